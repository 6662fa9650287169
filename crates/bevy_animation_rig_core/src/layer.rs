use bevy::{
    log::{debug, warn},
    reflect::{Reflect, std_traits::ReflectDefault},
};
use serde::{Deserialize, Serialize};

use crate::{
    constraint::{ConstraintJob, RigConstraint, WEIGHT_PROPERTY},
    errors::{BindError, BindResult},
    node_path::NodePath,
    stream::{AnimationStream, PropertyBinding, PropertyHandle, StreamId},
};

/// Which solver a layer binds for its constraints.
#[derive(Reflect, Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[reflect(Default)]
pub enum LayerMode {
    /// Constraints drive their constrained nodes from their sources.
    #[default]
    Forward,
    /// Constraints are replaced by their inverse solvers, which drive the sources from the
    /// constrained nodes. Used when baking animation onto constraints.
    Inverse,
}

/// A weighted group of constraints evaluated in author order.
#[derive(Debug, Clone)]
pub struct Rig {
    pub path: NodePath,
    weight: f32,
    pub constraints: Vec<Box<dyn RigConstraint>>,
}

impl Rig {
    pub fn new(path: impl Into<NodePath>) -> Self {
        Self {
            path: path.into(),
            weight: 1.,
            constraints: vec![],
        }
    }

    pub fn with_constraint(mut self, constraint: impl RigConstraint) -> Self {
        self.constraints.push(Box::new(constraint));
        self
    }

    pub fn with_weight(mut self, weight: f32) -> Self {
        self.set_weight(weight);
        self
    }

    pub fn weight(&self) -> f32 {
        self.weight
    }

    /// Master weight of the rig, multiplied into every constraint weight.
    pub fn set_weight(&mut self, weight: f32) {
        self.weight = weight.clamp(0., 1.);
    }

    pub fn weight_property(&self) -> PropertyBinding {
        PropertyBinding::new(self.path.clone(), WEIGHT_PROPERTY)
    }

    pub fn constraint(&self, path: &NodePath) -> Option<&dyn RigConstraint> {
        self.constraints
            .iter()
            .find(|c| c.path() == path)
            .map(|c| c.as_ref())
    }

    pub fn constraint_mut(&mut self, path: &NodePath) -> Option<&mut Box<dyn RigConstraint>> {
        self.constraints.iter_mut().find(|c| c.path() == path)
    }
}

#[derive(Debug)]
struct BoundLayer {
    stream: StreamId,
    rig_weight: PropertyHandle,
    constraint_weights: Vec<PropertyHandle>,
    jobs: Vec<Box<dyn ConstraintJob>>,
}

/// A [`Rig`] plus its bound jobs.
///
/// Lifecycle: unbound, then [`RigLayer::bind`] creates a job per constraint, then
/// [`RigLayer::update`] any number of times, then [`RigLayer::reset`] destroys every job. Binding
/// either succeeds for every constraint or leaves the layer unbound.
#[derive(Debug)]
pub struct RigLayer {
    rig: Rig,
    pub active: bool,
    mode: LayerMode,
    bound: Option<BoundLayer>,
}

impl RigLayer {
    pub fn new(rig: Rig) -> Self {
        Self {
            rig,
            active: true,
            mode: LayerMode::Forward,
            bound: None,
        }
    }

    /// A layer that binds the inverse solver of every constraint of `rig`.
    pub fn inverse(rig: Rig) -> Self {
        Self {
            mode: LayerMode::Inverse,
            ..Self::new(rig)
        }
    }

    pub fn rig(&self) -> &Rig {
        &self.rig
    }

    /// Edits to constraint data only reach the jobs after the next [`RigLayer::bind`]; weights are
    /// synced every frame.
    pub fn rig_mut(&mut self) -> &mut Rig {
        &mut self.rig
    }

    pub fn mode(&self) -> LayerMode {
        self.mode
    }

    pub fn is_bound(&self) -> bool {
        self.bound.is_some()
    }

    pub fn bind(&mut self, stream: &mut dyn AnimationStream) -> BindResult<()> {
        self.reset();

        if self.rig.constraints.is_empty() {
            return Err(BindError::EmptyRig {
                rig: self.rig.path.clone(),
            });
        }

        for constraint in &self.rig.constraints {
            constraint.validate(stream.hierarchy())?;
        }

        let rig_weight = stream.bind_property(&self.rig.weight_property(), self.rig.weight);
        let mut constraint_weights = Vec::with_capacity(self.rig.constraints.len());
        let mut jobs: Vec<Box<dyn ConstraintJob>> = Vec::with_capacity(self.rig.constraints.len());

        for constraint in &self.rig.constraints {
            let weight_binding =
                PropertyBinding::new(constraint.path().clone(), WEIGHT_PROPERTY);
            constraint_weights.push(stream.bind_property(&weight_binding, constraint.weight()));

            let job = match self.mode {
                LayerMode::Forward => constraint.create_job(stream, Some(rig_weight)),
                LayerMode::Inverse => constraint.create_inverse_job(stream, Some(rig_weight)),
            };
            match job {
                Ok(job) => jobs.push(job),
                Err(error) => {
                    for (constraint, job) in self.rig.constraints.iter().zip(jobs) {
                        constraint.destroy_job(job);
                    }
                    return Err(error);
                }
            }
        }

        debug!(
            "Bound rig {} ({} constraints, {:?})",
            self.rig.path,
            jobs.len(),
            self.mode
        );

        self.bound = Some(BoundLayer {
            stream: stream.id(),
            rig_weight,
            constraint_weights,
            jobs,
        });
        Ok(())
    }

    /// Evaluates every job in author order. Does nothing when unbound.
    pub fn update(&mut self, stream: &mut dyn AnimationStream) {
        let Some(bound) = &mut self.bound else {
            return;
        };
        assert!(
            bound.stream == stream.id(),
            "rig {} updated with a stream it was not bound against",
            self.rig.path
        );

        if self.mode == LayerMode::Forward {
            bound.rig_weight.sync(stream, self.rig.weight);
        }

        for ((constraint, job), weight) in self
            .rig
            .constraints
            .iter()
            .zip(bound.jobs.iter_mut())
            .zip(&bound.constraint_weights)
        {
            if self.mode == LayerMode::Forward {
                weight.sync(stream, constraint.weight());
                constraint.update_job(&mut **job, stream);
            }
            job.evaluate(stream);
        }
    }

    /// Destroys every job and returns to the unbound state.
    pub fn reset(&mut self) {
        let Some(bound) = self.bound.take() else {
            return;
        };
        for (constraint, job) in self.rig.constraints.iter().zip(bound.jobs) {
            constraint.destroy_job(job);
        }
    }
}

/// Validates the rig before binding, logging the reason a layer is skipped.
pub(crate) fn bind_or_warn(layer: &mut RigLayer, stream: &mut dyn AnimationStream) -> bool {
    match layer.bind(stream) {
        Ok(()) => true,
        Err(error) => {
            warn!("Skipping rig {}: {error}", layer.rig.path);
            false
        }
    }
}
