use std::{any::Any, fmt::Debug};

use bevy::reflect::Reflect;
use serde::{Deserialize, Serialize};

use crate::{
    binding::CurveBinding,
    errors::{BindError, BindResult},
    hierarchy::{NodeId, RigHierarchy},
    node_path::NodePath,
    stream::{AnimationStream, PropertyBinding, PropertyHandle},
};

pub const WEIGHT_PROPERTY: &str = "weight";

pub trait AsAny {
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl<T: Any> AsAny for T {
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// Bound runtime state of one constraint: handles, cached offsets and scratch buffers.
pub trait ConstraintJob: AsAny + Send + Sync + Debug + 'static {
    /// Reads and writes the stream for the current frame. Must never produce NaN poses.
    fn evaluate(&mut self, stream: &mut dyn AnimationStream);
}

/// The constraint weight as seen by a job: the constraint's own weight property scaled by the
/// owning rig's weight property, clamped to `[0, 1]`.
#[derive(Reflect, Clone, Copy, Debug, PartialEq)]
pub struct ConstraintWeight {
    weight: PropertyHandle,
    rig_weight: Option<PropertyHandle>,
}

impl ConstraintWeight {
    pub fn new(weight: PropertyHandle, rig_weight: Option<PropertyHandle>) -> Self {
        Self { weight, rig_weight }
    }

    pub fn get(&self, stream: &dyn AnimationStream) -> f32 {
        let rig = self.rig_weight.map_or(1., |handle| handle.get(stream));
        (self.weight.get(stream) * rig).clamp(0., 1.)
    }

    pub fn handle(&self) -> PropertyHandle {
        self.weight
    }

    pub fn sync(&self, stream: &mut dyn AnimationStream, authored: f32) {
        self.weight.sync(stream, authored);
    }
}

/// What a constraint needs while creating its job.
pub struct BindContext<'a> {
    pub constraint: &'a NodePath,
    pub weight: ConstraintWeight,
}

impl BindContext<'_> {
    pub fn property(&self, name: impl Into<String>) -> PropertyBinding {
        PropertyBinding::new(self.constraint.clone(), name)
    }

    pub fn require(&self, node: Option<NodeId>, field: &'static str) -> BindResult<NodeId> {
        require(self.constraint, node, field)
    }
}

/// Resolves a required node reference, failing with [`BindError::MissingReference`].
pub fn require(constraint: &NodePath, node: Option<NodeId>, field: &'static str) -> BindResult<NodeId> {
    node.ok_or_else(|| BindError::MissingReference {
        constraint: constraint.clone(),
        field,
    })
}

/// Like [`require`], additionally checking that the node exists in `hierarchy`.
pub fn require_in(
    constraint: &NodePath,
    hierarchy: &RigHierarchy,
    node: Option<NodeId>,
    field: &'static str,
) -> BindResult<NodeId> {
    let node = require(constraint, node, field)?;
    if hierarchy.contains(node) {
        Ok(node)
    } else {
        Err(BindError::UnknownNode {
            constraint: constraint.clone(),
            node,
        })
    }
}

/// Path of every node in `nodes` that exists in `hierarchy`, in order.
pub fn node_paths<'a>(
    hierarchy: &'a RigHierarchy,
    nodes: impl IntoIterator<Item = Option<NodeId>> + 'a,
) -> impl Iterator<Item = &'a NodePath> + 'a {
    nodes
        .into_iter()
        .flatten()
        .filter_map(|node| hierarchy.path(node))
}

/// Authored data of one constraint kind, and the binder that turns it into a job.
pub trait ConstraintData: Clone + Debug + Send + Sync + 'static {
    type Job: ConstraintJob;
    /// Inverse solver used when baking animation back onto this constraint's sources.
    /// [`NoInverse`] registers that none exists.
    type Inverse: InverseSolver<Self>;

    const NAME: &'static str;
    const CAN_BAKE_TO_SKELETON: bool = true;

    fn validate(&self, constraint: &NodePath, hierarchy: &RigHierarchy) -> BindResult<()>;

    fn create_job(
        &self,
        stream: &mut dyn AnimationStream,
        ctx: &BindContext,
    ) -> BindResult<Self::Job>;

    /// Pushes authored animatable values into the stream before evaluation.
    #[allow(unused_variables)]
    fn update_job(&self, job: &mut Self::Job, stream: &mut dyn AnimationStream) {}

    #[allow(unused_variables)]
    fn destroy_job(&self, job: Self::Job) {}

    /// Channels the forward solver reads, excluding the constraint weight.
    fn source_bindings(&self, constraint: &NodePath, hierarchy: &RigHierarchy) -> Vec<CurveBinding>;

    /// Channels the forward solver writes.
    fn constrained_bindings(
        &self,
        constraint: &NodePath,
        hierarchy: &RigHierarchy,
    ) -> Vec<CurveBinding>;
}

/// Inverse counterpart of a forward solver: recovers source values from the pose the forward
/// solver would have produced.
pub trait InverseSolver<D: ?Sized>: 'static {
    const SUPPORTED: bool;

    fn create_job(
        data: &D,
        stream: &mut dyn AnimationStream,
        ctx: &BindContext,
    ) -> BindResult<Box<dyn ConstraintJob>>;
}

/// Registration for constraint kinds without an inverse solver.
pub struct NoInverse;

impl<D: ?Sized> InverseSolver<D> for NoInverse {
    const SUPPORTED: bool = false;

    fn create_job(
        _data: &D,
        _stream: &mut dyn AnimationStream,
        ctx: &BindContext,
    ) -> BindResult<Box<dyn ConstraintJob>> {
        Err(BindError::NoInverse {
            constraint: ctx.constraint.clone(),
        })
    }
}

/// Object safe view of a constraint, as stored by rigs.
pub trait RigConstraint: Send + Sync + Debug + 'static {
    fn path(&self) -> &NodePath;
    fn kind(&self) -> &'static str;
    fn weight(&self) -> f32;
    fn set_weight(&mut self, weight: f32);

    fn validate(&self, hierarchy: &RigHierarchy) -> BindResult<()>;
    fn create_job(
        &self,
        stream: &mut dyn AnimationStream,
        rig_weight: Option<PropertyHandle>,
    ) -> BindResult<Box<dyn ConstraintJob>>;
    fn create_inverse_job(
        &self,
        stream: &mut dyn AnimationStream,
        rig_weight: Option<PropertyHandle>,
    ) -> BindResult<Box<dyn ConstraintJob>>;
    fn update_job(&self, job: &mut dyn ConstraintJob, stream: &mut dyn AnimationStream);
    fn destroy_job(&self, job: Box<dyn ConstraintJob>);

    fn can_bake_to_skeleton(&self) -> bool;
    fn can_bake_to_constraint(&self) -> bool;
    fn source_bindings(&self, hierarchy: &RigHierarchy) -> Vec<CurveBinding>;
    fn constrained_bindings(&self, hierarchy: &RigHierarchy) -> Vec<CurveBinding>;

    fn weight_binding(&self) -> CurveBinding {
        CurveBinding::float(self.path().clone(), WEIGHT_PROPERTY)
    }

    fn clone_box(&self) -> Box<dyn RigConstraint>;
}

impl Clone for Box<dyn RigConstraint> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

fn default_weight() -> f32 {
    1.
}

/// A constraint component: where it lives, its weight and its authored data.
#[derive(Reflect, Clone, Debug, Serialize, Deserialize)]
pub struct Constraint<D> {
    pub path: NodePath,
    #[serde(default = "default_weight")]
    pub weight: f32,
    pub data: D,
}

impl<D: ConstraintData> Constraint<D> {
    pub fn new(path: impl Into<NodePath>, data: D) -> Self {
        Self {
            path: path.into(),
            weight: 1.,
            data,
        }
    }

    pub fn with_weight(mut self, weight: f32) -> Self {
        self.weight = weight.clamp(0., 1.);
        self
    }

    fn bind_context<'a>(
        &'a self,
        stream: &mut dyn AnimationStream,
        rig_weight: Option<PropertyHandle>,
    ) -> BindContext<'a> {
        let binding = PropertyBinding::new(self.path.clone(), WEIGHT_PROPERTY);
        let weight = stream.bind_property(&binding, self.weight);
        BindContext {
            constraint: &self.path,
            weight: ConstraintWeight::new(weight, rig_weight),
        }
    }
}

impl<D: ConstraintData> RigConstraint for Constraint<D> {
    fn path(&self) -> &NodePath {
        &self.path
    }

    fn kind(&self) -> &'static str {
        D::NAME
    }

    fn weight(&self) -> f32 {
        self.weight
    }

    fn set_weight(&mut self, weight: f32) {
        self.weight = weight.clamp(0., 1.);
    }

    fn validate(&self, hierarchy: &RigHierarchy) -> BindResult<()> {
        self.data.validate(&self.path, hierarchy)
    }

    fn create_job(
        &self,
        stream: &mut dyn AnimationStream,
        rig_weight: Option<PropertyHandle>,
    ) -> BindResult<Box<dyn ConstraintJob>> {
        self.validate(stream.hierarchy())?;
        let ctx = self.bind_context(stream, rig_weight);
        let job = self.data.create_job(stream, &ctx)?;
        Ok(Box::new(job))
    }

    fn create_inverse_job(
        &self,
        stream: &mut dyn AnimationStream,
        rig_weight: Option<PropertyHandle>,
    ) -> BindResult<Box<dyn ConstraintJob>> {
        self.validate(stream.hierarchy())?;
        let ctx = self.bind_context(stream, rig_weight);
        <D::Inverse as InverseSolver<D>>::create_job(&self.data, stream, &ctx)
    }

    fn update_job(&self, job: &mut dyn ConstraintJob, stream: &mut dyn AnimationStream) {
        if let Some(job) = job.as_any_mut().downcast_mut::<D::Job>() {
            self.data.update_job(job, stream);
        }
    }

    fn destroy_job(&self, job: Box<dyn ConstraintJob>) {
        if let Ok(job) = job.into_any().downcast::<D::Job>() {
            self.data.destroy_job(*job);
        }
    }

    fn can_bake_to_skeleton(&self) -> bool {
        D::CAN_BAKE_TO_SKELETON
    }

    fn can_bake_to_constraint(&self) -> bool {
        <D::Inverse as InverseSolver<D>>::SUPPORTED
    }

    fn source_bindings(&self, hierarchy: &RigHierarchy) -> Vec<CurveBinding> {
        self.data.source_bindings(&self.path, hierarchy)
    }

    fn constrained_bindings(&self, hierarchy: &RigHierarchy) -> Vec<CurveBinding> {
        self.data.constrained_bindings(&self.path, hierarchy)
    }

    fn clone_box(&self) -> Box<dyn RigConstraint> {
        Box::new(self.clone())
    }
}
