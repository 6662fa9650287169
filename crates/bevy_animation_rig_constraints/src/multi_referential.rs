use bevy::reflect::{Reflect, std_traits::ReflectDefault};
use bevy_animation_rig_core::{
    affine::AffineTransform,
    binding::CurveBinding,
    constraint::{BindContext, ConstraintData, ConstraintJob, ConstraintWeight, InverseSolver, require_in},
    errors::{BindError, BindResult},
    hierarchy::{NodeId, RigHierarchy},
    node_path::NodePath,
    stream::{AnimationStream, PropertyHandle, ReadWriteTransformHandle},
};
use serde::{Deserialize, Serialize};

use crate::sources::tr_bindings;

pub const DRIVER: &str = "driver";

/// A group of nodes moving rigidly with whichever one of them is the driver.
///
/// Offsets are captured once, at bind time, relative to the driver authored at that point.
/// Switching the `driver` property at runtime keeps using those offsets.
#[derive(Reflect, Clone, Debug, Default, Serialize, Deserialize)]
#[reflect(Default)]
#[serde(default)]
pub struct MultiReferentialData {
    pub driver: usize,
    pub source_objects: Vec<Option<NodeId>>,
}

#[derive(Debug)]
pub struct MultiReferentialJob {
    sources: Vec<ReadWriteTransformHandle>,
    offsets: Vec<AffineTransform>,
    driver: PropertyHandle,
    weight: ConstraintWeight,
}

fn driver_index(value: f32, len: usize) -> usize {
    (value.round().max(0.) as usize).min(len.saturating_sub(1))
}

impl ConstraintJob for MultiReferentialJob {
    fn evaluate(&mut self, stream: &mut dyn AnimationStream) {
        let w = self.weight.get(stream);
        if w <= 0. {
            return;
        }
        let driver = driver_index(self.driver.get(stream), self.sources.len());
        let driver_tx = self.sources[driver].global_tr(stream);
        for (i, (source, offset)) in self.sources.iter().zip(&self.offsets).enumerate() {
            if i == driver {
                continue;
            }
            let current = source.global_tr(stream);
            source.set_global_tr(stream, current.lerp(&(driver_tx * *offset), w));
        }
    }
}

impl MultiReferentialData {
    fn bind_sources(
        &self,
        stream: &mut dyn AnimationStream,
        ctx: &BindContext,
    ) -> BindResult<(Vec<ReadWriteTransformHandle>, Vec<AffineTransform>, PropertyHandle)> {
        let sources = self
            .source_objects
            .iter()
            .map(|node| Ok(stream.bind_read_write(ctx.require(*node, "source_objects")?)))
            .collect::<BindResult<Vec<_>>>()?;
        let driver_bind = sources[self.driver].global_tr(stream);
        let offsets = sources
            .iter()
            .map(|source| driver_bind.inverse_mul(&source.global_tr(stream)))
            .collect();
        let driver = stream.bind_property(&ctx.property(DRIVER), self.driver as f32);
        Ok((sources, offsets, driver))
    }
}

impl ConstraintData for MultiReferentialData {
    type Job = MultiReferentialJob;
    type Inverse = MultiReferentialInverse;
    const NAME: &'static str = "MultiReferential";

    fn validate(&self, constraint: &NodePath, hierarchy: &RigHierarchy) -> BindResult<()> {
        if self.source_objects.is_empty() {
            return Err(BindError::EmptySources {
                constraint: constraint.clone(),
            });
        }
        for node in &self.source_objects {
            require_in(constraint, hierarchy, *node, "source_objects")?;
        }
        if self.driver >= self.source_objects.len() {
            return Err(BindError::InvalidParameter {
                constraint: constraint.clone(),
                reason: format!(
                    "driver {} is out of range for {} sources",
                    self.driver,
                    self.source_objects.len()
                ),
            });
        }
        Ok(())
    }

    fn create_job(
        &self,
        stream: &mut dyn AnimationStream,
        ctx: &BindContext,
    ) -> BindResult<MultiReferentialJob> {
        let (sources, offsets, driver) = self.bind_sources(stream, ctx)?;
        Ok(MultiReferentialJob {
            sources,
            offsets,
            driver,
            weight: ctx.weight,
        })
    }

    fn update_job(&self, job: &mut MultiReferentialJob, stream: &mut dyn AnimationStream) {
        job.driver.sync(stream, self.driver as f32);
    }

    fn source_bindings(&self, constraint: &NodePath, hierarchy: &RigHierarchy) -> Vec<CurveBinding> {
        let mut bindings = tr_bindings(hierarchy, self.source_objects.get(self.driver).copied().flatten());
        bindings.push(CurveBinding::float(constraint.clone(), DRIVER));
        bindings
    }

    fn constrained_bindings(&self, _: &NodePath, hierarchy: &RigHierarchy) -> Vec<CurveBinding> {
        self.source_objects
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != self.driver)
            .flat_map(|(_, node)| tr_bindings(hierarchy, *node))
            .collect()
    }
}

/// Recovers the driver pose from the first other source.
#[derive(Debug)]
pub struct MultiReferentialInverseJob {
    driver: ReadWriteTransformHandle,
    driver_index: usize,
    reference: Option<(ReadWriteTransformHandle, AffineTransform)>,
    driver_property: PropertyHandle,
    weight: ConstraintWeight,
}

impl ConstraintJob for MultiReferentialInverseJob {
    fn evaluate(&mut self, stream: &mut dyn AnimationStream) {
        self.weight.handle().set(stream, 1.);
        self.driver_property.set(stream, self.driver_index as f32);
        if let Some((reference, inverse_offset)) = &self.reference {
            let driver = reference.global_tr(stream) * *inverse_offset;
            self.driver.set_global_tr(stream, driver);
        }
    }
}

pub struct MultiReferentialInverse;

impl InverseSolver<MultiReferentialData> for MultiReferentialInverse {
    const SUPPORTED: bool = true;

    fn create_job(
        data: &MultiReferentialData,
        stream: &mut dyn AnimationStream,
        ctx: &BindContext,
    ) -> BindResult<Box<dyn ConstraintJob>> {
        let (sources, offsets, driver_property) = data.bind_sources(stream, ctx)?;
        let reference = sources
            .iter()
            .zip(&offsets)
            .enumerate()
            .find(|(i, _)| *i != data.driver)
            .map(|(_, (source, offset))| (*source, offset.inverse()));
        Ok(Box::new(MultiReferentialInverseJob {
            driver: sources[data.driver],
            driver_index: data.driver,
            reference,
            driver_property,
            weight: ctx.weight,
        }))
    }
}

#[cfg(test)]
mod tests {
    use bevy::{
        math::{Quat, Vec3},
        transform::components::Transform,
    };
    use bevy_animation_rig_core::stream::{PropertyBinding, SceneStream};

    use super::*;
    use crate::testing::{CONSTRAINT_PATH, assert_quat_eq, assert_vec_eq, inverse_layer, layer, scene};

    fn setup() -> (SceneStream, MultiReferentialData, [NodeId; 2]) {
        let (stream, ids) = scene(&[
            ("root", None, Vec3::ZERO),
            ("hand", Some(0), Vec3::X),
            ("prop", Some(0), Vec3::new(1., 0., 1.)),
        ]);
        let data = MultiReferentialData {
            driver: 0,
            source_objects: vec![Some(ids[1]), Some(ids[2])],
        };
        (stream, data, [ids[1], ids[2]])
    }

    #[test]
    fn zero_weight_is_pass_through() {
        let (mut stream, data, [hand, prop]) = setup();
        let mut layer = layer(data, 0.);
        layer.bind(&mut stream).unwrap();
        stream.set_local_transform(hand, Transform::from_xyz(0., 5., 0.));
        layer.update(&mut stream);
        assert_eq!(stream.local_transform(prop).translation, Vec3::new(1., 0., 1.));
    }

    #[test]
    fn others_follow_the_driver() {
        let (mut stream, data, [hand, prop]) = setup();
        let mut layer = layer(data, 1.);
        layer.bind(&mut stream).unwrap();
        stream.set_local_transform(
            hand,
            Transform::from_xyz(0., 2., 0.).with_rotation(Quat::from_rotation_y(std::f32::consts::FRAC_PI_2)),
        );
        layer.update(&mut stream);
        assert_vec_eq(stream.global_transform(prop).translation, Vec3::new(1., 2., 0.), 1e-5);
        assert_quat_eq(
            stream.global_transform(prop).rotation,
            Quat::from_rotation_y(std::f32::consts::FRAC_PI_2),
            1e-5,
        );
    }

    #[test]
    fn switching_driver_keeps_bind_time_offsets() {
        let (mut stream, data, [hand, prop]) = setup();
        let mut layer = layer(data, 1.);
        layer.bind(&mut stream).unwrap();
        let driver = stream
            .find_property(&PropertyBinding::new(CONSTRAINT_PATH.into(), DRIVER))
            .unwrap();
        driver.set(&mut stream, 1.);
        stream.set_property_animated(driver, true);
        layer.update(&mut stream);

        // offsets stay relative to the bind-time driver, so the hand lands on the prop
        assert_vec_eq(stream.global_transform(hand).translation, Vec3::new(1., 0., 1.), 1e-5);
    }

    #[test]
    fn out_of_range_driver_is_invalid() {
        let (mut stream, mut data, _) = setup();
        data.driver = 2;
        assert!(layer(data, 1.).bind(&mut stream).is_err());
    }

    #[test]
    fn inverse_recovers_the_driver() {
        let (mut stream, data, [hand, prop]) = setup();
        let mut inverse = inverse_layer(data.clone());
        inverse.bind(&mut stream).unwrap();

        stream.set_local_transform(prop, Transform::from_xyz(4., 0., 1.));
        inverse.update(&mut stream);
        assert_vec_eq(stream.global_transform(hand).translation, Vec3::new(4., 0., 0.), 1e-5);
    }
}
