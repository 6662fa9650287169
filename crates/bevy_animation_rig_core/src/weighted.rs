use bevy::reflect::{Reflect, std_traits::ReflectDefault};
use serde::{Deserialize, Serialize};

use crate::{errors::WeightedSetError, hierarchy::NodeId};

/// A source node reference paired with its influence.
#[derive(Reflect, Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[reflect(Default)]
pub struct WeightedTransform {
    pub node: Option<NodeId>,
    pub weight: f32,
}

impl Default for WeightedTransform {
    fn default() -> Self {
        Self {
            node: None,
            weight: 1.,
        }
    }
}

impl WeightedTransform {
    pub fn new(node: NodeId, weight: f32) -> Self {
        Self {
            node: Some(node),
            weight,
        }
    }
}

/// Optional clamp for authored weights. `None` bounds are open.
#[derive(Reflect, Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[reflect(Default)]
pub struct WeightRange {
    pub min: Option<f32>,
    pub max: Option<f32>,
}

impl WeightRange {
    pub const UNIT: Self = Self {
        min: Some(0.),
        max: Some(1.),
    };

    pub const SIGNED_UNIT: Self = Self {
        min: Some(-1.),
        max: Some(1.),
    };

    pub fn clamp(&self, value: f32) -> f32 {
        let value = self.min.map_or(value, |min| value.max(min));
        self.max.map_or(value, |max| value.min(max))
    }
}

/// Ordered, fixed capacity list of weighted sources.
///
/// The order is preserved exactly as authored: the `i`-th entry is addressed by the indexed
/// property `<array>.item<i>.weight` when curves are bound to it.
#[derive(Reflect, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[reflect(Default)]
#[serde(try_from = "Vec<WeightedTransform>", into = "Vec<WeightedTransform>")]
pub struct WeightedTransformSet {
    items: Vec<WeightedTransform>,
}

impl WeightedTransformSet {
    pub const CAPACITY: usize = 8;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn push(&mut self, item: WeightedTransform) -> Result<(), WeightedSetError> {
        self.ensure_room()?;
        self.items.push(item);
        Ok(())
    }

    pub fn insert(&mut self, index: usize, item: WeightedTransform) -> Result<(), WeightedSetError> {
        self.ensure_room()?;
        if index > self.items.len() {
            return Err(WeightedSetError::IndexOutOfRange {
                index,
                len: self.items.len(),
            });
        }
        self.items.insert(index, item);
        Ok(())
    }

    pub fn remove(&mut self, index: usize) -> Result<WeightedTransform, WeightedSetError> {
        if index >= self.items.len() {
            return Err(WeightedSetError::IndexOutOfRange {
                index,
                len: self.items.len(),
            });
        }
        Ok(self.items.remove(index))
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn get(&self, index: usize) -> Option<&WeightedTransform> {
        self.items.get(index)
    }

    pub fn set_weight(&mut self, index: usize, weight: f32) -> Result<(), WeightedSetError> {
        let len = self.items.len();
        let item = self
            .items
            .get_mut(index)
            .ok_or(WeightedSetError::IndexOutOfRange { index, len })?;
        item.weight = weight;
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &WeightedTransform> {
        self.items.iter()
    }

    pub fn weights(&self) -> impl Iterator<Item = f32> + '_ {
        self.items.iter().map(|item| item.weight)
    }

    pub fn clamp_weights(&mut self, range: WeightRange) {
        for item in &mut self.items {
            item.weight = range.clamp(item.weight);
        }
    }

    fn ensure_room(&self) -> Result<(), WeightedSetError> {
        if self.items.len() >= Self::CAPACITY {
            Err(WeightedSetError::CapacityExceeded {
                capacity: Self::CAPACITY,
            })
        } else {
            Ok(())
        }
    }
}

impl TryFrom<Vec<WeightedTransform>> for WeightedTransformSet {
    type Error = WeightedSetError;

    fn try_from(items: Vec<WeightedTransform>) -> Result<Self, Self::Error> {
        if items.len() > Self::CAPACITY {
            return Err(WeightedSetError::CapacityExceeded {
                capacity: Self::CAPACITY,
            });
        }
        Ok(Self { items })
    }
}

impl From<WeightedTransformSet> for Vec<WeightedTransform> {
    fn from(value: WeightedTransformSet) -> Self {
        value.items
    }
}

impl<'a> IntoIterator for &'a WeightedTransformSet {
    type Item = &'a WeightedTransform;
    type IntoIter = std::slice::Iter<'a, WeightedTransform>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_past_capacity_is_rejected() {
        let mut set = WeightedTransformSet::new();
        for i in 0..WeightedTransformSet::CAPACITY {
            set.push(WeightedTransform::new(NodeId(i), 1.)).unwrap();
        }
        assert_eq!(
            set.push(WeightedTransform::new(NodeId(99), 1.)),
            Err(WeightedSetError::CapacityExceeded { capacity: 8 })
        );
        assert_eq!(
            set.insert(0, WeightedTransform::new(NodeId(99), 1.)),
            Err(WeightedSetError::CapacityExceeded { capacity: 8 })
        );
        assert_eq!(set.len(), 8);
    }

    #[test]
    fn insertion_order_is_preserved() {
        let mut set = WeightedTransformSet::new();
        set.push(WeightedTransform::new(NodeId(3), 0.5)).unwrap();
        set.push(WeightedTransform::new(NodeId(1), 0.25)).unwrap();
        set.insert(1, WeightedTransform::new(NodeId(7), 1.)).unwrap();
        let nodes: Vec<_> = set.iter().filter_map(|item| item.node).collect();
        assert_eq!(nodes, vec![NodeId(3), NodeId(7), NodeId(1)]);
    }

    #[test]
    fn oversized_deserialization_fails() {
        let items = (0..9)
            .map(|i| format!("(node: Some({i}), weight: 1.0)"))
            .collect::<Vec<_>>()
            .join(", ");
        let result: Result<WeightedTransformSet, _> = ron::from_str(&format!("[{items}]"));
        assert!(result.is_err());

        let ok: WeightedTransformSet = ron::from_str("[(node: Some(2), weight: 0.5)]").unwrap();
        assert_eq!(ok.get(0), Some(&WeightedTransform::new(NodeId(2), 0.5)));
    }

    #[test]
    fn clamp_weights_to_range() {
        let mut set = WeightedTransformSet::new();
        set.push(WeightedTransform::new(NodeId(0), 1.5)).unwrap();
        set.push(WeightedTransform::new(NodeId(1), -2.)).unwrap();
        set.clamp_weights(WeightRange::UNIT);
        assert_eq!(set.weights().collect::<Vec<_>>(), vec![1., 0.]);
    }
}
