use bevy::reflect::{Reflect, std_traits::ReflectDefault};
use serde::{Deserialize, Serialize};

#[derive(Reflect, Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[reflect(Default)]
pub struct Keyframe {
    pub time: f32,
    pub value: f32,
}

impl Keyframe {
    pub fn new(time: f32, value: f32) -> Self {
        Self { time, value }
    }
}

/// Sparse scalar curve, linearly interpolated between keys and held constant outside them.
#[derive(Reflect, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[reflect(Default)]
pub struct AnimationCurve {
    keys: Vec<Keyframe>,
}

impl AnimationCurve {
    pub fn new(keys: impl IntoIterator<Item = Keyframe>) -> Self {
        let mut curve = Self {
            keys: keys.into_iter().collect(),
        };
        curve.keys.sort_by(|a, b| a.time.total_cmp(&b.time));
        curve
    }

    pub fn constant(value: f32) -> Self {
        Self::new([Keyframe::new(0., value)])
    }

    pub fn linear(start_time: f32, start_value: f32, end_time: f32, end_value: f32) -> Self {
        Self::new([
            Keyframe::new(start_time, start_value),
            Keyframe::new(end_time, end_value),
        ])
    }

    pub fn keys(&self) -> &[Keyframe] {
        &self.keys
    }

    /// Adds a key, replacing any existing key at the same time.
    pub fn add_key(&mut self, key: Keyframe) {
        match self
            .keys
            .binary_search_by(|existing| existing.time.total_cmp(&key.time))
        {
            Ok(index) => self.keys[index] = key,
            Err(index) => self.keys.insert(index, key),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn start_time(&self) -> f32 {
        self.keys.first().map_or(0., |k| k.time)
    }

    pub fn end_time(&self) -> f32 {
        self.keys.last().map_or(0., |k| k.time)
    }

    pub fn evaluate(&self, time: f32) -> f32 {
        let Some(first) = self.keys.first() else {
            return 0.;
        };
        if time <= first.time {
            return first.value;
        }
        let next = self.keys.partition_point(|k| k.time <= time);
        if next >= self.keys.len() {
            return self.keys[self.keys.len() - 1].value;
        }
        let (a, b) = (self.keys[next - 1], self.keys[next]);
        let span = b.time - a.time;
        if span <= f32::EPSILON {
            return b.value;
        }
        let f = (time - a.time) / span;
        a.value + (b.value - a.value) * f
    }
}

/// One sample per frame at a fixed rate, as produced by baking.
#[derive(Reflect, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[reflect(Default)]
pub struct DenseCurve {
    pub start_time: f32,
    pub frame_rate: f32,
    /// Time of the last sample when the range is not a whole number of frames.
    #[serde(default)]
    pub end_time: Option<f32>,
    pub samples: Vec<f32>,
}

impl DenseCurve {
    pub fn new(start_time: f32, frame_rate: f32) -> Self {
        Self {
            start_time,
            frame_rate,
            end_time: None,
            samples: vec![],
        }
    }

    pub fn with_end_time(mut self, end_time: f32) -> Self {
        self.end_time = Some(end_time);
        self
    }

    pub fn push(&mut self, value: f32) {
        self.samples.push(value);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn time_of(&self, frame: usize) -> f32 {
        let time = self.start_time + frame as f32 / self.frame_rate;
        self.end_time.map_or(time, |end| time.min(end))
    }

    /// Every sample as a key.
    pub fn to_keyframes(&self) -> AnimationCurve {
        AnimationCurve {
            keys: self
                .samples
                .iter()
                .enumerate()
                .map(|(frame, value)| Keyframe::new(self.time_of(frame), *value))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evaluate_interpolates_and_clamps() {
        let curve = AnimationCurve::new([
            Keyframe::new(1., 10.),
            Keyframe::new(0., 0.),
            Keyframe::new(2., 10.),
        ]);
        assert_eq!(curve.evaluate(-1.), 0.);
        assert_eq!(curve.evaluate(0.5), 5.);
        assert_eq!(curve.evaluate(1.5), 10.);
        assert_eq!(curve.evaluate(3.), 10.);
        assert_eq!(AnimationCurve::default().evaluate(1.), 0.);
    }

    #[test]
    fn add_key_replaces_same_time() {
        let mut curve = AnimationCurve::constant(1.);
        curve.add_key(Keyframe::new(0., 2.));
        curve.add_key(Keyframe::new(1., 4.));
        assert_eq!(curve.keys().len(), 2);
        assert_eq!(curve.evaluate(0.5), 3.);
    }

    #[test]
    fn dense_curve_to_keyframes_keeps_frame_times() {
        let mut dense = DenseCurve::new(0.5, 10.);
        dense.push(1.);
        dense.push(2.);
        let keys = dense.to_keyframes();
        assert!((keys.keys()[1].time - 0.6).abs() < 1e-6);
        assert_eq!(keys.keys()[1].value, 2.);
    }
}
