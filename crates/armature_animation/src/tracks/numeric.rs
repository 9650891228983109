use std::sync::Arc;

use armature_core::errors::Result;

use crate::keyframe::{KeyFrame, NumericKeyFrame};
use crate::time_index::TimeIndex;
use crate::tracks::{AnimationTrack, KeyFrameTrack, ListenerSlot, TrackListener};
use crate::values::Interpolatable;

/// A scalar property driven by numeric tracks.
pub trait AnimableValue {
    /// Adds `delta` on top of the current value.
    fn apply_delta(&mut self, delta: f32);

    /// Restores the value captured by [`set_current_state_as_base_value`](Self::set_current_state_as_base_value).
    fn reset_to_base_value(&mut self);

    fn set_current_state_as_base_value(&mut self);
}

/// A plain `f32` with a base value to reset to.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AnimableScalar {
    pub value: f32,
    base: f32,
}

impl AnimableScalar {
    #[must_use]
    pub fn new(value: f32) -> Self {
        Self { value, base: value }
    }

    #[must_use]
    pub fn base_value(&self) -> f32 {
        self.base
    }
}

impl AnimableValue for AnimableScalar {
    fn apply_delta(&mut self, delta: f32) {
        self.value += delta;
    }

    fn reset_to_base_value(&mut self) {
        self.value = self.base;
    }

    fn set_current_state_as_base_value(&mut self) {
        self.base = self.value;
    }
}

/// Scalar keyframes driving one animable value.
#[derive(Debug, Clone)]
pub struct NumericAnimationTrack {
    key_frames: KeyFrameTrack<NumericKeyFrame>,
    listener: ListenerSlot<NumericKeyFrame>,
}

impl NumericAnimationTrack {
    #[must_use]
    pub fn new(handle: u16) -> Self {
        Self {
            key_frames: KeyFrameTrack::new(handle),
            listener: ListenerSlot::default(),
        }
    }

    #[must_use]
    pub fn key_frames(&self) -> &[NumericKeyFrame] {
        self.key_frames.key_frames()
    }

    pub fn key_frame(&self, index: usize) -> Result<&NumericKeyFrame> {
        self.key_frames.get(index)
    }

    pub fn key_frame_mut(&mut self, index: usize) -> Result<&mut NumericKeyFrame> {
        self.key_frames.get_mut(index)
    }

    pub fn create_numeric_key_frame(&mut self, time: f32) -> &mut NumericKeyFrame {
        self.key_frames.create(time)
    }

    pub fn insert_key_frame(&mut self, key_frame: NumericKeyFrame) -> &mut NumericKeyFrame {
        self.key_frames.insert(key_frame)
    }

    pub fn set_listener(&mut self, listener: Option<Arc<dyn TrackListener<NumericKeyFrame>>>) {
        self.listener.set(listener);
    }

    /// Linearly interpolated value at `time_index`; 0.0 for an empty track.
    #[must_use]
    pub fn interpolated_key_frame(&self, time_index: &TimeIndex) -> NumericKeyFrame {
        let time = time_index.time_pos();
        if let Some(listener) = self.listener.get()
            && let Some(key_frame) = listener.interpolated_key_frame(self.handle(), time_index)
        {
            return key_frame;
        }

        let Some(span) = self.key_frames.key_frames_at_time(time_index) else {
            return NumericKeyFrame::at_time(time);
        };
        let frames = self.key_frames.key_frames();
        let k1 = frames[span.first].value;
        let k2 = frames[span.second].value;
        NumericKeyFrame::new(time, f32::interpolate_linear(k1, k2, span.t))
    }

    /// Adds `value * weight * scale` to `target`.
    pub fn apply_to_animable(&self, target: &mut dyn AnimableValue, time_index: &TimeIndex, weight: f32, scale: f32) {
        if self.key_frames.is_empty() || weight == 0.0 || scale == 0.0 {
            return;
        }
        let kf = self.interpolated_key_frame(time_index);
        target.apply_delta(kf.value * weight * scale);
    }
}

impl AnimationTrack for NumericAnimationTrack {
    fn handle(&self) -> u16 {
        self.key_frames.handle()
    }

    fn num_key_frames(&self) -> usize {
        self.key_frames.len()
    }

    fn key_frame_time(&self, index: usize) -> Result<f32> {
        self.key_frames.get(index).map(KeyFrame::time)
    }

    fn remove_key_frame(&mut self, index: usize) -> Result<()> {
        self.key_frames.remove(index).map(drop)
    }

    fn remove_all_key_frames(&mut self) {
        self.key_frames.clear();
    }

    fn collect_key_frame_times(&self, out: &mut Vec<f32>) {
        out.extend(self.key_frames.times());
    }

    fn build_key_frame_index_map(&mut self, global_times: &[f32]) {
        self.key_frames.build_index_map(global_times);
    }

    fn has_non_zero_key_frames(&self) -> bool {
        self.key_frames.key_frames().iter().any(|kf| kf.value != 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_interpolates_and_applies_delta() {
        let mut track = NumericAnimationTrack::new(3);
        track.create_numeric_key_frame(0.0).value = 0.0;
        track.create_numeric_key_frame(2.0).value = 10.0;

        let kf = track.interpolated_key_frame(&TimeIndex::new(0.5));
        assert!((kf.value - 2.5).abs() < 1e-6);

        let mut target = AnimableScalar::new(1.0);
        track.apply_to_animable(&mut target, &TimeIndex::new(1.0), 0.5, 2.0);
        assert!((target.value - 6.0).abs() < 1e-6);

        target.reset_to_base_value();
        assert_eq!(target.value, 1.0);
    }
}
