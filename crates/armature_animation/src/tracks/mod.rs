//! Animation tracks.
//!
//! Every track is keyed by a `u16` handle and stores a time-sorted keyframe
//! list in a [`KeyFrameTrack`]. The three families differ in payload and in
//! what they drive:
//!
//! - [`NodeAnimationTrack`]: transform deltas applied to an [`AnimableNode`]
//! - [`NumericAnimationTrack`]: scalar deltas applied to an [`AnimableValue`]
//! - [`VertexAnimationTrack`]: morph snapshots or pose blends applied to vertex data

use std::fmt;
use std::sync::Arc;

use armature_core::errors::{ArmatureError, Result};

use crate::keyframe::KeyFrame;
use crate::time_index::{TimeIndex, build_index_map};

pub mod node;
pub mod numeric;
pub mod vertex;

pub use node::{AnimableNode, NodeAnimationTrack};
pub use numeric::{AnimableValue, NumericAnimationTrack};
pub use vertex::{
    HardwareMorph, HardwarePoseSlot, HardwareVertexAnimation, VertexAnimationTarget,
    VertexAnimationTrack, VertexAnimationType, VertexTargetMode,
};

/// Hook that may replace a track's built-in interpolation.
///
/// Returning `None` falls back to the track's own interpolation.
pub trait TrackListener<K>: Send + Sync {
    fn interpolated_key_frame(&self, handle: u16, time_index: &TimeIndex) -> Option<K>;
}

/// Optional shared listener with a readable `Debug`.
pub(crate) struct ListenerSlot<K>(Option<Arc<dyn TrackListener<K>>>);

impl<K> ListenerSlot<K> {
    pub(crate) fn get(&self) -> Option<&Arc<dyn TrackListener<K>>> {
        self.0.as_ref()
    }

    pub(crate) fn set(&mut self, listener: Option<Arc<dyn TrackListener<K>>>) {
        self.0 = listener;
    }
}

impl<K> Default for ListenerSlot<K> {
    fn default() -> Self {
        Self(None)
    }
}

impl<K> Clone for ListenerSlot<K> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<K> fmt::Debug for ListenerSlot<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.0.is_some() { "Some(<listener>)" } else { "None" })
    }
}

/// Keyframes located around a time position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyFrameSpan {
    /// Index of the keyframe at or before the time.
    pub first: usize,
    /// Index of the keyframe at or after the time.
    pub second: usize,
    /// Blend parameter in `[0, 1)` from `first` to `second`.
    pub t: f32,
}

/// Time-sorted keyframe storage shared by all track families.
#[derive(Debug, Clone)]
pub struct KeyFrameTrack<K: KeyFrame> {
    handle: u16,
    key_frames: Vec<K>,
    // Local lower bound per global keyframe index; `None` until rebuilt.
    index_map: Option<Vec<usize>>,
}

impl<K: KeyFrame> KeyFrameTrack<K> {
    #[must_use]
    pub fn new(handle: u16) -> Self {
        Self {
            handle,
            key_frames: Vec::new(),
            index_map: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn handle(&self) -> u16 {
        self.handle
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.key_frames.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.key_frames.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn key_frames(&self) -> &[K] {
        &self.key_frames
    }

    pub fn get(&self, index: usize) -> Result<&K> {
        self.key_frames.get(index).ok_or(ArmatureError::IndexOutOfBounds {
            context: "key frame",
            index,
        })
    }

    pub fn get_mut(&mut self, index: usize) -> Result<&mut K> {
        self.key_frames.get_mut(index).ok_or(ArmatureError::IndexOutOfBounds {
            context: "key frame",
            index,
        })
    }

    /// Inserts a keyframe after any existing ones with the same time.
    pub fn insert(&mut self, key_frame: K) -> &mut K {
        let time = key_frame.time();
        let at = self.key_frames.partition_point(|k| k.time() <= time);
        self.key_frames.insert(at, key_frame);
        self.index_map = None;
        &mut self.key_frames[at]
    }

    pub fn create(&mut self, time: f32) -> &mut K {
        self.insert(K::at_time(time))
    }

    pub fn remove(&mut self, index: usize) -> Result<K> {
        if index >= self.key_frames.len() {
            return Err(ArmatureError::IndexOutOfBounds {
                context: "key frame",
                index,
            });
        }
        self.index_map = None;
        Ok(self.key_frames.remove(index))
    }

    pub fn clear(&mut self) {
        self.key_frames.clear();
        self.index_map = None;
    }

    /// Keeps only the keyframes for which `keep` returns true.
    pub(crate) fn retain_indices(&mut self, mut keep: impl FnMut(usize) -> bool) {
        let mut index = 0;
        self.key_frames.retain(|_| {
            let kept = keep(index);
            index += 1;
            kept
        });
        self.index_map = None;
    }

    pub(crate) fn key_frames_mut(&mut self) -> &mut [K] {
        &mut self.key_frames
    }

    pub fn times(&self) -> impl Iterator<Item = f32> + '_ {
        self.key_frames.iter().map(KeyFrame::time)
    }

    pub(crate) fn build_index_map(&mut self, global_times: &[f32]) {
        let local: Vec<f32> = self.times().collect();
        self.index_map = Some(build_index_map(&local, global_times));
    }

    #[inline]
    fn search(&self, time_index: &TimeIndex) -> usize {
        if let (Some(key), Some(map)) = (time_index.key_index(), self.index_map.as_ref())
            && let Some(&local) = map.get(key)
        {
            return local;
        }
        let time = time_index.time_pos();
        self.key_frames.partition_point(|k| k.time() < time)
    }

    /// Finds the keyframes bracketing `time_index`.
    ///
    /// Times before the first keyframe or after the last one clamp to that
    /// keyframe with `t = 0`. Returns `None` for an empty track.
    #[must_use]
    pub fn key_frames_at_time(&self, time_index: &TimeIndex) -> Option<KeyFrameSpan> {
        let last = self.key_frames.len().checked_sub(1)?;
        let time = time_index.time_pos();
        let second = self.search(time_index);

        if second > last {
            return Some(KeyFrameSpan {
                first: last,
                second: last,
                t: 0.0,
            });
        }

        let first = if second > 0 && time < self.key_frames[second].time() {
            second - 1
        } else {
            second
        };

        let t1 = self.key_frames[first].time();
        let t2 = self.key_frames[second].time();
        let t = if t1 == t2 { 0.0 } else { (time - t1) / (t2 - t1) };
        Some(KeyFrameSpan { first, second, t })
    }
}

/// Operations every track family supports, regardless of payload.
pub trait AnimationTrack {
    fn handle(&self) -> u16;

    fn num_key_frames(&self) -> usize;

    fn key_frame_time(&self, index: usize) -> Result<f32>;

    fn remove_key_frame(&mut self, index: usize) -> Result<()>;

    fn remove_all_key_frames(&mut self);

    /// Appends this track's keyframe times to `out`.
    fn collect_key_frame_times(&self, out: &mut Vec<f32>);

    /// Rebuilds the global-to-local keyframe index map against `global_times`.
    fn build_key_frame_index_map(&mut self, global_times: &[f32]);

    /// Whether any keyframe differs from the neutral payload.
    fn has_non_zero_key_frames(&self) -> bool;

    /// Removes redundant keyframes without changing the sampled result.
    fn optimise(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyframe::NumericKeyFrame;
    use crate::time_index::lower_bound;

    fn track(times: &[f32]) -> KeyFrameTrack<NumericKeyFrame> {
        let mut track = KeyFrameTrack::new(0);
        for &time in times {
            track.create(time);
        }
        track
    }

    #[test]
    fn insert_keeps_time_order_and_is_stable() {
        let mut track = track(&[2.0, 0.0, 1.0]);
        track.insert(NumericKeyFrame::new(1.0, 5.0));
        let times: Vec<f32> = track.times().collect();
        assert_eq!(times, vec![0.0, 1.0, 1.0, 2.0]);
        assert_eq!(track.get(2).unwrap().value, 5.0);
    }

    #[test]
    fn span_between_keys() {
        let track = track(&[0.0, 1.0, 2.0]);
        let span = track.key_frames_at_time(&TimeIndex::new(1.5)).unwrap();
        assert_eq!((span.first, span.second), (1, 2));
        assert!((span.t - 0.5).abs() < 1e-6);
    }

    #[test]
    fn span_clamps_outside_range() {
        let track = track(&[0.5, 1.0, 2.0]);
        let before = track.key_frames_at_time(&TimeIndex::new(0.0)).unwrap();
        assert_eq!((before.first, before.second, before.t), (0, 0, 0.0));
        let after = track.key_frames_at_time(&TimeIndex::new(5.0)).unwrap();
        assert_eq!((after.first, after.second, after.t), (2, 2, 0.0));
        let exact = track.key_frames_at_time(&TimeIndex::new(1.0)).unwrap();
        assert_eq!((exact.first, exact.second, exact.t), (1, 1, 0.0));
    }

    #[test]
    fn index_map_agrees_with_search() {
        let mut local = track(&[0.0, 2.0]);
        let global = [0.0, 1.0, 2.0, 3.0];
        local.build_index_map(&global);
        for time in [0.0, 0.5, 1.0, 1.5, 2.0, 2.5, 4.0] {
            let key = lower_bound(&global, time);
            let fast = local.key_frames_at_time(&TimeIndex::with_key_index(time, key));
            let slow = local.key_frames_at_time(&TimeIndex::new(time));
            assert_eq!(fast, slow, "time {time}");
        }
    }

    #[test]
    fn out_of_range_access_errors() {
        let mut track = track(&[0.0]);
        assert!(matches!(track.get(3), Err(ArmatureError::IndexOutOfBounds { index: 3, .. })));
        assert!(track.remove(1).is_err());
        assert!(track.key_frames_at_time(&TimeIndex::new(0.0)).is_some());
        track.clear();
        assert!(track.key_frames_at_time(&TimeIndex::new(0.0)).is_none());
    }
}
