use std::borrow::Cow;
use std::sync::Arc;

use glam::{Quat, Vec3};

use armature_core::errors::Result;
use armature_core::math::{
    DEFAULT_TOLERANCE, nlerp, position_equals, real_equal, rotation_angle, rotation_equals, slerp,
};

use crate::keyframe::{KeyFrame, TransformKeyFrame};
use crate::settings::{InterpolationMode, RotationInterpolationMode, SkeletonBlendMode};
use crate::spline::{RotationalSpline, SimpleSpline};
use crate::time_index::TimeIndex;
use crate::tracks::{AnimationTrack, KeyFrameTrack, ListenerSlot, TrackListener};

/// A transformable target driven by node tracks, typically a bone.
///
/// Tracks add their contribution on top of whatever the node currently holds,
/// so callers reset nodes to their initial state once before applying a set
/// of animations.
pub trait AnimableNode {
    /// Adds `delta` to the local position.
    fn translate(&mut self, delta: Vec3);

    /// Rotates in local space: `orientation = orientation * delta`.
    fn rotate(&mut self, delta: Quat);

    fn scale(&self) -> Vec3;

    fn set_scale(&mut self, scale: Vec3);

    /// Restores the node's baseline transform.
    fn reset_to_initial_state(&mut self);
}

/// Interpolation and blending parameters an animation passes to its tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NodeApplyMode {
    pub interpolation: InterpolationMode,
    pub rotation_interpolation: RotationInterpolationMode,
    pub blend_mode: SkeletonBlendMode,
}

#[derive(Debug, Clone)]
struct NodeSplines {
    position: SimpleSpline,
    rotation: RotationalSpline,
    scale: SimpleSpline,
}

impl NodeSplines {
    /// With `shortest_path`, each rotation is negated when it lies in the
    /// opposite hemisphere from its (already adjusted) predecessor, so squad
    /// tangents are built along the short arc.
    fn build(key_frames: &[TransformKeyFrame], shortest_path: bool) -> Self {
        let mut rotations: Vec<Quat> = Vec::with_capacity(key_frames.len());
        for kf in key_frames {
            let rotation = match rotations.last() {
                Some(prev) if shortest_path && prev.dot(kf.rotation) < 0.0 => -kf.rotation,
                _ => kf.rotation,
            };
            rotations.push(rotation);
        }
        Self {
            position: SimpleSpline::new(key_frames.iter().map(|k| k.translate).collect()),
            rotation: RotationalSpline::new(rotations),
            scale: SimpleSpline::new(key_frames.iter().map(|k| k.scale).collect()),
        }
    }
}

/// Transform keyframes driving one node.
#[derive(Debug, Clone)]
pub struct NodeAnimationTrack {
    key_frames: KeyFrameTrack<TransformKeyFrame>,
    use_shortest_rotation_path: bool,
    // Cleared on any keyframe edit.
    splines: Option<NodeSplines>,
    listener: ListenerSlot<TransformKeyFrame>,
}

impl NodeAnimationTrack {
    #[must_use]
    pub fn new(handle: u16) -> Self {
        Self {
            key_frames: KeyFrameTrack::new(handle),
            use_shortest_rotation_path: true,
            splines: None,
            listener: ListenerSlot::default(),
        }
    }

    #[must_use]
    pub fn key_frames(&self) -> &[TransformKeyFrame] {
        self.key_frames.key_frames()
    }

    pub fn key_frame(&self, index: usize) -> Result<&TransformKeyFrame> {
        self.key_frames.get(index)
    }

    pub fn key_frame_mut(&mut self, index: usize) -> Result<&mut TransformKeyFrame> {
        self.splines = None;
        self.key_frames.get_mut(index)
    }

    /// Creates a neutral keyframe at `time` and returns it for editing.
    pub fn create_node_key_frame(&mut self, time: f32) -> &mut TransformKeyFrame {
        self.splines = None;
        self.key_frames.create(time)
    }

    pub fn insert_key_frame(&mut self, key_frame: TransformKeyFrame) -> &mut TransformKeyFrame {
        self.splines = None;
        self.key_frames.insert(key_frame)
    }

    #[inline]
    #[must_use]
    pub fn use_shortest_rotation_path(&self) -> bool {
        self.use_shortest_rotation_path
    }

    pub fn set_use_shortest_rotation_path(&mut self, enabled: bool) {
        if enabled != self.use_shortest_rotation_path {
            self.splines = None;
        }
        self.use_shortest_rotation_path = enabled;
    }

    pub fn set_listener(&mut self, listener: Option<Arc<dyn TrackListener<TransformKeyFrame>>>) {
        self.listener.set(listener);
    }

    /// Builds the spline cache used by [`InterpolationMode::Spline`].
    pub fn build_interpolation_splines(&mut self) {
        if self.splines.is_none() {
            self.splines = Some(NodeSplines::build(
                self.key_frames.key_frames(),
                self.use_shortest_rotation_path,
            ));
        }
    }

    #[must_use]
    pub fn has_spline_cache(&self) -> bool {
        self.splines.is_some()
    }

    /// Samples the track at `time_index`.
    #[must_use]
    pub fn interpolated_key_frame(
        &self,
        time_index: &TimeIndex,
        interpolation: InterpolationMode,
        rotation_interpolation: RotationInterpolationMode,
    ) -> TransformKeyFrame {
        let time = time_index.time_pos();
        if let Some(listener) = self.listener.get()
            && let Some(key_frame) = listener.interpolated_key_frame(self.handle(), time_index)
        {
            return key_frame;
        }

        let Some(span) = self.key_frames.key_frames_at_time(time_index) else {
            return TransformKeyFrame::at_time(time);
        };
        let frames = self.key_frames.key_frames();
        let k1 = &frames[span.first];
        if span.t == 0.0 {
            return k1.retimed(time);
        }
        let k2 = &frames[span.second];
        let t = span.t;

        match interpolation {
            InterpolationMode::Linear => {
                let rotation = match rotation_interpolation {
                    RotationInterpolationMode::Linear => {
                        nlerp(t, k1.rotation, k2.rotation, self.use_shortest_rotation_path)
                    }
                    RotationInterpolationMode::Spherical => {
                        slerp(t, k1.rotation, k2.rotation, self.use_shortest_rotation_path)
                    }
                };
                TransformKeyFrame::new(
                    time,
                    k1.translate.lerp(k2.translate, t),
                    rotation,
                    k1.scale.lerp(k2.scale, t),
                )
            }
            InterpolationMode::Spline => {
                let splines = match &self.splines {
                    Some(splines) => Cow::Borrowed(splines),
                    None => {
                        log::trace!("Track {}: sampling splines without a prepared cache", self.handle());
                        Cow::Owned(NodeSplines::build(frames, self.use_shortest_rotation_path))
                    }
                };
                TransformKeyFrame::new(
                    time,
                    splines.position.interpolate(span.first, t),
                    splines
                        .rotation
                        .interpolate(span.first, t, self.use_shortest_rotation_path),
                    splines.scale.interpolate(span.first, t),
                )
            }
        }
    }

    /// Adds this track's contribution at `time_index` to `node`.
    ///
    /// Translation is scaled by `weight * scale`. Rotation is blended from
    /// identity by `weight`. Scale deltas are scaled by `weight * scale` and
    /// multiply in [`SkeletonBlendMode::Average`] or add in
    /// [`SkeletonBlendMode::Cumulative`].
    pub fn apply_to_node(
        &self,
        node: &mut dyn AnimableNode,
        time_index: &TimeIndex,
        weight: f32,
        scale: f32,
        mode: NodeApplyMode,
    ) {
        if self.key_frames.is_empty() || weight == 0.0 {
            return;
        }
        let kf = self.interpolated_key_frame(time_index, mode.interpolation, mode.rotation_interpolation);

        node.translate(kf.translate * (weight * scale));

        let rotation = match mode.rotation_interpolation {
            RotationInterpolationMode::Linear => {
                nlerp(weight, Quat::IDENTITY, kf.rotation, self.use_shortest_rotation_path)
            }
            RotationInterpolationMode::Spherical => {
                slerp(weight, Quat::IDENTITY, kf.rotation, self.use_shortest_rotation_path)
            }
        };
        node.rotate(rotation);

        if kf.scale != Vec3::ONE {
            let delta = (kf.scale - Vec3::ONE) * (weight * scale);
            let current = node.scale();
            match mode.blend_mode {
                SkeletonBlendMode::Average => node.set_scale(current * (Vec3::ONE + delta)),
                SkeletonBlendMode::Cumulative => node.set_scale(current + delta),
            }
        }
    }

    pub fn reset_node_to_initial_state(&self, node: &mut dyn AnimableNode) {
        node.reset_to_initial_state();
    }

    /// Re-expresses every keyframe relative to `base`.
    pub fn rebase(&mut self, base: &TransformKeyFrame) {
        let inv_rotation = base.rotation.inverse();
        let inv_scale = Vec3::ONE / base.scale;
        for kf in self.key_frames.key_frames_mut() {
            kf.translate -= base.translate;
            kf.rotation = inv_rotation * kf.rotation;
            kf.scale *= inv_scale;
        }
        self.splines = None;
    }

    /// Applies `f` to every keyframe payload.
    pub fn transform_key_frames(&mut self, mut f: impl FnMut(&mut TransformKeyFrame)) {
        for kf in self.key_frames.key_frames_mut() {
            f(kf);
        }
        self.splines = None;
    }
}

impl AnimationTrack for NodeAnimationTrack {
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
        self.splines = None;
        self.key_frames.remove(index).map(drop)
    }

    fn remove_all_key_frames(&mut self) {
        self.splines = None;
        self.key_frames.clear();
    }

    fn collect_key_frame_times(&self, out: &mut Vec<f32>) {
        out.extend(self.key_frames.times());
    }

    fn build_key_frame_index_map(&mut self, global_times: &[f32]) {
        self.key_frames.build_index_map(global_times);
    }

    fn has_non_zero_key_frames(&self) -> bool {
        self.key_frames.key_frames().iter().any(|kf| {
            !position_equals(kf.translate, Vec3::ZERO, DEFAULT_TOLERANCE)
                || !position_equals(kf.scale, Vec3::ONE, DEFAULT_TOLERANCE)
                || !real_equal(rotation_angle(kf.rotation), 0.0, DEFAULT_TOLERANCE)
        })
    }

    // Drops the middle key of every run of five or more identical keyframes.
    // Two keys are kept at each end of a run so spline tangents are preserved.
    fn optimise(&mut self) {
        let frames = self.key_frames.key_frames();
        let mut remove = Vec::new();
        let mut dup_count = 0;
        let mut last: Option<&TransformKeyFrame> = None;

        for (k, kf) in frames.iter().enumerate() {
            let duplicate = last.is_some_and(|prev| {
                position_equals(kf.translate, prev.translate, DEFAULT_TOLERANCE)
                    && position_equals(kf.scale, prev.scale, DEFAULT_TOLERANCE)
                    && rotation_equals(kf.rotation, prev.rotation, DEFAULT_TOLERANCE)
            });
            if duplicate {
                dup_count += 1;
                if dup_count == 4 {
                    remove.push(k - 2);
                    dup_count -= 1;
                }
            } else {
                dup_count = 0;
                last = Some(kf);
            }
        }

        if !remove.is_empty() {
            let mut doomed = remove.into_iter().peekable();
            self.key_frames.retain_indices(|index| {
                if doomed.peek() == Some(&index) {
                    doomed.next();
                    false
                } else {
                    true
                }
            });
            self.splines = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct TestNode {
        position: Vec3,
        orientation: Quat,
        scale: Vec3,
    }

    impl AnimableNode for TestNode {
        fn translate(&mut self, delta: Vec3) {
            self.position += delta;
        }
        fn rotate(&mut self, delta: Quat) {
            self.orientation = (self.orientation * delta).normalize();
        }
        fn scale(&self) -> Vec3 {
            self.scale
        }
        fn set_scale(&mut self, scale: Vec3) {
            self.scale = scale;
        }
        fn reset_to_initial_state(&mut self) {
            self.position = Vec3::ZERO;
            self.orientation = Quat::IDENTITY;
            self.scale = Vec3::ONE;
        }
    }

    fn fresh_node() -> TestNode {
        let mut node = TestNode::default();
        node.reset_to_initial_state();
        node
    }

    #[test]
    fn optimise_drops_middle_of_long_runs() {
        let mut track = NodeAnimationTrack::new(0);
        for i in 0..6 {
            track.create_node_key_frame(i as f32);
        }
        track.create_node_key_frame(6.0).translate = Vec3::X;

        track.optimise();
        // Keys 0..=5 are identical: the 5th and 6th duplicates each drop one middle key.
        let times: Vec<f32> = track.key_frames().iter().map(KeyFrame::time).collect();
        assert_eq!(times, vec![0.0, 1.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn short_runs_are_kept() {
        let mut track = NodeAnimationTrack::new(0);
        for i in 0..4 {
            track.create_node_key_frame(i as f32);
        }
        track.optimise();
        assert_eq!(track.num_key_frames(), 4);
    }

    #[test]
    fn non_zero_detection_uses_tolerance() {
        let mut track = NodeAnimationTrack::new(0);
        track.create_node_key_frame(0.0).translate = Vec3::splat(1e-4);
        assert!(!track.has_non_zero_key_frames());
        track.create_node_key_frame(1.0).rotation = Quat::from_rotation_x(0.1);
        assert!(track.has_non_zero_key_frames());
    }

    #[test]
    fn zero_weight_leaves_node_untouched() {
        let mut track = NodeAnimationTrack::new(0);
        track.create_node_key_frame(0.0).translate = Vec3::X;
        let mut node = fresh_node();
        track.apply_to_node(&mut node, &TimeIndex::new(0.0), 0.0, 1.0, NodeApplyMode::default());
        assert_eq!(node.position, Vec3::ZERO);
    }

    #[test]
    fn scale_blends_per_mode() {
        let mut track = NodeAnimationTrack::new(0);
        track.create_node_key_frame(0.0).scale = Vec3::splat(2.0);

        let mut node = fresh_node();
        node.scale = Vec3::splat(3.0);
        let average = NodeApplyMode::default();
        track.apply_to_node(&mut node, &TimeIndex::new(0.0), 0.5, 1.0, average);
        assert!(node.scale.abs_diff_eq(Vec3::splat(4.5), 1e-6));

        let mut node = fresh_node();
        node.scale = Vec3::splat(3.0);
        let cumulative = NodeApplyMode {
            blend_mode: SkeletonBlendMode::Cumulative,
            ..Default::default()
        };
        track.apply_to_node(&mut node, &TimeIndex::new(0.0), 0.5, 1.0, cumulative);
        assert!(node.scale.abs_diff_eq(Vec3::splat(3.5), 1e-6));
    }

    #[test]
    fn rebase_makes_base_key_neutral() {
        let mut track = NodeAnimationTrack::new(0);
        let base = TransformKeyFrame::new(0.0, Vec3::X, Quat::from_rotation_y(0.5), Vec3::splat(2.0));
        track.insert_key_frame(base);
        track.rebase(&base);
        assert!(!track.has_non_zero_key_frames());
    }

    struct Frozen;

    impl TrackListener<TransformKeyFrame> for Frozen {
        fn interpolated_key_frame(&self, _handle: u16, time_index: &TimeIndex) -> Option<TransformKeyFrame> {
            Some(TransformKeyFrame::new(time_index.time_pos(), Vec3::Y, Quat::IDENTITY, Vec3::ONE))
        }
    }

    #[test]
    fn listener_overrides_interpolation() {
        let mut track = NodeAnimationTrack::new(0);
        track.create_node_key_frame(0.0).translate = Vec3::X;
        track.set_listener(Some(Arc::new(Frozen)));
        let kf = track.interpolated_key_frame(
            &TimeIndex::new(0.0),
            InterpolationMode::Linear,
            RotationInterpolationMode::Linear,
        );
        assert_eq!(kf.translate, Vec3::Y);
    }
}
