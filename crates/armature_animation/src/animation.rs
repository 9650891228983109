//! Animations: named, fixed-length collections of tracks keyed by handle.

use std::collections::BTreeMap;

use rustc_hash::FxHashSet;

use armature_core::errors::{ArmatureError, Result};

use crate::keyframe::{TransformKeyFrame, VertexPoseKeyFrame};
use crate::pose::Pose;
use crate::settings::{AnimationDefaults, InterpolationMode, RotationInterpolationMode, SkeletonBlendMode};
use crate::time_index::{TimeIndex, lower_bound, merge_key_frame_times};
use crate::tracks::{
    AnimableNode, AnimableValue, AnimationTrack, NodeAnimationTrack, NumericAnimationTrack,
    VertexAnimationTarget, VertexAnimationTrack, VertexAnimationType, node::NodeApplyMode,
};

/// Resolves node-track handles to animable nodes (a skeleton's bones).
pub trait NodeTargets {
    fn node_mut(&mut self, handle: u16) -> Option<&mut dyn AnimableNode>;
}

/// Resolves numeric-track handles to animable values.
pub trait AnimableTargets {
    fn animable_mut(&mut self, handle: u16) -> Option<&mut dyn AnimableValue>;
}

impl<V: AnimableValue> AnimableTargets for BTreeMap<u16, V> {
    fn animable_mut(&mut self, handle: u16) -> Option<&mut dyn AnimableValue> {
        self.get_mut(&handle).map(|v| v as &mut dyn AnimableValue)
    }
}

impl<V: AnimableValue> AnimableTargets for [V] {
    fn animable_mut(&mut self, handle: u16) -> Option<&mut dyn AnimableValue> {
        self.get_mut(usize::from(handle)).map(|v| v as &mut dyn AnimableValue)
    }
}

/// Something that owns animations by name: a skeleton or a mesh's animation set.
pub trait AnimationContainer {
    fn num_animations(&self) -> usize;

    /// Animation at `index` in name order.
    fn animation_at(&self, index: usize) -> Result<&Animation>;

    fn animation(&self, name: &str) -> Result<&Animation>;

    fn has_animation(&self, name: &str) -> bool;

    fn create_animation(&mut self, name: &str, length: f32) -> Result<&mut Animation>;

    fn remove_animation(&mut self, name: &str) -> Result<Animation>;
}

#[derive(Debug, Clone, PartialEq)]
struct BaseKeyFrameRequest {
    time: f32,
    animation: Option<String>,
}

/// Keyframes sampled from a base animation, used to re-express another
/// animation's keyframes relative to that pose.
#[derive(Debug, Clone, Default)]
pub struct BaseKeyFrames {
    node: BTreeMap<u16, TransformKeyFrame>,
    pose: BTreeMap<u16, VertexPoseKeyFrame>,
}

impl BaseKeyFrames {
    /// Samples every node track and pose track of `base` at `time`.
    #[must_use]
    pub fn sample(base: &Animation, time: f32) -> Self {
        let time_index = base.time_index(time);
        let node = base
            .node_tracks
            .iter()
            .map(|(&handle, track)| {
                let kf = track.interpolated_key_frame(&time_index, base.interpolation_mode, base.rotation_interpolation_mode);
                (handle, kf)
            })
            .collect();
        let pose = base
            .vertex_tracks
            .iter()
            .filter_map(|(&handle, track)| Some((handle, track.interpolated_pose_key_frame(&time_index)?)))
            .collect();
        Self { node, pose }
    }
}

/// A named animation of fixed length.
///
/// Tracks are stored per family in handle order. Editing a track through a
/// `_mut` accessor marks the global keyframe time list stale; it is rebuilt by
/// [`prepare`](Self::prepare), and until then lookups fall back to per-track
/// binary search.
#[derive(Debug, Clone)]
pub struct Animation {
    name: String,
    length: f32,
    interpolation_mode: InterpolationMode,
    rotation_interpolation_mode: RotationInterpolationMode,

    node_tracks: BTreeMap<u16, NodeAnimationTrack>,
    numeric_tracks: BTreeMap<u16, NumericAnimationTrack>,
    vertex_tracks: BTreeMap<u16, VertexAnimationTrack>,

    key_frame_times: Vec<f32>,
    key_frame_times_dirty: bool,

    base_key_frame: Option<BaseKeyFrameRequest>,
}

impl Animation {
    #[must_use]
    pub fn new(name: impl Into<String>, length: f32) -> Self {
        Self::with_defaults(name, length, &AnimationDefaults::default())
    }

    #[must_use]
    pub fn with_defaults(name: impl Into<String>, length: f32, defaults: &AnimationDefaults) -> Self {
        Self {
            name: name.into(),
            length,
            interpolation_mode: defaults.interpolation,
            rotation_interpolation_mode: defaults.rotation_interpolation,
            node_tracks: BTreeMap::new(),
            numeric_tracks: BTreeMap::new(),
            vertex_tracks: BTreeMap::new(),
            key_frame_times: Vec::new(),
            key_frame_times_dirty: false,
            base_key_frame: None,
        }
    }

    /// A copy of this animation under another name.
    #[must_use]
    pub fn clone_named(&self, new_name: impl Into<String>) -> Self {
        Self {
            name: new_name.into(),
            ..self.clone()
        }
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    #[must_use]
    pub fn length(&self) -> f32 {
        self.length
    }

    pub fn set_length(&mut self, length: f32) {
        self.length = length;
    }

    #[inline]
    #[must_use]
    pub fn interpolation_mode(&self) -> InterpolationMode {
        self.interpolation_mode
    }

    pub fn set_interpolation_mode(&mut self, mode: InterpolationMode) {
        self.interpolation_mode = mode;
    }

    #[inline]
    #[must_use]
    pub fn rotation_interpolation_mode(&self) -> RotationInterpolationMode {
        self.rotation_interpolation_mode
    }

    pub fn set_rotation_interpolation_mode(&mut self, mode: RotationInterpolationMode) {
        self.rotation_interpolation_mode = mode;
    }

    // ========================================================================
    // Node tracks
    // ========================================================================

    pub fn create_node_track(&mut self, handle: u16) -> Result<&mut NodeAnimationTrack> {
        if self.node_tracks.contains_key(&handle) {
            return Err(ArmatureError::duplicate("node track", handle));
        }
        self.key_frame_times_dirty = true;
        Ok(self.node_tracks.entry(handle).or_insert_with(|| NodeAnimationTrack::new(handle)))
    }

    pub fn node_track(&self, handle: u16) -> Result<&NodeAnimationTrack> {
        self.node_tracks
            .get(&handle)
            .ok_or_else(|| ArmatureError::not_found("node track", handle))
    }

    pub fn node_track_mut(&mut self, handle: u16) -> Result<&mut NodeAnimationTrack> {
        self.key_frame_times_dirty = true;
        self.node_tracks
            .get_mut(&handle)
            .ok_or_else(|| ArmatureError::not_found("node track", handle))
    }

    #[must_use]
    pub fn has_node_track(&self, handle: u16) -> bool {
        self.node_tracks.contains_key(&handle)
    }

    #[must_use]
    pub fn num_node_tracks(&self) -> usize {
        self.node_tracks.len()
    }

    pub fn node_tracks(&self) -> impl Iterator<Item = &NodeAnimationTrack> {
        self.node_tracks.values()
    }

    pub fn destroy_node_track(&mut self, handle: u16) -> Option<NodeAnimationTrack> {
        self.key_frame_times_dirty = true;
        self.node_tracks.remove(&handle)
    }

    pub fn destroy_all_node_tracks(&mut self) {
        self.node_tracks.clear();
        self.key_frame_times_dirty = true;
    }

    // ========================================================================
    // Numeric tracks
    // ========================================================================

    pub fn create_numeric_track(&mut self, handle: u16) -> Result<&mut NumericAnimationTrack> {
        if self.numeric_tracks.contains_key(&handle) {
            return Err(ArmatureError::duplicate("numeric track", handle));
        }
        self.key_frame_times_dirty = true;
        Ok(self
            .numeric_tracks
            .entry(handle)
            .or_insert_with(|| NumericAnimationTrack::new(handle)))
    }

    pub fn numeric_track(&self, handle: u16) -> Result<&NumericAnimationTrack> {
        self.numeric_tracks
            .get(&handle)
            .ok_or_else(|| ArmatureError::not_found("numeric track", handle))
    }

    pub fn numeric_track_mut(&mut self, handle: u16) -> Result<&mut NumericAnimationTrack> {
        self.key_frame_times_dirty = true;
        self.numeric_tracks
            .get_mut(&handle)
            .ok_or_else(|| ArmatureError::not_found("numeric track", handle))
    }

    #[must_use]
    pub fn has_numeric_track(&self, handle: u16) -> bool {
        self.numeric_tracks.contains_key(&handle)
    }

    #[must_use]
    pub fn num_numeric_tracks(&self) -> usize {
        self.numeric_tracks.len()
    }

    pub fn numeric_tracks(&self) -> impl Iterator<Item = &NumericAnimationTrack> {
        self.numeric_tracks.values()
    }

    pub fn destroy_numeric_track(&mut self, handle: u16) -> Option<NumericAnimationTrack> {
        self.key_frame_times_dirty = true;
        self.numeric_tracks.remove(&handle)
    }

    pub fn destroy_all_numeric_tracks(&mut self) {
        self.numeric_tracks.clear();
        self.key_frame_times_dirty = true;
    }

    // ========================================================================
    // Vertex tracks
    // ========================================================================

    pub fn create_vertex_track(&mut self, handle: u16, animation_type: VertexAnimationType) -> Result<&mut VertexAnimationTrack> {
        if self.vertex_tracks.contains_key(&handle) {
            return Err(ArmatureError::duplicate("vertex track", handle));
        }
        self.key_frame_times_dirty = true;
        Ok(self
            .vertex_tracks
            .entry(handle)
            .or_insert_with(|| VertexAnimationTrack::new(handle, animation_type)))
    }

    pub fn vertex_track(&self, handle: u16) -> Result<&VertexAnimationTrack> {
        self.vertex_tracks
            .get(&handle)
            .ok_or_else(|| ArmatureError::not_found("vertex track", handle))
    }

    pub fn vertex_track_mut(&mut self, handle: u16) -> Result<&mut VertexAnimationTrack> {
        self.key_frame_times_dirty = true;
        self.vertex_tracks
            .get_mut(&handle)
            .ok_or_else(|| ArmatureError::not_found("vertex track", handle))
    }

    #[must_use]
    pub fn has_vertex_track(&self, handle: u16) -> bool {
        self.vertex_tracks.contains_key(&handle)
    }

    #[must_use]
    pub fn num_vertex_tracks(&self) -> usize {
        self.vertex_tracks.len()
    }

    pub fn vertex_tracks(&self) -> impl Iterator<Item = &VertexAnimationTrack> {
        self.vertex_tracks.values()
    }

    pub fn destroy_vertex_track(&mut self, handle: u16) -> Option<VertexAnimationTrack> {
        self.key_frame_times_dirty = true;
        self.vertex_tracks.remove(&handle)
    }

    pub fn destroy_all_vertex_tracks(&mut self) {
        self.vertex_tracks.clear();
        self.key_frame_times_dirty = true;
    }

    pub fn destroy_all_tracks(&mut self) {
        self.destroy_all_node_tracks();
        self.destroy_all_numeric_tracks();
        self.destroy_all_vertex_tracks();
    }

    // ========================================================================
    // Keyframe time index
    // ========================================================================

    /// Rebuilds the global keyframe time list and every track's index map.
    pub fn build_key_frame_time_list(&mut self) {
        let mut times = Vec::new();
        let mut scratch = Vec::new();
        for track in self.tracks() {
            scratch.clear();
            track.collect_key_frame_times(&mut scratch);
            merge_key_frame_times(&mut times, scratch.iter().copied());
        }

        for track in self.node_tracks.values_mut() {
            track.build_key_frame_index_map(&times);
        }
        for track in self.numeric_tracks.values_mut() {
            track.build_key_frame_index_map(&times);
        }
        for track in self.vertex_tracks.values_mut() {
            track.build_key_frame_index_map(&times);
        }

        self.key_frame_times = times;
        self.key_frame_times_dirty = false;
    }

    /// Brings cached lookup data up to date: the global keyframe time list and,
    /// in spline mode, each node track's spline cache.
    pub fn prepare(&mut self) {
        if self.key_frame_times_dirty {
            self.build_key_frame_time_list();
        }
        if self.interpolation_mode == InterpolationMode::Spline {
            for track in self.node_tracks.values_mut() {
                track.build_interpolation_splines();
            }
        }
    }

    #[must_use]
    pub fn needs_prepare(&self) -> bool {
        self.key_frame_times_dirty
            || (self.interpolation_mode == InterpolationMode::Spline
                && self.node_tracks.values().any(|t| !t.has_spline_cache()))
    }

    /// The sorted union of all tracks' keyframe times, as of the last rebuild.
    #[must_use]
    pub fn key_frame_times(&self) -> &[f32] {
        &self.key_frame_times
    }

    /// Converts a time position to a [`TimeIndex`].
    ///
    /// Times beyond the length wrap with `fmod`. The global key index is only
    /// attached when the time list is current.
    #[must_use]
    pub fn time_index(&self, time_pos: f32) -> TimeIndex {
        let time_pos = if time_pos > self.length && self.length > 0.0 {
            time_pos % self.length
        } else {
            time_pos
        };
        if self.key_frame_times_dirty {
            TimeIndex::new(time_pos)
        } else {
            TimeIndex::with_key_index(time_pos, lower_bound(&self.key_frame_times, time_pos))
        }
    }

    fn tracks(&self) -> impl Iterator<Item = &dyn AnimationTrack> {
        let node = self.node_tracks.values().map(|t| t as &dyn AnimationTrack);
        let numeric = self.numeric_tracks.values().map(|t| t as &dyn AnimationTrack);
        let vertex = self.vertex_tracks.values().map(|t| t as &dyn AnimationTrack);
        node.chain(numeric).chain(vertex)
    }

    // ========================================================================
    // Applying
    // ========================================================================

    /// Applies every node track to the node with the same handle.
    ///
    /// With a blend mask, each track's weight is multiplied by the mask entry
    /// for its handle. A track whose handle has no node, or no mask entry, is
    /// an error.
    pub fn apply_to_targets(
        &self,
        targets: &mut dyn NodeTargets,
        time_pos: f32,
        weight: f32,
        blend_mask: Option<&[f32]>,
        scale: f32,
        blend_mode: SkeletonBlendMode,
    ) -> Result<()> {
        let time_index = self.time_index(time_pos);
        let mode = self.node_apply_mode(blend_mode);
        for (&handle, track) in &self.node_tracks {
            let track_weight = match blend_mask {
                Some(mask) => {
                    let entry = mask.get(usize::from(handle)).ok_or_else(|| {
                        ArmatureError::invalid_parameter(format!(
                            "blend mask of {} entries has no entry for bone {handle}",
                            mask.len()
                        ))
                    })?;
                    entry * weight
                }
                None => weight,
            };
            let node = targets.node_mut(handle).ok_or_else(|| {
                ArmatureError::invalid_parameter(format!(
                    "animation '{}' has a track for bone {handle}, which does not exist",
                    self.name
                ))
            })?;
            track.apply_to_node(node, &time_index, track_weight, scale, mode);
        }
        Ok(())
    }

    /// Applies every node track to a single node.
    pub fn apply_to_node(&self, node: &mut dyn AnimableNode, time_pos: f32, weight: f32, scale: f32, blend_mode: SkeletonBlendMode) {
        let time_index = self.time_index(time_pos);
        let mode = self.node_apply_mode(blend_mode);
        for track in self.node_tracks.values() {
            track.apply_to_node(node, &time_index, weight, scale, mode);
        }
    }

    /// Resets each node that has a track in this animation to its initial state.
    pub fn reset_nodes(&self, targets: &mut dyn NodeTargets) {
        for (&handle, track) in &self.node_tracks {
            if let Some(node) = targets.node_mut(handle) {
                track.reset_node_to_initial_state(node);
            }
        }
    }

    /// Applies every numeric track to the value with the same handle; tracks
    /// without a value are skipped.
    pub fn apply_to_animables(&self, targets: &mut dyn AnimableTargets, time_pos: f32, weight: f32, scale: f32) {
        let time_index = self.time_index(time_pos);
        for (&handle, track) in &self.numeric_tracks {
            match targets.animable_mut(handle) {
                Some(value) => track.apply_to_animable(value, &time_index, weight, scale),
                None => log::trace!("Numeric track {handle} of '{}' has no target", self.name),
            }
        }
    }

    /// Applies every numeric track to a single value.
    pub fn apply_to_animable(&self, value: &mut dyn AnimableValue, time_pos: f32, weight: f32, scale: f32) {
        let time_index = self.time_index(time_pos);
        for track in self.numeric_tracks.values() {
            track.apply_to_animable(value, &time_index, weight, scale);
        }
    }

    /// Applies every vertex track to the target with the same handle; tracks
    /// without a target are skipped.
    pub fn apply_to_vertex_targets(
        &self,
        targets: &mut BTreeMap<u16, VertexAnimationTarget<'_>>,
        time_pos: f32,
        weight: f32,
        poses: &[Pose],
    ) -> Result<()> {
        let time_index = self.time_index(time_pos);
        for (handle, track) in &self.vertex_tracks {
            if let Some(target) = targets.get_mut(handle) {
                track.apply_to_vertex_data(target, &time_index, weight, poses)?;
            }
        }
        Ok(())
    }

    /// Applies every vertex track to a single target.
    pub fn apply_to_vertex_data(&self, target: &mut VertexAnimationTarget<'_>, time_pos: f32, weight: f32, poses: &[Pose]) -> Result<()> {
        let time_index = self.time_index(time_pos);
        for track in self.vertex_tracks.values() {
            track.apply_to_vertex_data(target, &time_index, weight, poses)?;
        }
        Ok(())
    }

    fn node_apply_mode(&self, blend_mode: SkeletonBlendMode) -> NodeApplyMode {
        NodeApplyMode {
            interpolation: self.interpolation_mode,
            rotation_interpolation: self.rotation_interpolation_mode,
            blend_mode,
        }
    }

    // ========================================================================
    // Optimisation
    // ========================================================================

    /// Removes redundant keyframes and tracks.
    ///
    /// Node tracks with only neutral keyframes are destroyed when
    /// `discard_identity_node_tracks` is set; vertex tracks with nothing to
    /// apply are always destroyed.
    pub fn optimise(&mut self, discard_identity_node_tracks: bool) {
        self.node_tracks.retain(|&handle, track| {
            if discard_identity_node_tracks && !track.has_non_zero_key_frames() {
                log::debug!("Discarding identity node track {handle}");
                false
            } else {
                track.optimise();
                true
            }
        });
        self.vertex_tracks.retain(|&handle, track| {
            if track.has_non_zero_key_frames() {
                track.optimise();
                true
            } else {
                log::debug!("Discarding empty vertex track {handle}");
                false
            }
        });
        self.key_frame_times_dirty = true;
    }

    /// Removes from `handles` every handle whose node track here is not identity.
    pub fn collect_identity_node_tracks(&self, handles: &mut FxHashSet<u16>) {
        handles.retain(|handle| {
            self.node_tracks
                .get(handle)
                .is_none_or(|track| !track.has_non_zero_key_frames())
        });
    }

    pub fn destroy_node_tracks(&mut self, handles: &FxHashSet<u16>) {
        self.node_tracks.retain(|handle, _| !handles.contains(handle));
        self.key_frame_times_dirty = true;
    }

    // ========================================================================
    // Base keyframe
    // ========================================================================

    /// Requests that keyframes be re-expressed relative to the pose at
    /// `base_time` of `base_animation` (this animation when `None`).
    ///
    /// The rebase is one-way and happens on the owning container's next
    /// [`apply_pending_base_key_frames`] or on [`apply_base_key_frame`](Self::apply_base_key_frame).
    pub fn set_use_base_key_frame(&mut self, use_base: bool, base_time: f32, base_animation: Option<&str>) {
        self.base_key_frame = use_base.then(|| BaseKeyFrameRequest {
            time: base_time,
            animation: base_animation.map(str::to_owned),
        });
    }

    #[must_use]
    pub fn use_base_key_frame(&self) -> bool {
        self.base_key_frame.is_some()
    }

    #[must_use]
    pub fn base_key_frame_time(&self) -> Option<f32> {
        self.base_key_frame.as_ref().map(|r| r.time)
    }

    #[must_use]
    pub fn base_key_frame_animation_name(&self) -> Option<&str> {
        self.base_key_frame.as_ref().and_then(|r| r.animation.as_deref())
    }

    /// Rebases against a pending request that references this animation.
    /// Requests naming another animation are left for the container.
    pub fn apply_base_key_frame(&mut self) {
        let Some(request) = &self.base_key_frame else {
            return;
        };
        if request.animation.as_deref().is_some_and(|name| name != self.name) {
            return;
        }
        let base = BaseKeyFrames::sample(self, request.time);
        self.rebase(&base);
    }

    /// Re-expresses matching node and pose tracks relative to `base` and
    /// clears any pending request.
    pub fn rebase(&mut self, base: &BaseKeyFrames) {
        for (handle, track) in &mut self.node_tracks {
            if let Some(kf) = base.node.get(handle) {
                track.rebase(kf);
            }
        }
        for (handle, track) in &mut self.vertex_tracks {
            if track.animation_type() == VertexAnimationType::Pose
                && let Some(kf) = base.pose.get(handle)
            {
                track.rebase(kf);
            }
        }
        self.base_key_frame = None;
    }
}

/// Performs every pending base-keyframe rebase in `animations`, resolving
/// base animations by name within the same map.
pub fn apply_pending_base_key_frames(animations: &mut BTreeMap<String, Animation>) {
    let pending: Vec<(String, BaseKeyFrameRequest)> = animations
        .iter()
        .filter_map(|(name, anim)| Some((name.clone(), anim.base_key_frame.clone()?)))
        .collect();

    for (name, request) in pending {
        let base_name = request.animation.as_deref().unwrap_or(&name);
        let base = match animations.get(base_name) {
            Some(base_anim) => Some(BaseKeyFrames::sample(base_anim, request.time)),
            None => {
                log::warn!("Base animation '{base_name}' for '{name}' not found; keyframes left as authored");
                None
            }
        };
        if let Some(anim) = animations.get_mut(&name) {
            match base {
                Some(base) => anim.rebase(&base),
                None => anim.base_key_frame = None,
            }
        }
    }
}
