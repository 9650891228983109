//! Mesh-side animation container: poses and vertex animations.
//!
//! Vertex tracks are keyed by vertex target: 0 for shared geometry and
//! `n + 1` for the geometry of sub-part `n`. One target may be driven by morph
//! animation or by pose animation, never both.

use std::collections::BTreeMap;

use armature_core::errors::{ArmatureError, Result};

use crate::animation::{Animation, AnimationContainer, apply_pending_base_key_frames};
use crate::pose::Pose;
use crate::settings::AnimationDefaults;
use crate::state::AnimationStateSet;
use crate::tracks::{AnimationTrack, VertexAnimationTarget, VertexAnimationType};

/// Poses and vertex animations of one mesh.
#[derive(Debug, Clone, Default)]
pub struct MeshAnimations {
    poses: Vec<Pose>,
    animations: BTreeMap<String, Animation>,
    defaults: AnimationDefaults,
    target_types: BTreeMap<u16, VertexAnimationType>,
    animation_types_dirty: bool,
}

impl MeshAnimations {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn animation_defaults(&self) -> AnimationDefaults {
        self.defaults
    }

    pub fn set_animation_defaults(&mut self, defaults: AnimationDefaults) {
        self.defaults = defaults;
    }

    // ========================================================================
    // Poses
    // ========================================================================

    /// Creates an empty pose for `target`. Pose names are unique per mesh.
    pub fn create_pose(&mut self, target: u16, name: &str) -> Result<&mut Pose> {
        if self.poses.iter().any(|p| p.name() == name) {
            return Err(ArmatureError::duplicate("pose", name));
        }
        self.poses.push(Pose::new(target, name));
        let index = self.poses.len() - 1;
        Ok(&mut self.poses[index])
    }

    pub fn pose(&self, index: usize) -> Result<&Pose> {
        self.poses.get(index).ok_or(ArmatureError::IndexOutOfBounds { context: "pose", index })
    }

    pub fn pose_mut(&mut self, index: usize) -> Result<&mut Pose> {
        self.poses
            .get_mut(index)
            .ok_or(ArmatureError::IndexOutOfBounds { context: "pose", index })
    }

    pub fn pose_by_name(&self, name: &str) -> Result<&Pose> {
        self.poses
            .iter()
            .find(|p| p.name() == name)
            .ok_or_else(|| ArmatureError::not_found("pose", name))
    }

    /// Index of the named pose, as referenced by pose keyframes.
    pub fn pose_index(&self, name: &str) -> Result<u16> {
        self.poses
            .iter()
            .position(|p| p.name() == name)
            .map(|i| i as u16)
            .ok_or_else(|| ArmatureError::not_found("pose", name))
    }

    /// Removes a pose. Later poses move down one index.
    pub fn remove_pose(&mut self, index: usize) -> Result<Pose> {
        if index >= self.poses.len() {
            return Err(ArmatureError::IndexOutOfBounds { context: "pose", index });
        }
        Ok(self.poses.remove(index))
    }

    pub fn remove_pose_by_name(&mut self, name: &str) -> Result<Pose> {
        let index = usize::from(self.pose_index(name)?);
        Ok(self.poses.remove(index))
    }

    pub fn remove_all_poses(&mut self) {
        self.poses.clear();
    }

    #[must_use]
    pub fn poses(&self) -> &[Pose] {
        &self.poses
    }

    #[must_use]
    pub fn num_poses(&self) -> usize {
        self.poses.len()
    }

    // ========================================================================
    // Animations
    // ========================================================================

    pub fn animation_mut(&mut self, name: &str) -> Result<&mut Animation> {
        self.animation_types_dirty = true;
        self.animations
            .get_mut(name)
            .ok_or_else(|| ArmatureError::not_found("animation", name))
    }

    pub fn animations(&self) -> impl Iterator<Item = &Animation> {
        self.animations.values()
    }

    /// Records which kind of vertex animation drives each target.
    ///
    /// Fails if any target is driven by morph tracks in one place and pose
    /// tracks in another.
    pub fn determine_animation_types(&mut self) -> Result<()> {
        let mut types = BTreeMap::new();
        for anim in self.animations.values() {
            for track in anim.vertex_tracks() {
                let handle = track.handle();
                let kind = track.animation_type();
                match types.insert(handle, kind) {
                    Some(previous) if previous != kind => {
                        return Err(ArmatureError::invalid_parameter(format!(
                            "vertex target {handle} mixes {previous:?} and {kind:?} animation (in '{}')",
                            anim.name()
                        )));
                    }
                    _ => {}
                }
            }
        }
        self.target_types = types;
        self.animation_types_dirty = false;
        Ok(())
    }

    /// Animation kind driving `target`, as of the last
    /// [`determine_animation_types`](Self::determine_animation_types).
    #[must_use]
    pub fn vertex_animation_type(&self, target: u16) -> Option<VertexAnimationType> {
        self.target_types.get(&target).copied()
    }

    // ========================================================================
    // States
    // ========================================================================

    /// Replaces the contents of `set` with one disabled state per animation.
    pub fn init_animation_state(&self, set: &mut AnimationStateSet) -> Result<()> {
        set.remove_all_animation_states();
        for anim in self.animations.values() {
            set.create_animation_state(anim.name(), 0.0, anim.length(), 1.0, false)?;
        }
        Ok(())
    }

    /// Adds states for new animations and updates lengths of existing ones.
    pub fn refresh_animation_state(&self, set: &mut AnimationStateSet) -> Result<()> {
        for anim in self.animations.values() {
            set.refresh_animation_state(anim.name(), anim.length())?;
        }
        Ok(())
    }

    /// Applies every enabled state's vertex tracks to `targets`.
    ///
    /// Hardware outputs accumulate pose slots, so clear them before each frame.
    pub fn apply(&mut self, set: &AnimationStateSet, targets: &mut BTreeMap<u16, VertexAnimationTarget<'_>>) -> Result<()> {
        if self.animation_types_dirty {
            self.determine_animation_types()?;
        }
        apply_pending_base_key_frames(&mut self.animations);
        for anim in self.animations.values_mut() {
            anim.prepare();
        }

        for state in set.enabled_states() {
            match self.animations.get(state.animation_name()) {
                Some(anim) => anim.apply_to_vertex_targets(targets, state.time_position(), state.weight(), &self.poses)?,
                None => log::debug!("No vertex animation named '{}'; state skipped", state.animation_name()),
            }
        }
        Ok(())
    }
}

impl AnimationContainer for MeshAnimations {
    fn num_animations(&self) -> usize {
        self.animations.len()
    }

    fn animation_at(&self, index: usize) -> Result<&Animation> {
        self.animations
            .values()
            .nth(index)
            .ok_or(ArmatureError::IndexOutOfBounds { context: "animation", index })
    }

    fn animation(&self, name: &str) -> Result<&Animation> {
        self.animations
            .get(name)
            .ok_or_else(|| ArmatureError::not_found("animation", name))
    }

    fn has_animation(&self, name: &str) -> bool {
        self.animations.contains_key(name)
    }

    fn create_animation(&mut self, name: &str, length: f32) -> Result<&mut Animation> {
        if self.animations.contains_key(name) {
            return Err(ArmatureError::duplicate("animation", name));
        }
        self.animation_types_dirty = true;
        let anim = Animation::with_defaults(name, length, &self.defaults);
        Ok(self.animations.entry(name.to_owned()).or_insert(anim))
    }

    fn remove_animation(&mut self, name: &str) -> Result<Animation> {
        self.animation_types_dirty = true;
        self.animations
            .remove(name)
            .ok_or_else(|| ArmatureError::not_found("animation", name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mixing_morph_and_pose_on_one_target_fails() {
        let mut mesh = MeshAnimations::new();
        mesh.create_animation("morph", 1.0)
            .unwrap()
            .create_vertex_track(1, VertexAnimationType::Morph)
            .unwrap();
        mesh.create_animation("pose", 1.0)
            .unwrap()
            .create_vertex_track(1, VertexAnimationType::Pose)
            .unwrap();
        assert!(matches!(
            mesh.determine_animation_types(),
            Err(ArmatureError::InvalidParameter(_))
        ));
    }

    #[test]
    fn separate_targets_may_differ() {
        let mut mesh = MeshAnimations::new();
        let anim = mesh.create_animation("face", 1.0).unwrap();
        anim.create_vertex_track(0, VertexAnimationType::Morph).unwrap();
        anim.create_vertex_track(1, VertexAnimationType::Pose).unwrap();
        mesh.determine_animation_types().unwrap();
        assert_eq!(mesh.vertex_animation_type(1), Some(VertexAnimationType::Pose));
    }

    #[test]
    fn pose_lookup() {
        let mut mesh = MeshAnimations::new();
        mesh.create_pose(0, "smile").unwrap();
        mesh.create_pose(0, "frown").unwrap();
        assert!(mesh.create_pose(1, "smile").is_err());
        assert_eq!(mesh.pose_index("frown").unwrap(), 1);
        assert!(matches!(mesh.pose(7), Err(ArmatureError::IndexOutOfBounds { .. })));
        assert!(matches!(mesh.pose_by_name("wink"), Err(ArmatureError::NotFound { .. })));
        mesh.remove_pose(0).unwrap();
        assert_eq!(mesh.pose(0).unwrap().name(), "frown");
    }
}
