use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;

use glam::{Affine3A, Quat, Vec3};
use rustc_hash::{FxHashMap, FxHashSet};

use armature_animation::{
    Animation, AnimationContainer, AnimationDefaults, AnimationStateSet, AnimationTrack, KeyFrame,
    SkeletonBlendMode, apply_pending_base_key_frames,
};
use armature_core::errors::{ArmatureError, Result};
use armature_core::{BoneHandle, MAX_NUM_BONES};

use crate::bone::Bone;
use crate::hierarchy::BoneArena;

/// Another skeleton whose animations this one may play, with a translation scale.
#[derive(Debug, Clone)]
pub struct LinkedSkeletonAnimationSource {
    pub skeleton_name: String,
    pub scale: f32,
    skeleton: Option<Arc<Skeleton>>,
}

impl LinkedSkeletonAnimationSource {
    /// The resolved skeleton, if it has been loaded.
    #[must_use]
    pub fn skeleton(&self) -> Option<&Arc<Skeleton>> {
        self.skeleton.as_ref()
    }
}

/// A hierarchy of bones plus the animations that drive them.
///
/// Bone handles are dense indices below [`MAX_NUM_BONES`]; slots may be
/// left empty. Derived bone transforms are cached. Every skeleton operation
/// that moves bones refreshes them before returning; edits made directly
/// through [`bone_mut`](Self::bone_mut) are picked up by the next refresh,
/// [`updated_bone`](Self::updated_bone) or matrix query.
#[derive(Debug, Clone)]
pub struct Skeleton {
    name: String,
    bones: BoneArena,
    bone_names: FxHashMap<String, BoneHandle>,
    next_auto_handle: BoneHandle,
    has_binding_pose: bool,

    blend_mode: SkeletonBlendMode,
    defaults: AnimationDefaults,
    animations: BTreeMap<String, Animation>,
    linked_sources: Vec<LinkedSkeletonAnimationSource>,
}

impl Skeleton {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bones: BoneArena::new(),
            bone_names: FxHashMap::default(),
            next_auto_handle: 0,
            has_binding_pose: false,
            blend_mode: SkeletonBlendMode::default(),
            defaults: AnimationDefaults::default(),
            animations: BTreeMap::new(),
            linked_sources: Vec::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    // ========================================================================
    // Bones
    // ========================================================================

    /// Creates an unnamed bone with the next automatic handle.
    pub fn create_bone(&mut self) -> Result<&mut Bone> {
        let handle = self.next_auto_handle;
        self.next_auto_handle = self.next_auto_handle.saturating_add(1);
        self.create_bone_with_handle(handle)
    }

    /// Creates a named bone with the next automatic handle.
    pub fn create_bone_named(&mut self, name: &str) -> Result<&mut Bone> {
        let handle = self.next_auto_handle;
        self.next_auto_handle = self.next_auto_handle.saturating_add(1);
        self.create_bone_named_with_handle(name, handle)
    }

    pub fn create_bone_with_handle(&mut self, handle: BoneHandle) -> Result<&mut Bone> {
        self.insert_bone(handle, None)
    }

    pub fn create_bone_named_with_handle(&mut self, name: &str, handle: BoneHandle) -> Result<&mut Bone> {
        if self.bone_names.contains_key(name) {
            return Err(ArmatureError::duplicate("bone", name));
        }
        self.insert_bone(handle, Some(name))
    }

    fn insert_bone(&mut self, handle: BoneHandle, name: Option<&str>) -> Result<&mut Bone> {
        if usize::from(handle) >= MAX_NUM_BONES {
            return Err(ArmatureError::invalid_parameter(format!(
                "bone handle {handle} exceeds the maximum of {MAX_NUM_BONES} bones per skeleton"
            )));
        }
        if self.bones.contains(handle) {
            return Err(ArmatureError::duplicate("bone", handle));
        }
        if let Some(name) = name {
            self.bone_names.insert(name.to_owned(), handle);
        }
        self.next_auto_handle = self.next_auto_handle.max(handle.saturating_add(1));
        self.bones.insert(Bone::new(handle, name.map(str::to_owned)))
    }

    /// Creates a bone as a child of `parent`, at the given local offset.
    pub fn create_child_bone(
        &mut self,
        parent: BoneHandle,
        handle: Option<BoneHandle>,
        translate: Vec3,
        rotate: Quat,
    ) -> Result<BoneHandle> {
        self.bone(parent)?;
        let child = match handle {
            Some(h) => self.create_bone_with_handle(h)?,
            None => self.create_bone()?,
        };
        child.set_position(translate);
        child.set_orientation(rotate);
        let child = child.handle();
        self.add_child(parent, child)?;
        Ok(child)
    }

    pub fn add_child(&mut self, parent: BoneHandle, child: BoneHandle) -> Result<()> {
        self.bones.add_child(parent, child)?;
        self.bones.update_transforms();
        Ok(())
    }

    pub fn remove_child(&mut self, parent: BoneHandle, child: BoneHandle) -> Result<()> {
        self.bones.remove_child(parent, child)?;
        self.bones.update_transforms();
        Ok(())
    }

    pub fn bone(&self, handle: BoneHandle) -> Result<&Bone> {
        self.bones.get(handle).ok_or_else(|| ArmatureError::not_found("bone", handle))
    }

    pub fn bone_mut(&mut self, handle: BoneHandle) -> Result<&mut Bone> {
        self.bones.get_mut(handle).ok_or_else(|| ArmatureError::not_found("bone", handle))
    }

    /// The bone after propagating any pending local edits, so its derived
    /// transform is current.
    pub fn updated_bone(&mut self, handle: BoneHandle) -> Result<&Bone> {
        self.bones.update_transforms();
        self.bone(handle)
    }

    pub fn bone_by_name(&self, name: &str) -> Result<&Bone> {
        let handle = self.bone_handle(name)?;
        self.bone(handle)
    }

    pub fn bone_by_name_mut(&mut self, name: &str) -> Result<&mut Bone> {
        let handle = self.bone_handle(name)?;
        self.bone_mut(handle)
    }

    pub fn bone_handle(&self, name: &str) -> Result<BoneHandle> {
        self.bone_names
            .get(name)
            .copied()
            .ok_or_else(|| ArmatureError::not_found("bone", name))
    }

    #[must_use]
    pub fn has_bone(&self, name: &str) -> bool {
        self.bone_names.contains_key(name)
    }

    /// Number of handle slots; one past the highest bone handle.
    #[must_use]
    pub fn num_bones(&self) -> usize {
        self.bones.num_slots()
    }

    /// Existing bones in handle order.
    pub fn bones(&self) -> impl Iterator<Item = &Bone> {
        self.bones.iter()
    }

    #[must_use]
    pub fn root_bones(&self) -> Vec<BoneHandle> {
        self.bones.roots()
    }

    /// The first root bone.
    pub fn root_bone(&self) -> Result<&Bone> {
        let root = self.bones.roots().first().copied().ok_or_else(|| {
            ArmatureError::invalid_state(format!("skeleton '{}' has no bones to derive a root from", self.name))
        })?;
        self.bone(root)
    }

    pub(crate) fn arena(&self) -> &BoneArena {
        &self.bones
    }

    // ========================================================================
    // Pose
    // ========================================================================

    /// Captures the current pose of every bone as the binding pose.
    pub fn set_binding_pose(&mut self) {
        self.bones.update_transforms();
        for bone in self.bones.iter_mut() {
            bone.set_binding_pose();
        }
        self.has_binding_pose = true;
    }

    #[must_use]
    pub fn has_binding_pose(&self) -> bool {
        self.has_binding_pose
    }

    /// Returns bones to their initial state. Manually controlled bones are
    /// only reset when `reset_manual_bones` is set.
    pub fn reset(&mut self, reset_manual_bones: bool) {
        for bone in self.bones.iter_mut() {
            if reset_manual_bones || !bone.is_manually_controlled() {
                bone.reset();
            }
        }
        self.bones.update_transforms();
    }

    pub fn update_transforms(&mut self) {
        self.bones.update_transforms();
    }

    /// Binding-pose-to-current offset transform per handle slot; empty slots
    /// get the identity.
    pub fn bone_matrices(&mut self) -> Vec<Affine3A> {
        let mut out = Vec::with_capacity(self.bones.num_slots());
        self.bone_matrices_into(&mut out);
        out
    }

    /// As [`bone_matrices`](Self::bone_matrices), reusing `out`'s allocation.
    pub fn bone_matrices_into(&mut self, out: &mut Vec<Affine3A>) {
        self.bones.update_transforms();
        out.clear();
        out.resize(self.bones.num_slots(), Affine3A::IDENTITY);
        for bone in self.bones.iter() {
            out[usize::from(bone.handle())] = bone.offset_transform();
        }
    }

    // ========================================================================
    // Animation settings
    // ========================================================================

    #[must_use]
    pub fn blend_mode(&self) -> SkeletonBlendMode {
        self.blend_mode
    }

    pub fn set_blend_mode(&mut self, mode: SkeletonBlendMode) {
        self.blend_mode = mode;
    }

    #[must_use]
    pub fn animation_defaults(&self) -> AnimationDefaults {
        self.defaults
    }

    /// Modes given to animations created after this call.
    pub fn set_animation_defaults(&mut self, defaults: AnimationDefaults) {
        self.defaults = defaults;
    }

    // ========================================================================
    // Animations
    // ========================================================================

    pub fn animation_mut(&mut self, name: &str) -> Result<&mut Animation> {
        self.animations
            .get_mut(name)
            .ok_or_else(|| ArmatureError::not_found("animation", name))
    }

    /// Animations owned by this skeleton, in name order.
    pub fn animations(&self) -> impl Iterator<Item = &Animation> {
        self.animations.values()
    }

    /// Finds an animation here or in a linked skeleton, returning the link
    /// it came through. Local animations take precedence.
    #[must_use]
    pub fn find_animation(&self, name: &str) -> Option<(&Animation, Option<&LinkedSkeletonAnimationSource>)> {
        if let Some(anim) = self.animations.get(name) {
            return Some((anim, None));
        }
        self.linked_sources.iter().find_map(|source| {
            let linked = source.skeleton.as_ref()?;
            let (anim, _) = linked.find_animation(name)?;
            Some((anim, Some(source)))
        })
    }

    pub fn animation_with_link(&self, name: &str) -> Result<(&Animation, Option<&LinkedSkeletonAnimationSource>)> {
        self.find_animation(name)
            .ok_or_else(|| ArmatureError::not_found("animation", name))
    }

    /// Removes keyframes that add nothing and node tracks that are identity in
    /// every animation.
    ///
    /// With `preserving_identity_node_tracks`, identity tracks survive so a
    /// bone keeps being reset by animations that mention it.
    pub fn optimise_all_animations(&mut self, preserving_identity_node_tracks: bool) {
        if preserving_identity_node_tracks {
            for anim in self.animations.values_mut() {
                anim.optimise(false);
            }
            return;
        }

        let mut identity: FxHashSet<u16> = self.bones.iter().map(Bone::handle).collect();
        for anim in self.animations.values() {
            anim.collect_identity_node_tracks(&mut identity);
        }
        for anim in self.animations.values_mut() {
            anim.destroy_node_tracks(&identity);
            anim.optimise(false);
        }
    }

    /// Performs pending base-keyframe rebases and rebuilds stale keyframe
    /// time lists.
    pub fn prepare_animations(&mut self) {
        apply_pending_base_key_frames(&mut self.animations);
        for anim in self.animations.values_mut() {
            anim.prepare();
        }
    }

    /// Whether any local animation has a pending rebase or stale caches.
    #[must_use]
    pub fn animations_need_prepare(&self) -> bool {
        self.animations
            .values()
            .any(|a| a.use_base_key_frame() || a.needs_prepare())
    }

    // ========================================================================
    // Linked skeletons
    // ========================================================================

    /// Registers another skeleton, by name, as a source of animations.
    ///
    /// Registering the same name twice is ignored; call
    /// [`resolve_linked_skeletons`](Self::resolve_linked_skeletons) or
    /// [`link_skeleton`](Self::link_skeleton) to attach the skeleton itself.
    pub fn add_linked_skeleton_animation_source(&mut self, skeleton_name: &str, scale: f32) -> Result<()> {
        if skeleton_name == self.name {
            return Err(ArmatureError::invalid_parameter(format!(
                "skeleton '{skeleton_name}' cannot link to itself"
            )));
        }
        if self.linked_sources.iter().any(|s| s.skeleton_name == skeleton_name) {
            return Ok(());
        }
        self.linked_sources.push(LinkedSkeletonAnimationSource {
            skeleton_name: skeleton_name.to_owned(),
            scale,
            skeleton: None,
        });
        Ok(())
    }

    /// Registers and attaches an already loaded skeleton, preparing its
    /// animations first.
    pub fn link_skeleton(&mut self, mut skeleton: Arc<Skeleton>, scale: f32) -> Result<()> {
        self.add_linked_skeleton_animation_source(skeleton.name(), scale)?;
        prepare_linked(&mut skeleton);
        if let Some(source) = self.linked_sources.iter_mut().find(|s| s.skeleton_name == skeleton.name()) {
            source.skeleton = Some(skeleton);
        }
        Ok(())
    }

    /// Attaches every unresolved linked source through `resolve`, returning
    /// how many are still unresolved.
    pub fn resolve_linked_skeletons(&mut self, mut resolve: impl FnMut(&str) -> Option<Arc<Skeleton>>) -> usize {
        let mut unresolved = 0;
        for source in self.linked_sources.iter_mut().filter(|s| s.skeleton.is_none()) {
            source.skeleton = resolve(&source.skeleton_name).map(|mut skeleton| {
                prepare_linked(&mut skeleton);
                skeleton
            });
            if source.skeleton.is_none() {
                log::warn!(
                    "Linked skeleton '{}' of '{}' could not be resolved",
                    source.skeleton_name,
                    self.name
                );
                unresolved += 1;
            }
        }
        unresolved
    }

    pub fn remove_all_linked_skeleton_animation_sources(&mut self) {
        self.linked_sources.clear();
    }

    #[must_use]
    pub fn linked_skeleton_animation_sources(&self) -> &[LinkedSkeletonAnimationSource] {
        &self.linked_sources
    }

    /// Local animations followed by those reachable through links, at any
    /// depth, in the order [`find_animation`](Self::find_animation) searches.
    fn all_animations(&self) -> Vec<&Animation> {
        let mut out = Vec::new();
        self.collect_animations(&mut out);
        out
    }

    fn collect_animations<'a>(&'a self, out: &mut Vec<&'a Animation>) {
        out.extend(self.animations.values());
        for linked in self.linked_sources.iter().filter_map(|s| s.skeleton.as_deref()) {
            linked.collect_animations(out);
        }
    }

    // ========================================================================
    // States
    // ========================================================================

    /// Replaces the contents of `set` with one disabled state per animation,
    /// including those of linked skeletons.
    pub fn init_animation_state(&self, set: &mut AnimationStateSet) -> Result<()> {
        set.remove_all_animation_states();
        for anim in self.all_animations() {
            if !set.has_animation_state(anim.name()) {
                set.create_animation_state(anim.name(), 0.0, anim.length(), 1.0, false)?;
            }
        }
        Ok(())
    }

    /// Adds states for new animations and updates lengths of existing ones.
    pub fn refresh_animation_state(&self, set: &mut AnimationStateSet) -> Result<()> {
        for anim in self.all_animations() {
            set.refresh_animation_state(anim.name(), anim.length())?;
        }
        Ok(())
    }

    /// Poses the skeleton from every enabled state in `set`.
    ///
    /// Non-manual bones are reset first. In [`SkeletonBlendMode::Average`] the
    /// weights of states with a known animation are rescaled to sum to one
    /// when they sum to more; smaller sums are kept so everything can fade
    /// out. States naming unknown animations are skipped.
    pub fn set_animation_state(&mut self, set: &AnimationStateSet) -> Result<()> {
        self.prepare_animations();
        for bone in self.bones.iter_mut() {
            if !bone.is_manually_controlled() {
                bone.reset();
            }
        }

        let weight_factor = match self.blend_mode {
            SkeletonBlendMode::Average => {
                let total: f32 = set
                    .enabled_states()
                    .filter(|s| self.find_animation(s.animation_name()).is_some())
                    .map(|s| s.weight())
                    .sum();
                if total > 1.0 { 1.0 / total } else { 1.0 }
            }
            SkeletonBlendMode::Cumulative => 1.0,
        };

        let Self {
            bones,
            animations,
            linked_sources,
            blend_mode,
            ..
        } = self;
        for state in set.enabled_states() {
            let name = state.animation_name();
            let found = animations.get(name).map(|a| (a, None)).or_else(|| {
                linked_sources.iter().find_map(|source| {
                    let (anim, _) = source.skeleton.as_ref()?.find_animation(name)?;
                    Some((anim, Some(source.scale)))
                })
            });
            let Some((anim, link_scale)) = found else {
                log::debug!("Skeleton has no animation '{name}'; state skipped");
                continue;
            };
            anim.apply_to_targets(
                &mut *bones,
                state.time_position(),
                state.weight() * weight_factor,
                state.blend_mask(),
                link_scale.unwrap_or(1.0),
                *blend_mode,
            )?;
        }
        bones.update_transforms();
        Ok(())
    }

    // ========================================================================
    // Diagnostics
    // ========================================================================

    /// Human-readable listing of bones and animations.
    #[must_use]
    pub fn dump_contents(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "-= Debug output of skeleton {} =-", self.name);
        let _ = writeln!(out, "== Bones ==");
        let _ = writeln!(out, "Number of bones: {}", self.bones.iter().count());
        for bone in self.bones.iter() {
            let (axis, angle) = bone.orientation().to_axis_angle();
            let _ = writeln!(out, "-- Bone {} --", bone.handle());
            let _ = writeln!(out, "Name: {}", bone.name().unwrap_or(""));
            let _ = writeln!(out, "Parent: {}", bone.parent().map_or_else(|| "(none)".to_owned(), |p| p.to_string()));
            let _ = writeln!(out, "Position: {}", bone.position());
            let _ = writeln!(out, "Rotation: {} rad about {}", angle, axis);
            let _ = writeln!(out, "Scale: {}", bone.scale());
        }
        let _ = writeln!(out, "== Animations ==");
        let _ = writeln!(out, "Number of animations: {}", self.animations.len());
        for anim in self.animations.values() {
            let _ = writeln!(out, "-- Animation '{}' (length {}) --", anim.name(), anim.length());
            let _ = writeln!(out, "Number of tracks: {}", anim.num_node_tracks());
            for track in anim.node_tracks() {
                let _ = writeln!(out, "  -- Track for bone {} --", track.handle());
                for kf in track.key_frames() {
                    let (axis, angle) = kf.rotation.to_axis_angle();
                    let _ = writeln!(
                        out,
                        "    Time {}: translate {} rotate {} rad about {} scale {}",
                        kf.time(),
                        kf.translate,
                        angle,
                        axis,
                        kf.scale
                    );
                }
            }
        }
        out
    }
}

/// Linked skeletons are shared read-only, so their animations are prepared
/// once on attach. A skeleton shared elsewhere is copied on write.
fn prepare_linked(skeleton: &mut Arc<Skeleton>) {
    if skeleton.animations_need_prepare() {
        log::debug!("Preparing animations of linked skeleton '{}'", skeleton.name());
        Arc::make_mut(skeleton).prepare_animations();
    }
}

impl AnimationContainer for Skeleton {
    fn num_animations(&self) -> usize {
        self.animations.len()
    }

    fn animation_at(&self, index: usize) -> Result<&Animation> {
        self.animations
            .values()
            .nth(index)
            .ok_or(ArmatureError::IndexOutOfBounds { context: "animation", index })
    }

    /// Finds an animation here or, failing that, in a linked skeleton.
    fn animation(&self, name: &str) -> Result<&Animation> {
        self.animation_with_link(name).map(|(anim, _)| anim)
    }

    fn has_animation(&self, name: &str) -> bool {
        self.find_animation(name).is_some()
    }

    fn create_animation(&mut self, name: &str, length: f32) -> Result<&mut Animation> {
        if self.animations.contains_key(name) {
            return Err(ArmatureError::duplicate("animation", name));
        }
        let anim = Animation::with_defaults(name, length, &self.defaults);
        Ok(self.animations.entry(name.to_owned()).or_insert(anim))
    }

    fn remove_animation(&mut self, name: &str) -> Result<Animation> {
        self.animations
            .remove(name)
            .ok_or_else(|| ArmatureError::not_found("animation", name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> Skeleton {
        let mut skel = Skeleton::new("chain");
        skel.create_bone_named("root").unwrap();
        skel.create_child_bone(0, None, Vec3::Y, Quat::IDENTITY).unwrap();
        skel.set_binding_pose();
        skel
    }

    fn translate_anim(skel: &mut Skeleton, name: &str, bone: BoneHandle, offset: Vec3) {
        let anim = skel.create_animation(name, 1.0).unwrap();
        let track = anim.create_node_track(bone).unwrap();
        track.create_node_key_frame(0.0).translate = offset;
        track.create_node_key_frame(1.0).translate = offset;
    }

    #[test]
    fn bone_creation_rules() {
        let mut skel = chain();
        assert_eq!(skel.create_bone().unwrap().handle(), 2);
        assert!(matches!(skel.create_bone_named("root"), Err(ArmatureError::Duplicate { .. })));
        assert!(matches!(skel.create_bone_with_handle(1), Err(ArmatureError::Duplicate { .. })));
        assert!(matches!(
            skel.create_bone_with_handle(256),
            Err(ArmatureError::InvalidParameter(_))
        ));
        skel.create_bone_with_handle(10).unwrap();
        assert_eq!(skel.num_bones(), 11);
        assert_eq!(skel.create_bone().unwrap().handle(), 11);
        assert!(matches!(Skeleton::new("empty").root_bone(), Err(ArmatureError::InvalidState(_))));
    }

    #[test]
    fn binding_pose_gives_identity_matrices() {
        let mut skel = chain();
        for m in skel.bone_matrices() {
            assert!(m.abs_diff_eq(Affine3A::IDENTITY, 1e-6));
        }
        skel.bone_mut(0).unwrap().translate(Vec3::X);
        let matrices = skel.bone_matrices();
        assert!(matrices[1].translation.abs_diff_eq(Vec3::X.into(), 1e-6));
    }

    #[test]
    fn average_mode_rescales_heavy_weights() {
        let mut skel = chain();
        translate_anim(&mut skel, "a", 0, Vec3::X);
        translate_anim(&mut skel, "b", 0, Vec3::Z);

        let mut set = AnimationStateSet::new();
        skel.init_animation_state(&mut set).unwrap();
        {
            let mut a = set.state_mut("a").unwrap();
            a.set_weight(0.8);
            a.set_enabled(true);
        }
        {
            let mut b = set.state_mut("b").unwrap();
            b.set_weight(0.6);
            b.set_enabled(true);
        }
        skel.set_animation_state(&set).unwrap();
        let expected = Vec3::new(0.8 / 1.4, 0.0, 0.6 / 1.4);
        assert!(skel.bone(0).unwrap().position().abs_diff_eq(expected, 1e-5));

        skel.set_blend_mode(SkeletonBlendMode::Cumulative);
        skel.set_animation_state(&set).unwrap();
        assert!(skel.bone(0).unwrap().position().abs_diff_eq(Vec3::new(0.8, 0.0, 0.6), 1e-5));
    }

    #[test]
    fn manual_bones_survive_reset() {
        let mut skel = chain();
        skel.bone_mut(1).unwrap().set_manually_controlled(true);
        skel.bone_mut(1).unwrap().translate(Vec3::X);
        skel.bone_mut(0).unwrap().translate(Vec3::X);
        skel.reset(false);
        assert_eq!(skel.bone(0).unwrap().position(), Vec3::ZERO);
        assert_eq!(skel.bone(1).unwrap().position(), Vec3::new(1.0, 1.0, 0.0));
        skel.reset(true);
        assert_eq!(skel.bone(1).unwrap().position(), Vec3::Y);
    }

    #[test]
    fn linked_animations_are_scaled() {
        let mut source = chain();
        source.name = "source".to_owned();
        translate_anim(&mut source, "run", 1, Vec3::X);
        let source = Arc::new(source);

        let mut skel = chain();
        assert!(skel.add_linked_skeleton_animation_source("chain", 1.0).is_err());
        skel.link_skeleton(Arc::clone(&source), 2.0).unwrap();
        assert!(skel.has_animation("run"));

        let mut set = AnimationStateSet::new();
        skel.init_animation_state(&mut set).unwrap();
        set.state_mut("run").unwrap().set_enabled(true);
        skel.set_animation_state(&set).unwrap();
        assert!(skel.bone(1).unwrap().position().abs_diff_eq(Vec3::new(2.0, 1.0, 0.0), 1e-5));
    }

    #[test]
    fn unresolved_links_are_counted() {
        let mut skel = chain();
        skel.add_linked_skeleton_animation_source("other", 1.0).unwrap();
        skel.add_linked_skeleton_animation_source("other", 3.0).unwrap();
        assert_eq!(skel.linked_skeleton_animation_sources().len(), 1);
        assert_eq!(skel.resolve_linked_skeletons(|_| None), 1);
        assert_eq!(skel.resolve_linked_skeletons(|_| Some(Arc::new(Skeleton::new("other")))), 0);
    }

    #[test]
    fn optimise_drops_identity_tracks_everywhere() {
        let mut skel = chain();
        translate_anim(&mut skel, "still", 0, Vec3::ZERO);
        translate_anim(&mut skel, "move", 1, Vec3::X);
        skel.animation_mut("move").unwrap().create_node_track(0).unwrap();
        skel.optimise_all_animations(false);
        assert!(!skel.animation("still").unwrap().has_node_track(0));
        assert!(!skel.animation("move").unwrap().has_node_track(0));
        assert!(skel.animation("move").unwrap().has_node_track(1));
    }

    #[test]
    fn dump_lists_bones_and_animations() {
        let mut skel = chain();
        translate_anim(&mut skel, "walk", 0, Vec3::X);
        let dump = skel.dump_contents();
        assert!(dump.contains("Number of bones: 2"));
        assert!(dump.contains("Animation 'walk'"));
    }
}
