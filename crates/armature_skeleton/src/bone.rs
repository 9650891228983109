use glam::{Affine3A, Quat, Vec3};
use smallvec::SmallVec;

use armature_animation::AnimableNode;
use armature_core::BoneHandle;

/// Local, initial, derived and binding-pose transforms of one bone.
///
/// Local transforms are relative to the parent bone. Derived transforms are
/// relative to the skeleton root and are cached. The owning skeleton
/// refreshes them after posing; local edits made through
/// [`Skeleton::bone_mut`](crate::Skeleton::bone_mut) show up after
/// [`Skeleton::updated_bone`](crate::Skeleton::updated_bone) or the next pose.
#[derive(Debug, Clone)]
pub struct Bone {
    handle: BoneHandle,
    name: Option<String>,
    pub(crate) parent: Option<BoneHandle>,
    pub(crate) children: SmallVec<[BoneHandle; 4]>,

    // === Local transform ===
    position: Vec3,
    orientation: Quat,
    scale: Vec3,

    // === Initial state (reset target) ===
    initial_position: Vec3,
    initial_orientation: Quat,
    initial_scale: Vec3,

    // === Derived cache ===
    derived_position: Vec3,
    derived_orientation: Quat,
    derived_scale: Vec3,
    pub(crate) needs_update: bool,

    // === Binding pose inverse ===
    bind_derived_inverse_position: Vec3,
    bind_derived_inverse_orientation: Quat,
    bind_derived_inverse_scale: Vec3,

    inherit_orientation: bool,
    inherit_scale: bool,
    manually_controlled: bool,
}

impl Bone {
    pub(crate) fn new(handle: BoneHandle, name: Option<String>) -> Self {
        Self {
            handle,
            name,
            parent: None,
            children: SmallVec::new(),
            position: Vec3::ZERO,
            orientation: Quat::IDENTITY,
            scale: Vec3::ONE,
            initial_position: Vec3::ZERO,
            initial_orientation: Quat::IDENTITY,
            initial_scale: Vec3::ONE,
            derived_position: Vec3::ZERO,
            derived_orientation: Quat::IDENTITY,
            derived_scale: Vec3::ONE,
            needs_update: true,
            bind_derived_inverse_position: Vec3::ZERO,
            bind_derived_inverse_orientation: Quat::IDENTITY,
            bind_derived_inverse_scale: Vec3::ONE,
            inherit_orientation: true,
            inherit_scale: true,
            manually_controlled: false,
        }
    }

    // ========================================================================
    // Identity & hierarchy
    // ========================================================================

    #[inline]
    #[must_use]
    pub fn handle(&self) -> BoneHandle {
        self.handle
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<BoneHandle> {
        self.parent
    }

    #[inline]
    #[must_use]
    pub fn children(&self) -> &[BoneHandle] {
        &self.children
    }

    // ========================================================================
    // Local transform
    // ========================================================================

    #[inline]
    #[must_use]
    pub fn position(&self) -> Vec3 {
        self.position
    }

    #[inline]
    #[must_use]
    pub fn orientation(&self) -> Quat {
        self.orientation
    }

    #[inline]
    #[must_use]
    pub fn scale(&self) -> Vec3 {
        self.scale
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
        self.needs_update = true;
    }

    pub fn set_orientation(&mut self, orientation: Quat) {
        self.orientation = orientation.normalize();
        self.needs_update = true;
    }

    pub fn set_scale(&mut self, scale: Vec3) {
        self.scale = scale;
        self.needs_update = true;
    }

    /// Moves the bone in parent space.
    pub fn translate(&mut self, delta: Vec3) {
        self.position += delta;
        self.needs_update = true;
    }

    /// Rotates the bone in its own local space.
    pub fn rotate(&mut self, delta: Quat) {
        self.orientation = (self.orientation * delta).normalize();
        self.needs_update = true;
    }

    pub fn scale_by(&mut self, factor: Vec3) {
        self.scale *= factor;
        self.needs_update = true;
    }

    #[must_use]
    pub fn inherit_orientation(&self) -> bool {
        self.inherit_orientation
    }

    pub fn set_inherit_orientation(&mut self, inherit: bool) {
        self.inherit_orientation = inherit;
        self.needs_update = true;
    }

    #[must_use]
    pub fn inherit_scale(&self) -> bool {
        self.inherit_scale
    }

    pub fn set_inherit_scale(&mut self, inherit: bool) {
        self.inherit_scale = inherit;
        self.needs_update = true;
    }

    // ========================================================================
    // Initial state
    // ========================================================================

    /// Records the current local transform as the state [`reset`](Self::reset) restores.
    pub fn set_initial_state(&mut self) {
        self.initial_position = self.position;
        self.initial_orientation = self.orientation;
        self.initial_scale = self.scale;
    }

    pub fn reset(&mut self) {
        self.position = self.initial_position;
        self.orientation = self.initial_orientation;
        self.scale = self.initial_scale;
        self.needs_update = true;
    }

    #[must_use]
    pub fn initial_position(&self) -> Vec3 {
        self.initial_position
    }

    #[must_use]
    pub fn initial_orientation(&self) -> Quat {
        self.initial_orientation
    }

    #[must_use]
    pub fn initial_scale(&self) -> Vec3 {
        self.initial_scale
    }

    /// Manually controlled bones keep their pose across a skeleton reset
    /// unless the reset is forced.
    #[must_use]
    pub fn is_manually_controlled(&self) -> bool {
        self.manually_controlled
    }

    pub fn set_manually_controlled(&mut self, manual: bool) {
        self.manually_controlled = manual;
    }

    // ========================================================================
    // Derived transform
    // ========================================================================

    #[inline]
    #[must_use]
    pub fn derived_position(&self) -> Vec3 {
        self.derived_position
    }

    #[inline]
    #[must_use]
    pub fn derived_orientation(&self) -> Quat {
        self.derived_orientation
    }

    #[inline]
    #[must_use]
    pub fn derived_scale(&self) -> Vec3 {
        self.derived_scale
    }

    pub(crate) fn update_from_parent(&mut self, parent: Option<(Vec3, Quat, Vec3)>) {
        match parent {
            Some((parent_position, parent_orientation, parent_scale)) => {
                self.derived_orientation = if self.inherit_orientation {
                    parent_orientation * self.orientation
                } else {
                    self.orientation
                };
                self.derived_scale = if self.inherit_scale {
                    parent_scale * self.scale
                } else {
                    self.scale
                };
                self.derived_position = parent_orientation * (parent_scale * self.position) + parent_position;
            }
            None => {
                self.derived_position = self.position;
                self.derived_orientation = self.orientation;
                self.derived_scale = self.scale;
            }
        }
        self.needs_update = false;
    }

    pub(crate) fn derived(&self) -> (Vec3, Quat, Vec3) {
        (self.derived_position, self.derived_orientation, self.derived_scale)
    }

    // ========================================================================
    // Binding pose
    // ========================================================================

    /// Captures the current derived transform as the binding pose and the
    /// current local transform as the initial state.
    pub(crate) fn set_binding_pose(&mut self) {
        self.set_initial_state();
        self.bind_derived_inverse_position = -self.derived_position;
        self.bind_derived_inverse_scale = Vec3::ONE / self.derived_scale;
        self.bind_derived_inverse_orientation = self.derived_orientation.inverse();
    }

    /// Model-space position of the bone in the binding pose.
    #[must_use]
    pub fn binding_pose_position(&self) -> Vec3 {
        -self.bind_derived_inverse_position
    }

    #[must_use]
    pub fn binding_pose_inverse_position(&self) -> Vec3 {
        self.bind_derived_inverse_position
    }

    #[must_use]
    pub fn binding_pose_inverse_orientation(&self) -> Quat {
        self.bind_derived_inverse_orientation
    }

    #[must_use]
    pub fn binding_pose_inverse_scale(&self) -> Vec3 {
        self.bind_derived_inverse_scale
    }

    /// Transform from the binding pose to the current derived pose.
    ///
    /// Scale is combined per axis without shear; translation is taken back
    /// to binding-pose bone space before moving to the current pose.
    #[must_use]
    pub fn offset_transform(&self) -> Affine3A {
        let scale = self.derived_scale * self.bind_derived_inverse_scale;
        let rotation = self.derived_orientation * self.bind_derived_inverse_orientation;
        let translation = self.derived_position + rotation * (scale * self.bind_derived_inverse_position);
        Affine3A::from_scale_rotation_translation(scale, rotation, translation)
    }
}

impl AnimableNode for Bone {
    fn translate(&mut self, delta: Vec3) {
        Bone::translate(self, delta);
    }

    fn rotate(&mut self, delta: Quat) {
        Bone::rotate(self, delta);
    }

    fn scale(&self) -> Vec3 {
        self.scale
    }

    fn set_scale(&mut self, scale: Vec3) {
        Bone::set_scale(self, scale);
    }

    fn reset_to_initial_state(&mut self) {
        self.reset();
    }
}
