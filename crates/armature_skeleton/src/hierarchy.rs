//! Bone Hierarchy
//!
//! Bone storage and top-down derived-transform propagation, kept apart from
//! [`Skeleton`](crate::Skeleton) so that animations can be applied to the
//! bones while the skeleton's animation list is borrowed.
//!
//! # Update order
//!
//! Bones are processed in level order (BFS from the roots):
//! 1. All root bones (no dependencies)
//! 2. Direct children of the roots (depend only on level 1)
//! 3. ...and so on
//!
//! The level order is cached and rebuilt only after the hierarchy changes.

use armature_animation::{AnimableNode, NodeTargets};
use armature_core::errors::{ArmatureError, Result};
use armature_core::{BoneHandle, MAX_NUM_BONES};

use crate::bone::Bone;

/// Bones per level, root level first.
#[derive(Debug, Clone, Default)]
pub struct LevelOrderBatches {
    pub batches: Vec<Vec<BoneHandle>>,
}

impl LevelOrderBatches {
    /// Total number of bones across all levels.
    #[must_use]
    pub fn total_bones(&self) -> usize {
        self.batches.iter().map(Vec::len).sum()
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.batches.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = BoneHandle> + '_ {
        self.batches.iter().flatten().copied()
    }
}

/// Bones of one skeleton, indexed by handle. Slots may be empty.
#[derive(Debug, Clone, Default)]
pub struct BoneArena {
    slots: Vec<Option<Bone>>,
    order: LevelOrderBatches,
    order_dirty: bool,
    changed: Vec<bool>,
}

impl BoneArena {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of handle slots, including empty ones.
    #[must_use]
    pub fn num_slots(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn contains(&self, handle: BoneHandle) -> bool {
        self.get(handle).is_some()
    }

    #[must_use]
    pub fn get(&self, handle: BoneHandle) -> Option<&Bone> {
        self.slots.get(usize::from(handle)).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, handle: BoneHandle) -> Option<&mut Bone> {
        self.slots.get_mut(usize::from(handle)).and_then(Option::as_mut)
    }

    /// Existing bones in handle order.
    pub fn iter(&self) -> impl Iterator<Item = &Bone> {
        self.slots.iter().flatten()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Bone> {
        self.slots.iter_mut().flatten()
    }

    /// Handles of parentless bones, in handle order.
    #[must_use]
    pub fn roots(&self) -> Vec<BoneHandle> {
        self.iter().filter(|b| b.parent.is_none()).map(Bone::handle).collect()
    }

    pub(crate) fn insert(&mut self, bone: Bone) -> Result<&mut Bone> {
        let index = usize::from(bone.handle());
        if index >= MAX_NUM_BONES {
            return Err(ArmatureError::invalid_parameter(format!(
                "bone handle {index} exceeds the maximum of {MAX_NUM_BONES} bones per skeleton"
            )));
        }
        if index >= self.slots.len() {
            self.slots.resize_with(index + 1, || None);
        }
        if self.slots[index].is_some() {
            return Err(ArmatureError::duplicate("bone", index));
        }
        self.order_dirty = true;
        Ok(self.slots[index].insert(bone))
    }

    fn require(&self, handle: BoneHandle) -> Result<&Bone> {
        self.get(handle).ok_or_else(|| ArmatureError::not_found("bone", handle))
    }

    // ========================================================================
    // Hierarchy edits
    // ========================================================================

    /// Makes `child` a child of `parent`, detaching it from any previous parent.
    ///
    /// Fails if either bone is missing or if `parent` is `child` or one of its
    /// descendants.
    pub fn add_child(&mut self, parent: BoneHandle, child: BoneHandle) -> Result<()> {
        self.require(parent)?;
        self.require(child)?;
        let mut cursor = Some(parent);
        while let Some(handle) = cursor {
            if handle == child {
                return Err(ArmatureError::invalid_parameter(format!(
                    "bone {child} cannot become a child of its own descendant {parent}"
                )));
            }
            cursor = self.get(handle).and_then(Bone::parent);
        }

        if let Some(old_parent) = self.get(child).and_then(Bone::parent)
            && let Some(old) = self.get_mut(old_parent)
        {
            old.children.retain(|c| *c != child);
        }
        if let Some(p) = self.get_mut(parent) {
            p.children.push(child);
        }
        if let Some(c) = self.get_mut(child) {
            c.parent = Some(parent);
            c.needs_update = true;
        }
        self.order_dirty = true;
        Ok(())
    }

    /// Detaches `child` from `parent`, making it a root bone.
    pub fn remove_child(&mut self, parent: BoneHandle, child: BoneHandle) -> Result<()> {
        if self.require(child)?.parent() != Some(parent) {
            return Err(ArmatureError::invalid_parameter(format!(
                "bone {child} is not a child of bone {parent}"
            )));
        }
        if let Some(p) = self.get_mut(parent) {
            p.children.retain(|c| *c != child);
        }
        if let Some(c) = self.get_mut(child) {
            c.parent = None;
            c.needs_update = true;
        }
        self.order_dirty = true;
        Ok(())
    }

    // ========================================================================
    // Transform propagation
    // ========================================================================

    /// Cached level order, rebuilt if the hierarchy changed.
    pub fn level_order(&mut self) -> &LevelOrderBatches {
        if self.order_dirty {
            self.rebuild_level_order();
        }
        &self.order
    }

    fn rebuild_level_order(&mut self) {
        self.order.batches.clear();
        let mut current = self.roots();
        while !current.is_empty() {
            let next: Vec<BoneHandle> = current
                .iter()
                .filter_map(|&h| self.get(h))
                .flat_map(|b| b.children.iter().copied())
                .collect();
            self.order.batches.push(current);
            current = next;
        }
        self.order_dirty = false;
    }

    /// Recomputes derived transforms of every bone whose local transform, or
    /// any ancestor's, changed since the last update.
    pub fn update_transforms(&mut self) {
        if self.order_dirty {
            self.rebuild_level_order();
        }
        self.changed.clear();
        self.changed.resize(self.slots.len(), false);

        for level in &self.order.batches {
            for &handle in level {
                let index = usize::from(handle);
                let Some(parent) = self.slots.get(index).and_then(Option::as_ref).map(Bone::parent) else {
                    continue;
                };
                let parent_changed = parent.is_some_and(|p| self.changed[usize::from(p)]);
                let parent_derived = parent
                    .and_then(|p| self.slots.get(usize::from(p)))
                    .and_then(Option::as_ref)
                    .map(Bone::derived);

                if let Some(bone) = self.slots[index].as_mut()
                    && (bone.needs_update || parent_changed)
                {
                    bone.update_from_parent(parent_derived);
                    self.changed[index] = true;
                }
            }
        }
    }
}

impl NodeTargets for BoneArena {
    fn node_mut(&mut self, handle: u16) -> Option<&mut dyn AnimableNode> {
        self.get_mut(handle).map(|b| b as &mut dyn AnimableNode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Quat, Vec3};

    fn arena(count: u16) -> BoneArena {
        let mut arena = BoneArena::new();
        for h in 0..count {
            arena.insert(Bone::new(h, None)).unwrap();
        }
        arena
    }

    #[test]
    fn rejects_cycles() {
        let mut a = arena(3);
        a.add_child(0, 1).unwrap();
        a.add_child(1, 2).unwrap();
        assert!(a.add_child(2, 0).is_err());
        assert!(a.add_child(1, 1).is_err());
    }

    #[test]
    fn level_order_follows_hierarchy() {
        let mut a = arena(4);
        a.add_child(0, 2).unwrap();
        a.add_child(2, 3).unwrap();
        let order = a.level_order();
        assert_eq!(order.batches, vec![vec![0, 1], vec![2], vec![3]]);
        assert_eq!(order.total_bones(), 4);
    }

    #[test]
    fn reparenting_moves_child() {
        let mut a = arena(3);
        a.add_child(0, 2).unwrap();
        a.add_child(1, 2).unwrap();
        assert!(a.get(0).unwrap().children().is_empty());
        assert_eq!(a.get(1).unwrap().children(), &[2]);
        a.remove_child(1, 2).unwrap();
        assert_eq!(a.roots(), vec![0, 1, 2]);
        assert!(a.remove_child(1, 2).is_err());
    }

    #[test]
    fn derived_transforms_propagate() {
        let mut a = arena(2);
        a.add_child(0, 1).unwrap();
        a.get_mut(0).unwrap().set_orientation(Quat::from_rotation_z(std::f32::consts::FRAC_PI_2));
        a.get_mut(0).unwrap().set_scale(Vec3::splat(2.0));
        a.get_mut(1).unwrap().set_position(Vec3::X);
        a.update_transforms();

        let child = a.get(1).unwrap();
        assert!(child.derived_position().abs_diff_eq(Vec3::new(0.0, 2.0, 0.0), 1e-5));
        assert!(child.derived_scale().abs_diff_eq(Vec3::splat(2.0), 1e-6));

        // Only the root changes; the child must still be refreshed.
        a.get_mut(0).unwrap().set_position(Vec3::Z);
        a.update_transforms();
        assert!(a.get(1).unwrap().derived_position().abs_diff_eq(Vec3::new(0.0, 2.0, 1.0), 1e-5));
    }

    #[test]
    fn handle_limits() {
        let mut a = BoneArena::new();
        assert!(matches!(
            a.insert(Bone::new(256, None)),
            Err(ArmatureError::InvalidParameter(_))
        ));
        a.insert(Bone::new(3, None)).unwrap();
        assert_eq!(a.num_slots(), 4);
        assert!(matches!(a.insert(Bone::new(3, None)), Err(ArmatureError::Duplicate { .. })));
    }
}
