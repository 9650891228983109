//! Copying animations between skeletons with compatible hierarchies.

use glam::{Quat, Vec3};

use armature_animation::{AnimationContainer, KeyFrame};
use armature_core::errors::{ArmatureError, Result};
use armature_core::math::{DEFAULT_TOLERANCE, position_equals, real_equal};
use armature_core::BoneHandle;

use crate::skeleton::Skeleton;

/// Source-bind to target-bind correction applied to copied keyframes.
#[derive(Debug, Clone, Copy)]
struct DeltaTransform {
    translate: Vec3,
    rotate: Quat,
    scale: Vec3,
    is_identity: bool,
}

impl DeltaTransform {
    const IDENTITY: Self = Self {
        translate: Vec3::ZERO,
        rotate: Quat::IDENTITY,
        scale: Vec3::ONE,
        is_identity: true,
    };
}

impl Skeleton {
    /// Maps each source bone handle to the same handle here.
    #[must_use]
    pub fn build_map_bone_by_handle(&self, src: &Skeleton) -> Vec<BoneHandle> {
        (0..src.num_bones()).map(|h| h as BoneHandle).collect()
    }

    /// Maps each source bone to the bone here with the same name; bones with
    /// no match get fresh handles past the end of this skeleton.
    #[must_use]
    pub fn build_map_bone_by_name(&self, src: &Skeleton) -> Vec<BoneHandle> {
        let mut next_handle = self.num_bones() as BoneHandle;
        (0..src.num_bones())
            .map(|h| {
                let existing = src
                    .bone(h as BoneHandle)
                    .ok()
                    .and_then(|b| b.name())
                    .and_then(|name| self.bone_handle(name).ok());
                existing.unwrap_or_else(|| {
                    let handle = next_handle;
                    next_handle = next_handle.saturating_add(1);
                    handle
                })
            })
            .collect()
    }

    /// Copies animations from `src`, re-expressing keyframes against this
    /// skeleton's binding pose.
    ///
    /// `bone_handle_map[src_handle]` gives the target bone for each source
    /// slot. Source bones mapped past the existing bones are cloned in and
    /// attached under their mapped parents. Bones present in both skeletons
    /// must share the same (mapped) parent. An empty `animations` list copies
    /// every animation `src` owns; named animations must be owned by `src`
    /// rather than reached through one of its links.
    pub fn merge_skeleton_animations(
        &mut self,
        src: &Skeleton,
        bone_handle_map: &[BoneHandle],
        animations: &[&str],
    ) -> Result<()> {
        let num_src = src.num_bones();
        if bone_handle_map.len() != num_src {
            return Err(ArmatureError::invalid_parameter(format!(
                "bone handle map has {} entries but the source skeleton has {num_src} bones",
                bone_handle_map.len()
            )));
        }
        let map = |h: BoneHandle| bone_handle_map[usize::from(h)];
        let existed: Vec<bool> = bone_handle_map.iter().map(|&d| self.arena().contains(d)).collect();

        // Common bones must agree on hierarchy.
        for src_bone in src.bones() {
            let src_handle = usize::from(src_bone.handle());
            if !existed[src_handle] {
                continue;
            }
            let dst_bone = self.bone(bone_handle_map[src_handle])?;
            let compatible = match (src_bone.parent(), dst_bone.parent()) {
                (None, None) => true,
                (Some(sp), Some(dp)) => map(sp) == dp,
                _ => false,
            };
            if !compatible {
                return Err(ArmatureError::invalid_parameter(format!(
                    "source skeleton incompatible with this skeleton: different hierarchy between bone '{}' and '{}'",
                    src_bone.name().unwrap_or_default(),
                    dst_bone.name().unwrap_or_default()
                )));
            }
        }

        if existed.iter().zip(0..).any(|(&e, h)| !e && src.arena().contains(h)) {
            for src_bone in src.bones() {
                let dst_handle = map(src_bone.handle());
                if existed[usize::from(src_bone.handle())] {
                    continue;
                }
                let dst = match src_bone.name() {
                    Some(name) => self.create_bone_named_with_handle(name, dst_handle)?,
                    None => self.create_bone_with_handle(dst_handle)?,
                };
                dst.set_position(src_bone.initial_position());
                dst.set_orientation(src_bone.initial_orientation());
                dst.set_scale(src_bone.initial_scale());
                dst.set_initial_state();
            }
            for src_bone in src.bones() {
                if existed[usize::from(src_bone.handle())] {
                    continue;
                }
                if let Some(parent) = src_bone.parent() {
                    self.add_child(map(parent), map(src_bone.handle()))?;
                }
            }
            self.reset(true);
            self.set_binding_pose();
        }

        let mut deltas = vec![DeltaTransform::IDENTITY; num_src];
        for src_bone in src.bones() {
            let src_handle = usize::from(src_bone.handle());
            if !existed[src_handle] {
                continue;
            }
            let dst_bone = self.bone(bone_handle_map[src_handle])?;
            let translate = src_bone.initial_position() - dst_bone.initial_position();
            let rotate = dst_bone.initial_orientation().inverse() * src_bone.initial_orientation();
            let scale = src_bone.initial_scale() / dst_bone.initial_scale();
            let (_, angle) = rotate.to_axis_angle();
            let is_identity = position_equals(translate, Vec3::ZERO, DEFAULT_TOLERANCE)
                && position_equals(scale, Vec3::ONE, DEFAULT_TOLERANCE)
                && real_equal(angle, 0.0, DEFAULT_TOLERANCE);
            deltas[src_handle] = DeltaTransform { translate, rotate, scale, is_identity };
        }

        let sources = if animations.is_empty() {
            src.animations().collect::<Vec<_>>()
        } else {
            animations
                .iter()
                .map(|&name| match src.find_animation(name) {
                    Some((anim, None)) => Ok(anim),
                    _ => Err(ArmatureError::not_found("animation", name)),
                })
                .collect::<Result<Vec<_>>>()?
        };

        for src_anim in sources {
            let dst_anim = self.create_animation(src_anim.name(), src_anim.length())?;
            dst_anim.set_interpolation_mode(src_anim.interpolation_mode());
            dst_anim.set_rotation_interpolation_mode(src_anim.rotation_interpolation_mode());

            for src_bone in src.bones() {
                let src_handle = src_bone.handle();
                let delta = deltas[usize::from(src_handle)];
                let dst_handle = map(src_handle);

                if let Ok(src_track) = src_anim.node_track(src_handle) {
                    let dst_track = dst_anim.create_node_track(dst_handle)?;
                    dst_track.set_use_shortest_rotation_path(src_track.use_shortest_rotation_path());
                    for src_kf in src_track.key_frames() {
                        let dst_kf = dst_track.create_node_key_frame(src_kf.time());
                        if delta.is_identity {
                            dst_kf.translate = src_kf.translate;
                            dst_kf.rotation = src_kf.rotation;
                            dst_kf.scale = src_kf.scale;
                        } else {
                            dst_kf.translate = delta.translate + src_kf.translate;
                            dst_kf.rotation = delta.rotate * src_kf.rotation;
                            dst_kf.scale = delta.scale * src_kf.scale;
                        }
                    }
                } else if !delta.is_identity {
                    // Hold the correction for the whole animation.
                    let length = dst_anim.length();
                    let dst_track = dst_anim.create_node_track(dst_handle)?;
                    for time in [0.0, length] {
                        let kf = dst_track.create_node_key_frame(time);
                        kf.translate = delta.translate;
                        kf.rotation = delta.rotate;
                        kf.scale = delta.scale;
                    }
                }
            }
            log::debug!("Merged animation '{}' into skeleton '{}'", src_anim.name(), self.name());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_bone(name: &str, child_offset: Vec3) -> Skeleton {
        let mut skel = Skeleton::new(name);
        skel.create_bone_named("root").unwrap();
        skel.create_bone_named("arm").unwrap().set_position(child_offset);
        skel.add_child(0, 1).unwrap();
        skel.set_binding_pose();
        skel
    }

    #[test]
    fn map_by_name_appends_unknown_bones() {
        let dst = two_bone("dst", Vec3::X);
        let mut src = Skeleton::new("src");
        src.create_bone_named("arm").unwrap();
        src.create_bone_named("tail").unwrap();
        assert_eq!(dst.build_map_bone_by_name(&src), vec![1, 2]);
        assert_eq!(dst.build_map_bone_by_handle(&src), vec![0, 1]);
    }

    #[test]
    fn merge_corrects_for_binding_pose() {
        let mut dst = two_bone("dst", Vec3::X);
        let mut src = two_bone("src", Vec3::new(2.0, 0.0, 0.0));
        let anim = src.create_animation("wave", 1.0).unwrap();
        let kf = anim.create_node_track(1).unwrap().create_node_key_frame(0.5);
        kf.translate = Vec3::Y;

        let map = dst.build_map_bone_by_handle(&src);
        dst.merge_skeleton_animations(&src, &map, &[]).unwrap();

        let merged = dst.animation("wave").unwrap();
        let track = merged.node_track(1).unwrap();
        assert!(track.key_frames()[0].translate.abs_diff_eq(Vec3::new(1.0, 1.0, 0.0), 1e-6));
        assert!(!merged.has_node_track(0));
    }

    #[test]
    fn merge_rejects_mismatched_hierarchy() {
        let mut dst = two_bone("dst", Vec3::X);
        let mut src = Skeleton::new("src");
        src.create_bone_named("root").unwrap();
        src.create_bone_named("arm").unwrap();
        src.set_binding_pose();
        let map = dst.build_map_bone_by_handle(&src);
        assert!(matches!(
            dst.merge_skeleton_animations(&src, &map, &[]),
            Err(ArmatureError::InvalidParameter(_))
        ));
    }

    #[test]
    fn merge_clones_missing_bones() {
        let mut dst = Skeleton::new("dst");
        dst.create_bone_named("root").unwrap();
        dst.set_binding_pose();
        let mut src = two_bone("src", Vec3::Z);
        src.create_animation("idle", 2.0).unwrap();

        let map = dst.build_map_bone_by_name(&src);
        dst.merge_skeleton_animations(&src, &map, &["idle"]).unwrap();
        let arm = dst.bone_by_name("arm").unwrap();
        assert_eq!(arm.parent(), Some(0));
        assert!(arm.initial_position().abs_diff_eq(Vec3::Z, 1e-6));
        assert!(dst.has_animation("idle"));
        assert!(matches!(
            dst.merge_skeleton_animations(&src, &map, &["missing"]),
            Err(ArmatureError::NotFound { .. })
        ));
    }
}
