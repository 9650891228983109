use std::sync::Arc;

use smallvec::SmallVec;

use armature_core::errors::{ArmatureError, Result};
use armature_core::vertex::VertexBufferMut;

use crate::blend::{software_vertex_morph, software_vertex_pose_blend};
use crate::keyframe::{KeyFrame, MorphSnapshot, VertexMorphKeyFrame, VertexPoseKeyFrame};
use crate::pose::Pose;
use crate::time_index::TimeIndex;
use crate::tracks::{AnimationTrack, KeyFrameTrack};

/// The kind of keyframes a vertex track holds. Fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexAnimationType {
    /// Whole-buffer snapshots interpolated pairwise.
    Morph,
    /// Weighted references to additive poses.
    Pose,
}

/// Where a vertex track writes its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VertexTargetMode {
    /// Blend on the CPU into the target vertex buffer.
    #[default]
    Software,
    /// Record buffer pairs and influences for a vertex shader.
    Hardware,
}

/// Two morph snapshots and the parametric blend between them.
#[derive(Debug, Clone, PartialEq)]
pub struct HardwareMorph {
    pub from: Arc<MorphSnapshot>,
    pub to: Arc<MorphSnapshot>,
    pub t: f32,
}

/// A pose bound to a hardware slot with its final influence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HardwarePoseSlot {
    pub pose_index: u16,
    pub influence: f32,
}

/// Shader inputs produced by hardware-targeted vertex tracks.
#[derive(Debug, Clone, PartialEq)]
pub struct HardwareVertexAnimation {
    pub morph: Option<HardwareMorph>,
    pub poses: SmallVec<[HardwarePoseSlot; 4]>,
    pose_capacity: usize,
}

impl HardwareVertexAnimation {
    /// `pose_capacity` is the number of pose slots the shader exposes.
    #[must_use]
    pub fn new(pose_capacity: usize) -> Self {
        Self {
            morph: None,
            poses: SmallVec::new(),
            pose_capacity,
        }
    }

    #[must_use]
    pub fn pose_capacity(&self) -> usize {
        self.pose_capacity
    }

    /// Clears per-frame outputs before the next round of tracks runs.
    pub fn clear(&mut self) {
        self.morph = None;
        self.poses.clear();
    }

    fn bind_pose(&mut self, pose_index: u16, influence: f32) {
        if self.poses.len() < self.pose_capacity {
            self.poses.push(HardwarePoseSlot { pose_index, influence });
        } else {
            log::debug!("No free hardware pose slot for pose {pose_index}; ignoring it");
        }
    }
}

/// Destination of vertex tracks for one piece of geometry.
#[derive(Debug, Default)]
pub struct VertexAnimationTarget<'a> {
    pub software: Option<VertexBufferMut<'a>>,
    pub hardware: Option<&'a mut HardwareVertexAnimation>,
}

impl<'a> VertexAnimationTarget<'a> {
    #[must_use]
    pub fn software(buffer: VertexBufferMut<'a>) -> Self {
        Self {
            software: Some(buffer),
            hardware: None,
        }
    }

    #[must_use]
    pub fn hardware(output: &'a mut HardwareVertexAnimation) -> Self {
        Self {
            software: None,
            hardware: Some(output),
        }
    }
}

#[derive(Debug, Clone)]
enum VertexKeyFrames {
    Morph(KeyFrameTrack<VertexMorphKeyFrame>),
    Pose(KeyFrameTrack<VertexPoseKeyFrame>),
}

/// Morph or pose keyframes driving one vertex target.
#[derive(Debug, Clone)]
pub struct VertexAnimationTrack {
    key_frames: VertexKeyFrames,
    target_mode: VertexTargetMode,
}

impl VertexAnimationTrack {
    #[must_use]
    pub fn new(handle: u16, animation_type: VertexAnimationType) -> Self {
        let key_frames = match animation_type {
            VertexAnimationType::Morph => VertexKeyFrames::Morph(KeyFrameTrack::new(handle)),
            VertexAnimationType::Pose => VertexKeyFrames::Pose(KeyFrameTrack::new(handle)),
        };
        Self {
            key_frames,
            target_mode: VertexTargetMode::default(),
        }
    }

    #[must_use]
    pub fn animation_type(&self) -> VertexAnimationType {
        match self.key_frames {
            VertexKeyFrames::Morph(_) => VertexAnimationType::Morph,
            VertexKeyFrames::Pose(_) => VertexAnimationType::Pose,
        }
    }

    #[must_use]
    pub fn target_mode(&self) -> VertexTargetMode {
        self.target_mode
    }

    pub fn set_target_mode(&mut self, mode: VertexTargetMode) {
        self.target_mode = mode;
    }

    fn type_mismatch(handle: u16, held: VertexAnimationType, wanted: VertexAnimationType) -> ArmatureError {
        ArmatureError::invalid_parameter(format!(
            "vertex track {handle} holds {held:?} keyframes, cannot add {wanted:?} keyframes"
        ))
    }

    pub fn create_morph_key_frame(&mut self, time: f32) -> Result<&mut VertexMorphKeyFrame> {
        let handle = self.handle();
        match &mut self.key_frames {
            VertexKeyFrames::Morph(track) => Ok(track.create(time)),
            VertexKeyFrames::Pose(_) => Err(Self::type_mismatch(
                handle,
                VertexAnimationType::Pose,
                VertexAnimationType::Morph,
            )),
        }
    }

    pub fn create_pose_key_frame(&mut self, time: f32) -> Result<&mut VertexPoseKeyFrame> {
        let handle = self.handle();
        match &mut self.key_frames {
            VertexKeyFrames::Pose(track) => Ok(track.create(time)),
            VertexKeyFrames::Morph(_) => Err(Self::type_mismatch(
                handle,
                VertexAnimationType::Morph,
                VertexAnimationType::Pose,
            )),
        }
    }

    /// Morph keyframes, or an empty slice on a pose track.
    #[must_use]
    pub fn morph_key_frames(&self) -> &[VertexMorphKeyFrame] {
        match &self.key_frames {
            VertexKeyFrames::Morph(track) => track.key_frames(),
            VertexKeyFrames::Pose(_) => &[],
        }
    }

    /// Pose keyframes, or an empty slice on a morph track.
    #[must_use]
    pub fn pose_key_frames(&self) -> &[VertexPoseKeyFrame] {
        match &self.key_frames {
            VertexKeyFrames::Pose(track) => track.key_frames(),
            VertexKeyFrames::Morph(_) => &[],
        }
    }

    pub fn morph_key_frame_mut(&mut self, index: usize) -> Result<&mut VertexMorphKeyFrame> {
        let handle = self.handle();
        match &mut self.key_frames {
            VertexKeyFrames::Morph(track) => track.get_mut(index),
            VertexKeyFrames::Pose(_) => Err(Self::type_mismatch(
                handle,
                VertexAnimationType::Pose,
                VertexAnimationType::Morph,
            )),
        }
    }

    pub fn pose_key_frame_mut(&mut self, index: usize) -> Result<&mut VertexPoseKeyFrame> {
        let handle = self.handle();
        match &mut self.key_frames {
            VertexKeyFrames::Pose(track) => track.get_mut(index),
            VertexKeyFrames::Morph(_) => Err(Self::type_mismatch(
                handle,
                VertexAnimationType::Morph,
                VertexAnimationType::Pose,
            )),
        }
    }

    /// Interpolated pose references at `time_index`.
    ///
    /// Poses referenced by only one of the bracketing keyframes blend from or
    /// to zero influence. Returns `None` for morph tracks.
    #[must_use]
    pub fn interpolated_pose_key_frame(&self, time_index: &TimeIndex) -> Option<VertexPoseKeyFrame> {
        let VertexKeyFrames::Pose(track) = &self.key_frames else {
            return None;
        };
        let mut result = VertexPoseKeyFrame::at_time(time_index.time_pos());
        let Some(span) = track.key_frames_at_time(time_index) else {
            return Some(result);
        };
        let k1 = &track.key_frames()[span.first];
        let k2 = &track.key_frames()[span.second];
        let t = span.t;

        for start in k1.pose_references() {
            let end = k2.influence_of(start.pose_index).unwrap_or(0.0);
            result.add_pose_reference(start.pose_index, start.influence + t * (end - start.influence));
        }
        for end in k2.pose_references() {
            if k1.influence_of(end.pose_index).is_none() {
                result.add_pose_reference(end.pose_index, t * end.influence);
            }
        }
        Some(result)
    }

    /// Applies the track at `time_index` to `target`.
    ///
    /// Morph tracks replace positions with the interpolated snapshot and ignore
    /// `weight`. Pose tracks add each referenced pose scaled by its
    /// interpolated influence times `weight`.
    pub fn apply_to_vertex_data(
        &self,
        target: &mut VertexAnimationTarget<'_>,
        time_index: &TimeIndex,
        weight: f32,
        poses: &[Pose],
    ) -> Result<()> {
        match &self.key_frames {
            VertexKeyFrames::Morph(track) => {
                let Some(span) = track.key_frames_at_time(time_index) else {
                    return Ok(());
                };
                let buffer_of = |index: usize| {
                    let kf = &track.key_frames()[index];
                    kf.buffer.clone().ok_or_else(|| {
                        ArmatureError::invalid_state(format!(
                            "morph key frame at {} on track {} has no vertex buffer",
                            kf.time(),
                            track.handle()
                        ))
                    })
                };
                let from = buffer_of(span.first)?;
                let to = buffer_of(span.second)?;
                match self.target_mode {
                    VertexTargetMode::Software => {
                        let dst = self.software_target(target)?;
                        software_vertex_morph(span.t, &from, &to, dst)
                    }
                    VertexTargetMode::Hardware => {
                        let out = self.hardware_target(target)?;
                        out.morph = Some(HardwareMorph { from, to, t: span.t });
                        Ok(())
                    }
                }
            }
            VertexKeyFrames::Pose(track) => {
                if track.is_empty() {
                    return Ok(());
                }
                let Some(frame) = self.interpolated_pose_key_frame(time_index) else {
                    return Ok(());
                };
                for pose_ref in frame.pose_references() {
                    let pose = poses.get(usize::from(pose_ref.pose_index)).ok_or(
                        ArmatureError::IndexOutOfBounds {
                            context: "pose",
                            index: usize::from(pose_ref.pose_index),
                        },
                    )?;
                    let influence = pose_ref.influence * weight;
                    match self.target_mode {
                        VertexTargetMode::Software => {
                            let dst = self.software_target(target)?;
                            software_vertex_pose_blend(influence, pose.vertex_offsets(), pose.normals(), dst)?;
                        }
                        VertexTargetMode::Hardware => {
                            self.hardware_target(target)?.bind_pose(pose_ref.pose_index, influence);
                        }
                    }
                }
                Ok(())
            }
        }
    }

    fn software_target<'t, 'a>(&self, target: &'t mut VertexAnimationTarget<'a>) -> Result<&'t mut VertexBufferMut<'a>> {
        target.software.as_mut().ok_or_else(|| {
            ArmatureError::invalid_parameter(format!(
                "vertex track {} targets software blending but no vertex buffer was supplied",
                self.handle()
            ))
        })
    }

    fn hardware_target<'t>(&self, target: &'t mut VertexAnimationTarget<'_>) -> Result<&'t mut HardwareVertexAnimation> {
        target.hardware.as_deref_mut().ok_or_else(|| {
            ArmatureError::invalid_parameter(format!(
                "vertex track {} targets hardware blending but no hardware output was supplied",
                self.handle()
            ))
        })
    }

    /// Subtracts `base` influences from every pose keyframe. No-op on morph tracks.
    pub fn rebase(&mut self, base: &VertexPoseKeyFrame) {
        if let VertexKeyFrames::Pose(track) = &mut self.key_frames {
            for kf in track.key_frames_mut() {
                kf.rebase(base);
            }
        }
    }
}

impl AnimationTrack for VertexAnimationTrack {
    fn handle(&self) -> u16 {
        match &self.key_frames {
            VertexKeyFrames::Morph(track) => track.handle(),
            VertexKeyFrames::Pose(track) => track.handle(),
        }
    }

    fn num_key_frames(&self) -> usize {
        match &self.key_frames {
            VertexKeyFrames::Morph(track) => track.len(),
            VertexKeyFrames::Pose(track) => track.len(),
        }
    }

    fn key_frame_time(&self, index: usize) -> Result<f32> {
        match &self.key_frames {
            VertexKeyFrames::Morph(track) => track.get(index).map(KeyFrame::time),
            VertexKeyFrames::Pose(track) => track.get(index).map(KeyFrame::time),
        }
    }

    fn remove_key_frame(&mut self, index: usize) -> Result<()> {
        match &mut self.key_frames {
            VertexKeyFrames::Morph(track) => track.remove(index).map(drop),
            VertexKeyFrames::Pose(track) => track.remove(index).map(drop),
        }
    }

    fn remove_all_key_frames(&mut self) {
        match &mut self.key_frames {
            VertexKeyFrames::Morph(track) => track.clear(),
            VertexKeyFrames::Pose(track) => track.clear(),
        }
    }

    fn collect_key_frame_times(&self, out: &mut Vec<f32>) {
        match &self.key_frames {
            VertexKeyFrames::Morph(track) => out.extend(track.times()),
            VertexKeyFrames::Pose(track) => out.extend(track.times()),
        }
    }

    fn build_key_frame_index_map(&mut self, global_times: &[f32]) {
        match &mut self.key_frames {
            VertexKeyFrames::Morph(track) => track.build_index_map(global_times),
            VertexKeyFrames::Pose(track) => track.build_index_map(global_times),
        }
    }

    fn has_non_zero_key_frames(&self) -> bool {
        match &self.key_frames {
            VertexKeyFrames::Morph(track) => !track.is_empty(),
            VertexKeyFrames::Pose(track) => track
                .key_frames()
                .iter()
                .flat_map(VertexPoseKeyFrame::pose_references)
                .any(|r| r.influence > 0.0),
        }
    }
}
