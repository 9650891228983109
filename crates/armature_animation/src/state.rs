//! Playback state of animations and the set that groups them.
//!
//! States are owned by an [`AnimationStateSet`]. Reads go through
//! [`AnimationState`]; changes go through the [`AnimationStateMut`] guard
//! returned by [`AnimationStateSet::state_mut`], which keeps the set's
//! enabled-state list and dirty frame counter in step with every edit.

use std::collections::BTreeMap;
use std::ops::Deref;
use std::sync::Arc;

use parking_lot::Mutex;

use armature_core::errors::{ArmatureError, Result};

/// Time, weight and enablement of one animation on one skeleton or mesh.
#[derive(Debug, Clone)]
pub struct AnimationState {
    animation_name: String,
    time_pos: f32,
    length: f32,
    weight: f32,
    enabled: bool,
    looping: bool,
    blend_mask: Option<Vec<f32>>,
}

impl AnimationState {
    /// New states loop; `time_pos` is wrapped into `[0, length)` like any
    /// later time change.
    fn new(animation_name: &str, time_pos: f32, length: f32, weight: f32, enabled: bool) -> Self {
        let mut state = Self {
            animation_name: animation_name.to_owned(),
            time_pos: 0.0,
            length,
            weight,
            enabled,
            looping: true,
            blend_mask: None,
        };
        state.time_pos = state.wrapped_time(time_pos);
        state
    }

    #[inline]
    #[must_use]
    pub fn animation_name(&self) -> &str {
        &self.animation_name
    }

    #[inline]
    #[must_use]
    pub fn time_position(&self) -> f32 {
        self.time_pos
    }

    #[inline]
    #[must_use]
    pub fn length(&self) -> f32 {
        self.length
    }

    #[inline]
    #[must_use]
    pub fn weight(&self) -> f32 {
        self.weight
    }

    #[inline]
    #[must_use]
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    #[inline]
    #[must_use]
    pub fn looping(&self) -> bool {
        self.looping
    }

    /// Whether a non-looping state has reached its end.
    #[must_use]
    pub fn has_ended(&self) -> bool {
        self.time_pos >= self.length && !self.looping
    }

    /// Per-bone weights, indexed by bone handle.
    #[must_use]
    pub fn blend_mask(&self) -> Option<&[f32]> {
        self.blend_mask.as_deref()
    }

    #[must_use]
    pub fn has_blend_mask(&self) -> bool {
        self.blend_mask.is_some()
    }

    /// Mask entry for `bone`; 1.0 without a mask.
    pub fn blend_mask_entry(&self, bone: u16) -> Result<f32> {
        match &self.blend_mask {
            None => Ok(1.0),
            Some(mask) => mask.get(usize::from(bone)).copied().ok_or(ArmatureError::IndexOutOfBounds {
                context: "blend mask entry",
                index: usize::from(bone),
            }),
        }
    }

    fn wrapped_time(&self, time: f32) -> f32 {
        if self.length <= 0.0 {
            return 0.0;
        }
        if self.looping {
            let wrapped = time % self.length;
            if wrapped < 0.0 { wrapped + self.length } else { wrapped }
        } else {
            time.clamp(0.0, self.length)
        }
    }
}

impl PartialEq for AnimationState {
    fn eq(&self, other: &Self) -> bool {
        self.animation_name == other.animation_name
            && self.enabled == other.enabled
            && self.time_pos == other.time_pos
            && self.weight == other.weight
            && self.looping == other.looping
    }
}

/// Mutable access to one state inside its set.
pub struct AnimationStateMut<'a> {
    state: &'a mut AnimationState,
    enabled_list: &'a mut Vec<String>,
    dirty_frame_number: &'a mut u64,
}

impl Deref for AnimationStateMut<'_> {
    type Target = AnimationState;

    fn deref(&self) -> &AnimationState {
        self.state
    }
}

impl AnimationStateMut<'_> {
    fn notify_dirty_if_enabled(&mut self) {
        if self.state.enabled {
            *self.dirty_frame_number += 1;
        }
    }

    /// Moves to `time`, wrapping when looping and clamping to `[0, length]`
    /// otherwise.
    pub fn set_time_position(&mut self, time: f32) {
        if time != self.state.time_pos {
            self.state.time_pos = self.state.wrapped_time(time);
            self.notify_dirty_if_enabled();
        }
    }

    pub fn add_time(&mut self, offset: f32) {
        let time = self.state.time_pos + offset;
        self.set_time_position(time);
    }

    /// Changes the length without moving the time position.
    pub fn set_length(&mut self, length: f32) {
        self.state.length = length;
    }

    pub fn set_weight(&mut self, weight: f32) {
        self.state.weight = weight;
        self.notify_dirty_if_enabled();
    }

    pub fn set_loop(&mut self, looping: bool) {
        self.state.looping = looping;
    }

    /// Enables or disables the state, keeping the set's enabled list ordered
    /// by the time each state was last enabled.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.state.enabled = enabled;
        let name = &self.state.animation_name;
        self.enabled_list.retain(|n| n != name);
        if enabled {
            self.enabled_list.push(name.clone());
        }
        *self.dirty_frame_number += 1;
    }

    /// Creates a mask of `size` entries set to `initial_weight`. An existing
    /// mask is kept.
    pub fn create_blend_mask(&mut self, size: usize, initial_weight: f32) {
        if self.state.blend_mask.is_none() {
            self.state.blend_mask = Some(vec![initial_weight; size]);
        }
    }

    pub fn destroy_blend_mask(&mut self) {
        self.state.blend_mask = None;
    }

    pub fn set_blend_mask_entry(&mut self, bone: u16, weight: f32) -> Result<()> {
        let index = usize::from(bone);
        let entry = self
            .state
            .blend_mask
            .as_mut()
            .and_then(|mask| mask.get_mut(index))
            .ok_or(ArmatureError::IndexOutOfBounds {
                context: "blend mask entry",
                index,
            })?;
        *entry = weight;
        self.notify_dirty_if_enabled();
        Ok(())
    }

    /// Replaces the whole mask, creating it if absent.
    pub fn set_blend_mask_data(&mut self, data: &[f32]) -> Result<()> {
        match &mut self.state.blend_mask {
            Some(mask) if mask.len() != data.len() => {
                return Err(ArmatureError::invalid_parameter(format!(
                    "blend mask has {} entries, got {}",
                    mask.len(),
                    data.len()
                )));
            }
            Some(mask) => mask.copy_from_slice(data),
            None => self.state.blend_mask = Some(data.to_vec()),
        }
        self.notify_dirty_if_enabled();
        Ok(())
    }

    /// Copies time, length, weight, enablement and looping from `other`.
    pub fn copy_state_from(&mut self, other: &AnimationState) {
        self.state.time_pos = other.time_pos;
        self.state.length = other.length;
        self.state.weight = other.weight;
        self.state.looping = other.looping;
        if self.state.enabled != other.enabled {
            self.set_enabled(other.enabled);
        }
        *self.dirty_frame_number += 1;
    }
}

/// All animation states of one animated object.
///
/// Enabled states are tracked in enable order; the dirty frame number
/// increments whenever a change could affect the blended result.
#[derive(Debug, Clone, Default)]
pub struct AnimationStateSet {
    states: BTreeMap<String, AnimationState>,
    enabled: Vec<String>,
    dirty_frame_number: u64,
}

/// A state set behind a lock, for sharing between threads.
pub type SharedAnimationStateSet = Arc<Mutex<AnimationStateSet>>;

impl AnimationStateSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn into_shared(self) -> SharedAnimationStateSet {
        Arc::new(Mutex::new(self))
    }

    pub fn create_animation_state(
        &mut self,
        animation_name: &str,
        time_pos: f32,
        length: f32,
        weight: f32,
        enabled: bool,
    ) -> Result<AnimationStateMut<'_>> {
        if self.states.contains_key(animation_name) {
            return Err(ArmatureError::duplicate("animation state", animation_name));
        }
        let state = AnimationState::new(animation_name, time_pos, length, weight, enabled);
        self.states.insert(animation_name.to_owned(), state);
        if enabled {
            self.enabled.push(animation_name.to_owned());
        }
        self.dirty_frame_number += 1;
        self.state_mut(animation_name)
    }

    /// Creates a disabled state if missing; otherwise updates the length and
    /// clamps the time position to it.
    pub fn refresh_animation_state(&mut self, animation_name: &str, length: f32) -> Result<()> {
        if self.has_animation_state(animation_name) {
            let mut state = self.state_mut(animation_name)?;
            state.set_length(length);
            let clamped = state.time_position().min(length);
            state.set_time_position(clamped);
        } else {
            self.create_animation_state(animation_name, 0.0, length, 1.0, false)?;
        }
        Ok(())
    }

    pub fn animation_state(&self, animation_name: &str) -> Result<&AnimationState> {
        self.states
            .get(animation_name)
            .ok_or_else(|| ArmatureError::not_found("animation state", animation_name))
    }

    pub fn state_mut(&mut self, animation_name: &str) -> Result<AnimationStateMut<'_>> {
        let state = self
            .states
            .get_mut(animation_name)
            .ok_or_else(|| ArmatureError::not_found("animation state", animation_name))?;
        Ok(AnimationStateMut {
            state,
            enabled_list: &mut self.enabled,
            dirty_frame_number: &mut self.dirty_frame_number,
        })
    }

    #[must_use]
    pub fn has_animation_state(&self, animation_name: &str) -> bool {
        self.states.contains_key(animation_name)
    }

    pub fn remove_animation_state(&mut self, animation_name: &str) -> Option<AnimationState> {
        let removed = self.states.remove(animation_name)?;
        self.enabled.retain(|n| n != animation_name);
        self.dirty_frame_number += 1;
        Some(removed)
    }

    pub fn remove_all_animation_states(&mut self) {
        self.states.clear();
        self.enabled.clear();
        self.dirty_frame_number += 1;
    }

    /// All states in animation-name order.
    pub fn states(&self) -> impl Iterator<Item = &AnimationState> {
        self.states.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Enabled states, in the order they were enabled.
    pub fn enabled_states(&self) -> impl Iterator<Item = &AnimationState> {
        self.enabled.iter().filter_map(|name| self.states.get(name))
    }

    #[must_use]
    pub fn has_enabled_animation_state(&self) -> bool {
        !self.enabled.is_empty()
    }

    #[must_use]
    pub fn dirty_frame_number(&self) -> u64 {
        self.dirty_frame_number
    }

    pub fn notify_dirty(&mut self) {
        self.dirty_frame_number += 1;
    }

    /// Copies every state of `target` from the same-named state here, and
    /// replaces `target`'s enabled order and dirty frame number with ours.
    pub fn copy_matching_state(&self, target: &mut AnimationStateSet) -> Result<()> {
        for (name, theirs) in &mut target.states {
            let ours = self
                .states
                .get(name)
                .ok_or_else(|| ArmatureError::not_found("animation state", name))?;
            theirs.time_pos = ours.time_pos;
            theirs.length = ours.length;
            theirs.weight = ours.weight;
            theirs.enabled = ours.enabled;
            theirs.looping = ours.looping;
        }
        target.enabled = self
            .enabled
            .iter()
            .filter(|name| target.states.contains_key(*name))
            .cloned()
            .collect();
        target.dirty_frame_number = self.dirty_frame_number;
        Ok(())
    }
}
