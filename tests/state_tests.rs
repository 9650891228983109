//! Animation State Tests
//!
//! Tests for:
//! - Looping and clamped time positions
//! - Enabled-state ordering and the dirty frame number
//! - Blend masks
//! - State creation from animation containers, refresh and copying
//! - Sharing a state set between threads

use std::thread;

use armature::animation::{AnimationContainer, AnimationStateSet, MeshAnimations};
use armature::prelude::ArmatureError;

const EPSILON: f32 = 1e-5;

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < EPSILON
}

fn set_with(name: &str, length: f32) -> AnimationStateSet {
    let mut set = AnimationStateSet::new();
    set.create_animation_state(name, 0.0, length, 1.0, false).unwrap();
    set
}

// ============================================================================
// Time Position
// ============================================================================

#[test]
fn looping_wraps_time() {
    let mut set = set_with("walk", 2.0);
    let mut state = set.state_mut("walk").unwrap();
    assert!(state.looping());
    state.add_time(2.5);
    assert!(approx(state.time_position(), 0.5));
    state.add_time(-1.0);
    assert!(approx(state.time_position(), 1.5));
    state.set_time_position(2.0);
    assert!(approx(state.time_position(), 0.0));
}

#[test]
fn non_looping_clamps_and_ends() {
    let mut set = set_with("die", 1.0);
    let mut state = set.state_mut("die").unwrap();
    state.set_loop(false);
    state.add_time(3.0);
    assert!(approx(state.time_position(), 1.0));
    assert!(state.has_ended());
    state.set_time_position(-1.0);
    assert!(approx(state.time_position(), 0.0));
    assert!(!state.has_ended());
}

#[test]
fn zero_length_pins_time() {
    let mut set = set_with("pose", 0.0);
    let mut state = set.state_mut("pose").unwrap();
    state.add_time(0.3);
    assert_eq!(state.time_position(), 0.0);
}

// ============================================================================
// Enabled States & Dirty Tracking
// ============================================================================

#[test]
fn enabled_states_keep_enable_order() {
    let mut set = AnimationStateSet::new();
    for name in ["a", "b", "c"] {
        set.create_animation_state(name, 0.0, 1.0, 1.0, false).unwrap();
    }
    set.state_mut("c").unwrap().set_enabled(true);
    set.state_mut("a").unwrap().set_enabled(true);
    let names: Vec<_> = set.enabled_states().map(|s| s.animation_name().to_owned()).collect();
    assert_eq!(names, ["c", "a"]);

    set.state_mut("c").unwrap().set_enabled(false);
    set.state_mut("c").unwrap().set_enabled(true);
    let names: Vec<_> = set.enabled_states().map(|s| s.animation_name().to_owned()).collect();
    assert_eq!(names, ["a", "c"]);
    assert!(set.has_enabled_animation_state());
}

#[test]
fn created_enabled_state_is_listed() {
    let mut set = AnimationStateSet::new();
    set.create_animation_state("run", 0.0, 1.0, 1.0, true).unwrap();
    assert_eq!(set.enabled_states().count(), 1);
}

#[test]
fn disabled_changes_do_not_dirty() {
    let mut set = set_with("idle", 1.0);
    let before = set.dirty_frame_number();
    set.state_mut("idle").unwrap().add_time(0.5);
    set.state_mut("idle").unwrap().set_weight(0.3);
    assert_eq!(set.dirty_frame_number(), before);

    set.state_mut("idle").unwrap().set_enabled(true);
    let enabled = set.dirty_frame_number();
    assert!(enabled > before);
    set.state_mut("idle").unwrap().add_time(0.1);
    assert!(set.dirty_frame_number() > enabled);
}

#[test]
fn duplicate_and_missing_states() {
    let mut set = set_with("idle", 1.0);
    assert!(matches!(
        set.create_animation_state("idle", 0.0, 1.0, 1.0, false),
        Err(ArmatureError::Duplicate { .. })
    ));
    assert!(matches!(set.animation_state("run"), Err(ArmatureError::NotFound { .. })));
    assert!(set.remove_animation_state("idle").is_some());
    assert!(set.is_empty());
}

// ============================================================================
// Blend Masks
// ============================================================================

#[test]
fn blend_mask_entries() {
    let mut set = set_with("wave", 1.0);
    assert!(approx(set.animation_state("wave").unwrap().blend_mask_entry(7).unwrap(), 1.0));

    let mut state = set.state_mut("wave").unwrap();
    state.create_blend_mask(3, 0.0);
    state.set_blend_mask_entry(1, 0.75).unwrap();
    assert_eq!(state.blend_mask().unwrap(), &[0.0, 0.75, 0.0]);
    assert!(state.set_blend_mask_entry(3, 1.0).is_err());
    assert!(state.set_blend_mask_data(&[1.0, 1.0]).is_err());
    state.set_blend_mask_data(&[1.0, 0.5, 0.25]).unwrap();
    assert!(approx(state.blend_mask_entry(2).unwrap(), 0.25));
    state.destroy_blend_mask();
    assert!(!state.has_blend_mask());
}

// ============================================================================
// Containers, Refresh & Copy
// ============================================================================

#[test]
fn refresh_adds_and_clamps() {
    let mut mesh = MeshAnimations::new();
    mesh.create_animation("open", 2.0).unwrap();
    let mut set = AnimationStateSet::new();
    mesh.init_animation_state(&mut set).unwrap();
    {
        let mut state = set.state_mut("open").unwrap();
        state.set_loop(false);
        state.set_time_position(1.5);
    }

    mesh.remove_animation("open").unwrap();
    mesh.create_animation("open", 1.0).unwrap();
    mesh.create_animation("close", 1.0).unwrap();
    mesh.refresh_animation_state(&mut set).unwrap();

    assert_eq!(set.len(), 2);
    let open = set.animation_state("open").unwrap();
    assert!(approx(open.length(), 1.0));
    assert!(approx(open.time_position(), 1.0));
    assert!(!set.animation_state("close").unwrap().enabled());
}

#[test]
fn copy_matching_state_mirrors_source() {
    let mut source = AnimationStateSet::new();
    source.create_animation_state("a", 0.25, 1.0, 0.5, true).unwrap();
    source.create_animation_state("b", 0.0, 1.0, 1.0, false).unwrap();

    let mut target = AnimationStateSet::new();
    target.create_animation_state("a", 0.0, 1.0, 1.0, false).unwrap();
    source.copy_matching_state(&mut target).unwrap();

    assert_eq!(target.animation_state("a").unwrap(), source.animation_state("a").unwrap());
    assert_eq!(target.enabled_states().count(), 1);
    assert_eq!(target.dirty_frame_number(), source.dirty_frame_number());

    target.create_animation_state("c", 0.0, 1.0, 1.0, false).unwrap();
    assert!(source.copy_matching_state(&mut target).is_err());
}

// ============================================================================
// Sharing
// ============================================================================

#[test]
fn shared_set_advances_from_worker() {
    let shared = set_with("walk", 4.0).into_shared();
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let shared = shared.clone();
            thread::spawn(move || {
                shared.lock().state_mut("walk").unwrap().add_time(0.5);
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert!(approx(shared.lock().animation_state("walk").unwrap().time_position(), 2.0));
}
