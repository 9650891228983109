//! Time positions with an optional precomputed global keyframe index.
//!
//! An [`Animation`](crate::Animation) keeps the sorted, de-duplicated union of
//! all its tracks' keyframe times. Looking a time up in that list once yields a
//! global index that every track maps to its own keyframe list in O(1).

/// A time position, optionally carrying its lower-bound index into the owning
/// animation's global keyframe time list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeIndex {
    time_pos: f32,
    key_index: Option<usize>,
}

impl TimeIndex {
    /// A time without a global index; tracks fall back to binary search.
    #[must_use]
    pub fn new(time_pos: f32) -> Self {
        Self {
            time_pos,
            key_index: None,
        }
    }

    #[must_use]
    pub fn with_key_index(time_pos: f32, key_index: usize) -> Self {
        Self {
            time_pos,
            key_index: Some(key_index),
        }
    }

    #[inline]
    #[must_use]
    pub fn time_pos(&self) -> f32 {
        self.time_pos
    }

    #[inline]
    #[must_use]
    pub fn key_index(&self) -> Option<usize> {
        self.key_index
    }
}

/// Merges keyframe times into a sorted list without duplicates.
pub(crate) fn merge_key_frame_times(global: &mut Vec<f32>, times: impl IntoIterator<Item = f32>) {
    for time in times {
        let at = global.partition_point(|&t| t < time);
        if global.get(at) != Some(&time) {
            global.insert(at, time);
        }
    }
}

/// Index of the first entry not less than `time`.
#[inline]
pub(crate) fn lower_bound(times: &[f32], time: f32) -> usize {
    times.partition_point(|&t| t < time)
}

/// For each global index `j` (plus one past the end), the local lower bound of
/// `global[j]` in `local`.
pub(crate) fn build_index_map(local: &[f32], global: &[f32]) -> Vec<usize> {
    let mut map = Vec::with_capacity(global.len() + 1);
    let mut i = 0;
    for &time in global {
        while i < local.len() && local[i] < time {
            i += 1;
        }
        map.push(i);
    }
    map.push(local.len());
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merged_times_are_sorted_and_unique() {
        let mut global = Vec::new();
        merge_key_frame_times(&mut global, [0.0, 1.0, 2.0]);
        merge_key_frame_times(&mut global, [0.5, 1.0, 3.0]);
        assert_eq!(global, vec![0.0, 0.5, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn index_map_matches_local_lower_bound() {
        let local = [0.0, 2.0];
        let global = [0.0, 1.0, 2.0, 3.0];
        let map = build_index_map(&local, &global);
        assert_eq!(map, vec![0, 1, 1, 2, 2]);

        for time in [0.0, 0.3, 1.0, 1.7, 2.0, 2.5, 3.5] {
            let j = lower_bound(&global, time);
            assert_eq!(map[j], lower_bound(&local, time), "time {time}");
        }
    }
}
