//! Sparse per-bone keyframe storage
//!
//! A [`KeyframeTrack`] maps integer frame numbers to the bone's basis matrix
//! at that frame. Keys are kept sorted by the container itself, so every
//! consumer sees frames in ascending order regardless of insertion order.

use std::collections::BTreeMap;
use std::collections::btree_map;

use crate::matrix::Matrix4f;

/// Animation frame number
pub type Frame = i32;

/// Ordered mapping from frame number to basis matrix for one bone
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyframeTrack {
    keys: BTreeMap<Frame, Matrix4f>,
}

impl KeyframeTrack {
    /// Create an empty track
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the basis at `frame`, returning the matrix it replaced
    pub fn insert(&mut self, frame: Frame, basis: Matrix4f) -> Option<Matrix4f> {
        self.keys.insert(frame, basis)
    }

    /// Basis stored at exactly `frame`
    pub fn get(&self, frame: Frame) -> Option<&Matrix4f> {
        self.keys.get(&frame)
    }

    /// Basis held at `frame`: the greatest key at or before it, or the first
    /// key when `frame` precedes the whole track
    pub fn sample_held(&self, frame: Frame) -> Option<&Matrix4f> {
        self.keys
            .range(..=frame)
            .next_back()
            .map(|(_, basis)| basis)
            .or_else(|| self.keys.values().next())
    }

    /// Keyed frames in ascending order
    pub fn frames(&self) -> impl DoubleEndedIterator<Item = Frame> + ExactSizeIterator + '_ {
        self.keys.keys().copied()
    }

    /// `(frame, basis)` pairs in ascending frame order
    pub fn iter(&self) -> btree_map::Iter<'_, Frame, Matrix4f> {
        self.keys.iter()
    }

    /// First keyed frame
    pub fn first_frame(&self) -> Option<Frame> {
        self.keys.keys().next().copied()
    }

    /// Last keyed frame
    pub fn last_frame(&self) -> Option<Frame> {
        self.keys.keys().next_back().copied()
    }

    /// Number of keys
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the track has no keys
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl FromIterator<(Frame, Matrix4f)> for KeyframeTrack {
    fn from_iter<I: IntoIterator<Item = (Frame, Matrix4f)>>(iter: I) -> Self {
        Self {
            keys: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a KeyframeTrack {
    type Item = (&'a Frame, &'a Matrix4f);
    type IntoIter = btree_map::Iter<'a, Frame, Matrix4f>;

    fn into_iter(self) -> Self::IntoIter {
        self.keys.iter()
    }
}

/// A named animation: one keyframe track per animated bone
///
/// Bones without a track are static for the whole animation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Action {
    name: String,
    tracks: BTreeMap<String, KeyframeTrack>,
}

impl Action {
    /// Create an action with no tracks
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tracks: BTreeMap::new(),
        }
    }

    /// Add or replace the track for `bone`
    pub fn with_track(mut self, bone: impl Into<String>, track: KeyframeTrack) -> Self {
        self.insert_track(bone, track);
        self
    }

    /// Add or replace the track for `bone`, returning the previous one
    pub fn insert_track(
        &mut self,
        bone: impl Into<String>,
        track: KeyframeTrack,
    ) -> Option<KeyframeTrack> {
        self.tracks.insert(bone.into(), track)
    }

    /// Action name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Track for `bone`
    pub fn track(&self, bone: &str) -> Option<&KeyframeTrack> {
        self.tracks.get(bone)
    }

    /// `(bone, track)` pairs ordered by bone name
    pub fn tracks(&self) -> btree_map::Iter<'_, String, KeyframeTrack> {
        self.tracks.iter()
    }

    /// Number of animated bones
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    /// Whether no bone is animated
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Smallest and largest keyed frame across all tracks
    pub fn frame_span(&self) -> Option<(Frame, Frame)> {
        self.frame_span_where(|_| true)
    }

    /// Smallest and largest keyed frame across the tracks of bones accepted
    /// by `include`
    pub fn frame_span_where(
        &self,
        mut include: impl FnMut(&str) -> bool,
    ) -> Option<(Frame, Frame)> {
        self.tracks
            .iter()
            .filter(|(bone, _)| include(bone.as_str()))
            .filter_map(|(_, track)| Some((track.first_frame()?, track.last_frame()?)))
            .reduce(|(first, last), (start, end)| (first.min(start), last.max(end)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn translation(x: f32) -> Matrix4f {
        Matrix4f::from_translation(x, 0.0, 0.0)
    }

    #[test]
    fn test_frames_ascending_regardless_of_insertion_order() {
        let mut track = KeyframeTrack::new();
        track.insert(3, translation(3.0));
        track.insert(1, translation(1.0));
        track.insert(2, translation(2.0));

        assert_eq!(track.frames().collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(track.first_frame(), Some(1));
        assert_eq!(track.last_frame(), Some(3));
    }

    #[test]
    fn test_insert_replaces_existing_key() {
        let mut track = KeyframeTrack::new();
        assert!(track.insert(1, translation(1.0)).is_none());
        assert_eq!(track.insert(1, translation(5.0)), Some(translation(1.0)));
        assert_eq!(track.len(), 1);
        assert_eq!(track.get(1), Some(&translation(5.0)));
    }

    #[test_case(0, 2.0 ; "before first key holds first key")]
    #[test_case(2, 2.0 ; "exact key")]
    #[test_case(3, 2.0 ; "between keys holds previous")]
    #[test_case(4, 4.0 ; "second key")]
    #[test_case(10, 4.0 ; "after last key holds last")]
    fn test_sample_held(frame: Frame, expected_x: f32) {
        let track: KeyframeTrack = [(2, translation(2.0)), (4, translation(4.0))]
            .into_iter()
            .collect();
        assert_eq!(track.sample_held(frame), Some(&translation(expected_x)));
    }

    #[test]
    fn test_sample_held_empty() {
        assert!(KeyframeTrack::new().sample_held(1).is_none());
    }

    #[test]
    fn test_action_frame_span() {
        let action = Action::new("ArmatureAction")
            .with_track("Bone", [(1, translation(0.0)), (3, translation(0.0))].into_iter().collect())
            .with_track("Bone.001", [(2, translation(0.0)), (5, translation(0.0))].into_iter().collect());

        assert_eq!(action.frame_span(), Some((1, 5)));
        assert_eq!(action.frame_span_where(|bone| bone == "Bone"), Some((1, 3)));
        assert_eq!(action.frame_span_where(|_| false), None);
        assert_eq!(action.len(), 2);
        let bones: Vec<&str> = action.tracks().map(|(name, _)| name.as_str()).collect();
        assert_eq!(bones, vec!["Bone", "Bone.001"]);
    }
}
