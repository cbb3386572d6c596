//! Bind-pose resolution
//!
//! Computes, for every bone of an armature and every frame the bone is
//! animated on, the bone's accumulated world transform:
//!
//! ```text
//! root:   world(B, f) = local(B) * basis(B, f)
//! child:  world(B, f) = world(P, f) * (local_inv(P) * local(B)) * basis(B, f)
//! ```
//!
//! The middle term of the child formula re-expresses the child's bind offset
//! in the parent's bind space. It matches the exporter that bakes the inverse
//! matrices and must be kept in exactly this composition order.
//!
//! Bones without keyframes do not move: every frame of their synthesized
//! range maps to their rest local matrix.
//!
//! Bones are resolved top-down in hierarchy order and every world matrix is
//! cached per `(bone, frame)`, so a parent frame is computed once no matter
//! how many children ask for it. A child may ask for a frame its parent has
//! no key for; the parent then holds its nearest earlier key. A static parent
//! contributes an identity basis to its animated children.

use std::collections::BTreeMap;
use std::collections::btree_map;

use crate::armature::Armature;
use crate::error::{BindPoseError, Result};
use crate::keyframes::{Action, Frame, KeyframeTrack};
use crate::matrix::Matrix4f;

/// Options controlling bind-pose resolution
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Half-open `[start, end)` range synthesized for bones without keyframes
    ///
    /// When `None`, the range spans the keyed frames of the armature's bones
    /// (`first ..= last`), so static bones line up with animated ones.
    pub frame_range: Option<(Frame, Frame)>,
}

impl ResolveOptions {
    /// Use an explicit `[start, end)` range for static bones
    pub fn with_frame_range(start: Frame, end: Frame) -> Self {
        Self {
            frame_range: Some((start, end)),
        }
    }

    /// The `[start, end)` range for static bones of `armature` under `action`
    ///
    /// Tracks for bones the armature does not have are left out of the
    /// default span.
    pub fn static_range(&self, armature: &Armature, action: &Action) -> Result<(Frame, Frame)> {
        match self.frame_range {
            Some((start, end)) if start > end => {
                Err(BindPoseError::InvalidFrameRange { start, end })
            }
            Some(range) => Ok(range),
            None => match action.frame_span_where(|bone| armature.contains(bone)) {
                Some((first, last)) => {
                    let end = last
                        .checked_add(1)
                        .ok_or(BindPoseError::InvalidFrameRange { start: first, end: last })?;
                    Ok((first, end))
                }
                None => Ok((0, 0)),
            },
        }
    }
}

/// Resolved world-space matrices per bone and frame
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BindPoseTable {
    bones: BTreeMap<String, BTreeMap<Frame, Matrix4f>>,
}

impl BindPoseTable {
    /// World matrix of `bone` at `frame`
    pub fn get(&self, bone: &str, frame: Frame) -> Option<&Matrix4f> {
        self.bones.get(bone).and_then(|frames| frames.get(&frame))
    }

    /// All resolved frames of `bone`, ascending
    pub fn frames(&self, bone: &str) -> Option<&BTreeMap<Frame, Matrix4f>> {
        self.bones.get(bone)
    }

    /// Number of resolved frames for `bone` (0 when absent)
    pub fn frame_count(&self, bone: &str) -> usize {
        self.bones.get(bone).map_or(0, BTreeMap::len)
    }

    /// Bone names, sorted
    pub fn bones(&self) -> impl Iterator<Item = &str> + '_ {
        self.bones.keys().map(String::as_str)
    }

    /// `(bone, frames)` pairs sorted by bone name
    pub fn iter(&self) -> btree_map::Iter<'_, String, BTreeMap<Frame, Matrix4f>> {
        self.bones.iter()
    }

    /// Number of bones
    pub fn len(&self) -> usize {
        self.bones.len()
    }

    /// Whether the table has no bones
    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }
}

/// Per-bone data prepared once before resolution
#[derive(Debug)]
struct PreparedBone<'a> {
    parent: Option<usize>,
    rest: Matrix4f,
    /// `local(B)` for roots, `local_inv(P) * local(B)` for children
    offset: Matrix4f,
    /// `None` for static bones
    track: Option<&'a KeyframeTrack>,
}

impl PreparedBone<'_> {
    fn basis(&self, frame: Frame) -> Matrix4f {
        match self.track {
            Some(track) => track
                .get(frame)
                .or_else(|| track.sample_held(frame))
                .copied()
                .unwrap_or(Matrix4f::IDENTITY),
            None => Matrix4f::IDENTITY,
        }
    }
}

/// Resolves an armature and action into a [`BindPoseTable`]
#[derive(Debug)]
pub struct BindPoseResolver<'a> {
    armature: &'a Armature,
    action: &'a Action,
    options: ResolveOptions,
    prepared: Vec<PreparedBone<'a>>,
}

impl<'a> BindPoseResolver<'a> {
    /// Prepare a resolver
    ///
    /// Tracks naming bones that the armature does not have are ignored.
    pub fn new(armature: &'a Armature, action: &'a Action, options: ResolveOptions) -> Self {
        for (bone, _) in action.tracks() {
            if !armature.contains(bone) {
                log::warn!(
                    "Action '{}' animates bone '{}' which armature '{}' does not have; ignoring",
                    action.name(),
                    bone,
                    armature.name()
                );
            }
        }

        let skeleton = armature.skeleton();
        let prepared = skeleton
            .names()
            .iter()
            .enumerate()
            .filter_map(|(index, name)| {
                let bone = armature.bone(name)?;
                let parent = skeleton.parent(index);
                let offset = match parent
                    .and_then(|p| skeleton.name(p))
                    .and_then(|p| armature.bone(p))
                {
                    Some(parent_bone) => parent_bone
                        .matrix_local_inverted
                        .multiply(&bone.matrix_local),
                    None => bone.matrix_local,
                };
                let track = action.track(name).filter(|track| !track.is_empty());
                Some(PreparedBone {
                    parent,
                    rest: bone.matrix_local,
                    offset,
                    track,
                })
            })
            .collect();

        Self {
            armature,
            action,
            options,
            prepared,
        }
    }

    /// Resolve every bone of the armature
    ///
    /// Either the whole table is produced or an error is returned; no
    /// partially resolved table is ever handed out.
    pub fn resolve(&self) -> Result<BindPoseTable> {
        let (start, end) = self.options.static_range(self.armature, self.action)?;
        let skeleton = self.armature.skeleton();
        let mut cache = vec![BTreeMap::new(); self.prepared.len()];
        let mut table = BindPoseTable::default();

        for (index, bone) in self.prepared.iter().enumerate() {
            let resolved: BTreeMap<Frame, Matrix4f> = match bone.track {
                Some(track) => track
                    .frames()
                    .map(|frame| (frame, self.world_at(index, frame, &mut cache)))
                    .collect(),
                None => (start..end).map(|frame| (frame, bone.rest)).collect(),
            };

            let name = skeleton.name(index).unwrap_or_default();
            log::trace!(
                "Resolved bone '{}' ({}) over {} frames",
                name,
                if bone.track.is_some() { "animated" } else { "static" },
                resolved.len()
            );
            table.bones.insert(name.to_string(), resolved);
        }

        log::debug!(
            "Resolved armature '{}' with action '{}': {} bones, static range [{}, {})",
            self.armature.name(),
            self.action.name(),
            table.len(),
            start,
            end
        );

        Ok(table)
    }

    /// World matrix of a single bone at a single frame
    ///
    /// Evaluates the parent chain for exactly this frame, whether or not the
    /// bone is keyed there. Static bones return their rest local matrix.
    pub fn world(&self, bone: &str, frame: Frame) -> Option<Matrix4f> {
        let index = self.armature.skeleton().index_of(bone)?;
        let prepared = self.prepared.get(index)?;
        if prepared.track.is_none() {
            return Some(prepared.rest);
        }
        let mut cache = vec![BTreeMap::new(); self.prepared.len()];
        Some(self.world_at(index, frame, &mut cache))
    }

    fn world_at(
        &self,
        index: usize,
        frame: Frame,
        cache: &mut [BTreeMap<Frame, Matrix4f>],
    ) -> Matrix4f {
        if let Some(world) = cache[index].get(&frame) {
            return *world;
        }

        let bone = &self.prepared[index];
        let local = bone.offset.multiply(&bone.basis(frame));
        let world = match bone.parent {
            Some(parent) => self.world_at(parent, frame, cache).multiply(&local),
            None => local,
        };

        cache[index].insert(frame, world);
        world
    }
}

/// Resolve `armature` animated by `action`
pub fn resolve_bind_poses(
    armature: &Armature,
    action: &Action,
    options: &ResolveOptions,
) -> Result<BindPoseTable> {
    BindPoseResolver::new(armature, action, options.clone()).resolve()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::armature::Bone;
    use pretty_assertions::assert_eq;

    fn rotation_y(degrees: f32) -> Matrix4f {
        Matrix4f::from_glam(glam::Mat4::from_rotation_y(degrees.to_radians()))
    }

    fn translation(x: f32, y: f32, z: f32) -> Matrix4f {
        Matrix4f::from_translation(x, y, z)
    }

    fn chain_armature() -> Armature {
        Armature::new(
            "Armature",
            vec![
                Bone::new("Root", translation(0.0, 1.0, 0.0), translation(0.0, -1.0, 0.0)),
                Bone::new("Mid", translation(0.0, 3.0, 0.0), translation(0.0, -3.0, 0.0))
                    .with_parent("Root"),
                Bone::new("Tip", translation(0.0, 6.0, 0.0), translation(0.0, -6.0, 0.0))
                    .with_parent("Mid"),
            ],
        )
        .unwrap()
    }

    fn track(frames: &[(Frame, Matrix4f)]) -> KeyframeTrack {
        frames.iter().copied().collect()
    }

    #[test]
    fn test_root_world_is_local_times_basis() {
        let armature = chain_armature();
        let action = Action::new("Wave").with_track(
            "Root",
            track(&[(1, rotation_y(0.0)), (2, rotation_y(30.0))]),
        );

        let table = resolve_bind_poses(&armature, &action, &ResolveOptions::default()).unwrap();
        let root = armature.bone("Root").unwrap();

        for frame in [1, 2] {
            let basis = action.track("Root").unwrap().get(frame).unwrap();
            assert_eq!(
                table.get("Root", frame),
                Some(&root.matrix_local.multiply(basis))
            );
        }
    }

    #[test]
    fn test_child_world_composes_parent_chain() {
        let armature = chain_armature();
        let action = Action::new("Wave")
            .with_track("Root", track(&[(1, rotation_y(10.0)), (2, rotation_y(20.0))]))
            .with_track("Mid", track(&[(1, rotation_y(5.0)), (2, rotation_y(15.0))]))
            .with_track("Tip", track(&[(1, rotation_y(1.0)), (2, rotation_y(2.0))]));

        let table = resolve_bind_poses(&armature, &action, &ResolveOptions::default()).unwrap();

        for (child, parent) in [("Mid", "Root"), ("Tip", "Mid")] {
            let child_bone = armature.bone(child).unwrap();
            let parent_bone = armature.bone(parent).unwrap();
            for frame in [1, 2] {
                let basis = action.track(child).unwrap().get(frame).unwrap();
                let expected = table.get(parent, frame).unwrap().multiply(
                    &parent_bone
                        .matrix_local_inverted
                        .multiply(&child_bone.matrix_local)
                        .multiply(basis),
                );
                assert_eq!(table.get(child, frame), Some(&expected));
            }
        }
    }

    #[test]
    fn test_static_bone_uses_declared_range() {
        let armature = chain_armature();
        let action = Action::new("Idle");

        let table =
            resolve_bind_poses(&armature, &action, &ResolveOptions::with_frame_range(1, 4)).unwrap();

        assert_eq!(table.frames("Root").unwrap().keys().copied().collect::<Vec<_>>(), vec![1, 2, 3]);
        for name in ["Root", "Mid", "Tip"] {
            let rest = armature.bone(name).unwrap().matrix_local;
            assert_eq!(table.get(name, 2), Some(&rest), "{name}");
        }
    }

    #[test]
    fn test_static_child_of_animated_parent_does_not_move() {
        let armature = Armature::new(
            "Armature",
            vec![
                Bone::new("Root", Matrix4f::IDENTITY, Matrix4f::IDENTITY),
                Bone::new("Child", translation(0.0, 2.0, 0.0), translation(0.0, -2.0, 0.0))
                    .with_parent("Root"),
            ],
        )
        .unwrap();
        let action = Action::new("Slide").with_track(
            "Root",
            track(&[(1, Matrix4f::IDENTITY), (2, translation(5.0, 0.0, 0.0))]),
        );

        let resolver = BindPoseResolver::new(&armature, &action, ResolveOptions::default());
        let table = resolver.resolve().unwrap();
        let rest = armature.bone("Child").unwrap().matrix_local;

        assert_eq!(table.get("Root", 2), Some(&translation(5.0, 0.0, 0.0)));
        for frame in [1, 2] {
            assert_eq!(table.get("Child", frame), Some(&rest), "frame {frame}");
        }
        assert_eq!(resolver.world("Child", 2), Some(rest));
    }

    #[test]
    fn test_static_parent_gives_identity_basis_to_animated_child() {
        let armature = chain_armature();
        let action = Action::new("Wave").with_track("Tip", track(&[(1, rotation_y(30.0))]));

        let table = resolve_bind_poses(&armature, &action, &ResolveOptions::default()).unwrap();

        let root = armature.bone("Root").unwrap();
        let mid = armature.bone("Mid").unwrap();
        let tip = armature.bone("Tip").unwrap();
        let root_world = root.matrix_local.multiply(&Matrix4f::IDENTITY);
        let mid_world = root_world.multiply(
            &root
                .matrix_local_inverted
                .multiply(&mid.matrix_local)
                .multiply(&Matrix4f::IDENTITY),
        );
        let expected = mid_world.multiply(
            &mid.matrix_local_inverted
                .multiply(&tip.matrix_local)
                .multiply(&rotation_y(30.0)),
        );
        assert_eq!(table.get("Tip", 1), Some(&expected));
        assert_eq!(table.get("Mid", 1), Some(&mid.matrix_local));
    }

    #[test]
    fn test_default_range_at_frame_limit_is_rejected() {
        let armature = chain_armature();
        let action =
            Action::new("Edge").with_track("Root", track(&[(Frame::MAX, Matrix4f::IDENTITY)]));

        let result = resolve_bind_poses(&armature, &action, &ResolveOptions::default());
        assert!(matches!(
            result,
            Err(BindPoseError::InvalidFrameRange { start: Frame::MAX, end: Frame::MAX })
        ));
    }

    #[test]
    fn test_default_range_ignores_unknown_tracks() {
        let armature = chain_armature();
        let ghost: KeyframeTrack = (1..=200).map(|frame| (frame, Matrix4f::IDENTITY)).collect();
        let action = Action::new("Wave")
            .with_track("Root", track(&[(1, rotation_y(0.0)), (3, rotation_y(30.0))]))
            .with_track("Ghost", ghost);

        assert_eq!(
            ResolveOptions::default().static_range(&armature, &action).unwrap(),
            (1, 4)
        );
        let table = resolve_bind_poses(&armature, &action, &ResolveOptions::default()).unwrap();
        assert_eq!(table.frame_count("Mid"), 3);
    }

    #[test]
    fn test_empty_range_for_static_bone() {
        let armature = chain_armature();
        let action = Action::new("Idle");

        let table =
            resolve_bind_poses(&armature, &action, &ResolveOptions::with_frame_range(5, 5)).unwrap();

        assert_eq!(table.len(), 3);
        assert_eq!(table.frame_count("Root"), 0);
        assert!(table.frames("Root").unwrap().is_empty());
    }

    #[test]
    fn test_inverted_range_is_rejected() {
        let armature = chain_armature();
        let action = Action::new("Idle");
        let result = resolve_bind_poses(&armature, &action, &ResolveOptions::with_frame_range(4, 1));
        assert!(matches!(
            result,
            Err(BindPoseError::InvalidFrameRange { start: 4, end: 1 })
        ));
    }

    #[test]
    fn test_default_range_follows_action_span() {
        let armature = chain_armature();
        let action = Action::new("Wave")
            .with_track("Mid", track(&[(2, rotation_y(0.0)), (5, rotation_y(30.0))]));

        let table = resolve_bind_poses(&armature, &action, &ResolveOptions::default()).unwrap();

        assert_eq!(table.frame_count("Mid"), 2);
        assert_eq!(
            table.frames("Root").unwrap().keys().copied().collect::<Vec<_>>(),
            vec![2, 3, 4, 5]
        );
    }

    #[test]
    fn test_parent_with_different_frames_is_held() {
        let armature = chain_armature();
        let action = Action::new("Wave")
            .with_track("Root", track(&[(1, rotation_y(0.0)), (3, rotation_y(90.0))]))
            .with_track("Mid", track(&[(2, rotation_y(0.0))]));

        let resolver = BindPoseResolver::new(&armature, &action, ResolveOptions::default());
        let table = resolver.resolve().unwrap();

        // Root has no key at 2 so it holds its frame-1 pose
        let mid = armature.bone("Mid").unwrap();
        let root = armature.bone("Root").unwrap();
        let root_at_2 = root.matrix_local.multiply(&rotation_y(0.0));
        let expected = root_at_2.multiply(
            &root
                .matrix_local_inverted
                .multiply(&mid.matrix_local)
                .multiply(&rotation_y(0.0)),
        );
        assert_eq!(table.get("Mid", 2), Some(&expected));
        assert_eq!(resolver.world("Root", 2), Some(root_at_2));
        assert!(table.get("Root", 2).is_none());
    }

    #[test]
    fn test_memoized_matches_direct_world() {
        let armature = chain_armature();
        let action = Action::new("Wave")
            .with_track("Root", track(&[(1, rotation_y(10.0)), (2, rotation_y(20.0))]))
            .with_track("Tip", track(&[(1, rotation_y(40.0)), (2, rotation_y(50.0))]));

        let resolver = BindPoseResolver::new(&armature, &action, ResolveOptions::default());
        let table = resolver.resolve().unwrap();

        for (bone, frames) in table.iter() {
            for (frame, world) in frames {
                assert_eq!(resolver.world(bone, *frame).as_ref(), Some(world));
            }
        }
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let armature = chain_armature();
        let action = Action::new("Wave")
            .with_track("Root", track(&[(1, rotation_y(10.0)), (2, rotation_y(20.0))]))
            .with_track("Mid", track(&[(1, rotation_y(5.0)), (2, rotation_y(15.0))]));

        let first = resolve_bind_poses(&armature, &action, &ResolveOptions::default()).unwrap();
        let second = resolve_bind_poses(&armature, &action, &ResolveOptions::default()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_unknown_track_is_ignored() {
        let armature = chain_armature();
        let action = Action::new("Wave")
            .with_track("Root", track(&[(1, rotation_y(10.0))]))
            .with_track("Ghost", track(&[(1, rotation_y(10.0))]));

        let table = resolve_bind_poses(&armature, &action, &ResolveOptions::default()).unwrap();
        assert_eq!(table.len(), 3);
        assert!(table.frames("Ghost").is_none());
    }
}
