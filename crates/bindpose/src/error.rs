//! Error handling for bind-pose resolution and skin packing

use thiserror::Error;

use crate::keyframes::Frame;

/// Errors raised by malformed armature, keyframe or skin data
///
/// Every variant names the offending bone, vertex or frame so that a broken
/// asset can be traced back to its source instead of rendering a wrong skeleton.
#[derive(Debug, Error)]
pub enum BindPoseError {
    /// A bone declares a parent that is not part of the armature
    #[error("Bone '{bone}' references unknown parent '{parent}'")]
    UnknownParent {
        /// The bone carrying the dangling reference
        bone: String,
        /// The parent name that failed to resolve
        parent: String,
    },

    /// Following parent links from a bone leads back to the same bone
    #[error("Bone '{bone}' is part of a cyclic parent chain")]
    CyclicHierarchy {
        /// A bone on the cycle
        bone: String,
    },

    /// The armature map key disagrees with the bone's own name
    #[error("Bone stored under key '{key}' is named '{name}'")]
    BoneNameMismatch {
        /// The key in the armature's bone map
        key: String,
        /// The name recorded inside the bone
        name: String,
    },

    /// Two bones share the same name
    #[error("Duplicate bone name '{0}'")]
    DuplicateBone(String),

    /// An explicit bone order is not a permutation of the armature's bones
    #[error("Invalid bone order: {0}")]
    InvalidBoneOrder(String),

    /// A vertex's skin weights sum to zero and cannot be normalized
    #[error("Vertex {vertex} has a total skin weight of zero")]
    ZeroTotalWeight {
        /// Index of the vertex in mesh order
        vertex: usize,
    },

    /// A vertex is weighted to a bone the armature does not have
    #[error("Vertex {vertex} is skinned to unknown bone '{bone}'")]
    UnknownSkinBone {
        /// Index of the vertex in mesh order
        vertex: usize,
        /// The bone name that failed to resolve
        bone: String,
    },

    /// The declared animation range ends before it starts
    #[error("Invalid frame range: start {start} is after end {end}")]
    InvalidFrameRange {
        /// First frame of the range
        start: Frame,
        /// End of the range
        end: Frame,
    },

    /// Playback rate is zero, negative or not finite
    #[error("Invalid frame rate: {0}")]
    InvalidFrameRate(f64),

    /// A bone resolved to a different number of frames than its siblings
    #[error("Bone '{bone}' has {found} frames, expected {expected}")]
    NonUniformFrameCount {
        /// The bone with the mismatched frame count
        bone: String,
        /// Frame count of the first bone in index order
        expected: usize,
        /// Frame count of this bone
        found: usize,
    },

    /// A bind-pose table handed to the packer has no entry for a bone
    #[error("Bone '{bone}' has no resolved frames; was the table resolved for another armature?")]
    UnresolvedBone {
        /// The bone missing from the table
        bone: String,
    },

    /// A named mesh or action is missing from a loaded asset
    #[error("Unknown animation asset: {0}")]
    UnknownAnimation(String),

    /// I/O error while reading an asset
    #[cfg(feature = "serde")]
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Asset JSON could not be parsed
    #[cfg(feature = "serde")]
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type using `BindPoseError`
pub type Result<T> = std::result::Result<T, BindPoseError>;
