//! Skeletal bind-pose resolution and GPU skinning buffer packing.
//!
//! This crate turns an exported armature (a tree of named bones in their rest
//! pose) and sparse per-bone keyframes into the data a vertex-shader skinning
//! stage consumes:
//!
//! 1. [`resolve_bind_poses`] walks the bone hierarchy and computes every
//!    bone's world-space matrix for every keyed frame, producing a
//!    [`BindPoseTable`].
//! 2. [`SkinBufferBuilder`] (or the one-shot [`pack_skinning_buffers`])
//!    flattens the table, the inverse bind matrices and per-vertex skin
//!    weights into flat `f32` buffers addressed by a stable
//!    [`BoneIndexTable`].
//! 3. [`PlaybackClock`] advances the frame the shader should read at a fixed
//!    rate.
//!
//! The crate performs no graphics API calls; uploading the buffers is left to
//! the caller.
//!
//! # Examples
//!
//! ```
//! use bindpose::{
//!     Action, Armature, Bone, KeyframeTrack, Matrix4f, PackOptions, ResolveOptions,
//!     VertexSkin, pack_skinning_buffers, resolve_bind_poses,
//! };
//!
//! let armature = Armature::new(
//!     "Armature",
//!     vec![
//!         Bone::new("Bone", Matrix4f::IDENTITY, Matrix4f::IDENTITY),
//!         Bone::new(
//!             "Bone.001",
//!             Matrix4f::from_translation(0.0, 2.0, 0.0),
//!             Matrix4f::from_translation(0.0, -2.0, 0.0),
//!         )
//!         .with_parent("Bone"),
//!     ],
//! )?;
//!
//! let track: KeyframeTrack = (1..=3).map(|frame| (frame, Matrix4f::IDENTITY)).collect();
//! let action = Action::new("ArmatureAction")
//!     .with_track("Bone", track.clone())
//!     .with_track("Bone.001", track);
//!
//! let table = resolve_bind_poses(&armature, &action, &ResolveOptions::default())?;
//! assert_eq!(table.frame_count("Bone.001"), 3);
//!
//! let vertices = vec![VertexSkin::new([("Bone", 0.6), ("Bone.001", 0.4)], 1.0)];
//! let (buffers, mesh) =
//!     pack_skinning_buffers(&armature, &table, &vertices, &PackOptions::default())?;
//!
//! assert_eq!(buffers.bone_matrices.len(), 2 * 3 * 16);
//! assert_eq!(buffers.skin, vec![0.0, 0.6, 1.0, 0.4]);
//! assert_eq!(mesh.offsets().with_frame(1).matrix_index(1, 1), Some(48));
//! # Ok::<(), bindpose::BindPoseError>(())
//! ```
//!
//! # Features
//!
//! - `serde`: read the exporter's JSON armature, action and mesh files
//!   (see the `asset` module).

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod armature;
#[cfg(feature = "serde")]
#[cfg_attr(docsrs, doc(cfg(feature = "serde")))]
pub mod asset;
pub mod clock;
pub mod error;
pub mod keyframes;
pub mod matrix;
pub mod packer;
pub mod resolver;

pub use armature::{Armature, Bone, Skeleton};
pub use clock::{PlaybackClock, PlaybackConfig, PlaybackDirection, PlaybackState};
pub use error::{BindPoseError, Result};
pub use keyframes::{Action, Frame, KeyframeTrack};
pub use matrix::Matrix4f;
pub use packer::{
    AnimationSlot, ArmatureSlot, BoneIndexTable, MeshOffsets, MeshSlot, PackOptions,
    SkinBufferBuilder, SkinningBuffers, VertexSkin, VertexSkinAttributes, pack_skinning_buffers,
};
pub use resolver::{BindPoseResolver, BindPoseTable, ResolveOptions, resolve_bind_poses};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
