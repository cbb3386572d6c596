//! GPU skin-buffer packing
//!
//! Flattens resolved bind poses and per-vertex skin weights into four flat
//! `f32` buffers that a vertex-shader skinning stage reads as buffer
//! textures:
//!
//! - `bone_matrices`: per armature, per animation, per bone (index order),
//!   per frame (ascending), one row-major 4x4 block of 16 floats
//! - `inverted_matrices`: per armature, per bone, its inverse bind matrix
//! - `skin`: per vertex, `(bone index, normalized weight)` pairs
//! - `offsets`: one 6-float [`MeshOffsets`] record per mesh
//!
//! All offsets are counted in floats. Several armatures, animations and meshes
//! may share one set of buffers through [`SkinBufferBuilder`]. The shader
//! locates a bone matrix with
//!
//! ```text
//! mesh_offset + animation_offset + bone_index * frame_count * 16 + (frame - 1) * 16
//! ```
//!
//! where `frame` is the 1-based position of the frame within the animation.

use std::collections::BTreeMap;

use crate::armature::Armature;
use crate::error::{BindPoseError, Result};
use crate::keyframes::Frame;
use crate::resolver::BindPoseTable;

/// Floats per packed matrix
pub const MATRIX_STRIDE: usize = 16;

/// Floats per packed skin pair
pub const SKIN_PAIR_STRIDE: usize = 2;

/// Floats per mesh offset record
pub const OFFSETS_STRIDE: usize = 6;

/// Current-frame sentinel telling the shader to skip skinning
pub const REST_POSE_FRAME: Frame = -1;

/// Stable mapping between bone names and dense indices `0..N`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoneIndexTable {
    names: Vec<String>,
    indices: BTreeMap<String, usize>,
}

impl BoneIndexTable {
    /// Assign indices in the armature's bone order
    pub fn from_armature(armature: &Armature) -> Self {
        let names: Vec<String> = armature.bone_order().to_vec();
        let indices = names
            .iter()
            .enumerate()
            .map(|(index, name)| (name.clone(), index))
            .collect();
        Self { names, indices }
    }

    /// Index of a bone
    pub fn get(&self, name: &str) -> Option<usize> {
        self.indices.get(name).copied()
    }

    /// Bone name at an index
    pub fn name(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    /// `(index, name)` pairs in index order
    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> + '_ {
        self.names.iter().map(String::as_str).enumerate()
    }

    /// Number of bones
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Skin weights of one vertex
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VertexSkin {
    /// Influence per bone name
    pub weights: BTreeMap<String, f32>,
    /// Sum the weights are normalized against
    pub total_weight: f32,
}

impl VertexSkin {
    /// Create a vertex skin with an explicit total weight
    pub fn new(
        weights: impl IntoIterator<Item = (impl Into<String>, f32)>,
        total_weight: f32,
    ) -> Self {
        Self {
            weights: weights
                .into_iter()
                .map(|(bone, weight)| (bone.into(), weight))
                .collect(),
            total_weight,
        }
    }

    /// Create a vertex skin whose total weight is the sum of its weights
    pub fn from_weights(weights: impl IntoIterator<Item = (impl Into<String>, f32)>) -> Self {
        let mut skin = Self::new(weights, 0.0);
        skin.total_weight = skin.weights.values().sum();
        skin
    }

    /// Number of influencing bones
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    /// Whether no bone influences this vertex
    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }
}

/// Packing options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackOptions {
    /// Reject animations whose bones resolved to different frame counts
    ///
    /// The shader addresses bone matrices with a fixed per-bone stride, so a
    /// ragged animation reads the wrong matrices unless the consumer pads it.
    pub require_uniform_frames: bool,
}

impl Default for PackOptions {
    fn default() -> Self {
        Self {
            require_uniform_frames: true,
        }
    }
}

/// Per-mesh record locating its data inside the shared buffers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshOffsets {
    /// 1-based frame position, or [`REST_POSE_FRAME`]
    pub current_frame: Frame,
    /// Frames per bone in the animation
    pub frame_count: usize,
    /// Start of the mesh's pairs in the skin buffer
    pub skin_offset: usize,
    /// Start of the animation relative to `mesh_offset`
    pub animation_offset: usize,
    /// Start of the armature's block in the bone matrix buffer
    pub mesh_offset: usize,
    /// Start of the armature's block in the inverse matrix buffer
    pub inverted_matrix_offset: usize,
}

impl MeshOffsets {
    /// The record as uploaded: `[current_frame, frame_count, skin_offset,
    /// animation_offset, mesh_offset, inverted_matrix_offset]`
    pub fn to_array(&self) -> [f32; OFFSETS_STRIDE] {
        [
            self.current_frame as f32,
            self.frame_count as f32,
            self.skin_offset as f32,
            self.animation_offset as f32,
            self.mesh_offset as f32,
            self.inverted_matrix_offset as f32,
        ]
    }

    /// Copy showing the given 1-based frame position
    #[must_use]
    pub fn with_frame(self, frame: Frame) -> Self {
        Self {
            current_frame: frame,
            ..self
        }
    }

    /// Copy telling the shader to draw the rest pose
    #[must_use]
    pub fn rest_pose(self) -> Self {
        self.with_frame(REST_POSE_FRAME)
    }

    /// Whether the shader will skip skinning
    pub fn is_rest_pose(&self) -> bool {
        self.current_frame == REST_POSE_FRAME
    }

    /// Float index of a bone's matrix at a 1-based frame position
    pub fn matrix_index(&self, bone_index: usize, frame: Frame) -> Option<usize> {
        let position = usize::try_from(frame).ok()?.checked_sub(1)?;
        if position >= self.frame_count {
            return None;
        }
        Some(
            self.mesh_offset
                + self.animation_offset
                + bone_index * self.frame_count * MATRIX_STRIDE
                + position * MATRIX_STRIDE,
        )
    }

    /// Float index of a bone's inverse bind matrix
    pub fn inverted_matrix_index(&self, bone_index: usize) -> usize {
        self.inverted_matrix_offset + bone_index * MATRIX_STRIDE
    }
}

/// Per-vertex attributes pointing into the shared buffers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexSkinAttributes {
    /// Mesh slot index selecting the offset record
    pub mesh_index: usize,
    /// Number of influencing bones
    pub bone_count: usize,
    /// Start of this vertex's pairs, relative to the mesh's skin offset
    pub skin_offset: usize,
}

impl VertexSkinAttributes {
    /// Attributes as uploaded alongside position and UVs
    pub fn to_array(&self) -> [f32; 3] {
        [
            self.mesh_index as f32,
            self.bone_count as f32,
            self.skin_offset as f32,
        ]
    }
}

/// An armature written into a [`SkinBufferBuilder`]
#[derive(Debug, Clone, PartialEq)]
pub struct ArmatureSlot {
    index: usize,
    matrix_offset: usize,
    inverted_matrix_offset: usize,
    bone_indices: BoneIndexTable,
}

impl ArmatureSlot {
    /// Position among the builder's armatures
    pub fn index(&self) -> usize {
        self.index
    }

    /// Start of the armature's block in the bone matrix buffer
    pub fn matrix_offset(&self) -> usize {
        self.matrix_offset
    }

    /// Start of the armature's inverse bind matrices
    pub fn inverted_matrix_offset(&self) -> usize {
        self.inverted_matrix_offset
    }

    /// Bone indices used by every buffer of this armature
    pub fn bone_indices(&self) -> &BoneIndexTable {
        &self.bone_indices
    }
}

/// An animation written into a [`SkinBufferBuilder`]
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationSlot {
    armature: ArmatureSlot,
    animation_offset: usize,
    frame_count: usize,
    frames: Vec<Frame>,
}

impl AnimationSlot {
    /// The armature this animation drives
    pub fn armature(&self) -> &ArmatureSlot {
        &self.armature
    }

    /// Start of the animation relative to the armature's matrix block
    pub fn animation_offset(&self) -> usize {
        self.animation_offset
    }

    /// Frames per bone
    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    /// Packed frame numbers, ascending
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// 1-based position of a frame number within the packed frames
    pub fn frame_position(&self, frame: Frame) -> Option<Frame> {
        let index = self.frames.binary_search(&frame).ok()?;
        Frame::try_from(index + 1).ok()
    }
}

/// A mesh written into a [`SkinBufferBuilder`]
#[derive(Debug, Clone, PartialEq)]
pub struct MeshSlot {
    index: usize,
    offsets: MeshOffsets,
    animation: AnimationSlot,
    vertices: Vec<VertexSkinAttributes>,
}

impl MeshSlot {
    /// Position among the builder's meshes; selects the offset record
    pub fn index(&self) -> usize {
        self.index
    }

    /// The mesh's offset record, showing the rest pose
    pub fn offsets(&self) -> MeshOffsets {
        self.offsets
    }

    /// The animation the mesh was packed against
    pub fn animation(&self) -> &AnimationSlot {
        &self.animation
    }

    /// Per-vertex attributes in mesh vertex order
    pub fn vertex_attributes(&self) -> &[VertexSkinAttributes] {
        &self.vertices
    }
}

/// The four flat buffers handed to the GPU upload step
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SkinningBuffers {
    /// World matrices per armature, animation, bone and frame
    pub bone_matrices: Vec<f32>,
    /// Inverse bind matrices per armature and bone
    pub inverted_matrices: Vec<f32>,
    /// `(bone index, normalized weight)` pairs per vertex
    pub skin: Vec<f32>,
    /// One 6-float record per mesh
    pub offsets: Vec<f32>,
}

impl SkinningBuffers {
    /// The offset record of a mesh
    pub fn mesh_offsets(&self, mesh_index: usize) -> Option<&[f32]> {
        let start = mesh_index * OFFSETS_STRIDE;
        self.offsets.get(start..start + OFFSETS_STRIDE)
    }

    /// Overwrite the offset record of a mesh, typically once per drawn frame
    ///
    /// Returns `false` when `mesh_index` has no record.
    pub fn write_offsets(&mut self, mesh_index: usize, offsets: &MeshOffsets) -> bool {
        let start = mesh_index * OFFSETS_STRIDE;
        match self.offsets.get_mut(start..start + OFFSETS_STRIDE) {
            Some(record) => {
                record.copy_from_slice(&offsets.to_array());
                true
            }
            None => false,
        }
    }

    /// The 16 floats starting at `index` in the bone matrix buffer
    pub fn bone_matrix(&self, index: usize) -> Option<&[f32]> {
        self.bone_matrices.get(index..index + MATRIX_STRIDE)
    }
}

/// Appends armatures, animations and meshes into shared [`SkinningBuffers`]
#[derive(Debug, Default)]
pub struct SkinBufferBuilder {
    options: PackOptions,
    buffers: SkinningBuffers,
    armatures: usize,
    meshes: usize,
}

impl SkinBufferBuilder {
    /// Create a builder with default options
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder with custom options
    pub fn with_options(options: PackOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// Write an armature's inverse bind matrices and fix its bone indices
    pub fn add_armature(&mut self, armature: &Armature) -> ArmatureSlot {
        let bone_indices = BoneIndexTable::from_armature(armature);
        let slot = ArmatureSlot {
            index: self.armatures,
            matrix_offset: self.buffers.bone_matrices.len(),
            inverted_matrix_offset: self.buffers.inverted_matrices.len(),
            bone_indices,
        };

        for bone in armature.bones() {
            self.buffers
                .inverted_matrices
                .extend_from_slice(bone.matrix_local_inverted.as_array());
        }
        self.armatures += 1;

        log::debug!(
            "Packed armature '{}' as slot {} ({} inverse matrices at {})",
            armature.name(),
            slot.index,
            slot.bone_indices.len(),
            slot.inverted_matrix_offset
        );

        slot
    }

    /// Write an animation's world matrices for an armature
    pub fn add_animation(
        &mut self,
        armature: &ArmatureSlot,
        table: &BindPoseTable,
    ) -> Result<AnimationSlot> {
        let mut frame_count = None;
        let mut frames = Vec::new();

        for (_, name) in armature.bone_indices.iter() {
            let Some(resolved) = table.frames(name) else {
                return Err(BindPoseError::UnresolvedBone {
                    bone: name.to_string(),
                });
            };
            let found = resolved.len();
            match frame_count {
                None => {
                    frame_count = Some(found);
                    frames = resolved.keys().copied().collect();
                }
                Some(expected) if expected != found => {
                    if self.options.require_uniform_frames {
                        return Err(BindPoseError::NonUniformFrameCount {
                            bone: name.to_string(),
                            expected,
                            found,
                        });
                    }
                    log::warn!(
                        "Bone '{name}' has {found} frames, expected {expected}; matrix addressing will be off"
                    );
                }
                Some(_) => {}
            }
        }

        let start = self.buffers.bone_matrices.len();
        for (_, name) in armature.bone_indices.iter() {
            for world in table.frames(name).into_iter().flat_map(BTreeMap::values) {
                self.buffers
                    .bone_matrices
                    .extend_from_slice(world.as_array());
            }
        }

        let slot = AnimationSlot {
            armature: armature.clone(),
            animation_offset: start - armature.matrix_offset,
            frame_count: frame_count.unwrap_or(0),
            frames,
        };

        log::debug!(
            "Packed animation for armature slot {}: {} frames per bone, offset {}",
            armature.index,
            slot.frame_count,
            slot.animation_offset
        );

        Ok(slot)
    }

    /// Write a mesh's skin pairs and its offset record
    ///
    /// Nothing is written if any vertex is rejected.
    pub fn add_mesh(&mut self, animation: &AnimationSlot, vertices: &[VertexSkin]) -> Result<MeshSlot> {
        let bone_indices = &animation.armature.bone_indices;
        let mesh_index = self.meshes;
        let mut skin = Vec::new();
        let mut attributes = Vec::with_capacity(vertices.len());

        for (vertex, vertex_skin) in vertices.iter().enumerate() {
            if !vertex_skin.is_empty() && vertex_skin.total_weight == 0.0 {
                return Err(BindPoseError::ZeroTotalWeight { vertex });
            }

            let mut pairs = Vec::with_capacity(vertex_skin.len());
            for (bone, weight) in &vertex_skin.weights {
                let index = bone_indices
                    .get(bone)
                    .ok_or_else(|| BindPoseError::UnknownSkinBone {
                        vertex,
                        bone: bone.clone(),
                    })?;
                pairs.push((index, weight / vertex_skin.total_weight));
            }
            pairs.sort_by_key(|&(index, _)| index);

            attributes.push(VertexSkinAttributes {
                mesh_index,
                bone_count: pairs.len(),
                skin_offset: skin.len(),
            });
            for (index, weight) in pairs {
                skin.push(index as f32);
                skin.push(weight);
            }
        }

        let offsets = MeshOffsets {
            current_frame: REST_POSE_FRAME,
            frame_count: animation.frame_count,
            skin_offset: self.buffers.skin.len(),
            animation_offset: animation.animation_offset,
            mesh_offset: animation.armature.matrix_offset,
            inverted_matrix_offset: animation.armature.inverted_matrix_offset,
        };

        self.buffers.skin.extend(skin);
        self.buffers.offsets.extend_from_slice(&offsets.to_array());
        self.meshes += 1;

        log::debug!(
            "Packed mesh slot {}: {} vertices, skin offset {}",
            mesh_index,
            vertices.len(),
            offsets.skin_offset
        );

        Ok(MeshSlot {
            index: mesh_index,
            offsets,
            animation: animation.clone(),
            vertices: attributes,
        })
    }

    /// Borrow the buffers written so far
    pub fn buffers(&self) -> &SkinningBuffers {
        &self.buffers
    }

    /// Finish and take the buffers
    pub fn finish(self) -> SkinningBuffers {
        self.buffers
    }
}

/// Pack a single armature, animation and mesh into fresh buffers
pub fn pack_skinning_buffers(
    armature: &Armature,
    table: &BindPoseTable,
    vertices: &[VertexSkin],
    options: &PackOptions,
) -> Result<(SkinningBuffers, MeshSlot)> {
    let mut builder = SkinBufferBuilder::with_options(options.clone());
    let armature_slot = builder.add_armature(armature);
    let animation = builder.add_animation(&armature_slot, table)?;
    let mesh = builder.add_mesh(&animation, vertices)?;
    Ok((builder.finish(), mesh))
}
