//! JSON asset interchange
//!
//! Reads the three JSON files an exporter writes for a skinned mesh:
//!
//! - armatures: `{ "<armature>": { "name", "bones": { "<bone>": { "name",
//!   "parentName", "matrix_local", "matrix_local_inverted" } } } }`
//! - actions: `{ "<mesh>": { "<action>": { "<bone>": { "<frame>": [16 floats] } } } }`
//! - meshes: `{ "<mesh>": { "indices", "coordinates": [{ "index", "xyz", "uvs",
//!   "skin", "totalWeight" }] } }`
//!
//! Matrices are flat 16-float arrays in row-major order. Every file is parsed
//! into raw serde structs first and then converted into validated domain
//! types, so a broken asset fails with the same errors as hand-built data.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::armature::{Armature, Bone};
use crate::error::{BindPoseError, Result};
use crate::keyframes::{Action, Frame, KeyframeTrack};
use crate::matrix::Matrix4f;
use crate::packer::VertexSkin;

#[derive(Debug, Deserialize)]
struct RawBone {
    name: String,
    #[serde(rename = "parentName", default)]
    parent_name: String,
    matrix_local: Matrix4f,
    matrix_local_inverted: Matrix4f,
}

#[derive(Debug, Deserialize)]
struct RawArmature {
    name: String,
    bones: BTreeMap<String, RawBone>,
}

type RawActions = BTreeMap<String, BTreeMap<String, BTreeMap<String, BTreeMap<Frame, Matrix4f>>>>;

#[derive(Debug, Deserialize)]
struct RawCoordinate {
    index: u32,
    xyz: [f32; 3],
    #[serde(default)]
    uvs: [f32; 2],
    #[serde(default)]
    skin: BTreeMap<String, f32>,
    #[serde(rename = "totalWeight")]
    total_weight: f32,
}

#[derive(Debug, Deserialize)]
struct RawMesh {
    #[serde(default)]
    indices: Vec<u32>,
    coordinates: Vec<RawCoordinate>,
}

/// One vertex of an exported mesh
#[derive(Debug, Clone, PartialEq)]
pub struct MeshVertex {
    /// Vertex index as exported
    pub index: u32,
    /// Position
    pub position: [f32; 3],
    /// Texture coordinates
    pub uv: [f32; 2],
    /// Bone influences
    pub skin: VertexSkin,
}

/// An exported mesh with its skin weights
#[derive(Debug, Clone, PartialEq)]
pub struct MeshAsset {
    /// Mesh name
    pub name: String,
    /// Triangle indices
    pub indices: Vec<u32>,
    /// Vertices in mesh order
    pub vertices: Vec<MeshVertex>,
}

impl MeshAsset {
    /// Skin weights of every vertex, in mesh order
    pub fn skins(&self) -> Vec<VertexSkin> {
        self.vertices.iter().map(|vertex| vertex.skin.clone()).collect()
    }
}

/// Parse an armature file into validated armatures keyed by name
pub fn armatures_from_json(json: &str) -> Result<BTreeMap<String, Armature>> {
    let raw: BTreeMap<String, RawArmature> = serde_json::from_str(json)?;

    raw.into_iter()
        .map(|(key, armature)| {
            let bones = armature
                .bones
                .into_iter()
                .map(|(bone_key, bone)| {
                    let converted =
                        Bone::new(bone.name, bone.matrix_local, bone.matrix_local_inverted)
                            .with_parent(bone.parent_name);
                    (bone_key, converted)
                })
                .collect();
            Ok((key, Armature::from_map(armature.name, bones)?))
        })
        .collect()
}

/// Parse an action file into actions keyed by mesh name, then action name
pub fn actions_from_json(json: &str) -> Result<BTreeMap<String, BTreeMap<String, Action>>> {
    let raw: RawActions = serde_json::from_str(json)?;

    Ok(raw
        .into_iter()
        .map(|(mesh, actions)| {
            let actions = actions
                .into_iter()
                .map(|(name, bones)| {
                    let action = bones.into_iter().fold(
                        Action::new(name.clone()),
                        |action, (bone, keys)| {
                            action.with_track(bone, keys.into_iter().collect::<KeyframeTrack>())
                        },
                    );
                    (name, action)
                })
                .collect();
            (mesh, actions)
        })
        .collect())
}

/// Parse a mesh file into meshes keyed by name
pub fn meshes_from_json(json: &str) -> Result<BTreeMap<String, MeshAsset>> {
    let raw: BTreeMap<String, RawMesh> = serde_json::from_str(json)?;

    Ok(raw
        .into_iter()
        .map(|(name, mesh)| {
            let vertices = mesh
                .coordinates
                .into_iter()
                .map(|coordinate| MeshVertex {
                    index: coordinate.index,
                    position: coordinate.xyz,
                    uv: coordinate.uvs,
                    skin: VertexSkin {
                        weights: coordinate.skin,
                        total_weight: coordinate.total_weight,
                    },
                })
                .collect();
            let asset = MeshAsset {
                name: name.clone(),
                indices: mesh.indices,
                vertices,
            };
            (name, asset)
        })
        .collect())
}

/// Read and parse an armature file
pub fn load_armatures(path: impl AsRef<Path>) -> Result<BTreeMap<String, Armature>> {
    armatures_from_json(&fs::read_to_string(path)?)
}

/// Read and parse an action file
pub fn load_actions(path: impl AsRef<Path>) -> Result<BTreeMap<String, BTreeMap<String, Action>>> {
    actions_from_json(&fs::read_to_string(path)?)
}

/// Read and parse a mesh file
pub fn load_meshes(path: impl AsRef<Path>) -> Result<BTreeMap<String, MeshAsset>> {
    meshes_from_json(&fs::read_to_string(path)?)
}

/// Pick an entry by name, or the first entry when no name is given
///
/// `kind` names the entry type in the error message.
pub fn select<'a, T>(
    entries: &'a BTreeMap<String, T>,
    name: Option<&str>,
    kind: &str,
) -> Result<(&'a str, &'a T)> {
    match name {
        Some(name) => entries
            .get_key_value(name)
            .map(|(key, value)| (key.as_str(), value))
            .ok_or_else(|| BindPoseError::UnknownAnimation(format!("{kind} '{name}'"))),
        None => entries
            .iter()
            .next()
            .map(|(key, value)| (key.as_str(), value))
            .ok_or_else(|| BindPoseError::UnknownAnimation(format!("no {kind} in file"))),
    }
}
