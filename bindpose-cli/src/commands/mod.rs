//! Command implementations and the asset loading they share

pub mod pack;
pub mod play;
pub mod resolve;
pub mod tree;

use anyhow::{Context, Result};
use bindpose::asset::{self, MeshAsset};
use bindpose::{Action, Armature, Frame, ResolveOptions};
use clap::Args;
use std::path::{Path, PathBuf};

/// Armature and action selection shared by commands that resolve poses
#[derive(Args, Debug)]
pub struct AnimationArgs {
    /// Armature JSON file
    #[arg(long)]
    pub armature: PathBuf,

    /// Action JSON file
    #[arg(long)]
    pub actions: PathBuf,

    /// Armature name (defaults to the first in the file)
    #[arg(long)]
    pub armature_name: Option<String>,

    /// Mesh the actions belong to (defaults to the first in the file)
    #[arg(long)]
    pub mesh: Option<String>,

    /// Action name (defaults to the first for the mesh)
    #[arg(long)]
    pub action: Option<String>,

    /// First frame synthesized for bones without keyframes
    #[arg(long, env = "BINDPOSE_START_FRAME", requires = "end", allow_hyphen_values = true)]
    pub start: Option<Frame>,

    /// End (exclusive) of the synthesized range
    #[arg(long, env = "BINDPOSE_END_FRAME", requires = "start", allow_hyphen_values = true)]
    pub end: Option<Frame>,
}

/// A loaded armature and the action driving it
pub struct LoadedAnimation {
    pub mesh: String,
    pub armature: Armature,
    pub action: Action,
}

impl AnimationArgs {
    /// Resolve options from the frame range flags
    pub fn resolve_options(&self) -> ResolveOptions {
        match (self.start, self.end) {
            (Some(start), Some(end)) => ResolveOptions::with_frame_range(start, end),
            _ => ResolveOptions::default(),
        }
    }

    /// Load the selected armature and action
    pub fn load(&self) -> Result<LoadedAnimation> {
        let armature = load_armature(&self.armature, self.armature_name.as_deref())?;

        let actions = asset::load_actions(&self.actions)
            .with_context(|| format!("Failed to load actions from {}", self.actions.display()))?;
        let (mesh, mesh_actions) = asset::select(&actions, self.mesh.as_deref(), "mesh")
            .with_context(|| format!("No matching mesh in {}", self.actions.display()))?;
        let (_, action) = asset::select(mesh_actions, self.action.as_deref(), "action")
            .with_context(|| format!("No matching action for mesh '{mesh}'"))?;

        log::info!(
            "Loaded armature '{}' ({} bones) and action '{}' ({} tracks)",
            armature.name(),
            armature.len(),
            action.name(),
            action.len()
        );

        Ok(LoadedAnimation {
            mesh: mesh.to_string(),
            armature,
            action: action.clone(),
        })
    }
}

/// Load one armature from an armature file
pub fn load_armature(path: &Path, name: Option<&str>) -> Result<Armature> {
    let armatures = asset::load_armatures(path)
        .with_context(|| format!("Failed to load armature from {}", path.display()))?;
    let (_, armature) = asset::select(&armatures, name, "armature")
        .with_context(|| format!("No matching armature in {}", path.display()))?;
    Ok(armature.clone())
}

/// Load one mesh from a mesh file
pub fn load_mesh(path: &Path, name: &str) -> Result<MeshAsset> {
    let meshes = asset::load_meshes(path)
        .with_context(|| format!("Failed to load meshes from {}", path.display()))?;
    let (_, mesh) = asset::select(&meshes, Some(name), "mesh")
        .with_context(|| format!("No matching mesh in {}", path.display()))?;
    Ok(mesh.clone())
}
