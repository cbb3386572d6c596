//! `bindpose pack`: skinning buffers as JSON

use anyhow::{Context, Result};
use bindpose::packer::{MATRIX_STRIDE, SKIN_PAIR_STRIDE};
use bindpose::{
    Frame, MeshSlot, PackOptions, SkinningBuffers, pack_skinning_buffers, resolve_bind_poses,
};
use clap::Args;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use super::{AnimationArgs, LoadedAnimation, load_mesh};

#[derive(Args, Debug)]
pub struct PackArgs {
    #[command(flatten)]
    pub animation: AnimationArgs,

    /// Mesh JSON file with per-vertex skin weights
    #[arg(long)]
    pub mesh_file: PathBuf,

    /// Output file (defaults to stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Accept bones with differing frame counts
    #[arg(long)]
    pub allow_ragged: bool,

    /// Pretty-print the JSON
    #[arg(long)]
    pub pretty: bool,
}

/// Everything a GPU upload step needs for one mesh
#[derive(Debug, Serialize)]
pub struct PackReport<'a> {
    pub armature: &'a str,
    pub action: &'a str,
    pub mesh: &'a str,
    pub bone_indices: BTreeMap<&'a str, usize>,
    pub frames: &'a [Frame],
    pub offsets: [f32; 6],
    pub vertex_attributes: Vec<[f32; 3]>,
    pub bone_matrices: &'a [f32],
    pub inverted_matrices: &'a [f32],
    pub skin: &'a [f32],
}

impl<'a> PackReport<'a> {
    pub fn new(loaded: &'a LoadedAnimation, buffers: &'a SkinningBuffers, mesh: &'a MeshSlot) -> Self {
        let animation = mesh.animation();
        Self {
            armature: loaded.armature.name(),
            action: loaded.action.name(),
            mesh: &loaded.mesh,
            bone_indices: animation
                .armature()
                .bone_indices()
                .iter()
                .map(|(index, name)| (name, index))
                .collect(),
            frames: animation.frames(),
            offsets: mesh.offsets().to_array(),
            vertex_attributes: mesh
                .vertex_attributes()
                .iter()
                .map(|attributes| attributes.to_array())
                .collect(),
            bone_matrices: &buffers.bone_matrices,
            inverted_matrices: &buffers.inverted_matrices,
            skin: &buffers.skin,
        }
    }
}

pub fn execute(args: PackArgs) -> Result<()> {
    let loaded = args.animation.load()?;
    let mesh_asset = load_mesh(&args.mesh_file, &loaded.mesh)?;

    let table = resolve_bind_poses(
        &loaded.armature,
        &loaded.action,
        &args.animation.resolve_options(),
    )
    .context("Failed to resolve bind poses")?;

    let options = PackOptions {
        require_uniform_frames: !args.allow_ragged,
    };
    let (buffers, mesh) =
        pack_skinning_buffers(&loaded.armature, &table, &mesh_asset.skins(), &options)
            .with_context(|| format!("Failed to pack mesh '{}'", mesh_asset.name))?;

    log::info!(
        "Packed {} bone matrices, {} inverse matrices, {} skin pairs",
        buffers.bone_matrices.len() / MATRIX_STRIDE,
        buffers.inverted_matrices.len() / MATRIX_STRIDE,
        buffers.skin.len() / SKIN_PAIR_STRIDE
    );

    let report = PackReport::new(&loaded, &buffers, &mesh);
    match &args.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            write_report(BufWriter::new(file), &report, args.pretty)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Wrote skinning buffers to {}", path.display());
        }
        None => write_report(io::stdout().lock(), &report, args.pretty)?,
    }

    Ok(())
}

fn write_report<W: Write>(mut writer: W, report: &PackReport<'_>, pretty: bool) -> Result<()> {
    if pretty {
        serde_json::to_writer_pretty(&mut writer, report)?;
    } else {
        serde_json::to_writer(&mut writer, report)?;
    }
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}
