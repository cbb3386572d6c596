//! `bindpose resolve`: per-bone world matrices

use anyhow::{Context, Result};
use bindpose::{BindPoseTable, BoneIndexTable, Frame, Matrix4f, resolve_bind_poses};
use clap::Args;

use super::AnimationArgs;

#[derive(Args, Debug)]
pub struct ResolveArgs {
    #[command(flatten)]
    pub animation: AnimationArgs,

    /// Print every bone's world matrix at this frame
    #[arg(short, long, allow_hyphen_values = true)]
    pub frame: Option<Frame>,
}

pub fn execute(args: ResolveArgs) -> Result<()> {
    let loaded = args.animation.load()?;
    let table = resolve_bind_poses(
        &loaded.armature,
        &loaded.action,
        &args.animation.resolve_options(),
    )
    .with_context(|| {
        format!(
            "Failed to resolve action '{}' on armature '{}'",
            loaded.action.name(),
            loaded.armature.name()
        )
    })?;

    println!(
        "Armature '{}', action '{}' (mesh '{}')",
        loaded.armature.name(),
        loaded.action.name(),
        loaded.mesh
    );

    let indices = BoneIndexTable::from_armature(&loaded.armature);
    for (index, bone) in indices.iter() {
        println!("  [{index}] {bone}: {}", describe_frames(&table, bone));
        if let Some(frame) = args.frame {
            match table.get(bone, frame) {
                Some(world) => print!("{}", format_matrix(world, "      ")),
                None => println!("      (no frame {frame})"),
            }
        }
    }

    Ok(())
}

/// Summary of the frames resolved for one bone
pub fn describe_frames(table: &BindPoseTable, bone: &str) -> String {
    let frames: Vec<Frame> = table
        .frames(bone)
        .map(|frames| frames.keys().copied().collect())
        .unwrap_or_default();

    match frames.as_slice() {
        [] => "no frames".to_string(),
        [only] => format!("1 frame ({only})"),
        [first, .., last] => format!("{} frames ({first}..={last})", frames.len()),
    }
}

/// Four indented rows of a matrix
pub fn format_matrix(matrix: &Matrix4f, indent: &str) -> String {
    let mut output = String::new();
    for row in 0..4 {
        output.push_str(&format!(
            "{indent}[{:>9.5} {:>9.5} {:>9.5} {:>9.5}]\n",
            matrix.get(row, 0),
            matrix.get(row, 1),
            matrix.get(row, 2),
            matrix.get(row, 3)
        ));
    }
    output
}
