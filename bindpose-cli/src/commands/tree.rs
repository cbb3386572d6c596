//! `bindpose tree`: bone hierarchy rendering

use anyhow::{Context, Result};
use bindpose::asset;
use bindpose::{Action, Armature, BoneIndexTable};
use clap::Args;
use std::path::PathBuf;

use super::load_armature;
use crate::utils::{NodeType, TreeNode, TreeOptions, render_tree};

#[derive(Args, Debug)]
pub struct TreeArgs {
    /// Armature JSON file
    pub file: PathBuf,

    /// Armature name (defaults to the first in the file)
    #[arg(long)]
    pub armature_name: Option<String>,

    /// Action JSON file used to mark animated bones
    #[arg(long)]
    pub actions: Option<PathBuf>,

    /// Action name within the action file
    #[arg(long, requires = "actions")]
    pub action: Option<String>,

    /// Maximum depth to display
    #[arg(short, long)]
    pub depth: Option<usize>,

    /// Show metadata inline
    #[arg(short, long)]
    pub compact: bool,

    /// Disable colors
    #[arg(long)]
    pub no_color: bool,
}

pub fn execute(args: TreeArgs) -> Result<()> {
    let armature = load_armature(&args.file, args.armature_name.as_deref())?;

    let action = match &args.actions {
        Some(path) => {
            let actions = asset::load_actions(path)
                .with_context(|| format!("Failed to load actions from {}", path.display()))?;
            let (_, mesh_actions) = asset::select(&actions, None, "mesh")?;
            let (_, action) = asset::select(mesh_actions, args.action.as_deref(), "action")?;
            Some(action.clone())
        }
        None => None,
    };

    let root = build_tree(&armature, action.as_ref());
    let options = TreeOptions {
        max_depth: args.depth,
        no_color: args.no_color,
        show_metadata: true,
        compact: args.compact,
    };

    print!("{}", render_tree(&root, &options));
    Ok(())
}

/// Build the render tree for an armature, roots first, siblings by name
pub fn build_tree(armature: &Armature, action: Option<&Action>) -> TreeNode {
    let indices = BoneIndexTable::from_armature(armature);
    let skeleton = armature.skeleton();

    let mut root = TreeNode::new(armature.name(), NodeType::Armature)
        .with_metadata("bones", armature.len());
    if let Some(action) = action {
        root = root.with_metadata("action", action.name());
    }

    for index in skeleton.roots() {
        root = root.add_child(bone_node(armature, &indices, action, index));
    }
    root
}

fn bone_node(
    armature: &Armature,
    indices: &BoneIndexTable,
    action: Option<&Action>,
    index: usize,
) -> TreeNode {
    let skeleton = armature.skeleton();
    let name = skeleton.name(index).unwrap_or_default();
    let track = action.and_then(|action| action.track(name));

    let node_type = if track.is_some_and(|track| !track.is_empty()) {
        NodeType::AnimatedBone
    } else {
        NodeType::Bone
    };

    let mut node = TreeNode::new(name, node_type);
    if let Some(bone_index) = indices.get(name) {
        node = node.with_metadata("index", bone_index);
    }
    if let Some(bone) = armature.bone(name) {
        let [x, y, z] = bone.matrix_local.transform_point([0.0, 0.0, 0.0]);
        node = node.with_metadata("head", format!("({x:.3}, {y:.3}, {z:.3})"));
    }
    if let Some(track) = track {
        node = node.with_metadata("keys", track.len());
    }

    for &child in skeleton.children(index) {
        node = node.add_child(bone_node(armature, indices, action, child));
    }
    node
}

#[cfg(test)]
mod tests {
    use super::*;
    use bindpose::{Bone, KeyframeTrack, Matrix4f};

    #[test]
    fn test_build_tree_follows_hierarchy() {
        let armature = Armature::new(
            "Armature",
            vec![
                Bone::new("Bone", Matrix4f::IDENTITY, Matrix4f::IDENTITY),
                Bone::new("Bone.001", Matrix4f::IDENTITY, Matrix4f::IDENTITY)
                    .with_parent("Bone"),
            ],
        )
        .unwrap();
        let track: KeyframeTrack = [(1, Matrix4f::IDENTITY)].into_iter().collect();
        let action = Action::new("ArmatureAction").with_track("Bone.001", track);

        let root = build_tree(&armature, Some(&action));

        assert_eq!(root.children.len(), 1);
        let bone = &root.children[0];
        assert_eq!(bone.name, "Bone");
        assert_eq!(bone.node_type, NodeType::Bone);
        assert_eq!(bone.children[0].node_type, NodeType::AnimatedBone);
        assert_eq!(bone.children[0].metadata["index"], "1");
        assert_eq!(bone.children[0].metadata["keys"], "1");
    }
}
