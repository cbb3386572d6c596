//! Exported cube asset through the full pipeline
#![cfg(feature = "serde")]

use bindpose::asset::{load_actions, load_armatures, load_meshes, select};
use bindpose::{
    BindPoseError, Matrix4f, PackOptions, ResolveOptions, pack_skinning_buffers,
    resolve_bind_poses,
};
use pretty_assertions::assert_eq;
use std::path::PathBuf;

const EPSILON: f32 = 1e-5;

fn data(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join(name)
}

#[test]
fn test_load_exported_assets() {
    let armatures = load_armatures(data("armature.json")).unwrap();
    let actions = load_actions(data("actions.json")).unwrap();
    let meshes = load_meshes(data("cube.json")).unwrap();

    let (name, armature) = select(&armatures, None, "armature").unwrap();
    assert_eq!(name, "Armature");
    assert_eq!(armature.bone_order(), &["Bone".to_string(), "Bone.001".to_string()]);

    let (_, cube_actions) = select(&actions, Some("Cube"), "mesh").unwrap();
    let (_, action) = select(cube_actions, Some("ArmatureAction"), "action").unwrap();
    assert_eq!(action.frame_span(), Some((1, 3)));

    assert_eq!(meshes["Cube"].vertices.len(), 6);
}

#[test]
fn test_resolve_exported_cube() {
    let armatures = load_armatures(data("armature.json")).unwrap();
    let actions = load_actions(data("actions.json")).unwrap();
    let armature = &armatures["Armature"];
    let action = &actions["Cube"]["ArmatureAction"];

    let table = resolve_bind_poses(armature, action, &ResolveOptions::default()).unwrap();

    // Frame 1 keys are identity, so both bones sit at their rest pose
    for bone in ["Bone", "Bone.001"] {
        let rest = armature.bone(bone).unwrap().matrix_local;
        assert!(table.get(bone, 1).unwrap().approx_eq(&rest, EPSILON), "{bone}");
    }

    let basis = action.track("Bone").unwrap().get(3).unwrap();
    let root = armature.bone("Bone").unwrap();
    assert_eq!(
        table.get("Bone", 3),
        Some(&root.matrix_local.multiply(basis))
    );
}

#[test]
fn test_pack_exported_cube() {
    let armatures = load_armatures(data("armature.json")).unwrap();
    let actions = load_actions(data("actions.json")).unwrap();
    let meshes = load_meshes(data("cube.json")).unwrap();
    let armature = &armatures["Armature"];
    let action = &actions["Cube"]["ArmatureAction"];
    let skins = meshes["Cube"].skins();

    let table = resolve_bind_poses(armature, action, &ResolveOptions::default()).unwrap();
    let (buffers, mesh) =
        pack_skinning_buffers(armature, &table, &skins, &PackOptions::default()).unwrap();

    let influences: usize = skins.iter().map(|skin| skin.len()).sum();
    assert_eq!(influences, 10);
    assert_eq!(buffers.skin.len(), 2 * influences);

    // Vertex 5 is weighted 2.0 against a total of 2.0
    let last = mesh.vertex_attributes()[5];
    assert_eq!(last.bone_count, 1);
    assert_eq!(
        &buffers.skin[last.skin_offset..last.skin_offset + 2],
        &[0.0f32, 1.0]
    );

    assert_eq!(
        &buffers.inverted_matrices[16..32],
        armature
            .bone("Bone.001")
            .unwrap()
            .matrix_local_inverted
            .as_array()
    );
    assert_eq!(mesh.offsets().frame_count, 3);
}

#[test]
fn test_unknown_action_is_reported() {
    let actions = load_actions(data("actions.json")).unwrap();
    let result = select(&actions["Cube"], Some("Walk"), "action");
    assert!(matches!(result, Err(BindPoseError::UnknownAnimation(_))));
}

#[test]
fn test_missing_file_is_io_error() {
    let result = load_armatures(data("missing.json"));
    assert!(matches!(result, Err(BindPoseError::Io(_))));
}

#[test]
fn test_matrix_json_is_row_major() {
    let m: Matrix4f =
        serde_json::from_str("[1, 0, 0, 5, 0, 1, 0, 6, 0, 0, 1, 7, 0, 0, 0, 1]").unwrap();
    assert_eq!(m, Matrix4f::from_translation(5.0, 6.0, 7.0));
    assert_eq!(
        serde_json::to_string(&m).unwrap(),
        "[1.0,0.0,0.0,5.0,0.0,1.0,0.0,6.0,0.0,0.0,1.0,7.0,0.0,0.0,0.0,1.0]"
    );
}
