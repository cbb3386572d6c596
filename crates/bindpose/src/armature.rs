//! Armature model: named bones linked by parent-name references
//!
//! Bones refer to their parent by name only; the armature owns every bone.
//! Parent references and acyclicity are validated once, when the armature is
//! built, and the result is cached as an explicit [`Skeleton`] tree so later
//! passes never have to chase names or guard against loops.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use crate::error::{BindPoseError, Result};
use crate::matrix::Matrix4f;

/// A single bone in its rest pose
#[derive(Debug, Clone, PartialEq)]
pub struct Bone {
    /// Bone name, unique within its armature
    pub name: String,
    /// Parent bone name (`None` for a root bone)
    pub parent_name: Option<String>,
    /// Rest-pose local transform
    pub matrix_local: Matrix4f,
    /// Precomputed inverse of `matrix_local`, supplied by the exporter
    pub matrix_local_inverted: Matrix4f,
}

impl Bone {
    /// Create a root bone
    pub fn new(
        name: impl Into<String>,
        matrix_local: Matrix4f,
        matrix_local_inverted: Matrix4f,
    ) -> Self {
        Self {
            name: name.into(),
            parent_name: None,
            matrix_local,
            matrix_local_inverted,
        }
    }

    /// Set the parent bone name
    ///
    /// An empty name means "no parent", matching exported assets that write
    /// `""` for root bones.
    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        let parent = parent.into();
        self.parent_name = if parent.is_empty() { None } else { Some(parent) };
        self
    }

    /// Whether this bone has no parent
    pub fn is_root(&self) -> bool {
        self.parent_name.is_none()
    }
}

/// Explicit bone tree derived from an armature's parent references
///
/// Bones are stored in hierarchy order: every parent precedes its children,
/// roots come first, siblings are ordered by name.
#[derive(Debug, Clone, Default)]
pub struct Skeleton {
    names: Vec<String>,
    parents: Vec<Option<usize>>,
    children: Vec<Vec<usize>>,
    depths: Vec<usize>,
    index_of: HashMap<String, usize>,
}

impl Skeleton {
    /// Build the tree, rejecting dangling parents and cycles
    fn build(bones: &BTreeMap<String, Bone>) -> Result<Self> {
        for bone in bones.values() {
            if let Some(parent) = &bone.parent_name
                && !bones.contains_key(parent)
            {
                return Err(BindPoseError::UnknownParent {
                    bone: bone.name.clone(),
                    parent: parent.clone(),
                });
            }
        }

        let mut child_names: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        let mut queue: VecDeque<(&str, Option<usize>, usize)> = VecDeque::new();
        for bone in bones.values() {
            match &bone.parent_name {
                Some(parent) => child_names.entry(parent.as_str()).or_default().push(&bone.name),
                None => queue.push_back((&bone.name, None, 0)),
            }
        }

        let mut skeleton = Self::default();
        while let Some((name, parent, depth)) = queue.pop_front() {
            let index = skeleton.names.len();
            skeleton.names.push(name.to_string());
            skeleton.parents.push(parent);
            skeleton.children.push(Vec::new());
            skeleton.depths.push(depth);
            skeleton.index_of.insert(name.to_string(), index);
            if let Some(parent) = parent {
                skeleton.children[parent].push(index);
            }

            if let Some(children) = child_names.get(name) {
                for &child in children {
                    queue.push_back((child, Some(index), depth + 1));
                }
            }
        }

        // Bones on a parent cycle are never reached from a root
        if skeleton.names.len() != bones.len() {
            let bone = find_cycle(bones, &skeleton.index_of);
            return Err(BindPoseError::CyclicHierarchy { bone });
        }

        Ok(skeleton)
    }

    /// Number of bones
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the skeleton has no bones
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Bone names in hierarchy order
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Hierarchy index of a bone
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index_of.get(name).copied()
    }

    /// Name of the bone at a hierarchy index
    pub fn name(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    /// Parent index of the bone at `index`
    pub fn parent(&self, index: usize) -> Option<usize> {
        self.parents.get(index).copied().flatten()
    }

    /// Child indices of the bone at `index`
    pub fn children(&self, index: usize) -> &[usize] {
        self.children.get(index).map_or(&[], Vec::as_slice)
    }

    /// Distance from the root (roots have depth 0)
    pub fn depth(&self, index: usize) -> usize {
        self.depths.get(index).copied().unwrap_or(0)
    }

    /// Indices of root bones
    pub fn roots(&self) -> impl Iterator<Item = usize> + '_ {
        self.parents
            .iter()
            .enumerate()
            .filter(|(_, parent)| parent.is_none())
            .map(|(index, _)| index)
    }
}

/// Walk parent links from the first unreached bone until a bone repeats
fn find_cycle(bones: &BTreeMap<String, Bone>, reached: &HashMap<String, usize>) -> String {
    let Some(start) = bones.keys().find(|name| !reached.contains_key(*name)) else {
        return String::new();
    };

    let mut seen: Vec<&str> = Vec::new();
    let mut current = start.as_str();
    loop {
        if seen.contains(&current) {
            return current.to_string();
        }
        seen.push(current);
        match bones.get(current).and_then(|b| b.parent_name.as_deref()) {
            Some(parent) => current = parent,
            None => return start.clone(),
        }
    }
}

/// A named skeleton in its rest pose
#[derive(Debug, Clone)]
pub struct Armature {
    name: String,
    bones: BTreeMap<String, Bone>,
    bone_order: Vec<String>,
    skeleton: Skeleton,
}

impl Armature {
    /// Build and validate an armature from a list of bones
    ///
    /// The bone index order defaults to lexicographic by name.
    pub fn new(name: impl Into<String>, bones: impl IntoIterator<Item = Bone>) -> Result<Self> {
        let mut map = BTreeMap::new();
        for bone in bones {
            if map.contains_key(&bone.name) {
                return Err(BindPoseError::DuplicateBone(bone.name));
            }
            map.insert(bone.name.clone(), bone);
        }
        Self::build(name.into(), map)
    }

    /// Build and validate an armature from a name-keyed bone map
    pub fn from_map(name: impl Into<String>, bones: BTreeMap<String, Bone>) -> Result<Self> {
        for (key, bone) in &bones {
            if key != &bone.name {
                return Err(BindPoseError::BoneNameMismatch {
                    key: key.clone(),
                    name: bone.name.clone(),
                });
            }
        }
        Self::build(name.into(), bones)
    }

    fn build(name: String, bones: BTreeMap<String, Bone>) -> Result<Self> {
        let skeleton = Skeleton::build(&bones)?;
        let bone_order = bones.keys().cloned().collect();

        log::debug!(
            "Armature '{}': {} bones, {} roots",
            name,
            skeleton.len(),
            skeleton.roots().count()
        );

        Ok(Self {
            name,
            bones,
            bone_order,
            skeleton,
        })
    }

    /// Replace the default lexicographic bone order with an explicit one
    ///
    /// `order` must name every bone exactly once.
    pub fn with_bone_order(mut self, order: Vec<String>) -> Result<Self> {
        if order.len() != self.bones.len() {
            return Err(BindPoseError::InvalidBoneOrder(format!(
                "expected {} bones, got {}",
                self.bones.len(),
                order.len()
            )));
        }

        let mut seen = HashSet::with_capacity(order.len());
        for name in &order {
            if !self.bones.contains_key(name) {
                return Err(BindPoseError::InvalidBoneOrder(format!(
                    "unknown bone '{name}'"
                )));
            }
            if !seen.insert(name.as_str()) {
                return Err(BindPoseError::InvalidBoneOrder(format!(
                    "bone '{name}' listed twice"
                )));
            }
        }

        self.bone_order = order;
        Ok(self)
    }

    /// Armature name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of bones
    pub fn len(&self) -> usize {
        self.bones.len()
    }

    /// Whether the armature has no bones
    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    /// Look up a bone by name
    pub fn bone(&self, name: &str) -> Option<&Bone> {
        self.bones.get(name)
    }

    /// Whether a bone with this name exists
    pub fn contains(&self, name: &str) -> bool {
        self.bones.contains_key(name)
    }

    /// Bones in index order
    pub fn bones(&self) -> impl Iterator<Item = &Bone> + '_ {
        self.bone_order.iter().filter_map(|name| self.bones.get(name))
    }

    /// Deterministic order used to assign bone indices
    pub fn bone_order(&self) -> &[String] {
        &self.bone_order
    }

    /// Parent of a bone, if it has one
    pub fn parent(&self, name: &str) -> Option<&Bone> {
        self.bones
            .get(name)
            .and_then(|bone| bone.parent_name.as_deref())
            .and_then(|parent| self.bones.get(parent))
    }

    /// Names of the bone's direct children, sorted by name
    pub fn children(&self, name: &str) -> Vec<&str> {
        self.skeleton.index_of(name).map_or_else(Vec::new, |index| {
            self.skeleton
                .children(index)
                .iter()
                .filter_map(|&child| self.skeleton.name(child))
                .collect()
        })
    }

    /// Root bones, sorted by name
    pub fn roots(&self) -> Vec<&Bone> {
        self.skeleton
            .roots()
            .filter_map(|index| self.skeleton.name(index))
            .filter_map(|name| self.bones.get(name))
            .collect()
    }

    /// Distance of a bone from its root
    pub fn depth(&self, name: &str) -> Option<usize> {
        self.skeleton.index_of(name).map(|index| self.skeleton.depth(index))
    }

    /// The validated bone tree
    pub fn skeleton(&self) -> &Skeleton {
        &self.skeleton
    }
}
