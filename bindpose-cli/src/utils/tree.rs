//! Tree rendering for bone hierarchies

use console::Style;
use std::collections::BTreeMap;

/// A node in a rendered tree
#[derive(Debug, Clone)]
pub struct TreeNode {
    pub name: String,
    pub node_type: NodeType,
    pub children: Vec<TreeNode>,
    pub metadata: BTreeMap<String, String>,
}

/// Types of nodes in the tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    Armature,
    Bone,
    /// A bone with keyframes in the selected action
    AnimatedBone,
}

/// Options for tree rendering
#[derive(Debug, Clone)]
pub struct TreeOptions {
    pub max_depth: Option<usize>,
    pub no_color: bool,
    pub show_metadata: bool,
    pub compact: bool,
}

impl Default for TreeOptions {
    fn default() -> Self {
        Self {
            max_depth: None,
            no_color: false,
            show_metadata: true,
            compact: false,
        }
    }
}

impl TreeNode {
    /// Create a new tree node
    pub fn new(name: impl Into<String>, node_type: NodeType) -> Self {
        Self {
            name: name.into(),
            node_type,
            children: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }

    /// Add a child node
    pub fn add_child(mut self, child: TreeNode) -> Self {
        self.children.push(child);
        self
    }

    /// Add metadata
    pub fn with_metadata(mut self, key: &str, value: impl ToString) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }
}

impl NodeType {
    /// Marker printed before the node name
    pub fn icon(self) -> &'static str {
        match self {
            NodeType::Armature => "🦴",
            NodeType::Bone => "○",
            NodeType::AnimatedBone => "●",
        }
    }

    /// Color style for the node name
    pub fn style(self, no_color: bool) -> Style {
        if no_color {
            Style::new()
        } else {
            match self {
                NodeType::Armature => Style::new().bold().cyan(),
                NodeType::Bone => Style::new().dim(),
                NodeType::AnimatedBone => Style::new().green(),
            }
        }
    }
}

/// Render a tree structure to string
pub fn render_tree(root: &TreeNode, options: &TreeOptions) -> String {
    let mut output = String::new();
    render_node(root, &mut output, "", true, 0, options);
    output
}

fn render_node(
    node: &TreeNode,
    output: &mut String,
    prefix: &str,
    is_last: bool,
    depth: usize,
    options: &TreeOptions,
) {
    if let Some(max_depth) = options.max_depth
        && depth > max_depth
    {
        return;
    }

    let style = node.node_type.style(options.no_color);
    let connector = if depth == 0 {
        ""
    } else if is_last {
        "└── "
    } else {
        "├── "
    };

    let mut line = format!(
        "{}{}{} {}",
        prefix,
        connector,
        node.node_type.icon(),
        style.apply_to(&node.name)
    );

    if options.show_metadata && options.compact && !node.metadata.is_empty() {
        let parts: Vec<String> = node
            .metadata
            .iter()
            .map(|(key, value)| format!("{key}:{value}"))
            .collect();
        line.push_str(&format!(" [{}]", parts.join(", ")));
    }

    output.push_str(&line);
    output.push('\n');

    let child_prefix = if depth == 0 {
        String::new()
    } else {
        format!("{}{}", prefix, if is_last { "    " } else { "│   " })
    };

    if options.show_metadata && !options.compact {
        let meta_style = if options.no_color {
            Style::new()
        } else {
            Style::new().dim()
        };
        for (key, value) in &node.metadata {
            output.push_str(&format!(
                "{}    {}: {}\n",
                child_prefix,
                meta_style.apply_to(key),
                value
            ));
        }
    }

    for (i, child) in node.children.iter().enumerate() {
        let is_last_child = i == node.children.len() - 1;
        render_node(
            child,
            output,
            &child_prefix,
            is_last_child,
            depth + 1,
            options,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TreeNode {
        TreeNode::new("Armature", NodeType::Armature)
            .with_metadata("bones", 3)
            .add_child(
                TreeNode::new("Hip", NodeType::AnimatedBone)
                    .with_metadata("index", 0)
                    .add_child(TreeNode::new("Spine", NodeType::Bone).with_metadata("index", 2)),
            )
            .add_child(TreeNode::new("Prop", NodeType::Bone).with_metadata("index", 1))
    }

    #[test]
    fn test_tree_rendering() {
        let options = TreeOptions {
            no_color: true,
            show_metadata: false,
            ..TreeOptions::default()
        };
        let output = render_tree(&sample(), &options);
        let lines: Vec<&str> = output.lines().collect();

        assert_eq!(lines[0], "🦴 Armature");
        assert_eq!(lines[1], "├── ● Hip");
        assert_eq!(lines[2], "│   └── ○ Spine");
        assert_eq!(lines[3], "└── ○ Prop");
    }

    #[test]
    fn test_compact_metadata() {
        let options = TreeOptions {
            no_color: true,
            compact: true,
            ..TreeOptions::default()
        };
        let output = render_tree(&sample(), &options);
        assert!(output.contains("● Hip [index:0]"));
        assert!(output.contains("🦴 Armature [bones:3]"));
    }

    #[test]
    fn test_max_depth() {
        let options = TreeOptions {
            max_depth: Some(1),
            no_color: true,
            show_metadata: false,
            ..TreeOptions::default()
        };
        let output = render_tree(&sample(), &options);
        assert!(output.contains("Hip"));
        assert!(!output.contains("Spine"));
    }
}
