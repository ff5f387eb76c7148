//! The selection tree: a non-owning shadow of a project forest.

use bakery_loader::{NodeId, Project};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

/// Index of a shadow node within its [`SelectionTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TreeNodeId(pub(crate) usize);

impl TreeNodeId {
    /// Raw arena index, for diagnostics.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for TreeNodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

#[derive(Debug)]
pub(crate) struct ShadowNode {
    pub(crate) node: NodeId,
    pub(crate) parent: Option<TreeNodeId>,
    pub(crate) children: Vec<TreeNodeId>,
}

/// A 1:1 shadow of one project's forest, holding navigation structure only.
///
/// Shadow nodes are created once per forest node during [`build`](Self::build),
/// in the same relative order as the forest, and the whole tree is rebuilt
/// wholesale on a full reload - there is no incremental patching. Selection
/// values stay on the underlying plugins; the tree adds parent links, child
/// order, and the node-to-shadow index the engine needs for disable targets.
#[derive(Debug)]
pub struct SelectionTree {
    pub(crate) nodes: Vec<ShadowNode>,
    roots: Vec<TreeNodeId>,
    by_node: HashMap<NodeId, TreeNodeId>,
}

impl SelectionTree {
    /// Builds the shadow of a fully loaded project.
    #[must_use]
    pub fn build(project: &Project) -> Self {
        let mut tree = Self {
            nodes: Vec::with_capacity(project.node_count()),
            roots: Vec::new(),
            by_node: HashMap::with_capacity(project.node_count()),
        };
        for &root in project.roots() {
            let id = tree.add(project, root, None);
            tree.roots.push(id);
        }
        tree
    }

    fn add(&mut self, project: &Project, node: NodeId, parent: Option<TreeNodeId>) -> TreeNodeId {
        let id = TreeNodeId(self.nodes.len());
        self.nodes.push(ShadowNode {
            node,
            parent,
            children: Vec::new(),
        });
        self.by_node.insert(node, id);
        if let Some(parent) = parent {
            self.nodes[parent.0].children.push(id);
        }
        for &child in project.children(node) {
            self.add(project, child, Some(id));
        }
        id
    }

    /// Top-level shadow nodes, in forest order.
    #[must_use]
    pub fn roots(&self) -> &[TreeNodeId] {
        &self.roots
    }

    /// The forest node a shadow node mirrors.
    #[must_use]
    pub fn node_id(&self, id: TreeNodeId) -> Option<NodeId> {
        self.nodes.get(id.0).map(|n| n.node)
    }

    /// Shadow of a forest node.
    #[must_use]
    pub fn shadow_of(&self, node: NodeId) -> Option<TreeNodeId> {
        self.by_node.get(&node).copied()
    }

    /// Parent shadow node.
    #[must_use]
    pub fn parent(&self, id: TreeNodeId) -> Option<TreeNodeId> {
        self.nodes.get(id.0).and_then(|n| n.parent)
    }

    /// Ordered child shadow nodes (empty for unknown ids).
    #[must_use]
    pub fn children(&self, id: TreeNodeId) -> &[TreeNodeId] {
        self.nodes.get(id.0).map_or(&[], |n| n.children.as_slice())
    }

    /// Looks a shadow node up through the project's path index.
    #[must_use]
    pub fn find_by_path(&self, project: &Project, path: &Path) -> Option<TreeNodeId> {
        project.find_by_path(path).and_then(|n| self.shadow_of(n))
    }

    /// Number of shadow nodes.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when the shadowed forest had no nodes.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
