//! Project forests: arena-allocated plugin trees with a path index.
//!
//! Parent/child navigation uses arena indices instead of owned
//! back-references, which keeps the forest acyclic by construction and
//! upward walks O(1) per step. Nodes are only ever appended during
//! enumeration, never relinked across parents.

use crate::error::{LoadError, Result};
use bakery_core::{Plugin, PluginKind, Variables, declare};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Index of a node within its project's arena.
///
/// Ids are only meaningful for the project that produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// Raw arena index, for diagnostics.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One slot of the project forest.
///
/// The skeleton fields (path, kind, level) are fixed by the enumeration
/// pass; the payload arrives when the node's load stage completes. A node
/// whose load failed keeps its slot with the error recorded - its missing
/// payload (and thus missing section table) is what suppresses run/edit
/// actions downstream.
#[derive(Debug, Clone)]
pub struct PluginNode {
    path: PathBuf,
    short_path: String,
    kind: PluginKind,
    level: u32,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    plugin: Option<Plugin>,
    error: Option<String>,
}

impl PluginNode {
    /// Absolute path of the underlying file or directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Display path relative to the load root.
    #[must_use]
    pub fn short_path(&self) -> &str {
        &self.short_path
    }

    /// Node kind fixed at enumeration time.
    #[must_use]
    pub const fn kind(&self) -> PluginKind {
        self.kind
    }

    /// Nesting level below the load root.
    #[must_use]
    pub const fn level(&self) -> u32 {
        self.level
    }

    /// Parent node, `None` for project roots.
    #[must_use]
    pub const fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Ordered child nodes.
    #[must_use]
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// The loaded payload, absent until the node's stage completes (or
    /// forever, when the load failed).
    #[must_use]
    pub const fn plugin(&self) -> Option<&Plugin> {
        self.plugin.as_ref()
    }

    /// The recorded per-item load error, if any.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

/// An ordered forest of plugin nodes under one project directory.
///
/// Alongside the arena the project keeps a flat path index for O(1)
/// disable-target lookup and the variable table used to expand paths
/// declared inside its plugins.
#[derive(Debug, Clone)]
pub struct Project {
    name: String,
    root_dir: PathBuf,
    nodes: Vec<PluginNode>,
    roots: Vec<NodeId>,
    by_path: HashMap<PathBuf, NodeId>,
    variables: Variables,
    main_node: Option<NodeId>,
}

impl Project {
    pub(crate) fn new(name: String, root_dir: PathBuf, variables: Variables) -> Self {
        Self {
            name,
            root_dir,
            nodes: Vec::new(),
            roots: Vec::new(),
            by_path: HashMap::new(),
            variables,
            main_node: None,
        }
    }

    /// Appends a Directory node (payload available immediately).
    pub(crate) fn push_directory(
        &mut self,
        parent: Option<NodeId>,
        path: PathBuf,
        short_path: String,
        level: u32,
    ) -> NodeId {
        let plugin = Plugin::directory(path.clone(), short_path.clone(), level);
        self.push(PluginNode {
            path,
            short_path,
            kind: PluginKind::Directory,
            level,
            parent,
            children: Vec::new(),
            plugin: Some(plugin),
            error: None,
        })
    }

    /// Appends a Plugin or Link skeleton whose payload a load stage fills in.
    pub(crate) fn push_pending(
        &mut self,
        parent: Option<NodeId>,
        path: PathBuf,
        short_path: String,
        kind: PluginKind,
        level: u32,
    ) -> NodeId {
        self.push(PluginNode {
            path,
            short_path,
            kind,
            level,
            parent,
            children: Vec::new(),
            plugin: None,
            error: None,
        })
    }

    fn push(&mut self, node: PluginNode) -> NodeId {
        let id = NodeId(self.nodes.len());
        let parent = node.parent;
        self.by_path.insert(node.path.clone(), id);
        self.nodes.push(node);
        match parent {
            Some(p) => self.nodes[p.0].children.push(id),
            None => self.roots.push(id),
        }
        id
    }

    pub(crate) fn set_plugin(&mut self, id: NodeId, plugin: Plugin) {
        if plugin.main_level && self.main_node.is_none() {
            self.main_node = Some(id);
        }
        let node = &mut self.nodes[id.0];
        node.error = None;
        node.plugin = Some(plugin);
    }

    pub(crate) fn set_error(&mut self, id: NodeId, message: String) {
        let node = &mut self.nodes[id.0];
        node.plugin = None;
        node.error = Some(message);
    }

    /// Project name (its directory name under the load root).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The project's directory.
    #[must_use]
    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// Variable table for expanding declared paths.
    #[must_use]
    pub const fn variables(&self) -> &Variables {
        &self.variables
    }

    /// Top-level nodes, in enumeration order.
    #[must_use]
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// Looks a node up by id.
    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&PluginNode> {
        self.nodes.get(id.0)
    }

    /// Child list of a node (empty for unknown ids).
    #[must_use]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes.get(id.0).map_or(&[], |n| n.children.as_slice())
    }

    /// Parent of a node.
    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id.0).and_then(|n| n.parent)
    }

    /// Loaded payload of a node.
    #[must_use]
    pub fn plugin(&self, id: NodeId) -> Option<&Plugin> {
        self.nodes.get(id.0).and_then(|n| n.plugin.as_ref())
    }

    /// Mutable payload access; the selection engine writes states through
    /// this.
    #[must_use]
    pub fn plugin_mut(&mut self, id: NodeId) -> Option<&mut Plugin> {
        self.nodes.get_mut(id.0).and_then(|n| n.plugin.as_mut())
    }

    /// O(1) lookup of a node by absolute path.
    #[must_use]
    pub fn find_by_path(&self, path: &Path) -> Option<NodeId> {
        self.by_path.get(path).copied()
    }

    /// The project's main-level plugin (`script.project`), once loaded.
    #[must_use]
    pub const fn main_node(&self) -> Option<NodeId> {
        self.main_node
    }

    /// Number of loaded main-level plugins.
    #[must_use]
    pub fn main_level_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| n.plugin.as_ref().is_some_and(|p| p.main_level))
            .count()
    }

    /// Total number of nodes (directories included).
    #[must_use]
    pub const fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Iterates all nodes in arena order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &PluginNode)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }

    /// Re-reads and re-parses one plugin in place, bypassing the cache.
    ///
    /// Used after an on-disk edit; siblings are untouched. Refreshing a
    /// Link node re-parses its declaration only - the spliced target
    /// content returns with the next full load.
    ///
    /// # Errors
    ///
    /// * [`LoadError::UnknownNode`] - the id does not name a node
    /// * [`LoadError::Declaration`] - the file no longer parses
    /// * [`LoadError::Io`] - the file cannot be read
    pub fn refresh_plugin(&mut self, id: NodeId) -> Result<()> {
        let (path, short_path, kind, level) = {
            let node = self
                .nodes
                .get(id.0)
                .ok_or(LoadError::UnknownNode { index: id.0 })?;
            (
                node.path.clone(),
                node.short_path.clone(),
                node.kind,
                node.level,
            )
        };
        if kind == PluginKind::Directory {
            return Ok(());
        }
        let text = fs::read_to_string(&path)?;
        let plugin = declare::parse_plugin(&path, &short_path, kind, level, &text)?;
        tracing::debug!(path = %path.display(), "plugin refreshed");
        self.set_plugin(id, plugin);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bakery_core::SelectedState;

    fn skeleton_project() -> (Project, NodeId, NodeId, NodeId) {
        let mut project = Project::new(
            "Proj".to_string(),
            PathBuf::from("/base/Proj"),
            Variables::new(),
        );
        let dir = project.push_directory(
            None,
            PathBuf::from("/base/Proj/Apps"),
            "Proj/Apps".into(),
            1,
        );
        let a = project.push_pending(
            Some(dir),
            PathBuf::from("/base/Proj/Apps/a.script"),
            "Proj/Apps/a.script".into(),
            PluginKind::Plugin,
            2,
        );
        let b = project.push_pending(
            Some(dir),
            PathBuf::from("/base/Proj/Apps/b.script"),
            "Proj/Apps/b.script".into(),
            PluginKind::Plugin,
            2,
        );
        (project, dir, a, b)
    }

    #[test]
    fn arena_wires_parents_and_children() {
        let (project, dir, a, b) = skeleton_project();
        assert_eq!(project.roots(), &[dir]);
        assert_eq!(project.children(dir), &[a, b]);
        assert_eq!(project.parent(a), Some(dir));
        assert_eq!(project.parent(dir), None);
        assert_eq!(project.node_count(), 3);
    }

    #[test]
    fn path_index_finds_nodes() {
        let (project, _, a, _) = skeleton_project();
        assert_eq!(
            project.find_by_path(Path::new("/base/Proj/Apps/a.script")),
            Some(a)
        );
        assert_eq!(project.find_by_path(Path::new("/base/Proj/nope")), None);
    }

    #[test]
    fn pending_nodes_have_no_payload() {
        let (project, dir, a, _) = skeleton_project();
        assert!(project.plugin(a).is_none());
        // Directories carry their payload immediately.
        let d = project.plugin(dir).unwrap();
        assert_eq!(d.kind, PluginKind::Directory);
        assert_eq!(d.selected, SelectedState::Deselected);
    }

    #[test]
    fn set_error_marks_but_keeps_node() {
        let (mut project, _, a, _) = skeleton_project();
        project.set_error(a, "missing [Main] section".to_string());
        let node = project.node(a).unwrap();
        assert!(node.plugin().is_none());
        assert_eq!(node.error(), Some("missing [Main] section"));
        assert_eq!(project.node_count(), 3);
    }

    #[test]
    fn refresh_unknown_node_is_rejected() {
        let (mut project, ..) = skeleton_project();
        let err = project.refresh_plugin(NodeId(99)).unwrap_err();
        assert!(matches!(err, LoadError::UnknownNode { index: 99 }));
    }
}
