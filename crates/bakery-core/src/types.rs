//! Plugin data model.
//!
//! [`Plugin`] is the in-memory representation of one declaration file, shared
//! between the loader (which builds it), the cache (which serializes it), and
//! the selection tree (which reads and writes its selection value).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Name of the metadata section every plugin declaration must carry.
pub const MAIN_SECTION: &str = "Main";

/// Key under `[Main]` that seeds and persists the selection state.
pub const SELECTED_KEY: &str = "Selected";

/// Key under `[Main]` listing plugin paths to deselect when this plugin is
/// selected.
pub const DISABLE_KEY: &str = "Disable";

/// Key under `[Main]` naming a link plugin's target path.
pub const LINK_KEY: &str = "Link";

/// File extension of ordinary plugin declarations.
pub const SCRIPT_EXT: &str = "script";

/// File extension of link plugins, resolved in the second load stage.
pub const LINK_EXT: &str = "link";

/// File name of a project's main-level plugin, located at the project root.
pub const PROJECT_SCRIPT: &str = "script.project";

/// What kind of node a plugin occupies in the project forest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PluginKind {
    /// A grouping directory. Carries no declaration and no checkbox.
    Directory,
    /// An ordinary plugin declaration (`.script`).
    Plugin,
    /// A link whose content is inherited from another plugin (`.link`).
    /// Its resolved section table is populated only after the second load
    /// stage completes.
    Link,
}

impl fmt::Display for PluginKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Directory => write!(f, "directory"),
            Self::Plugin => write!(f, "plugin"),
            Self::Link => write!(f, "link"),
        }
    }
}

/// Tri-state selection value of a plugin node.
///
/// `NotSelectable` is terminal: a node in this state carries no checkbox and
/// never changes due to parent or child activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SelectedState {
    /// The node is checked.
    Selected,
    /// The node is unchecked.
    Deselected,
    /// The node has no checkbox and is excluded from all propagation.
    NotSelectable,
}

impl SelectedState {
    /// Parses the declared `Selected` value.
    ///
    /// `"True"` seeds `Selected`, `"None"` seeds `NotSelectable`, anything
    /// else (including a missing key) seeds `Deselected`. Matching is
    /// case-insensitive, as the declaration format is hand-edited.
    #[must_use]
    pub fn from_declared(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.eq_ignore_ascii_case("true") => Self::Selected,
            Some(v) if v.eq_ignore_ascii_case("none") => Self::NotSelectable,
            _ => Self::Deselected,
        }
    }

    /// Returns the on-disk spelling of this state for the `Selected` key.
    #[must_use]
    pub const fn as_declared(self) -> &'static str {
        match self {
            Self::Selected => "True",
            Self::Deselected => "False",
            Self::NotSelectable => "None",
        }
    }

    /// Returns true when the node carries a checkbox at all.
    #[must_use]
    pub const fn is_selectable(self) -> bool {
        !matches!(self, Self::NotSelectable)
    }
}

impl fmt::Display for SelectedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_declared())
    }
}

/// In-memory representation of one plugin declaration file.
///
/// Built by [`crate::declare::parse_plugin`], adopted verbatim from the cache
/// on a fingerprint match, and mutated only through the selection engine
/// (its [`selected`](Self::selected) field).
///
/// Invariants:
/// - `kind == Directory` implies an empty section table and no
///   selection-affecting content of its own; a directory's checkbox exists
///   purely to group-toggle its descendants.
/// - `kind == Link` implies `sections` holds the *target's* content once the
///   second load stage has resolved it, and is empty before that.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plugin {
    /// Absolute path of the declaration file (or directory).
    pub full_path: PathBuf,
    /// Display path relative to the load root.
    pub short_path: String,
    /// Node kind; fixed at enumeration time from extension/location.
    pub kind: PluginKind,
    /// Declared `Title`, defaulting to the file stem.
    pub title: String,
    /// Declared `Description`, possibly empty.
    pub description: String,
    /// Declared `Author`, possibly empty.
    pub author: String,
    /// Declared `Version`, defaulting to `"1"`.
    pub version: String,
    /// Nesting level below the load root.
    pub level: u32,
    /// True for the project's primary entry plugin (`script.project`).
    pub main_level: bool,
    /// Declared `Mandatory` flag; mandatory nodes are immune to propagation.
    pub mandatory: bool,
    /// Current tri-state selection value.
    pub selected: SelectedState,
    /// `[Main]` key/value table, keys lower-cased.
    pub main: BTreeMap<String, String>,
    /// Named body sections with their raw, uninterpreted lines.
    pub sections: BTreeMap<String, Vec<String>>,
    /// Raw (unexpanded) link target, present only for `kind == Link`.
    pub link_target: Option<String>,
}

impl Plugin {
    /// Creates a Directory node for a grouping folder.
    ///
    /// Directories have no declaration file and no section table. They do
    /// carry a checkbox (seeded unchecked) so that toggling a folder drives
    /// every plugin beneath it and checked children light their folder up.
    #[must_use]
    pub fn directory(full_path: PathBuf, short_path: String, level: u32) -> Self {
        let title = full_path
            .file_name()
            .map_or_else(|| short_path.clone(), |n| n.to_string_lossy().into_owned());
        Self {
            full_path,
            short_path,
            kind: PluginKind::Directory,
            title,
            description: String::new(),
            author: String::new(),
            version: String::new(),
            level,
            main_level: false,
            mandatory: false,
            selected: SelectedState::Deselected,
            main: BTreeMap::new(),
            sections: BTreeMap::new(),
            link_target: None,
        }
    }

    /// Returns the raw lines of a named section, if present.
    #[must_use]
    pub fn section(&self, name: &str) -> Option<&[String]> {
        self.sections.get(name).map(Vec::as_slice)
    }

    /// Returns true if the plugin carries the named body section.
    ///
    /// A node whose load failed has no section table at all, which is what
    /// suppresses run/edit actions downstream.
    #[must_use]
    pub fn has_section(&self, name: &str) -> bool {
        self.sections.contains_key(name)
    }

    /// Returns a `[Main]` value by key (case-insensitive).
    #[must_use]
    pub fn main_value(&self, key: &str) -> Option<&str> {
        self.main.get(&key.to_ascii_lowercase()).map(String::as_str)
    }

    /// Returns the raw (unexpanded) paths listed by the disable directive.
    ///
    /// The list is comma-separated in the declaration; empty entries are
    /// dropped. An absent key yields an empty list.
    #[must_use]
    pub fn disable_paths(&self) -> Vec<String> {
        self.main_value(DISABLE_KEY).map_or_else(Vec::new, |raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        })
    }

    /// Returns true when the node carries a checkbox.
    #[must_use]
    pub const fn is_selectable(&self) -> bool {
        self.selected.is_selectable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selected_state_from_declared() {
        assert_eq!(
            SelectedState::from_declared(Some("True")),
            SelectedState::Selected
        );
        assert_eq!(
            SelectedState::from_declared(Some("true")),
            SelectedState::Selected
        );
        assert_eq!(
            SelectedState::from_declared(Some("False")),
            SelectedState::Deselected
        );
        assert_eq!(
            SelectedState::from_declared(Some("None")),
            SelectedState::NotSelectable
        );
        assert_eq!(
            SelectedState::from_declared(Some("garbage")),
            SelectedState::Deselected
        );
        assert_eq!(SelectedState::from_declared(None), SelectedState::Deselected);
    }

    #[test]
    fn selected_state_roundtrip() {
        for state in [
            SelectedState::Selected,
            SelectedState::Deselected,
            SelectedState::NotSelectable,
        ] {
            assert_eq!(SelectedState::from_declared(Some(state.as_declared())), state);
        }
    }

    #[test]
    fn not_selectable_is_not_selectable() {
        assert!(SelectedState::Selected.is_selectable());
        assert!(SelectedState::Deselected.is_selectable());
        assert!(!SelectedState::NotSelectable.is_selectable());
    }

    #[test]
    fn directory_node_shape() {
        let dir = Plugin::directory(PathBuf::from("/base/proj/Apps"), "proj/Apps".into(), 2);
        assert_eq!(dir.kind, PluginKind::Directory);
        assert_eq!(dir.title, "Apps");
        assert_eq!(dir.selected, SelectedState::Deselected);
        assert!(dir.sections.is_empty());
        assert!(!dir.mandatory);
    }

    #[test]
    fn disable_paths_splits_and_trims() {
        let mut plugin = Plugin::directory(PathBuf::from("/p"), "p".into(), 0);
        plugin.main.insert(
            "disable".to_string(),
            "%BaseDir%/a.script , %BaseDir%/b.script,,".to_string(),
        );
        assert_eq!(
            plugin.disable_paths(),
            vec!["%BaseDir%/a.script", "%BaseDir%/b.script"]
        );
    }

    #[test]
    fn disable_paths_empty_without_key() {
        let plugin = Plugin::directory(PathBuf::from("/p"), "p".into(), 0);
        assert!(plugin.disable_paths().is_empty());
    }
}
