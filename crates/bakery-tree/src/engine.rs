//! Selection propagation and the disable directive.

use crate::observer::{NullObserver, SelectionObserver};
use crate::tree::{SelectionTree, TreeNodeId};
use bakery_core::{
    MAIN_SECTION, PluginKind, SELECTED_KEY, SelectedState, clean_declared_path, declare,
    normalize_separators,
};
use bakery_loader::Project;
use std::path::{Path, PathBuf};

/// What happened to one declared disable target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisableOutcome {
    /// The path exactly as declared (unexpanded).
    pub declared: String,
    /// The expanded, normalized path that was looked up.
    pub path: PathBuf,
    /// Result of processing this target.
    pub status: DisableStatus,
}

/// Per-target result of the disable directive.
///
/// No variant aborts the remaining targets; every failure is recorded and
/// logged rather than thrown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisableStatus {
    /// The target was deselected and its declaration rewritten on disk.
    Applied,
    /// The expanded path named no node in this project.
    TargetMissing,
    /// The target exists but is a directory, mandatory, or checkbox-less;
    /// it was left untouched.
    TargetProtected,
    /// The in-memory deselect applied but the `Selected=False` write failed.
    PersistFailed(String),
}

impl SelectionTree {
    /// Sets a node's checkbox and runs the full propagation pass.
    ///
    /// Equivalent to [`set_selected_observed`](Self::set_selected_observed)
    /// with a [`NullObserver`].
    pub fn set_selected(
        &self,
        project: &mut Project,
        id: TreeNodeId,
        value: bool,
    ) -> Vec<DisableOutcome> {
        self.set_selected_observed(project, id, value, &mut NullObserver)
    }

    /// Sets a node's checkbox, notifying `observer` of every state change.
    ///
    /// The pass runs in a fixed order: the source transition, the disable
    /// directives of nodes that transitioned into selected, the top-down
    /// cascade over descendants, then one bottom-up inference walk from the
    /// source's parent to the root. The call returns only after the whole
    /// pass reached its fixed point.
    ///
    /// The request is ignored (empty outcome list, no changes) when the
    /// node is mandatory, carries no checkbox, or never loaded.
    pub fn set_selected_observed(
        &self,
        project: &mut Project,
        id: TreeNodeId,
        value: bool,
        observer: &mut dyn SelectionObserver,
    ) -> Vec<DisableOutcome> {
        let mut outcomes = Vec::new();
        let Some(shadow) = self.nodes.get(id.0) else {
            return outcomes;
        };
        let Some(plugin) = project.plugin(shadow.node) else {
            return outcomes;
        };
        if plugin.mandatory || !plugin.is_selectable() {
            return outcomes;
        }
        let state = if value {
            SelectedState::Selected
        } else {
            SelectedState::Deselected
        };

        let changed = self.apply_state(project, id, state, observer);
        if changed && value {
            self.run_disable_directive(project, id, observer, &mut outcomes);
        }

        self.cascade(project, id, state, observer, &mut outcomes);
        self.infer_upward(project, shadow.parent, observer);
        outcomes
    }

    /// Recomputes every inferable node bottom-up from its children.
    ///
    /// Used once after a tree is built so folder checkboxes reflect the
    /// seeded states of the plugins beneath them.
    pub fn infer_initial(&self, project: &mut Project, observer: &mut dyn SelectionObserver) {
        for &root in self.roots() {
            self.infer_subtree(project, root, observer);
        }
    }

    fn infer_subtree(
        &self,
        project: &mut Project,
        id: TreeNodeId,
        observer: &mut dyn SelectionObserver,
    ) {
        if self.nodes[id.0].children.is_empty() {
            return;
        }
        for &child in &self.nodes[id.0].children {
            self.infer_subtree(project, child, observer);
        }
        let any_selected = self.any_child_selected(project, id);
        let eligible = project
            .plugin(self.nodes[id.0].node)
            .is_some_and(|p| !p.mandatory && p.is_selectable());
        if eligible {
            let state = if any_selected {
                SelectedState::Selected
            } else {
                SelectedState::Deselected
            };
            self.apply_state(project, id, state, observer);
        }
    }

    /// Writes `state` through to the shadowed plugin; returns whether the
    /// value actually changed. Eligibility is the caller's business.
    fn apply_state(
        &self,
        project: &mut Project,
        id: TreeNodeId,
        state: SelectedState,
        observer: &mut dyn SelectionObserver,
    ) -> bool {
        let node = self.nodes[id.0].node;
        let Some(plugin) = project.plugin_mut(node) else {
            return false;
        };
        if plugin.selected == state {
            return false;
        }
        plugin.selected = state;
        observer.selection_changed(node, state);
        true
    }

    /// Top-down: drives every descendant that is selectable, non-mandatory,
    /// and not main-level. Ineligible nodes are left unchanged but do not
    /// stop the walk - plugins beneath an inert grouping node are still
    /// driven.
    fn cascade(
        &self,
        project: &mut Project,
        id: TreeNodeId,
        state: SelectedState,
        observer: &mut dyn SelectionObserver,
        outcomes: &mut Vec<DisableOutcome>,
    ) {
        for &child in &self.nodes[id.0].children {
            let node = self.nodes[child.0].node;
            let drivable = project
                .plugin(node)
                .is_some_and(|p| !p.mandatory && p.is_selectable() && !p.main_level);
            if drivable {
                let changed = self.apply_state(project, child, state, observer);
                if changed && state == SelectedState::Selected {
                    self.run_disable_directive(project, child, observer, outcomes);
                }
            }
            self.cascade(project, child, state, observer, outcomes);
        }
    }

    /// Bottom-up: each ancestor becomes the OR of its immediate children,
    /// unless it is mandatory or checkbox-less (left unchanged either way,
    /// the walk continues to the root).
    fn infer_upward(
        &self,
        project: &mut Project,
        from: Option<TreeNodeId>,
        observer: &mut dyn SelectionObserver,
    ) {
        let mut current = from;
        while let Some(id) = current {
            let any_selected = self.any_child_selected(project, id);
            let node = self.nodes[id.0].node;
            let eligible = project
                .plugin(node)
                .is_some_and(|p| !p.mandatory && p.is_selectable());
            if eligible {
                let state = if any_selected {
                    SelectedState::Selected
                } else {
                    SelectedState::Deselected
                };
                self.apply_state(project, id, state, observer);
            }
            current = self.nodes[id.0].parent;
        }
    }

    fn any_child_selected(&self, project: &Project, id: TreeNodeId) -> bool {
        self.nodes[id.0].children.iter().any(|c| {
            project
                .plugin(self.nodes[c.0].node)
                .is_some_and(|p| p.selected == SelectedState::Selected)
        })
    }

    /// Executes one node's disable directive.
    ///
    /// Each declared path is variable-expanded, normalized, and resolved
    /// through the project's path index. A found, unprotected target is
    /// persisted as `Selected=False` in its own declaration and forced to
    /// deselected in memory, followed by its own bottom-up walk. Disable is
    /// single-hop: the target's directives never fire in turn, which
    /// guarantees termination.
    fn run_disable_directive(
        &self,
        project: &mut Project,
        id: TreeNodeId,
        observer: &mut dyn SelectionObserver,
        outcomes: &mut Vec<DisableOutcome>,
    ) {
        let node = self.nodes[id.0].node;
        let declared = match project.plugin(node) {
            Some(plugin) => plugin.disable_paths(),
            None => return,
        };
        if declared.is_empty() {
            return;
        }

        let root_dir = project.root_dir().to_path_buf();
        let vars = project.variables().clone();

        for raw in declared {
            let expanded = normalize_separators(&vars.expand(&raw));
            let candidate = Path::new(&expanded);
            let target_path = if candidate.is_absolute() {
                clean_declared_path(candidate)
            } else {
                clean_declared_path(&root_dir.join(candidate))
            };

            let Some(target_node) = project.find_by_path(&target_path) else {
                tracing::warn!(target = %target_path.display(), "disable target not found");
                outcomes.push(DisableOutcome {
                    declared: raw,
                    path: target_path,
                    status: DisableStatus::TargetMissing,
                });
                continue;
            };
            let Some(target) = self.shadow_of(target_node) else {
                outcomes.push(DisableOutcome {
                    declared: raw,
                    path: target_path,
                    status: DisableStatus::TargetMissing,
                });
                continue;
            };

            let protected = project.plugin(target_node).is_none_or(|p| {
                p.kind == PluginKind::Directory || p.mandatory || !p.is_selectable()
            });
            if protected {
                tracing::debug!(target = %target_path.display(), "disable target is protected");
                outcomes.push(DisableOutcome {
                    declared: raw,
                    path: target_path,
                    status: DisableStatus::TargetProtected,
                });
                continue;
            }

            // Persist first so a reload reflects the outcome even if this
            // process dies mid-pass; the write happens regardless of whether
            // the in-memory state changes below.
            let status = match declare::set_key(&target_path, MAIN_SECTION, SELECTED_KEY, "False") {
                Ok(()) => DisableStatus::Applied,
                Err(e) => {
                    tracing::warn!(
                        target = %target_path.display(),
                        error = %e,
                        "disable target state not persisted"
                    );
                    DisableStatus::PersistFailed(e.to_string())
                }
            };

            self.apply_state(project, target, SelectedState::Deselected, observer);
            self.infer_upward(project, self.nodes[target.0].parent, observer);
            outcomes.push(DisableOutcome {
                declared: raw,
                path: target_path,
                status,
            });
        }
    }
}
