//! Integration tests for selection propagation and the disable directive.
//!
//! Fixtures are real plugin hierarchies loaded through the staged loader,
//! so the tree under test is exactly what a display layer would shadow.

use bakery_core::{MAIN_SECTION, SELECTED_KEY, SelectedState, declare};
use bakery_loader::{Project, ProjectLoader};
use bakery_tree::{DisableStatus, NullObserver, SelectionTree, TreeNodeId};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// One project exercising every propagation case: a folder of plugins with
/// a nested subfolder, a mandatory plugin, a checkbox-less plugin, and
/// three plugins carrying disable directives.
fn fixture() -> TempDir {
    let temp = TempDir::new().unwrap();
    let base = temp.path();

    write(
        &base.join("Proj/script.project"),
        "[Main]\nTitle=Proj\nSelected=True\n\n[Process]\nEcho,main\n",
    );
    write(
        &base.join("Proj/Tools/editor.script"),
        "[Main]\nTitle=Editor\nSelected=False\n\n[Process]\nEcho,editor\n",
    );
    write(
        &base.join("Proj/Tools/viewer.script"),
        "[Main]\nTitle=Viewer\nSelected=False\n\n[Process]\nEcho,viewer\n",
    );
    write(
        &base.join("Proj/Tools/pinned.script"),
        "[Main]\nTitle=Pinned\nSelected=False\nMandatory=True\n\n[Process]\nEcho,pinned\n",
    );
    write(
        &base.join("Proj/Tools/hidden.script"),
        "[Main]\nTitle=Hidden\nSelected=None\n\n[Process]\nEcho,hidden\n",
    );
    write(
        &base.join("Proj/Tools/Sub/nested.script"),
        "[Main]\nTitle=Nested\nSelected=False\n\n[Process]\nEcho,nested\n",
    );
    write(
        &base.join("Proj/Group/a.script"),
        "[Main]\nTitle=A\nSelected=False\nDisable=%BaseDir%\\Proj\\Group\\b.script\n\n[Process]\nEcho,a\n",
    );
    write(
        &base.join("Proj/Group/b.script"),
        "[Main]\nTitle=B\nSelected=False\n\n[Process]\nEcho,b\n",
    );
    write(
        &base.join("Proj/baddisabler.script"),
        "[Main]\nTitle=BadDisabler\nSelected=False\nDisable=%BaseDir%\\Proj\\missing.script,%BaseDir%\\Proj\\locked.script,%BaseDir%\\Proj\\inert.script,%BaseDir%\\Proj\\Tools\n\n[Process]\nEcho,bad\n",
    );
    write(
        &base.join("Proj/locked.script"),
        "[Main]\nTitle=Locked\nSelected=False\nMandatory=True\n\n[Process]\nEcho,locked\n",
    );
    write(
        &base.join("Proj/inert.script"),
        "[Main]\nTitle=Inert\nSelected=None\n\n[Process]\nEcho,inert\n",
    );

    temp
}

async fn load_project(temp: &TempDir) -> Project {
    let loader = ProjectLoader::new(temp.path(), None);
    let plan = loader.prepare().unwrap();
    let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
    let mut output = loader.load(plan, &tx).await.unwrap();
    output.projects.remove(0)
}

fn node_at(project: &Project, tree: &SelectionTree, path: &Path) -> TreeNodeId {
    tree.find_by_path(project, path)
        .unwrap_or_else(|| panic!("no tree node for {}", path.display()))
}

fn state_at(project: &Project, path: &Path) -> SelectedState {
    let id = project.find_by_path(path).unwrap();
    project.plugin(id).unwrap().selected
}

#[tokio::test]
async fn shadow_mirrors_forest_one_to_one() {
    let temp = fixture();
    let project = load_project(&temp).await;
    let tree = SelectionTree::build(&project);

    assert_eq!(tree.len(), project.node_count());
    assert_eq!(tree.roots().len(), project.roots().len());

    // Child order matches the forest everywhere.
    for (tree_root, forest_root) in tree.roots().iter().zip(project.roots()) {
        assert_eq!(tree.node_id(*tree_root), Some(*forest_root));
        let tree_children: Vec<_> = tree
            .children(*tree_root)
            .iter()
            .map(|c| tree.node_id(*c).unwrap())
            .collect();
        assert_eq!(tree_children, project.children(*forest_root));
    }
}

#[tokio::test]
async fn top_down_drives_eligible_descendants() {
    let temp = fixture();
    let mut project = load_project(&temp).await;
    let tree = SelectionTree::build(&project);
    let tools = node_at(&project, &tree, &temp.path().join("Proj/Tools"));

    tree.set_selected(&mut project, tools, true);

    for leaf in ["editor.script", "viewer.script", "Sub/nested.script"] {
        let path = temp.path().join("Proj/Tools").join(leaf);
        assert_eq!(state_at(&project, &path), SelectedState::Selected, "{leaf}");
    }
    assert_eq!(
        state_at(&project, &temp.path().join("Proj/Tools/Sub")),
        SelectedState::Selected
    );
    // Mandatory and checkbox-less nodes are not driven.
    assert_eq!(
        state_at(&project, &temp.path().join("Proj/Tools/pinned.script")),
        SelectedState::Deselected
    );
    assert_eq!(
        state_at(&project, &temp.path().join("Proj/Tools/hidden.script")),
        SelectedState::NotSelectable
    );

    // And the mirror operation deselects them all again.
    tree.set_selected(&mut project, tools, false);
    for leaf in ["editor.script", "viewer.script", "Sub/nested.script"] {
        let path = temp.path().join("Proj/Tools").join(leaf);
        assert_eq!(state_at(&project, &path), SelectedState::Deselected, "{leaf}");
    }
}

#[tokio::test]
async fn bottom_up_parent_is_or_of_children() {
    let temp = fixture();
    let mut project = load_project(&temp).await;
    let tree = SelectionTree::build(&project);

    let nested = node_at(
        &project,
        &tree,
        &temp.path().join("Proj/Tools/Sub/nested.script"),
    );

    // Selecting a deep leaf lights up the whole ancestor chain.
    tree.set_selected(&mut project, nested, true);
    assert_eq!(
        state_at(&project, &temp.path().join("Proj/Tools/Sub")),
        SelectedState::Selected
    );
    assert_eq!(
        state_at(&project, &temp.path().join("Proj/Tools")),
        SelectedState::Selected
    );

    // Deselecting the only selected leaf turns the chain off again.
    tree.set_selected(&mut project, nested, false);
    assert_eq!(
        state_at(&project, &temp.path().join("Proj/Tools/Sub")),
        SelectedState::Deselected
    );
    assert_eq!(
        state_at(&project, &temp.path().join("Proj/Tools")),
        SelectedState::Deselected
    );
}

#[tokio::test]
async fn mandatory_nodes_never_change() {
    let temp = fixture();
    let mut project = load_project(&temp).await;
    let tree = SelectionTree::build(&project);

    // Direct toggles are rejected outright.
    let locked = node_at(&project, &tree, &temp.path().join("Proj/locked.script"));
    let outcomes = tree.set_selected(&mut project, locked, true);
    assert!(outcomes.is_empty());
    assert_eq!(
        state_at(&project, &temp.path().join("Proj/locked.script")),
        SelectedState::Deselected
    );

    // Cascades pass mandatory nodes by (covered in the top-down test for
    // pinned.script); bottom-up leaves them alone too.
    let pinned_path = temp.path().join("Proj/Tools/pinned.script");
    let tools = node_at(&project, &tree, &temp.path().join("Proj/Tools"));
    tree.set_selected(&mut project, tools, true);
    tree.set_selected(&mut project, tools, false);
    assert_eq!(state_at(&project, &pinned_path), SelectedState::Deselected);
}

#[tokio::test]
async fn checkbox_less_nodes_are_inert() {
    let temp = fixture();
    let mut project = load_project(&temp).await;
    let tree = SelectionTree::build(&project);

    let inert = node_at(&project, &tree, &temp.path().join("Proj/inert.script"));
    let outcomes = tree.set_selected(&mut project, inert, true);
    assert!(outcomes.is_empty());
    assert_eq!(
        state_at(&project, &temp.path().join("Proj/inert.script")),
        SelectedState::NotSelectable
    );

    // A selected sibling never counts a NotSelectable node into the OR.
    let hidden_path = temp.path().join("Proj/Tools/hidden.script");
    let editor = node_at(
        &project,
        &tree,
        &temp.path().join("Proj/Tools/editor.script"),
    );
    tree.set_selected(&mut project, editor, true);
    tree.set_selected(&mut project, editor, false);
    assert_eq!(state_at(&project, &hidden_path), SelectedState::NotSelectable);
    assert_eq!(
        state_at(&project, &temp.path().join("Proj/Tools")),
        SelectedState::Deselected
    );
}

#[tokio::test]
async fn disable_deselects_target_and_persists() {
    let temp = fixture();
    let mut project = load_project(&temp).await;
    let tree = SelectionTree::build(&project);

    let a = node_at(&project, &tree, &temp.path().join("Proj/Group/a.script"));
    let b_path = temp.path().join("Proj/Group/b.script");

    let outcomes = tree.set_selected(&mut project, a, true);

    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].status, DisableStatus::Applied);
    assert_eq!(outcomes[0].path, b_path);

    // A is selected, B stays deselected, and B's declaration was rewritten.
    assert_eq!(
        state_at(&project, &temp.path().join("Proj/Group/a.script")),
        SelectedState::Selected
    );
    assert_eq!(state_at(&project, &b_path), SelectedState::Deselected);
    assert_eq!(
        declare::read_key(&b_path, MAIN_SECTION, SELECTED_KEY)
            .unwrap()
            .as_deref(),
        Some("False")
    );

    // The common parent reflects the OR of its children.
    assert_eq!(
        state_at(&project, &temp.path().join("Proj/Group")),
        SelectedState::Selected
    );
}

#[tokio::test]
async fn disable_is_single_hop() {
    // A dedicated chain: disabler -> viewer -> nested. Only the first hop
    // may fire.
    let temp = TempDir::new().unwrap();
    write(
        &temp.path().join("Proj/script.project"),
        "[Main]\nTitle=Proj\nSelected=True\n",
    );
    write(
        &temp.path().join("Proj/Tools/viewer.script"),
        "[Main]\nTitle=Viewer\nSelected=False\nDisable=%BaseDir%\\Proj\\Tools\\Sub\\nested.script\n\n[Process]\nEcho,viewer\n",
    );
    write(
        &temp.path().join("Proj/Tools/Sub/nested.script"),
        "[Main]\nTitle=Nested\nSelected=False\n\n[Process]\nEcho,nested\n",
    );
    write(
        &temp.path().join("Proj/disabler.script"),
        "[Main]\nTitle=Disabler\nSelected=False\nDisable=%BaseDir%\\Proj\\Tools\\viewer.script\n\n[Process]\nEcho,disabler\n",
    );

    let mut project = load_project(&temp).await;
    let tree = SelectionTree::build(&project);

    let nested_path = temp.path().join("Proj/Tools/Sub/nested.script");
    let viewer_path = temp.path().join("Proj/Tools/viewer.script");

    let nested = node_at(&project, &tree, &nested_path);
    let viewer = node_at(&project, &tree, &viewer_path);
    let disabler = node_at(&project, &tree, &temp.path().join("Proj/disabler.script"));

    // Select viewer (its own directive disables nested along the way), then
    // re-select nested so both are on.
    tree.set_selected(&mut project, viewer, true);
    tree.set_selected(&mut project, nested, true);
    assert_eq!(state_at(&project, &viewer_path), SelectedState::Selected);
    assert_eq!(state_at(&project, &nested_path), SelectedState::Selected);

    // Disabler's directive targets viewer. Viewer must flip off - but
    // viewer's own directive (targeting nested) must NOT fire in turn.
    let outcomes = tree.set_selected(&mut project, disabler, true);
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].status, DisableStatus::Applied);

    assert_eq!(state_at(&project, &viewer_path), SelectedState::Deselected);
    assert_eq!(state_at(&project, &nested_path), SelectedState::Selected);
    assert_eq!(
        declare::read_key(&viewer_path, MAIN_SECTION, SELECTED_KEY)
            .unwrap()
            .as_deref(),
        Some("False")
    );
}

#[tokio::test]
async fn disable_failures_skip_and_continue() {
    let temp = fixture();
    let mut project = load_project(&temp).await;
    let tree = SelectionTree::build(&project);

    let bad = node_at(
        &project,
        &tree,
        &temp.path().join("Proj/baddisabler.script"),
    );
    let outcomes = tree.set_selected(&mut project, bad, true);

    // Four declared targets, four recorded outcomes, none aborted the rest.
    assert_eq!(outcomes.len(), 4);
    assert_eq!(outcomes[0].status, DisableStatus::TargetMissing);
    assert_eq!(outcomes[1].status, DisableStatus::TargetProtected); // mandatory
    assert_eq!(outcomes[2].status, DisableStatus::TargetProtected); // checkbox-less
    assert_eq!(outcomes[3].status, DisableStatus::TargetProtected); // directory

    // Protected targets kept their states and files.
    assert_eq!(
        state_at(&project, &temp.path().join("Proj/locked.script")),
        SelectedState::Deselected
    );
    assert_eq!(
        declare::read_key(
            &temp.path().join("Proj/locked.script"),
            MAIN_SECTION,
            SELECTED_KEY
        )
        .unwrap()
        .as_deref(),
        Some("False")
    );
    assert_eq!(
        state_at(&project, &temp.path().join("Proj/inert.script")),
        SelectedState::NotSelectable
    );
}

#[tokio::test]
async fn observer_sees_each_transition_once() {
    let temp = fixture();
    let mut project = load_project(&temp).await;
    let tree = SelectionTree::build(&project);

    let tools = node_at(&project, &tree, &temp.path().join("Proj/Tools"));
    let mut changes: Vec<(bakery_loader::NodeId, SelectedState)> = Vec::new();
    tree.set_selected_observed(&mut project, tools, true, &mut changes);

    // Tools itself + editor + viewer + Sub + nested = 5 transitions; pinned
    // and hidden never fire.
    assert_eq!(changes.len(), 5);
    assert!(changes.iter().all(|(_, s)| *s == SelectedState::Selected));
    let pinned_node = project
        .find_by_path(&temp.path().join("Proj/Tools/pinned.script"))
        .unwrap();
    assert!(changes.iter().all(|(n, _)| *n != pinned_node));

    // Toggling the same value again produces no transitions at all.
    let mut repeat: Vec<(bakery_loader::NodeId, SelectedState)> = Vec::new();
    tree.set_selected_observed(&mut project, tools, true, &mut repeat);
    assert!(repeat.is_empty());
}

#[tokio::test]
async fn infer_initial_seeds_folder_checkboxes() {
    let temp = TempDir::new().unwrap();
    write(
        &temp.path().join("Proj/script.project"),
        "[Main]\nTitle=Proj\nSelected=True\n",
    );
    write(
        &temp.path().join("Proj/Apps/on.script"),
        "[Main]\nTitle=On\nSelected=True\n\n[Process]\nEcho,on\n",
    );
    write(
        &temp.path().join("Proj/Apps/off.script"),
        "[Main]\nTitle=Off\nSelected=False\n\n[Process]\nEcho,off\n",
    );
    write(
        &temp.path().join("Proj/Other/off2.script"),
        "[Main]\nTitle=None\nSelected=False\n\n[Process]\nEcho,none\n",
    );

    let mut project = load_project(&temp).await;
    let tree = SelectionTree::build(&project);
    tree.infer_initial(&mut project, &mut NullObserver);

    assert_eq!(
        state_at(&project, &temp.path().join("Proj/Apps")),
        SelectedState::Selected
    );
    assert_eq!(
        state_at(&project, &temp.path().join("Proj/Other")),
        SelectedState::Deselected
    );
}

#[tokio::test]
async fn failed_nodes_cannot_be_toggled() {
    let temp = fixture();
    write(
        &temp.path().join("Proj/broken.script"),
        "[Process]\nEcho,orphan\n",
    );
    let mut project = load_project(&temp).await;
    let tree = SelectionTree::build(&project);

    let broken = node_at(&project, &tree, &temp.path().join("Proj/broken.script"));
    let outcomes = tree.set_selected(&mut project, broken, true);
    assert!(outcomes.is_empty());
    let node = project
        .find_by_path(&temp.path().join("Proj/broken.script"))
        .unwrap();
    assert!(project.plugin(node).is_none());
}

#[tokio::test]
async fn main_level_plugin_acts_as_a_source() {
    let temp = fixture();
    let mut project = load_project(&temp).await;
    let tree = SelectionTree::build(&project);

    let main_path = temp.path().join("Proj/script.project");
    assert_eq!(state_at(&project, &main_path), SelectedState::Selected);

    let main = node_at(&project, &tree, &main_path);
    tree.set_selected(&mut project, main, false);
    assert_eq!(state_at(&project, &main_path), SelectedState::Deselected);
    tree.set_selected(&mut project, main, true);
    assert_eq!(state_at(&project, &main_path), SelectedState::Selected);
}
