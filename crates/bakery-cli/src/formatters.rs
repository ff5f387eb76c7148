//! Text and JSON rendering for command output.

use anyhow::Result;
use bakery_core::{PluginKind, SelectedState};
use bakery_loader::{LoadOutput, NodeId, Project};
use bakery_tree::{DisableOutcome, DisableStatus};
use console::style;
use serde_json::json;
use std::path::Path;

/// Closing summary block for `bakery load`.
pub fn print_summary(output: &LoadOutput) {
    for project in &output.projects {
        println!(
            "{}  {} nodes",
            style(project.name()).bold(),
            project.node_count()
        );
    }
    println!("{}", output.summary.status_line());
    if !output.summary.errors.is_empty() {
        println!(
            "{}",
            style(format!("{} item(s) failed:", output.summary.errors.len())).red()
        );
        for error in &output.summary.errors {
            println!(
                "  {} (stage {}): {}",
                error.path.display(),
                error.stage.number(),
                error.message
            );
        }
    }
}

/// JSON summary for `bakery load --format json`.
pub fn print_summary_json(output: &LoadOutput) -> Result<()> {
    let value = json!({
        "projects": output
            .projects
            .iter()
            .map(|p| json!({ "name": p.name(), "nodes": p.node_count() }))
            .collect::<Vec<_>>(),
        "summary": output.summary,
    });
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

/// Indented checkbox view of one project's forest.
pub fn print_tree(project: &Project) {
    println!("{}", style(project.name()).bold());
    for &root in project.roots() {
        print_node(project, root, 1);
    }
}

fn print_node(project: &Project, id: NodeId, depth: usize) {
    let Some(node) = project.node(id) else {
        return;
    };
    let indent = "  ".repeat(depth);

    match node.plugin() {
        Some(plugin) => {
            let checkbox = match plugin.selected {
                SelectedState::Selected => "[x]",
                SelectedState::Deselected => "[ ]",
                SelectedState::NotSelectable => "   ",
            };
            let mark = if plugin.mandatory {
                " (mandatory)"
            } else if plugin.kind == PluginKind::Link {
                " -> link"
            } else {
                ""
            };
            println!("{indent}{checkbox} {}{mark}", plugin.title);
        }
        None => {
            let reason = node.error().unwrap_or("not loaded");
            println!(
                "{indent}{} {} ({})",
                style("(!)").red(),
                node.short_path(),
                style(reason).dim()
            );
        }
    }

    for &child in project.children(id) {
        print_node(project, child, depth + 1);
    }
}

/// Whole-forest JSON for `bakery tree --format json`.
pub fn print_forest_json(output: &LoadOutput) -> Result<()> {
    let projects = output
        .projects
        .iter()
        .map(|project| {
            json!({
                "name": project.name(),
                "roots": project
                    .roots()
                    .iter()
                    .map(|&r| node_json(project, r))
                    .collect::<Vec<_>>(),
            })
        })
        .collect::<Vec<_>>();
    println!(
        "{}",
        serde_json::to_string_pretty(&json!({ "projects": projects }))?
    );
    Ok(())
}

fn node_json(project: &Project, id: NodeId) -> serde_json::Value {
    let children: Vec<_> = project
        .children(id)
        .iter()
        .map(|&c| node_json(project, c))
        .collect();
    match project.node(id) {
        Some(node) => match node.plugin() {
            Some(plugin) => json!({
                "path": node.short_path(),
                "kind": plugin.kind.to_string(),
                "title": plugin.title,
                "selected": plugin.selected.as_declared(),
                "mandatory": plugin.mandatory,
                "children": children,
            }),
            None => json!({
                "path": node.short_path(),
                "error": node.error(),
                "children": children,
            }),
        },
        None => json!(null),
    }
}

/// Human-readable report for `bakery toggle`.
pub fn print_toggle_report(
    project: &Project,
    target: &Path,
    changes: &[(NodeId, SelectedState)],
    outcomes: &[DisableOutcome],
) {
    if changes.is_empty() {
        println!(
            "{} unchanged (mandatory, checkbox-less, or already in that state)",
            target.display()
        );
    } else {
        println!("{} state change(s):", changes.len());
        for (node, state) in changes {
            let label = project
                .node(*node)
                .map_or_else(|| node.to_string(), |n| n.short_path().to_string());
            println!("  {label} -> {state}");
        }
    }
    for outcome in outcomes {
        let status = match &outcome.status {
            DisableStatus::Applied => style("disabled".to_string()).green(),
            DisableStatus::TargetMissing => style("target missing".to_string()).yellow(),
            DisableStatus::TargetProtected => style("target protected".to_string()).yellow(),
            DisableStatus::PersistFailed(e) => style(format!("persist failed: {e}")).red(),
        };
        println!("  disable {} [{status}]", outcome.path.display());
    }
}

/// JSON report for `bakery toggle --format json`.
pub fn print_toggle_json(
    project: &Project,
    changes: &[(NodeId, SelectedState)],
    outcomes: &[DisableOutcome],
) -> Result<()> {
    let changes: Vec<_> = changes
        .iter()
        .map(|(node, state)| {
            json!({
                "path": project.node(*node).map(|n| n.short_path().to_string()),
                "state": state.as_declared(),
            })
        })
        .collect();
    let disables: Vec<_> = outcomes
        .iter()
        .map(|outcome| {
            json!({
                "declared": outcome.declared,
                "path": outcome.path,
                "status": match &outcome.status {
                    DisableStatus::Applied => "applied".to_string(),
                    DisableStatus::TargetMissing => "target-missing".to_string(),
                    DisableStatus::TargetProtected => "target-protected".to_string(),
                    DisableStatus::PersistFailed(e) => format!("persist-failed: {e}"),
                },
            })
        })
        .collect();
    println!(
        "{}",
        serde_json::to_string_pretty(&json!({ "changes": changes, "disable": disables }))?
    );
    Ok(())
}
