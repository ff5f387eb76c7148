//! Command implementations: load, tree, toggle.

use crate::formatters;
use crate::{Format, LoadOpts};
use anyhow::{Context, Result, bail};
use bakery_cache::CacheReconciler;
use bakery_core::clean_declared_path;
use bakery_loader::{LoadOutput, ProgressAggregator, ProjectLoader};
use bakery_tree::SelectionTree;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::Arc;

/// Opens the cache unless disabled; a broken cache demotes to cache-off
/// with a warning instead of failing the command.
fn open_cache(opts: &LoadOpts) -> Option<Arc<CacheReconciler>> {
    if opts.no_cache {
        return None;
    }
    let dir = opts
        .cache_dir
        .clone()
        .or_else(CacheReconciler::default_dir)?;
    match CacheReconciler::open(&dir, 4096) {
        Ok(cache) => Some(Arc::new(cache)),
        Err(e) => {
            tracing::warn!(error = %e, "cache unusable, continuing without it");
            None
        }
    }
}

/// Runs the full pipeline with a live progress bar and flushes the cache
/// afterwards in a separate pass.
async fn run_load(opts: &LoadOpts) -> Result<LoadOutput> {
    let cache = open_cache(opts);
    let mut loader = ProjectLoader::new(&opts.root, cache.clone());
    if let Some(jobs) = opts.jobs {
        loader = loader.with_jobs(jobs);
    }

    let plan = loader
        .prepare()
        .with_context(|| format!("enumerating {}", opts.root.display()))?;

    let total = plan.stage1_total() + plan.stage2_total();
    let bar = if opts.format == Format::Text {
        let bar = ProgressBar::new(u64::try_from(total).unwrap_or(u64::MAX));
        bar.set_style(ProgressStyle::with_template(
            "{bar:40.cyan/blue} {pos}/{len} {msg}",
        )?);
        bar
    } else {
        ProgressBar::hidden()
    };

    let mut progress = ProgressAggregator::new(plan.stage1_total(), plan.stage2_total());
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let drain_bar = bar.clone();
    let drain = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let line = progress.observe(&event);
            drain_bar.set_position(
                u64::try_from(progress.stage1_completed() + progress.stage2_completed())
                    .unwrap_or(u64::MAX),
            );
            drain_bar.set_message(line);
        }
        progress
    });

    let output = loader.load(plan, &tx).await?;
    drop(tx);
    let progress = drain.await?;
    bar.finish_and_clear();

    debug_assert!(progress.is_finished());

    // The cache refresh is its own pass, after the load; a concurrent flush
    // holding the gate just means this one is skipped.
    if let Some(cache) = cache {
        match tokio::task::spawn_blocking(move || cache.flush()).await? {
            Ok(outcome) => tracing::debug!(?outcome, "cache flush finished"),
            Err(e) => tracing::warn!(error = %e, "cache flush failed"),
        }
    }

    Ok(output)
}

/// `bakery load`
pub async fn load(opts: &LoadOpts) -> Result<()> {
    let output = run_load(opts).await?;
    match opts.format {
        Format::Text => formatters::print_summary(&output),
        Format::Json => formatters::print_summary_json(&output)?,
    }
    Ok(())
}

/// `bakery tree`
pub async fn tree(opts: &LoadOpts) -> Result<()> {
    let mut output = run_load(opts).await?;

    // Seed folder checkboxes from the plugins beneath them before showing
    // the forest.
    for project in &mut output.projects {
        let tree = SelectionTree::build(project);
        tree.infer_initial(project, &mut bakery_tree::NullObserver);
    }

    match opts.format {
        Format::Text => {
            for project in &output.projects {
                formatters::print_tree(project);
            }
            println!("{}", output.summary.status_line());
        }
        Format::Json => formatters::print_forest_json(&output)?,
    }
    Ok(())
}

/// `bakery toggle`
pub async fn toggle(opts: &LoadOpts, plugin: &Path, value: bool) -> Result<()> {
    let mut output = run_load(opts).await?;

    let target = if plugin.is_absolute() {
        clean_declared_path(plugin)
    } else {
        clean_declared_path(&opts.root.join(plugin))
    };

    let Some(project) = output
        .projects
        .iter_mut()
        .find(|p| p.find_by_path(&target).is_some())
    else {
        bail!("no loaded plugin at {}", target.display());
    };

    let tree = SelectionTree::build(project);
    tree.infer_initial(project, &mut bakery_tree::NullObserver);
    let Some(node) = tree.find_by_path(project, &target) else {
        bail!("no loaded plugin at {}", target.display());
    };

    let mut changes: Vec<(bakery_loader::NodeId, bakery_core::SelectedState)> = Vec::new();
    let outcomes = tree.set_selected_observed(project, node, value, &mut changes);

    match opts.format {
        Format::Text => {
            formatters::print_toggle_report(project, &target, &changes, &outcomes);
            formatters::print_tree(project);
        }
        Format::Json => formatters::print_toggle_json(project, &changes, &outcomes)?,
    }
    Ok(())
}
