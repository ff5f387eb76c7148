//! Two-stage concurrent project loading.
//!
//! A load runs in three strictly ordered phases:
//!
//! 1. **Enumeration** ([`ProjectLoader::prepare`]) walks the root once,
//!    builds the full node skeleton for every project, and fixes the
//!    per-stage item totals - before any loading work begins, so progress
//!    denominators are exact.
//! 2. **Stage 1** loads every ordinary plugin on a bounded worker pool,
//!    consulting the cache per item.
//! 3. **Stage 2** starts only after Stage 1 has fully completed and resolves
//!    link plugins against the now-populated forests; no link is resolved
//!    before its potential targets exist.
//!
//! Completion order within a stage is unspecified; stage boundaries are
//! strict. Per-item failures never abort the batch - they are recorded on
//! the node, surfaced as error-class progress events, and collected into the
//! [`LoadSummary`]. Only an unreadable root is fatal.

use crate::error::{LoadError, Result};
use crate::progress::{LoadEvent, LoadStage};
use crate::project::{NodeId, Project};
use bakery_cache::{CacheReconciler, Fingerprint};
use bakery_core::{
    LINK_EXT, PROJECT_SCRIPT, Plugin, PluginKind, SCRIPT_EXT, Variables, clean_declared_path,
    declare, normalize_separators,
};
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinSet;
use walkdir::WalkDir;

/// Everything the enumeration pass produces: project skeletons plus the
/// fixed per-stage work lists.
#[derive(Debug)]
pub struct LoadPlan {
    projects: Vec<Project>,
    stage1_items: Vec<(usize, NodeId)>,
    stage2_items: Vec<(usize, NodeId)>,
}

impl LoadPlan {
    /// Number of Stage 1 (ordinary plugin) items.
    #[must_use]
    pub fn stage1_total(&self) -> usize {
        self.stage1_items.len()
    }

    /// Number of Stage 2 (link) items.
    #[must_use]
    pub fn stage2_total(&self) -> usize {
        self.stage2_items.len()
    }

    /// The enumerated project skeletons (payloads not yet loaded).
    #[must_use]
    pub fn projects(&self) -> &[Project] {
        &self.projects
    }
}

/// One per-item failure collected during a load.
#[derive(Debug, Clone, Serialize)]
pub struct ItemError {
    /// Path of the failing plugin file.
    pub path: PathBuf,
    /// Stage the item belonged to.
    pub stage: LoadStage,
    /// Human-readable failure description.
    pub message: String,
}

/// Aggregate result of one completed load.
#[derive(Debug, Clone, Serialize)]
pub struct LoadSummary {
    /// Stage 1 items enumerated.
    pub stage1_total: usize,
    /// Stage 1 items adopted from the cache.
    pub stage1_cached: usize,
    /// Stage 2 items enumerated.
    pub stage2_total: usize,
    /// Stage 2 items adopted from the cache.
    pub stage2_cached: usize,
    /// Every per-item failure, in completion order.
    pub errors: Vec<ItemError>,
    /// Wall-clock duration of both stages.
    pub elapsed: Duration,
}

impl LoadSummary {
    /// Total items across both stages.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.stage1_total + self.stage2_total
    }

    /// Percentage of items served from the cache.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn cache_percent(&self) -> f64 {
        if self.total() == 0 {
            return 0.0;
        }
        (self.stage1_cached + self.stage2_cached) as f64 * 100.0 / self.total() as f64
    }

    /// The closing status line ("N plugins loaded (x% cached), took t sec").
    #[must_use]
    pub fn status_line(&self) -> String {
        format!(
            "{} plugins loaded ({:.1}% cached), took {:.3}sec",
            self.total(),
            self.cache_percent(),
            self.elapsed.as_secs_f64()
        )
    }
}

/// A fully loaded forest plus its summary.
#[derive(Debug)]
pub struct LoadOutput {
    /// One project per top-level directory, fully populated.
    pub projects: Vec<Project>,
    /// Counters, errors, and timing for the run.
    pub summary: LoadSummary,
}

/// Loads a root directory of projects in two dependency-ordered stages.
///
/// The loader owns the concurrency policy (bounded worker pool), the cache
/// handle, and the busy flag that rejects re-entrant loads. All forest
/// mutation happens on the caller's task as worker results arrive; workers
/// only read files and parse.
///
/// # Examples
///
/// ```no_run
/// use bakery_loader::ProjectLoader;
/// use tokio::sync::mpsc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let loader = ProjectLoader::new("/opt/bakery/projects", None);
/// let plan = loader.prepare()?;
/// println!("{} + {} items", plan.stage1_total(), plan.stage2_total());
///
/// let (tx, mut rx) = mpsc::unbounded_channel();
/// let output = loader.load(plan, &tx).await?;
/// println!("{}", output.summary.status_line());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ProjectLoader {
    base_dir: PathBuf,
    cache: Option<Arc<CacheReconciler>>,
    jobs: usize,
    busy: AtomicBool,
}

impl ProjectLoader {
    /// Creates a loader over `base_dir`, optionally backed by a cache.
    ///
    /// The worker pool defaults to the machine's available parallelism.
    #[must_use]
    pub fn new(base_dir: impl Into<PathBuf>, cache: Option<Arc<CacheReconciler>>) -> Self {
        let jobs = std::thread::available_parallelism().map_or(4, NonZeroUsize::get);
        Self {
            base_dir: base_dir.into(),
            cache,
            jobs,
            busy: AtomicBool::new(false),
        }
    }

    /// Overrides the worker pool size (clamped to at least 1).
    #[must_use]
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    /// The load root this loader enumerates.
    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Dry enumeration pass: builds every project skeleton and fixes the
    /// per-stage totals without reading any plugin content.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::RootUnreadable`] when the root directory cannot
    /// be listed. Unreadable entries below the root are skipped with a
    /// warning instead.
    pub fn prepare(&self) -> Result<LoadPlan> {
        let entries = fs::read_dir(&self.base_dir).map_err(|e| LoadError::RootUnreadable {
            path: self.base_dir.clone(),
            source: e,
        })?;

        let mut project_dirs = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| LoadError::RootUnreadable {
                path: self.base_dir.clone(),
                source: e,
            })?;
            let path = entry.path();
            if path.is_dir() {
                project_dirs.push(path);
            }
        }
        project_dirs.sort();

        let mut projects = Vec::new();
        let mut stage1_items = Vec::new();
        let mut stage2_items = Vec::new();

        for dir in project_dirs {
            let name = dir.file_name().map_or_else(
                || dir.to_string_lossy().into_owned(),
                |n| n.to_string_lossy().into_owned(),
            );
            let mut variables = Variables::new();
            variables.set("BaseDir", self.base_dir.to_string_lossy());
            variables.set("ProjectDir", dir.to_string_lossy());

            let proj_idx = projects.len();
            let mut project = Project::new(name, dir.clone(), variables);
            let mut dir_nodes: HashMap<PathBuf, NodeId> = HashMap::new();

            for entry in WalkDir::new(&dir).min_depth(1).sort_by_file_name() {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        tracing::warn!(error = %e, "skipping unreadable entry");
                        continue;
                    }
                };
                let path = entry.path().to_path_buf();
                let parent = path.parent().and_then(|p| dir_nodes.get(p)).copied();
                let level = u32::try_from(entry.depth()).unwrap_or(u32::MAX);
                let short = short_path(&self.base_dir, &path);

                if entry.file_type().is_dir() {
                    let id = project.push_directory(parent, path.clone(), short, level);
                    dir_nodes.insert(path, id);
                } else if let Some(kind) = classify(&path) {
                    let id = project.push_pending(parent, path, short, kind, level);
                    if kind == PluginKind::Link {
                        stage2_items.push((proj_idx, id));
                    } else {
                        stage1_items.push((proj_idx, id));
                    }
                }
            }
            projects.push(project);
        }

        tracing::info!(
            projects = projects.len(),
            stage1 = stage1_items.len(),
            stage2 = stage2_items.len(),
            "enumeration complete"
        );
        Ok(LoadPlan {
            projects,
            stage1_items,
            stage2_items,
        })
    }

    /// Runs both load stages over a prepared plan.
    ///
    /// Emits one [`LoadEvent`] per item on `events` (from this task, so the
    /// channel stays single-producer and ordered) and publishes the fully
    /// built forests atomically in the returned [`LoadOutput`] - callers
    /// never observe a half-loaded tree.
    ///
    /// # Errors
    ///
    /// * [`LoadError::LoadInProgress`] - another load currently runs on this
    ///   loader; the request is rejected, not queued
    ///
    /// Per-item failures are not errors here; see [`LoadSummary::errors`].
    pub async fn load(
        &self,
        plan: LoadPlan,
        events: &UnboundedSender<LoadEvent>,
    ) -> Result<LoadOutput> {
        let _busy = BusyGuard::try_acquire(&self.busy).ok_or(LoadError::LoadInProgress)?;
        let started = Instant::now();
        let LoadPlan {
            mut projects,
            stage1_items,
            stage2_items,
        } = plan;

        let mut errors = Vec::new();
        let mut stage1_cached = 0usize;
        let mut stage2_cached = 0usize;

        // Stage 1: ordinary plugins.
        let mut workers = self.spawn_stage(&projects, &stage1_items);
        while let Some(joined) = workers.join_next().await {
            let Ok((proj, node, outcome)) = joined else {
                tracing::error!("stage 1 worker panicked");
                let _ = events.send(LoadEvent {
                    stage: LoadStage::Stage1,
                    cache_hit: false,
                    label: None,
                });
                continue;
            };
            match outcome {
                Ok(item) => {
                    if item.cache_hit {
                        stage1_cached += 1;
                    } else if let Some(cache) = &self.cache {
                        cache.store(
                            &item.plugin.full_path,
                            item.fingerprint.clone(),
                            item.plugin.clone(),
                        );
                    }
                    let label = Some(item.plugin.short_path.clone());
                    projects[proj].set_plugin(node, item.plugin);
                    let _ = events.send(LoadEvent {
                        stage: LoadStage::Stage1,
                        cache_hit: item.cache_hit,
                        label,
                    });
                }
                Err(message) => {
                    record_failure(
                        &mut projects,
                        &mut errors,
                        proj,
                        node,
                        LoadStage::Stage1,
                        message,
                        events,
                    );
                }
            }
        }

        // Stage 1 barrier passed: every potential link target now exists.
        let target_index = build_target_index(&projects);

        // Stage 2: link plugins.
        let mut workers = self.spawn_stage(&projects, &stage2_items);
        while let Some(joined) = workers.join_next().await {
            let Ok((proj, node, outcome)) = joined else {
                tracing::error!("stage 2 worker panicked");
                let _ = events.send(LoadEvent {
                    stage: LoadStage::Stage2,
                    cache_hit: false,
                    label: None,
                });
                continue;
            };
            match outcome {
                Ok(item) => match resolve_link(&projects, &target_index, proj, &item.plugin) {
                    Ok(resolved) => {
                        if item.cache_hit {
                            stage2_cached += 1;
                        } else if let Some(cache) = &self.cache {
                            // The unresolved declaration is what gets
                            // cached; splicing is repeated per load against
                            // the current targets.
                            cache.store(
                                &item.plugin.full_path,
                                item.fingerprint.clone(),
                                item.plugin.clone(),
                            );
                        }
                        let label = Some(resolved.short_path.clone());
                        projects[proj].set_plugin(node, resolved);
                        let _ = events.send(LoadEvent {
                            stage: LoadStage::Stage2,
                            cache_hit: item.cache_hit,
                            label,
                        });
                    }
                    Err(message) => {
                        record_failure(
                            &mut projects,
                            &mut errors,
                            proj,
                            node,
                            LoadStage::Stage2,
                            message,
                            events,
                        );
                    }
                },
                Err(message) => {
                    record_failure(
                        &mut projects,
                        &mut errors,
                        proj,
                        node,
                        LoadStage::Stage2,
                        message,
                        events,
                    );
                }
            }
        }

        let summary = LoadSummary {
            stage1_total: stage1_items.len(),
            stage1_cached,
            stage2_total: stage2_items.len(),
            stage2_cached,
            errors,
            elapsed: started.elapsed(),
        };
        tracing::info!("{}", summary.status_line());
        for error in &summary.errors {
            tracing::warn!(
                path = %error.path.display(),
                stage = error.stage.number(),
                "{}", error.message
            );
        }

        Ok(LoadOutput { projects, summary })
    }

    fn spawn_stage(
        &self,
        projects: &[Project],
        items: &[(usize, NodeId)],
    ) -> JoinSet<(usize, NodeId, std::result::Result<LoadedItem, String>)> {
        let semaphore = Arc::new(Semaphore::new(self.jobs));
        let mut set = JoinSet::new();
        for &(proj, node_id) in items {
            let Some(node) = projects.get(proj).and_then(|p| p.node(node_id)) else {
                continue;
            };
            let path = node.path().to_path_buf();
            let short = node.short_path().to_string();
            let kind = node.kind();
            let level = node.level();
            let cache = self.cache.clone();
            let semaphore = Arc::clone(&semaphore);
            set.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return (proj, node_id, Err("worker pool closed".to_string())),
                };
                (proj, node_id, load_item(&path, &short, kind, level, cache).await)
            });
        }
        set
    }
}

#[allow(clippy::too_many_arguments)]
fn record_failure(
    projects: &mut [Project],
    errors: &mut Vec<ItemError>,
    proj: usize,
    node: NodeId,
    stage: LoadStage,
    message: String,
    events: &UnboundedSender<LoadEvent>,
) {
    let path = projects
        .get(proj)
        .and_then(|p| p.node(node))
        .map_or_else(PathBuf::new, |n| n.path().to_path_buf());
    if let Some(project) = projects.get_mut(proj) {
        project.set_error(node, message.clone());
    }
    errors.push(ItemError {
        path,
        stage,
        message,
    });
    let _ = events.send(LoadEvent {
        stage,
        cache_hit: false,
        label: None,
    });
}

/// A worker's per-item result: the plugin, its content fingerprint, and
/// whether the cache supplied it.
#[derive(Debug)]
struct LoadedItem {
    plugin: Plugin,
    fingerprint: Fingerprint,
    cache_hit: bool,
}

async fn load_item(
    path: &Path,
    short: &str,
    kind: PluginKind,
    level: u32,
    cache: Option<Arc<CacheReconciler>>,
) -> std::result::Result<LoadedItem, String> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
    let fingerprint = Fingerprint::of_bytes(&bytes);

    if let Some(cache) = &cache
        && let Some(plugin) = cache.lookup(path, &fingerprint)
    {
        return Ok(LoadedItem {
            plugin,
            fingerprint,
            cache_hit: true,
        });
    }

    let text = String::from_utf8_lossy(&bytes);
    let plugin =
        declare::parse_plugin(path, short, kind, level, &text).map_err(|e| e.to_string())?;
    Ok(LoadedItem {
        plugin,
        fingerprint,
        cache_hit: false,
    })
}

fn build_target_index(projects: &[Project]) -> HashMap<PathBuf, (usize, NodeId)> {
    let mut index = HashMap::new();
    for (proj, project) in projects.iter().enumerate() {
        for (id, node) in project.iter() {
            if node.kind() == PluginKind::Plugin && node.plugin().is_some() {
                index.insert(node.path().to_path_buf(), (proj, id));
            }
        }
    }
    index
}

/// Splices a link's target content into the link's own declaration.
///
/// Link targets must be ordinary plugins that loaded in Stage 1; a link
/// pointing at another link, a directory, or a failed node is an error.
fn resolve_link(
    projects: &[Project],
    target_index: &HashMap<PathBuf, (usize, NodeId)>,
    proj: usize,
    link: &Plugin,
) -> std::result::Result<Plugin, String> {
    let raw = link
        .link_target
        .as_deref()
        .ok_or_else(|| "link declaration has no target".to_string())?;
    let expanded = normalize_separators(&projects[proj].variables().expand(raw));
    let candidate = Path::new(&expanded);
    let target_path = if candidate.is_absolute() {
        clean_declared_path(candidate)
    } else {
        let parent = link.full_path.parent().unwrap_or_else(|| Path::new(""));
        clean_declared_path(&parent.join(candidate))
    };

    let Some(&(tproj, tnode)) = target_index.get(&target_path) else {
        return Err(format!("link target not found: {}", target_path.display()));
    };
    let target = projects[tproj]
        .plugin(tnode)
        .ok_or_else(|| format!("link target failed to load: {}", target_path.display()))?;

    let mut resolved = link.clone();
    resolved.sections = target.sections.clone();
    if resolved.main_value("title").is_none() {
        resolved.title = target.title.clone();
    }
    if resolved.description.is_empty() {
        resolved.description = target.description.clone();
    }
    if resolved.author.is_empty() {
        resolved.author = target.author.clone();
    }
    resolved.version = target.version.clone();
    Ok(resolved)
}

fn classify(path: &Path) -> Option<PluginKind> {
    let ext = path.extension().and_then(|e| e.to_str())?;
    if ext.eq_ignore_ascii_case(SCRIPT_EXT) {
        Some(PluginKind::Plugin)
    } else if ext.eq_ignore_ascii_case(LINK_EXT) {
        Some(PluginKind::Link)
    } else if path
        .file_name()
        .is_some_and(|n| n.to_string_lossy().eq_ignore_ascii_case(PROJECT_SCRIPT))
    {
        Some(PluginKind::Plugin)
    } else {
        None
    }
}

fn short_path(base: &Path, path: &Path) -> String {
    path.strip_prefix(base).map_or_else(
        |_| path.to_string_lossy().into_owned(),
        |p| normalize_separators(&p.to_string_lossy()),
    )
}

struct BusyGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> BusyGuard<'a> {
    fn try_acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_was| Self { flag })
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}
