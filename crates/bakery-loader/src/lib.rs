//! Staged, cached, concurrent loading of Bakery project forests.
//!
//! A *project* is one top-level directory under the load root; its plugins
//! form an ordered forest. Loading happens in two dependency-ordered stages
//! over a bounded worker pool: Stage 1 parses every ordinary plugin
//! (consulting the parse cache per item), and only after a strict barrier
//! does Stage 2 resolve link plugins against the now-complete forests.
//!
//! Per-item completion is reported through a single event channel; the
//! [`ProgressAggregator`] folds that stream into counters and an overall
//! completion fraction with a denominator fixed by the enumeration pass.
//!
//! # Examples
//!
//! ```no_run
//! use bakery_loader::{ProgressAggregator, ProjectLoader};
//! use tokio::sync::mpsc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let loader = ProjectLoader::new("/opt/bakery/projects", None).with_jobs(8);
//!
//! // Totals are known before any plugin content is read.
//! let plan = loader.prepare()?;
//! let mut progress = ProgressAggregator::new(plan.stage1_total(), plan.stage2_total());
//!
//! let (tx, mut rx) = mpsc::unbounded_channel();
//! let drain = tokio::spawn(async move {
//!     while let Some(event) = rx.recv().await {
//!         println!("{}", progress.observe(&event));
//!     }
//! });
//!
//! let output = loader.load(plan, &tx).await?;
//! drop(tx);
//! drain.await?;
//! println!("{}", output.summary.status_line());
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs, missing_debug_implementations)]

mod error;
mod loader;
mod progress;
mod project;

pub use error::{LoadError, Result};
pub use loader::{ItemError, LoadOutput, LoadPlan, LoadSummary, ProjectLoader};
pub use progress::{LoadEvent, LoadStage, ProgressAggregator};
pub use project::{NodeId, PluginNode, Project};
