//! Load progress events and their aggregation.
//!
//! Loader workers emit one [`LoadEvent`] per completed item through a single
//! channel; the [`ProgressAggregator`] folds the stream into stage-relative
//! and global counters plus a human-readable status line. The aggregator is
//! display-agnostic: rendering belongs to whoever drains it.

use serde::Serialize;

/// Which load stage an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LoadStage {
    /// Ordinary plugins, loaded first.
    Stage1,
    /// Link plugins, resolved only after every Stage 1 item exists.
    Stage2,
}

impl LoadStage {
    /// 1-based stage number for display.
    #[must_use]
    pub const fn number(self) -> u8 {
        match self {
            Self::Stage1 => 1,
            Self::Stage2 => 2,
        }
    }
}

/// One per-item completion record from the loader.
///
/// `label` carries the item's display path; an error-class event carries no
/// label (the error detail itself travels on the affected node and in the
/// load summary).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadEvent {
    /// Stage the completed item belonged to.
    pub stage: LoadStage,
    /// True when the item was adopted from the cache instead of parsed.
    pub cache_hit: bool,
    /// Display path of the item; `None` marks a per-item failure.
    pub label: Option<String>,
}

impl LoadEvent {
    /// True when this event records a per-item failure.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        self.label.is_none()
    }
}

/// Folds load events into monotonically increasing counters.
///
/// The denominators are fixed up front from the enumeration pass, which is
/// what makes [`fraction`](Self::fraction) monotonic: it never jumps
/// backwards when cache hits land early, and it reaches exactly 1.0 when
/// both stages finish.
///
/// # Examples
///
/// ```
/// use bakery_loader::{LoadEvent, LoadStage, ProgressAggregator};
///
/// let mut progress = ProgressAggregator::new(2, 0);
/// assert_eq!(progress.fraction(), 0.0);
///
/// progress.observe(&LoadEvent {
///     stage: LoadStage::Stage1,
///     cache_hit: true,
///     label: Some("proj/a.script".into()),
/// });
/// assert_eq!(progress.fraction(), 0.5);
/// assert!(!progress.is_finished());
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct ProgressAggregator {
    stage1_total: usize,
    stage2_total: usize,
    stage1_completed: usize,
    stage1_cached: usize,
    stage2_completed: usize,
    stage2_cached: usize,
    errors: usize,
}

impl ProgressAggregator {
    /// Creates an aggregator with the fixed per-stage totals.
    #[must_use]
    pub const fn new(stage1_total: usize, stage2_total: usize) -> Self {
        Self {
            stage1_total,
            stage2_total,
            stage1_completed: 0,
            stage1_cached: 0,
            stage2_completed: 0,
            stage2_cached: 0,
            errors: 0,
        }
    }

    /// Folds one event in and returns the status line it produces.
    pub fn observe(&mut self, event: &LoadEvent) -> String {
        let (completed, total) = match event.stage {
            LoadStage::Stage1 => {
                self.stage1_completed += 1;
                if event.cache_hit {
                    self.stage1_cached += 1;
                }
                (self.stage1_completed, self.stage1_total)
            }
            LoadStage::Stage2 => {
                self.stage2_completed += 1;
                if event.cache_hit {
                    self.stage2_cached += 1;
                }
                (self.stage2_completed, self.stage2_total)
            }
        };
        if event.is_error() {
            self.errors += 1;
        }

        let detail = match (&event.label, event.cache_hit) {
            (Some(label), true) => format!("Cached - {label}"),
            (Some(label), false) => label.clone(),
            (None, true) => "Cached - Error".to_string(),
            (None, false) => "Error".to_string(),
        };
        format!(
            "Stage {} ({completed}/{total}) - {detail}",
            event.stage.number()
        )
    }

    /// Overall completion fraction in `[0.0, 1.0]`.
    ///
    /// An empty load (both totals zero) is complete by definition.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn fraction(&self) -> f64 {
        let total = self.stage1_total + self.stage2_total;
        if total == 0 {
            return 1.0;
        }
        (self.stage1_completed + self.stage2_completed) as f64 / total as f64
    }

    /// True once both stages have delivered every counted item.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.stage1_completed >= self.stage1_total && self.stage2_completed >= self.stage2_total
    }

    /// Stage 1 items completed so far.
    #[must_use]
    pub const fn stage1_completed(&self) -> usize {
        self.stage1_completed
    }

    /// Stage 1 items adopted from the cache.
    #[must_use]
    pub const fn stage1_cached(&self) -> usize {
        self.stage1_cached
    }

    /// Stage 2 items completed so far.
    #[must_use]
    pub const fn stage2_completed(&self) -> usize {
        self.stage2_completed
    }

    /// Stage 2 items adopted from the cache.
    #[must_use]
    pub const fn stage2_cached(&self) -> usize {
        self.stage2_cached
    }

    /// Error-class events observed so far.
    #[must_use]
    pub const fn errors(&self) -> usize {
        self.errors
    }
}
