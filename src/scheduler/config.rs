//! Scheduler configuration and builder.

use std::fmt;
use std::rc::Rc;

use super::{ScheduleFn, Scheduler};
use crate::host::Host;

/// Tunables for a [`Scheduler`].
#[derive(Clone, Default)]
pub struct SchedulerConfig {
    /// Anchor the first placement into a non-empty container before the
    /// container's existing first child, until a placed node lands last.
    ///
    /// Default: `false` (always anchor at the next sibling's node).
    pub legacy_bootstrap_anchor: bool,

    /// Invoked when the scheduler goes from idle to "drive requested".
    ///
    /// The embedder is expected to call [`Scheduler::flush`] later, once the
    /// current call stack has unwound. Requests made before that flush
    /// coalesce into a single drive.
    pub on_schedule: Option<ScheduleFn>,
}

impl fmt::Debug for SchedulerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchedulerConfig")
            .field("legacy_bootstrap_anchor", &self.legacy_bootstrap_anchor)
            .field("on_schedule", &self.on_schedule.is_some())
            .finish()
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Chained builder for a [`Scheduler`].
///
/// ```ignore
/// let scheduler = SchedulerBuilder::new()
///     .legacy_bootstrap_anchor(true)
///     .on_schedule(move || wake.set(true))
///     .build(Document::new());
/// ```
#[derive(Debug, Default)]
pub struct SchedulerBuilder {
    config: SchedulerConfig,
}

impl SchedulerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable the one-time bootstrap anchor for pre-populated containers.
    ///
    /// Default: `false`
    pub fn legacy_bootstrap_anchor(mut self, enabled: bool) -> Self {
        self.config.legacy_bootstrap_anchor = enabled;
        self
    }

    /// Set the deferral callback.
    pub fn on_schedule(mut self, f: impl Fn() + 'static) -> Self {
        self.config.on_schedule = Some(Rc::new(f));
        self
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Build a scheduler driving `host`.
    pub fn build<H: Host>(self, host: H) -> Scheduler<H> {
        Scheduler::with_config(host, self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::Document;

    #[test]
    fn test_defaults() {
        let config = SchedulerConfig::default();
        assert!(!config.legacy_bootstrap_anchor);
        assert!(config.on_schedule.is_none());
    }

    #[test]
    fn test_builder_chains() {
        let builder = SchedulerBuilder::new()
            .legacy_bootstrap_anchor(true)
            .on_schedule(|| {});

        assert!(builder.config().legacy_bootstrap_anchor);
        assert!(builder.config().on_schedule.is_some());
        assert!(format!("{:?}", builder).contains("on_schedule: true"));
    }

    #[test]
    fn test_build_infers_host_from_argument() {
        let scheduler = SchedulerBuilder::new()
            .legacy_bootstrap_anchor(true)
            .build(Document::new());

        assert!(scheduler.config().legacy_bootstrap_anchor);
        assert!(!scheduler.has_pending_work());
    }
}
