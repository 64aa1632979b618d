//! Error taxonomy for the reconciler.
//!
//! The reconciler validates nothing itself. Errors come from the two
//! collaborators it drives (the host tree and user effects) and from
//! lookups of fibers that no longer exist.

use thiserror::Error;

use crate::fiber::FiberId;

/// Failure of a drive cycle.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// A host tree operation failed.
    #[error("host operation `{op}` failed")]
    Host {
        op: &'static str,
        #[source]
        source: anyhow::Error,
    },

    /// A post-commit effect returned an error.
    #[error("effect of {component} ({fiber:?}) failed")]
    Effect {
        fiber: FiberId,
        component: String,
        #[source]
        source: anyhow::Error,
    },

    /// A fiber handle no longer resolves in the arena.
    #[error("fiber {0:?} is not alive")]
    StaleFiber(FiberId),

    /// A fiber that must own a host node reached commit without one.
    #[error("fiber {0:?} has no host node")]
    MissingNode(FiberId),
}

impl ReconcileError {
    pub(crate) fn host(op: &'static str) -> impl FnOnce(anyhow::Error) -> Self {
        move |source| ReconcileError::Host { op, source }
    }
}

pub type Result<T, E = ReconcileError> = std::result::Result<T, E>;
