//! # spark-fiber
//!
//! Fiber-based incremental reconciler for UI trees.
//!
//! Application code describes the UI as an immutable tree of vnodes. The
//! reconciler keeps a mutable fiber per vnode across renders, diffs each new
//! description against the previous one by key and type, and applies only
//! the resulting insert/update/delete patches to a host tree.
//!
//! ## Architecture
//!
//! ```text
//! render(vnode) ─▶ Scheduler ─▶ reconcile_children (per fiber) ─▶ patch list ─▶ commit ─▶ Host
//!                      ▲                                                           │
//!                      └──────────── StateSetter::set ◀── effects ◀─────────────────┘
//! ```
//!
//! Work is single-threaded and cooperative. Requests are queued and a drive
//! cycle ([`Scheduler::flush`]) processes one fiber per [`Scheduler::step`],
//! then commits the finished unit in one go. A failure before commit rolls
//! the fiber tree back to its last committed state.
//!
//! ## Modules
//!
//! - [`types`] - Fiber tags, patch flags, keys and attribute values
//! - [`vnode`] - Vnodes, props, components and their builders
//! - [`fiber`] - Fibers and the slot arena that owns them
//! - [`reconcile`] - Child keying and the two-pass child diff
//! - [`scheduler`] - Request queue, depth-first traversal and drive loop
//! - [`commit`] - Patch application, anchors and effects
//! - [`hooks`] - Component state slots and effects
//! - [`host`] - Host tree trait and the in-memory [`Document`]

pub mod commit;
pub mod error;
pub mod fiber;
pub mod hooks;
pub mod host;
pub mod reconcile;
pub mod scheduler;
pub mod types;
pub mod vnode;

// Re-export commonly used items
pub use types::*;

pub use error::{ReconcileError, Result};

pub use vnode::{Component, ElementType, Props, VNode, component, h, text};

pub use fiber::{Fiber, FiberArena, FiberId};

pub use hooks::{HookState, Hooks, StateSetter};

pub use host::{Document, DocumentStats, Host, NodeId};

pub use scheduler::{Scheduler, SchedulerBuilder, SchedulerConfig, Step, Updater};

pub use commit::{AppliedPatch, CommitReport};
