//! Planning and applying line-level rewrites.
//!
//! Planners turn scan results into [`RewriteEdit`]s without touching any
//! document; the executor applies them document by document.

pub mod executor;
pub mod model;
pub mod planner;

pub use executor::apply;
pub use model::{AuditRecord, BatchSummary, EditFailure, EditReason, FailureReason, RewriteEdit};
pub use planner::{plan_format_conversion, plan_recovery, plan_target_rename, FormatConversion};
