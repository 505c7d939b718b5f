//! imgref Core Library
//!
//! Keeps image references inside a tree of Markdown notes consistent:
//! link parsing, path naming policies, broken-reference detection,
//! operation-log recovery and batch rewriting.
//!

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod line_map;
pub mod model;
pub mod namespace;
pub mod oplog;
pub mod paths;
pub mod recovery;
pub mod rewrite;
pub mod scanner;
pub mod syntax;
pub mod utils;
pub mod vfs;

pub use config::ImgrefConfig;
pub use engine::ImgrefEngine;
pub use error::{ImgrefError, ParseMiss};
pub use model::{
    LinkOccurrence, OperationKind, OperationLogEntry, RecoveryCandidate, RecoveryType,
    ReferenceStatus, ResolvedReference, SyntaxKind,
};
pub use namespace::{FileIndex, Namespace};
pub use oplog::{AuditSink, OperationFilter, OperationLog};
pub use paths::NamingPolicy;
pub use rewrite::model::{AuditRecord, BatchSummary, RewriteEdit};
pub use rewrite::FormatConversion;
pub use scanner::{ScanOptions, ScanReport};
pub use utils::normalize_vault_path;
pub use vfs::{DocumentStore, MemoryFileSystem, PhysicalFileSystem};
