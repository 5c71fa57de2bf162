//! Incremental annotation of script runs in a live document.
//!
//! * [`tree`]: the document seam and an in-memory implementation
//! * [`walk`]: document-order candidate collection and exclusion rules
//! * [`splice`]: idempotent in-place replacement of a scanned leaf
//! * [`annotator`]: one resolve-and-splice pass with fallback on failure
//! * [`scheduler`]: debounced, mutation-driven passes
//! * [`lookup`]: on-demand rich lookup of a selection
//! * [`config`]: TOML configuration

pub mod annotator;
pub mod config;
pub mod lookup;
pub mod scheduler;
pub mod splice;
pub mod tree;
pub mod walk;

#[cfg(test)]
mod invariants;

pub use annotator::{Annotator, PassReport, SharedTree};
pub use config::{ChimeraConfig, ConfigError};
pub use lookup::{LookupOutcome, LookupPipeline, LookupView};
pub use scheduler::{Scheduler, SchedulerConfig, SchedulerHandle, SchedulerPhase, SchedulerStats};
pub use splice::{ResolvedSegment, SpliceOutcome, splice_leaf};
pub use tree::{AnnotationMarker, ChangeKind, DocumentTree, Fragment, MemoryTree, NodeKind, TreeChange, TreeError};
pub use walk::WalkFilter;
