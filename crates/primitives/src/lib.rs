//! Core types for script-run annotation: bounded caches, script ranges,
//! segment scanning, and selection cleaning.

/// Fixed-capacity insertion-ordered cache.
pub mod cache;
/// Selection text normalization for on-demand lookups.
pub mod clean;
/// Target-script code point ranges and the script-run scanner.
pub mod script;

pub use cache::BoundedCache;
pub use clean::{CleanError, clean_selection};
pub use script::{Scanner, ScriptRange, ScriptRangeError, Segment, SegmentKind, Segments};
