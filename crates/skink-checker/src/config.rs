//! Run configuration
//!
//! The configuration surface of one analysis run. Loading these settings
//! from project files is the embedder's concern; the analyzer only reads
//! the struct.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::issues::{IssueKind, Severity};

/// Settings for one analysis run.
#[derive(Debug, Clone)]
pub struct Config {
    /// Abort the run on the first accepted error-severity issue.
    pub stop_on_first_error: bool,
    /// Prefer annotation comment types over inferred types.
    pub trust_doc_types: bool,
    /// Treat possibly-null dereferences as errors instead of notices, and
    /// refuse null arguments for non-nullable parameters.
    pub strict_nullability: bool,
    /// Report shell execution constructs.
    pub forbid_shell_exec: bool,
    /// Report debugging dump calls.
    pub forbid_debug_dumps: bool,
    /// Per-kind severity overrides.
    pub severity_overrides: FxHashMap<IssueKind, Severity>,
    /// Kinds dropped for the whole run.
    pub suppressed_kinds: FxHashSet<IssueKind>,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            stop_on_first_error: false,
            trust_doc_types: true,
            strict_nullability: false,
            forbid_shell_exec: false,
            forbid_debug_dumps: false,
            severity_overrides: FxHashMap::default(),
            suppressed_kinds: FxHashSet::default(),
        }
    }
}
