//! Skink Type Checker
//!
//! Flow-sensitive static analysis for Skink programs.
//!
//! This crate provides:
//! - [`Registry`]: classes, functions, and builtin signatures for one run
//! - [`Checker`]: the statement and expression walker, with per-branch
//!   [`Context`]s and assertion-based narrowing
//! - [`Issue`] and [`IssueSink`]: diagnostic collection with suppression,
//!   severity overrides, and deduplication
//! - [`diagnostics`]: terminal and JSON rendering of collected issues
//! - [`analyze`]: the one-call entry point
//!
//! # Usage
//!
//! ```
//! use skink_ast::AstBuilder;
//! use skink_checker::{analyze, Config, Registry};
//!
//! let mut b = AstBuilder::new();
//! let one = b.int(1);
//! let assign = b.assign_stmt("$x", one);
//! let x = b.var("$x");
//! let echo = b.echo(vec![x]);
//! let program = b.program("demo.skink", vec![assign, echo]);
//!
//! let mut registry = Registry::new();
//! let analysis = analyze(&program, &mut registry, &Config::default());
//! assert!(analysis.issues.is_empty());
//! ```

use rustc_hash::FxHashMap;
use skink_ast::{NodeId, Program};
use skink_types::Union;

pub mod checker;
pub mod config;
pub mod context;
pub mod diagnostics;
pub mod issues;
pub mod reconciler;
pub mod registry;

// Re-export main types
pub use checker::Checker;
pub use config::Config;
pub use context::Context;
pub use diagnostics::{create_files, emit_issues, issues_to_json, Diagnostic, JsonDiagnostic};
pub use issues::{Fatal, Issue, IssueKind, IssueSink, Severity};
pub use reconciler::{Assertion, Assertions};
pub use registry::{
    ClassLookup, ClassRecord, FunctionRecord, MethodRecord, ParamRecord, PropertyRecord, Registry,
};

/// Everything one analysis run produces.
#[derive(Debug)]
pub struct Analysis {
    /// Accepted issues, in discovery order.
    pub issues: Vec<Issue>,
    /// Inferred type of every checked expression node.
    pub node_types: FxHashMap<NodeId, Union>,
    /// Present when the run aborted on the first error.
    pub fatal: Option<Fatal>,
}

impl Analysis {
    /// Whether any recorded issue has error severity.
    pub fn has_errors(&self) -> bool {
        self.issues.iter().any(|i| i.severity == Severity::Error)
    }
}

/// Checks one program against the given registry and configuration.
///
/// Issues recorded before a fatal stop are still returned.
pub fn analyze(program: &Program, registry: &mut Registry, config: &Config) -> Analysis {
    let mut checker = Checker::new(registry, config);
    let fatal = checker.check_program(program).err();
    let (issues, node_types) = checker.into_results();
    Analysis {
        issues,
        node_types,
        fatal,
    }
}
