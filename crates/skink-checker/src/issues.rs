//! Issue collection
//!
//! Every diagnostic the analyzer produces is an [`Issue`] routed through
//! the [`IssueSink`]. The sink applies suppression lists and severity
//! overrides, deduplicates by content, and implements the
//! stop-on-first-error fatal path. Most issues are recoverable: the
//! checker substitutes `mixed` or skips the offending subtree and keeps
//! going.

use std::hash::{Hash, Hasher};

use rustc_hash::{FxHashSet, FxHasher};
use skink_ast::Span;
use thiserror::Error;

use crate::config::Config;

/// Everything the analyzer can complain about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IssueKind {
    // ===== Structural =====
    UndefinedVariable,
    PossiblyUndefinedVariable,
    UndefinedFunction,
    UndefinedClass,
    UndefinedConstant,
    UndefinedProperty,
    UndefinedMethod,
    InvalidClassCasing,
    CircularHierarchy,
    DuplicateClass,
    DuplicateFunction,

    // ===== Type =====
    InvalidArgument,
    InvalidReturnType,
    NullReference,
    PossiblyNullReference,
    InvalidArrayOffset,
    InvalidIterator,
    InvalidPropertyAssignment,
    InvalidDocblock,
    FailedTypeResolution,
    MixedMethodCall,
    MixedPropertyFetch,

    // ===== Visibility / binding =====
    InaccessibleMethod,
    InaccessibleProperty,
    InvalidStaticInvocation,
    InvalidScope,

    // ===== Lifecycle =====
    DeprecatedMethod,

    // ===== Control-flow hygiene =====
    UnreachableStatement,
    TooFewArguments,
    TooManyArguments,
    RedundantCondition,

    // ===== Forbidden constructs =====
    ForbiddenCode,
}

impl IssueKind {
    /// Stable diagnostic code.
    pub fn code(&self) -> &'static str {
        match self {
            IssueKind::UndefinedVariable => "E1001",
            IssueKind::PossiblyUndefinedVariable => "E1002",
            IssueKind::UndefinedFunction => "E1003",
            IssueKind::UndefinedClass => "E1004",
            IssueKind::UndefinedConstant => "E1005",
            IssueKind::UndefinedProperty => "E1006",
            IssueKind::UndefinedMethod => "E1007",
            IssueKind::InvalidClassCasing => "E1008",
            IssueKind::CircularHierarchy => "E1009",
            IssueKind::DuplicateClass => "E1010",
            IssueKind::DuplicateFunction => "E1011",
            IssueKind::InvalidArgument => "E2001",
            IssueKind::InvalidReturnType => "E2002",
            IssueKind::NullReference => "E2003",
            IssueKind::PossiblyNullReference => "E2004",
            IssueKind::InvalidArrayOffset => "E2005",
            IssueKind::InvalidIterator => "E2006",
            IssueKind::InvalidPropertyAssignment => "E2007",
            IssueKind::InvalidDocblock => "E2008",
            IssueKind::FailedTypeResolution => "E2009",
            IssueKind::MixedMethodCall => "E2010",
            IssueKind::MixedPropertyFetch => "E2011",
            IssueKind::InaccessibleMethod => "E3001",
            IssueKind::InaccessibleProperty => "E3002",
            IssueKind::InvalidStaticInvocation => "E3003",
            IssueKind::InvalidScope => "E3004",
            IssueKind::ForbiddenCode => "E4001",
            IssueKind::DeprecatedMethod => "W1001",
            IssueKind::UnreachableStatement => "W1002",
            IssueKind::TooFewArguments => "E2012",
            IssueKind::TooManyArguments => "E2013",
            IssueKind::RedundantCondition => "W1003",
        }
    }

    /// Kind name as written in `@suppress` annotations.
    pub fn name(&self) -> &'static str {
        match self {
            IssueKind::UndefinedVariable => "UndefinedVariable",
            IssueKind::PossiblyUndefinedVariable => "PossiblyUndefinedVariable",
            IssueKind::UndefinedFunction => "UndefinedFunction",
            IssueKind::UndefinedClass => "UndefinedClass",
            IssueKind::UndefinedConstant => "UndefinedConstant",
            IssueKind::UndefinedProperty => "UndefinedProperty",
            IssueKind::UndefinedMethod => "UndefinedMethod",
            IssueKind::InvalidClassCasing => "InvalidClassCasing",
            IssueKind::CircularHierarchy => "CircularHierarchy",
            IssueKind::DuplicateClass => "DuplicateClass",
            IssueKind::DuplicateFunction => "DuplicateFunction",
            IssueKind::InvalidArgument => "InvalidArgument",
            IssueKind::InvalidReturnType => "InvalidReturnType",
            IssueKind::NullReference => "NullReference",
            IssueKind::PossiblyNullReference => "PossiblyNullReference",
            IssueKind::InvalidArrayOffset => "InvalidArrayOffset",
            IssueKind::InvalidIterator => "InvalidIterator",
            IssueKind::InvalidPropertyAssignment => "InvalidPropertyAssignment",
            IssueKind::InvalidDocblock => "InvalidDocblock",
            IssueKind::FailedTypeResolution => "FailedTypeResolution",
            IssueKind::MixedMethodCall => "MixedMethodCall",
            IssueKind::MixedPropertyFetch => "MixedPropertyFetch",
            IssueKind::InaccessibleMethod => "InaccessibleMethod",
            IssueKind::InaccessibleProperty => "InaccessibleProperty",
            IssueKind::InvalidStaticInvocation => "InvalidStaticInvocation",
            IssueKind::InvalidScope => "InvalidScope",
            IssueKind::DeprecatedMethod => "DeprecatedMethod",
            IssueKind::UnreachableStatement => "UnreachableStatement",
            IssueKind::TooFewArguments => "TooFewArguments",
            IssueKind::TooManyArguments => "TooManyArguments",
            IssueKind::RedundantCondition => "RedundantCondition",
            IssueKind::ForbiddenCode => "ForbiddenCode",
        }
    }

    /// Inverse of [`IssueKind::name`], for `@suppress` lists.
    pub fn from_name(name: &str) -> Option<IssueKind> {
        use IssueKind::*;
        let kind = match name {
            "UndefinedVariable" => UndefinedVariable,
            "PossiblyUndefinedVariable" => PossiblyUndefinedVariable,
            "UndefinedFunction" => UndefinedFunction,
            "UndefinedClass" => UndefinedClass,
            "UndefinedConstant" => UndefinedConstant,
            "UndefinedProperty" => UndefinedProperty,
            "UndefinedMethod" => UndefinedMethod,
            "InvalidClassCasing" => InvalidClassCasing,
            "CircularHierarchy" => CircularHierarchy,
            "DuplicateClass" => DuplicateClass,
            "DuplicateFunction" => DuplicateFunction,
            "InvalidArgument" => InvalidArgument,
            "InvalidReturnType" => InvalidReturnType,
            "NullReference" => NullReference,
            "PossiblyNullReference" => PossiblyNullReference,
            "InvalidArrayOffset" => InvalidArrayOffset,
            "InvalidIterator" => InvalidIterator,
            "InvalidPropertyAssignment" => InvalidPropertyAssignment,
            "InvalidDocblock" => InvalidDocblock,
            "FailedTypeResolution" => FailedTypeResolution,
            "MixedMethodCall" => MixedMethodCall,
            "MixedPropertyFetch" => MixedPropertyFetch,
            "InaccessibleMethod" => InaccessibleMethod,
            "InaccessibleProperty" => InaccessibleProperty,
            "InvalidStaticInvocation" => InvalidStaticInvocation,
            "InvalidScope" => InvalidScope,
            "DeprecatedMethod" => DeprecatedMethod,
            "UnreachableStatement" => UnreachableStatement,
            "TooFewArguments" => TooFewArguments,
            "TooManyArguments" => TooManyArguments,
            "RedundantCondition" => RedundantCondition,
            "ForbiddenCode" => ForbiddenCode,
            _ => return None,
        };
        Some(kind)
    }

    /// Severity before configuration overrides.
    pub fn default_severity(&self) -> Severity {
        match self {
            IssueKind::DeprecatedMethod
            | IssueKind::UnreachableStatement
            | IssueKind::RedundantCondition
            | IssueKind::MixedMethodCall
            | IssueKind::MixedPropertyFetch => Severity::Info,
            _ => Severity::Error,
        }
    }
}

/// Issue severity after gating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Info,
    Error,
    /// Configured away entirely; never recorded.
    Suppressed,
}

/// One diagnostic.
#[derive(Debug, Clone, PartialEq)]
pub struct Issue {
    pub kind: IssueKind,
    pub message: String,
    pub file: String,
    pub span: Span,
    pub severity: Severity,
}

impl Issue {
    pub fn new(kind: IssueKind, message: impl Into<String>, file: impl Into<String>, span: Span) -> Issue {
        Issue {
            kind,
            message: message.into(),
            file: file.into(),
            span,
            severity: kind.default_severity(),
        }
    }
}

/// Raised when the run cannot continue.
#[derive(Debug, Error)]
pub enum Fatal {
    #[error("{file}:{line}: {message} (stopping on first error)")]
    StopOnFirst {
        kind: IssueKind,
        message: String,
        file: String,
        line: u32,
    },
}

/// Collects accepted issues for the whole run.
#[derive(Debug)]
pub struct IssueSink {
    issues: Vec<Issue>,
    seen: FxHashSet<u64>,
    stop_on_first_error: bool,
    config_suppressed: FxHashSet<IssueKind>,
    overrides: Vec<(IssueKind, Severity)>,
}

impl IssueSink {
    pub fn new(config: &Config) -> IssueSink {
        let mut overrides: Vec<(IssueKind, Severity)> = config
            .severity_overrides
            .iter()
            .map(|(k, s)| (*k, *s))
            .collect();
        if !config.strict_nullability
            && !config
                .severity_overrides
                .contains_key(&IssueKind::PossiblyNullReference)
        {
            overrides.push((IssueKind::PossiblyNullReference, Severity::Info));
        }
        IssueSink {
            issues: Vec::new(),
            seen: FxHashSet::default(),
            stop_on_first_error: config.stop_on_first_error,
            config_suppressed: config.suppressed_kinds.clone(),
            overrides,
        }
    }

    /// Records an issue unless suppressed; returns whether it was accepted.
    ///
    /// `suppressed` is the caller's active `@suppress` list. Accepted
    /// issues are deduplicated by kind, message, and location. Under
    /// stop-on-first-error the first accepted error aborts the run.
    pub fn report(&mut self, mut issue: Issue, suppressed: &[IssueKind]) -> Result<bool, Fatal> {
        if suppressed.contains(&issue.kind) || self.config_suppressed.contains(&issue.kind) {
            return Ok(false);
        }
        if let Some((_, severity)) = self.overrides.iter().find(|(k, _)| *k == issue.kind) {
            issue.severity = *severity;
        }
        if issue.severity == Severity::Suppressed {
            return Ok(false);
        }

        let mut hasher = FxHasher::default();
        issue.kind.hash(&mut hasher);
        issue.message.hash(&mut hasher);
        issue.file.hash(&mut hasher);
        issue.span.line.hash(&mut hasher);
        let digest = hasher.finish();
        if !self.seen.insert(digest) {
            return Ok(false);
        }

        let fatal = self.stop_on_first_error && issue.severity == Severity::Error;
        let result = if fatal {
            Err(Fatal::StopOnFirst {
                kind: issue.kind,
                message: issue.message.clone(),
                file: issue.file.clone(),
                line: issue.span.line,
            })
        } else {
            Ok(true)
        };
        self.issues.push(issue);
        result
    }

    /// Whether any recorded issue has error severity.
    pub fn has_errors(&self) -> bool {
        self.issues.iter().any(|i| i.severity == Severity::Error)
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    /// Takes the recorded issues, leaving the sink empty.
    pub fn drain(&mut self) -> Vec<Issue> {
        std::mem::take(&mut self.issues)
    }
}
