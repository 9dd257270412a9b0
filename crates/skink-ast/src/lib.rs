//! Skink AST
//!
//! Node structures for parsed Skink programs.
//!
//! This crate provides:
//! - Expression and statement nodes with stable [`NodeId`]s and [`Span`]s
//! - Class/function/property declaration structures
//! - The [`DocBlock`] carrier for already-lexed annotation comments
//! - [`AstBuilder`], the id-minting construction surface used by the
//!   upstream parser and by tests
//!
//! The tree is immutable once built; analysis results live in side tables
//! keyed by [`NodeId`].

pub mod ast;
pub mod builder;
pub mod doc;
pub mod span;

// Re-export main types
pub use ast::{
    Arg, ArrayEntry, BinaryOp, CatchClause, ClassDecl, ClassKind, ClosureUse, ConstDecl, ElseIf,
    Expr, ExprKind, FunctionDecl, NodeId, Param, Program, PropertyDecl, Stmt, StmtKind,
    SwitchCase, UnaryOp, Visibility,
};
pub use builder::AstBuilder;
pub use doc::DocBlock;
pub use span::Span;
