//! AST node definitions
//!
//! Nodes are immutable once built. Every expression and statement carries a
//! [`NodeId`] minted by the builder; analysis results (inferred types) are
//! keyed by that id in a side table rather than written into the tree.

use crate::doc::DocBlock;
use crate::span::Span;

/// Stable identity of an AST node.
///
/// Ids are unique within one [`Program`](crate::Program) and survive
/// re-visits of the same node, so side tables keyed by `NodeId` never
/// mismatch after a subtree is checked twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

/// Member visibility.
///
/// | Modifier    | Accessible from                          |
/// |-------------|------------------------------------------|
/// | `public`    | everywhere                               |
/// | `protected` | declaring class, ancestors, descendants  |
/// | `private`   | declaring class only                     |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Visibility {
    Private,
    Protected,
    #[default]
    Public,
}

// ============================================================================
// Expressions
// ============================================================================

/// Expression node: stable id, source span, and the expression itself.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub id: NodeId,
    pub span: Span,
    pub kind: ExprKind,
}

/// Expression (produces a value).
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// Integer literal: `42`
    Int(i64),
    /// Float literal: `3.14`
    Float(f64),
    /// String literal: `'hello'`
    Str(String),
    /// Boolean literal: `true`, `false`
    Bool(bool),
    /// Null literal
    Null,

    /// Variable: `$name` (stored without the sigil)
    Variable { name: String },

    /// Array literal: `['a' => 1, 2]`
    Array { entries: Vec<ArrayEntry> },

    /// Binary operation: `$a + $b`, `$a && $b`, `$a === $b`
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },

    /// Unary operation: `!$a`, `-$a`
    Unary { op: UnaryOp, operand: Box<Expr> },

    /// Assignment: `$a = expr`, `$a->p = expr`, `$a['k'] = expr`
    Assign {
        target: Box<Expr>,
        value: Box<Expr>,
    },

    /// Compound assignment: `$a += expr`, `$s .= expr`
    CompoundAssign {
        target: Box<Expr>,
        op: BinaryOp,
        value: Box<Expr>,
    },

    /// Destructuring assignment: `[$a, $b] = expr` (holes allowed)
    ListAssign {
        targets: Vec<Option<Expr>>,
        value: Box<Expr>,
    },

    /// Ternary: `cond ? then : else` (`then` absent for the short form)
    Ternary {
        cond: Box<Expr>,
        then: Option<Box<Expr>>,
        otherwise: Box<Expr>,
    },

    /// `isset($a, $b->p)`
    Isset { targets: Vec<Expr> },

    /// `empty($a)`
    Empty { operand: Box<Expr> },

    /// `$a instanceof ClassName`
    Instanceof {
        operand: Box<Expr>,
        class: String,
    },

    /// Instance property fetch: `$obj->prop`
    PropertyFetch {
        receiver: Box<Expr>,
        property: String,
    },

    /// Static property fetch: `ClassName::$prop`
    StaticPropertyFetch { class: String, property: String },

    /// Class constant fetch: `ClassName::CONST`
    ClassConstFetch { class: String, constant: String },

    /// Array index: `$a['k']`, `$a[0]`; index absent for push (`$a[] = v`)
    ArrayAccess {
        array: Box<Expr>,
        index: Option<Box<Expr>>,
    },

    /// Instance method call: `$obj->m(...)`
    MethodCall {
        receiver: Box<Expr>,
        method: String,
        args: Vec<Arg>,
    },

    /// Static method call: `ClassName::m(...)`, `self::m(...)`,
    /// `parent::m(...)`, `static::m(...)`
    StaticCall {
        class: String,
        method: String,
        args: Vec<Arg>,
    },

    /// Free function call: `f(...)`
    FunctionCall { name: String, args: Vec<Arg> },

    /// Object construction: `new ClassName(...)`
    New { class: String, args: Vec<Arg> },

    /// Anonymous function: `function ($x) use ($y, &$z) { ... }`
    Closure {
        params: Vec<Param>,
        uses: Vec<ClosureUse>,
        return_type: Option<String>,
        body: Vec<Stmt>,
    },

    /// Backtick shell execution: `` `cmd` ``
    Shell { command: Box<Expr> },
}

/// One entry of an array literal; `key` is absent for list-style entries.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayEntry {
    pub key: Option<Expr>,
    pub value: Expr,
}

/// One call-site argument.
#[derive(Debug, Clone, PartialEq)]
pub struct Arg {
    pub value: Expr,
    /// `...$args` spread at the call site.
    pub spread: bool,
}

/// A closure capture: `use ($x)` or `use (&$x)`.
#[derive(Debug, Clone, PartialEq)]
pub struct ClosureUse {
    pub name: String,
    pub by_ref: bool,
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    /// String concatenation: `.`
    Concat,
    /// Short-circuit and: `&&`
    And,
    /// Short-circuit or: `||`
    Or,
    /// Null coalescing: `??`
    Coalesce,
    /// `===`
    Identical,
    /// `!==`
    NotIdentical,
    /// `==`
    Equal,
    /// `!=`
    NotEqual,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// `!`
    Not,
    /// `-`
    Neg,
}

impl Expr {
    /// Check if this expression is a literal.
    pub fn is_literal(&self) -> bool {
        matches!(
            self.kind,
            ExprKind::Int(_)
                | ExprKind::Float(_)
                | ExprKind::Str(_)
                | ExprKind::Bool(_)
                | ExprKind::Null
        )
    }

    /// Variable name when this is a plain variable expression.
    pub fn as_variable(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Variable { name } => Some(name),
            _ => None,
        }
    }
}

// ============================================================================
// Statements
// ============================================================================

/// Statement node: stable id, source span, and the statement itself.
#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub id: NodeId,
    pub span: Span,
    pub kind: StmtKind,
}

/// Statement (performs an action).
#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    /// Expression in statement position, with an optional annotation
    /// comment (`@var` applies to the assignment it precedes).
    Expr {
        expr: Expr,
        doc: Option<DocBlock>,
    },

    /// `echo expr, expr;`
    Echo { exprs: Vec<Expr> },

    /// `if (...) { ... } elseif (...) { ... } else { ... }`
    If {
        cond: Expr,
        then_branch: Vec<Stmt>,
        elseifs: Vec<ElseIf>,
        else_branch: Option<Vec<Stmt>>,
    },

    /// `while (...) { ... }`
    While { cond: Expr, body: Vec<Stmt> },

    /// `do { ... } while (...);`
    DoWhile { body: Vec<Stmt>, cond: Expr },

    /// `for (init; cond; step) { ... }`
    For {
        init: Vec<Expr>,
        cond: Option<Expr>,
        step: Vec<Expr>,
        body: Vec<Stmt>,
    },

    /// `foreach (coll as $k => $v) { ... }`
    Foreach {
        collection: Expr,
        key_var: Option<String>,
        value_var: String,
        body: Vec<Stmt>,
    },

    /// `switch (subject) { case v: ... default: ... }`
    Switch {
        subject: Expr,
        cases: Vec<SwitchCase>,
    },

    /// `break;`
    Break,

    /// `continue;`
    Continue,

    /// `return expr;`
    Return { expr: Option<Expr> },

    /// `throw expr;`
    Throw { expr: Expr },

    /// `try { ... } catch (A | B $e) { ... } finally { ... }`
    Try {
        body: Vec<Stmt>,
        catches: Vec<CatchClause>,
        finally: Option<Vec<Stmt>>,
    },

    /// `unset($a, $b['k']);`
    Unset { targets: Vec<Expr> },

    /// Free function declaration.
    Function(FunctionDecl),

    /// Class, interface, or mixin declaration.
    Class(ClassDecl),
}

/// One `elseif` arm.
#[derive(Debug, Clone, PartialEq)]
pub struct ElseIf {
    pub cond: Expr,
    pub body: Vec<Stmt>,
    pub span: Span,
}

/// One `case`/`default` arm; `value` is absent for `default`.
#[derive(Debug, Clone, PartialEq)]
pub struct SwitchCase {
    pub value: Option<Expr>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

/// One `catch` clause; multiple class names share one clause.
#[derive(Debug, Clone, PartialEq)]
pub struct CatchClause {
    pub class_names: Vec<String>,
    pub var: Option<String>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

impl Stmt {
    /// Check if this statement is a declaration.
    pub fn is_declaration(&self) -> bool {
        matches!(self.kind, StmtKind::Function(_) | StmtKind::Class(_))
    }
}

// ============================================================================
// Declarations
// ============================================================================

/// Function or method declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub name: String,
    pub params: Vec<Param>,
    /// Inline declared return type string, when present.
    pub return_type: Option<String>,
    pub body: Vec<Stmt>,
    /// Meaningful for methods only.
    pub visibility: Visibility,
    pub is_static: bool,
    pub is_abstract: bool,
    pub doc: Option<DocBlock>,
    pub span: Span,
}

/// Function/method/closure parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    /// Inline declared type string, when present.
    pub ty: Option<String>,
    pub by_ref: bool,
    pub variadic: bool,
    pub default: Option<Expr>,
    pub span: Span,
}

/// What a class-like declaration declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassKind {
    Class,
    Interface,
    /// Trait-like mixin pulled into classes with `use`.
    Mixin,
}

/// Class, interface, or mixin declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassDecl {
    pub name: String,
    pub kind: ClassKind,
    pub parent: Option<String>,
    pub interfaces: Vec<String>,
    /// Mixins pulled in with `use MixinName;` inside the body.
    pub mixins: Vec<String>,
    pub constants: Vec<ConstDecl>,
    pub properties: Vec<PropertyDecl>,
    pub methods: Vec<FunctionDecl>,
    pub is_abstract: bool,
    pub doc: Option<DocBlock>,
    pub span: Span,
}

/// Class property declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDecl {
    pub name: String,
    pub visibility: Visibility,
    pub is_static: bool,
    /// Inline declared type string, when present.
    pub ty: Option<String>,
    pub default: Option<Expr>,
    pub doc: Option<DocBlock>,
    pub span: Span,
}

/// Class constant declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstDecl {
    pub name: String,
    pub value: Expr,
    pub span: Span,
}

// ============================================================================
// Program
// ============================================================================

/// A parsed source file.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    /// Path reported in diagnostics.
    pub path: String,
    pub stmts: Vec<Stmt>,
}
