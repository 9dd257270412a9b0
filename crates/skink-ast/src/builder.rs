//! AST construction
//!
//! [`AstBuilder`] is the only way to mint [`NodeId`]s, which keeps them
//! unique per program. The upstream parser drives it when lowering source
//! text; tests drive it directly to assemble programs without a parser.
//! Every node receives a fresh synthetic span (one line per node) so
//! diagnostics stay distinguishable even for programs that never had
//! source text.

use crate::ast::*;
use crate::doc::DocBlock;
use crate::span::Span;

/// Builder for AST nodes with stable ids.
#[derive(Debug, Default)]
pub struct AstBuilder {
    next_id: u32,
    next_line: u32,
}

impl AstBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    fn fresh_span(&mut self) -> Span {
        self.next_line += 1;
        let start = (self.next_line as usize) * 16;
        Span::new(start, start + 8, self.next_line, 1)
    }

    /// Wraps an expression kind into a node with a fresh id and span.
    pub fn expr(&mut self, kind: ExprKind) -> Expr {
        Expr {
            id: self.id(),
            span: self.fresh_span(),
            kind,
        }
    }

    /// Wraps a statement kind into a node with a fresh id and span.
    pub fn stmt(&mut self, kind: StmtKind) -> Stmt {
        Stmt {
            id: self.id(),
            span: self.fresh_span(),
            kind,
        }
    }

    // ===== Literals =====

    pub fn int(&mut self, value: i64) -> Expr {
        self.expr(ExprKind::Int(value))
    }

    pub fn float(&mut self, value: f64) -> Expr {
        self.expr(ExprKind::Float(value))
    }

    pub fn str(&mut self, value: &str) -> Expr {
        self.expr(ExprKind::Str(value.to_string()))
    }

    pub fn bool(&mut self, value: bool) -> Expr {
        self.expr(ExprKind::Bool(value))
    }

    pub fn null(&mut self) -> Expr {
        self.expr(ExprKind::Null)
    }

    // ===== Variables and access paths =====

    /// Variable reference; a leading `$` sigil is accepted and stripped.
    pub fn var(&mut self, name: &str) -> Expr {
        let name = name.strip_prefix('$').unwrap_or(name).to_string();
        self.expr(ExprKind::Variable { name })
    }

    pub fn prop_fetch(&mut self, receiver: Expr, property: &str) -> Expr {
        self.expr(ExprKind::PropertyFetch {
            receiver: Box::new(receiver),
            property: property.to_string(),
        })
    }

    pub fn static_prop(&mut self, class: &str, property: &str) -> Expr {
        self.expr(ExprKind::StaticPropertyFetch {
            class: class.to_string(),
            property: property.strip_prefix('$').unwrap_or(property).to_string(),
        })
    }

    pub fn class_const(&mut self, class: &str, constant: &str) -> Expr {
        self.expr(ExprKind::ClassConstFetch {
            class: class.to_string(),
            constant: constant.to_string(),
        })
    }

    pub fn array_idx(&mut self, array: Expr, index: Expr) -> Expr {
        self.expr(ExprKind::ArrayAccess {
            array: Box::new(array),
            index: Some(Box::new(index)),
        })
    }

    /// Push target: `$a[]`.
    pub fn array_push(&mut self, array: Expr) -> Expr {
        self.expr(ExprKind::ArrayAccess {
            array: Box::new(array),
            index: None,
        })
    }

    // ===== Operators =====

    pub fn binary(&mut self, op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
        self.expr(ExprKind::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    }

    pub fn and(&mut self, lhs: Expr, rhs: Expr) -> Expr {
        self.binary(BinaryOp::And, lhs, rhs)
    }

    pub fn or(&mut self, lhs: Expr, rhs: Expr) -> Expr {
        self.binary(BinaryOp::Or, lhs, rhs)
    }

    pub fn identical(&mut self, lhs: Expr, rhs: Expr) -> Expr {
        self.binary(BinaryOp::Identical, lhs, rhs)
    }

    pub fn not_identical(&mut self, lhs: Expr, rhs: Expr) -> Expr {
        self.binary(BinaryOp::NotIdentical, lhs, rhs)
    }

    pub fn concat(&mut self, lhs: Expr, rhs: Expr) -> Expr {
        self.binary(BinaryOp::Concat, lhs, rhs)
    }

    pub fn not(&mut self, operand: Expr) -> Expr {
        self.expr(ExprKind::Unary {
            op: UnaryOp::Not,
            operand: Box::new(operand),
        })
    }

    pub fn neg(&mut self, operand: Expr) -> Expr {
        self.expr(ExprKind::Unary {
            op: UnaryOp::Neg,
            operand: Box::new(operand),
        })
    }

    pub fn ternary(&mut self, cond: Expr, then: Option<Expr>, otherwise: Expr) -> Expr {
        self.expr(ExprKind::Ternary {
            cond: Box::new(cond),
            then: then.map(Box::new),
            otherwise: Box::new(otherwise),
        })
    }

    pub fn instanceof(&mut self, operand: Expr, class: &str) -> Expr {
        self.expr(ExprKind::Instanceof {
            operand: Box::new(operand),
            class: class.to_string(),
        })
    }

    pub fn isset(&mut self, targets: Vec<Expr>) -> Expr {
        self.expr(ExprKind::Isset { targets })
    }

    pub fn empty(&mut self, operand: Expr) -> Expr {
        self.expr(ExprKind::Empty {
            operand: Box::new(operand),
        })
    }

    pub fn shell(&mut self, command: Expr) -> Expr {
        self.expr(ExprKind::Shell {
            command: Box::new(command),
        })
    }

    // ===== Arrays =====

    /// Array literal from `(key, value)` pairs; `None` keys append.
    pub fn array(&mut self, entries: Vec<(Option<Expr>, Expr)>) -> Expr {
        let entries = entries
            .into_iter()
            .map(|(key, value)| ArrayEntry { key, value })
            .collect();
        self.expr(ExprKind::Array { entries })
    }

    /// List-style array literal: `[v1, v2, ...]`.
    pub fn list(&mut self, values: Vec<Expr>) -> Expr {
        let entries = values
            .into_iter()
            .map(|value| ArrayEntry { key: None, value })
            .collect();
        self.expr(ExprKind::Array { entries })
    }

    // ===== Assignment =====

    pub fn assign(&mut self, target: Expr, value: Expr) -> Expr {
        self.expr(ExprKind::Assign {
            target: Box::new(target),
            value: Box::new(value),
        })
    }

    pub fn compound_assign(&mut self, target: Expr, op: BinaryOp, value: Expr) -> Expr {
        self.expr(ExprKind::CompoundAssign {
            target: Box::new(target),
            op,
            value: Box::new(value),
        })
    }

    pub fn list_assign(&mut self, targets: Vec<Option<Expr>>, value: Expr) -> Expr {
        self.expr(ExprKind::ListAssign {
            targets,
            value: Box::new(value),
        })
    }

    /// `$name = value;` as a statement.
    pub fn assign_stmt(&mut self, name: &str, value: Expr) -> Stmt {
        let target = self.var(name);
        let assign = self.assign(target, value);
        self.expr_stmt(assign)
    }

    /// `$name = value;` with an annotation comment.
    pub fn assign_stmt_doc(&mut self, name: &str, value: Expr, doc: DocBlock) -> Stmt {
        let target = self.var(name);
        let expr = self.assign(target, value);
        self.stmt(StmtKind::Expr {
            expr,
            doc: Some(doc),
        })
    }

    // ===== Calls =====

    pub fn arg(value: Expr) -> Arg {
        Arg {
            value,
            spread: false,
        }
    }

    pub fn spread_arg(value: Expr) -> Arg {
        Arg {
            value,
            spread: true,
        }
    }

    pub fn call(&mut self, name: &str, args: Vec<Expr>) -> Expr {
        let args = args.into_iter().map(Self::arg).collect();
        self.expr(ExprKind::FunctionCall {
            name: name.to_string(),
            args,
        })
    }

    pub fn method_call(&mut self, receiver: Expr, method: &str, args: Vec<Expr>) -> Expr {
        let args = args.into_iter().map(Self::arg).collect();
        self.expr(ExprKind::MethodCall {
            receiver: Box::new(receiver),
            method: method.to_string(),
            args,
        })
    }

    pub fn static_call(&mut self, class: &str, method: &str, args: Vec<Expr>) -> Expr {
        let args = args.into_iter().map(Self::arg).collect();
        self.expr(ExprKind::StaticCall {
            class: class.to_string(),
            method: method.to_string(),
            args,
        })
    }

    pub fn new_object(&mut self, class: &str, args: Vec<Expr>) -> Expr {
        let args = args.into_iter().map(Self::arg).collect();
        self.expr(ExprKind::New {
            class: class.to_string(),
            args,
        })
    }

    pub fn closure(
        &mut self,
        params: Vec<Param>,
        uses: Vec<ClosureUse>,
        body: Vec<Stmt>,
    ) -> Expr {
        self.expr(ExprKind::Closure {
            params,
            uses,
            return_type: None,
            body,
        })
    }

    pub fn use_by_value(name: &str) -> ClosureUse {
        ClosureUse {
            name: name.strip_prefix('$').unwrap_or(name).to_string(),
            by_ref: false,
        }
    }

    pub fn use_by_ref(name: &str) -> ClosureUse {
        ClosureUse {
            name: name.strip_prefix('$').unwrap_or(name).to_string(),
            by_ref: true,
        }
    }

    // ===== Statements =====

    pub fn expr_stmt(&mut self, expr: Expr) -> Stmt {
        self.stmt(StmtKind::Expr { expr, doc: None })
    }

    pub fn echo(&mut self, exprs: Vec<Expr>) -> Stmt {
        self.stmt(StmtKind::Echo { exprs })
    }

    pub fn if_stmt(&mut self, cond: Expr, then: Vec<Stmt>, els: Option<Vec<Stmt>>) -> Stmt {
        self.stmt(StmtKind::If {
            cond,
            then_branch: then,
            elseifs: Vec::new(),
            else_branch: els,
        })
    }

    pub fn if_full(
        &mut self,
        cond: Expr,
        then: Vec<Stmt>,
        elseifs: Vec<ElseIf>,
        els: Option<Vec<Stmt>>,
    ) -> Stmt {
        self.stmt(StmtKind::If {
            cond,
            then_branch: then,
            elseifs,
            else_branch: els,
        })
    }

    pub fn elseif(&mut self, cond: Expr, body: Vec<Stmt>) -> ElseIf {
        ElseIf {
            cond,
            body,
            span: self.fresh_span(),
        }
    }

    pub fn while_stmt(&mut self, cond: Expr, body: Vec<Stmt>) -> Stmt {
        self.stmt(StmtKind::While { cond, body })
    }

    pub fn do_while(&mut self, body: Vec<Stmt>, cond: Expr) -> Stmt {
        self.stmt(StmtKind::DoWhile { body, cond })
    }

    pub fn for_stmt(
        &mut self,
        init: Vec<Expr>,
        cond: Option<Expr>,
        step: Vec<Expr>,
        body: Vec<Stmt>,
    ) -> Stmt {
        self.stmt(StmtKind::For {
            init,
            cond,
            step,
            body,
        })
    }

    pub fn foreach(
        &mut self,
        collection: Expr,
        key_var: Option<&str>,
        value_var: &str,
        body: Vec<Stmt>,
    ) -> Stmt {
        self.stmt(StmtKind::Foreach {
            collection,
            key_var: key_var.map(|k| k.strip_prefix('$').unwrap_or(k).to_string()),
            value_var: value_var
                .strip_prefix('$')
                .unwrap_or(value_var)
                .to_string(),
            body,
        })
    }

    pub fn switch_stmt(&mut self, subject: Expr, cases: Vec<SwitchCase>) -> Stmt {
        self.stmt(StmtKind::Switch { subject, cases })
    }

    pub fn case(&mut self, value: Expr, body: Vec<Stmt>) -> SwitchCase {
        SwitchCase {
            value: Some(value),
            body,
            span: self.fresh_span(),
        }
    }

    pub fn default_case(&mut self, body: Vec<Stmt>) -> SwitchCase {
        SwitchCase {
            value: None,
            body,
            span: self.fresh_span(),
        }
    }

    pub fn break_stmt(&mut self) -> Stmt {
        self.stmt(StmtKind::Break)
    }

    pub fn continue_stmt(&mut self) -> Stmt {
        self.stmt(StmtKind::Continue)
    }

    pub fn ret(&mut self, expr: Option<Expr>) -> Stmt {
        self.stmt(StmtKind::Return { expr })
    }

    pub fn throw_stmt(&mut self, expr: Expr) -> Stmt {
        self.stmt(StmtKind::Throw { expr })
    }

    pub fn try_stmt(
        &mut self,
        body: Vec<Stmt>,
        catches: Vec<CatchClause>,
        finally: Option<Vec<Stmt>>,
    ) -> Stmt {
        self.stmt(StmtKind::Try {
            body,
            catches,
            finally,
        })
    }

    pub fn catch(&mut self, class_names: Vec<&str>, var: &str, body: Vec<Stmt>) -> CatchClause {
        CatchClause {
            class_names: class_names.into_iter().map(String::from).collect(),
            var: Some(var.strip_prefix('$').unwrap_or(var).to_string()),
            body,
            span: self.fresh_span(),
        }
    }

    pub fn unset(&mut self, targets: Vec<Expr>) -> Stmt {
        self.stmt(StmtKind::Unset { targets })
    }

    // ===== Declarations =====

    pub fn param(&mut self, name: &str, ty: Option<&str>) -> Param {
        Param {
            name: name.strip_prefix('$').unwrap_or(name).to_string(),
            ty: ty.map(String::from),
            by_ref: false,
            variadic: false,
            default: None,
            span: self.fresh_span(),
        }
    }

    pub fn function(
        &mut self,
        name: &str,
        params: Vec<Param>,
        return_type: Option<&str>,
        body: Vec<Stmt>,
    ) -> FunctionDecl {
        FunctionDecl {
            name: name.to_string(),
            params,
            return_type: return_type.map(String::from),
            body,
            visibility: Visibility::Public,
            is_static: false,
            is_abstract: false,
            doc: None,
            span: self.fresh_span(),
        }
    }

    pub fn method(
        &mut self,
        name: &str,
        visibility: Visibility,
        params: Vec<Param>,
        return_type: Option<&str>,
        body: Vec<Stmt>,
    ) -> FunctionDecl {
        let mut decl = self.function(name, params, return_type, body);
        decl.visibility = visibility;
        decl
    }

    pub fn function_stmt(&mut self, decl: FunctionDecl) -> Stmt {
        self.stmt(StmtKind::Function(decl))
    }

    /// Empty class declaration; callers fill in members directly.
    pub fn class(&mut self, name: &str) -> ClassDecl {
        ClassDecl {
            name: name.to_string(),
            kind: ClassKind::Class,
            parent: None,
            interfaces: Vec::new(),
            mixins: Vec::new(),
            constants: Vec::new(),
            properties: Vec::new(),
            methods: Vec::new(),
            is_abstract: false,
            doc: None,
            span: self.fresh_span(),
        }
    }

    pub fn interface(&mut self, name: &str) -> ClassDecl {
        let mut decl = self.class(name);
        decl.kind = ClassKind::Interface;
        decl
    }

    pub fn mixin(&mut self, name: &str) -> ClassDecl {
        let mut decl = self.class(name);
        decl.kind = ClassKind::Mixin;
        decl
    }

    pub fn class_stmt(&mut self, decl: ClassDecl) -> Stmt {
        self.stmt(StmtKind::Class(decl))
    }

    pub fn property(
        &mut self,
        name: &str,
        visibility: Visibility,
        is_static: bool,
        ty: Option<&str>,
    ) -> PropertyDecl {
        PropertyDecl {
            name: name.strip_prefix('$').unwrap_or(name).to_string(),
            visibility,
            is_static,
            ty: ty.map(String::from),
            default: None,
            doc: None,
            span: self.fresh_span(),
        }
    }

    pub fn constant(&mut self, name: &str, value: Expr) -> ConstDecl {
        ConstDecl {
            name: name.to_string(),
            value,
            span: self.fresh_span(),
        }
    }

    pub fn program(&mut self, path: &str, stmts: Vec<Stmt>) -> Program {
        Program {
            path: path.to_string(),
            stmts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique() {
        let mut b = AstBuilder::new();
        let a = b.var("$x");
        let c = b.var("$x");
        assert_ne!(a.id, c.id);
        assert_eq!(a.kind, c.kind);
    }

    #[test]
    fn test_sigil_stripped() {
        let mut b = AstBuilder::new();
        let v = b.var("$count");
        assert_eq!(v.as_variable(), Some("count"));
        let bare = b.var("count");
        assert_eq!(bare.as_variable(), Some("count"));
    }

    #[test]
    fn test_spans_advance() {
        let mut b = AstBuilder::new();
        let a = b.int(1);
        let c = b.int(2);
        assert!(c.span.line > a.span.line);
    }

    #[test]
    fn test_assign_stmt_shape() {
        let mut b = AstBuilder::new();
        let one = b.int(1);
        let stmt = b.assign_stmt("$x", one);
        match stmt.kind {
            StmtKind::Expr { expr, doc } => {
                assert!(doc.is_none());
                assert!(matches!(expr.kind, ExprKind::Assign { .. }));
            }
            other => panic!("expected expression statement, got {:?}", other),
        }
    }
}
