//! Expression typing
//!
//! Every expression is typed against the current [`Context`]; the result
//! lands in the node-type table. Assignments write through to the context,
//! and the short-circuit operators run their right side on a clone narrowed
//! by the left side's assertions.

use std::collections::BTreeMap;

use skink_ast::{ArrayEntry, BinaryOp, Expr, ExprKind, Span, UnaryOp};
use skink_types::{Atomic, Union};

use crate::context::Context;
use crate::issues::{Fatal, IssueKind};
use crate::reconciler::{reconcile, scrape_assertions, Assertion};

use super::{apply_silent, Checker};

impl<'a> Checker<'a> {
    /// Types one expression, recording the result in the node table.
    pub(crate) fn check_expr(&mut self, expr: &Expr, ctx: &mut Context) -> Result<Union, Fatal> {
        let ty = self.expr_type(expr, ctx)?;
        self.node_types.insert(expr.id, ty.clone());
        Ok(ty)
    }

    fn expr_type(&mut self, expr: &Expr, ctx: &mut Context) -> Result<Union, Fatal> {
        match &expr.kind {
            ExprKind::Int(_) => Ok(Union::int()),
            ExprKind::Float(_) => Ok(Union::float()),
            ExprKind::Str(_) => Ok(Union::string()),
            ExprKind::Bool(true) => Ok(Union::of(Atomic::True)),
            ExprKind::Bool(false) => Ok(Union::of(Atomic::False)),
            ExprKind::Null => Ok(Union::null()),
            ExprKind::Variable { name } => self.check_variable(name, expr.span, ctx),
            ExprKind::Array { entries } => self.check_array_literal(entries, ctx),
            ExprKind::Binary { op, lhs, rhs } => self.check_binary(*op, lhs, rhs, ctx),
            ExprKind::Unary { op, operand } => self.check_unary(*op, operand, ctx),
            ExprKind::Assign { target, value } => self.check_assign(target, value, ctx),
            ExprKind::CompoundAssign { target, op, value } => {
                self.check_compound_assign(target, *op, value, ctx)
            }
            ExprKind::ListAssign { targets, value } => {
                self.check_list_assign(targets, value, expr.span, ctx)
            }
            ExprKind::Ternary {
                cond,
                then,
                otherwise,
            } => self.check_ternary(cond, then.as_deref(), otherwise, ctx),
            ExprKind::Isset { targets } => self.check_isset(targets, ctx),
            ExprKind::Empty { operand } => self.check_empty(operand, ctx),
            ExprKind::Instanceof { operand, class } => {
                self.check_instanceof(operand, class, expr.span, ctx)
            }
            ExprKind::PropertyFetch { receiver, property } => {
                self.check_property_fetch(receiver, property, expr.span, ctx)
            }
            ExprKind::StaticPropertyFetch { class, property } => {
                self.check_static_property(class, property, expr.span, ctx)
            }
            ExprKind::ClassConstFetch { class, constant } => {
                self.check_class_const(class, constant, expr.span, ctx)
            }
            ExprKind::ArrayAccess { array, index } => {
                self.check_array_read(array, index.as_deref(), expr.span, ctx)
            }
            ExprKind::MethodCall {
                receiver,
                method,
                args,
            } => self.check_method_call(receiver, method, args, expr.span, ctx),
            ExprKind::StaticCall {
                class,
                method,
                args,
            } => self.check_static_call(class, method, args, expr.span, ctx),
            ExprKind::FunctionCall { name, args } => {
                self.check_function_call(name, args, expr.span, ctx)
            }
            ExprKind::New { class, args } => self.check_new(class, args, expr.span, ctx),
            ExprKind::Closure {
                params,
                uses,
                return_type,
                body,
            } => self.check_closure(expr.id, params, uses, return_type.as_deref(), body, expr.span, ctx),
            ExprKind::Shell { command } => self.check_shell(command, expr.span, ctx),
        }
    }

    // ===== Variables =====

    fn check_variable(&mut self, name: &str, span: Span, ctx: &mut Context) -> Result<Union, Fatal> {
        let id = format!("${}", name);
        if let Some(ty) = ctx.var_type(&id) {
            return Ok(ty.clone());
        }
        if id == "$this" {
            self.report(
                IssueKind::InvalidScope,
                "Cannot use $this outside a class context".to_string(),
                span,
            )?;
            return Ok(Union::mixed());
        }
        if !self.caps.check_variables {
            return Ok(Union::mixed());
        }
        if ctx.is_possibly_defined(&id) {
            self.report(
                IssueKind::PossiblyUndefinedVariable,
                format!("Variable {} may be undefined on some paths", id),
                span,
            )?;
        } else {
            self.report(
                IssueKind::UndefinedVariable,
                format!("Variable {} is not defined", id),
                span,
            )?;
        }
        Ok(Union::mixed())
    }

    // ===== Array literals =====

    /// Literal or absent keys build a shape tracking each field; any
    /// computed key folds the literal into a plain container.
    fn check_array_literal(
        &mut self,
        entries: &[ArrayEntry],
        ctx: &mut Context,
    ) -> Result<Union, Fatal> {
        if entries.is_empty() {
            return Ok(Union::empty_array());
        }
        let mut fields: BTreeMap<String, Union> = BTreeMap::new();
        let mut next_index: i64 = 0;
        let mut dynamic = false;
        let mut key_parts: Vec<Atomic> = Vec::new();
        let mut value_parts: Vec<Atomic> = Vec::new();
        for entry in entries {
            let value_ty = self.check_expr(&entry.value, ctx)?;
            value_parts.extend(value_ty.parts().cloned());
            match &entry.key {
                None => {
                    fields.insert(next_index.to_string(), value_ty);
                    key_parts.push(Atomic::Int);
                    next_index += 1;
                }
                Some(key) => {
                    let key_ty = self.check_expr(key, ctx)?;
                    key_parts.extend(key_ty.parts().cloned());
                    match &key.kind {
                        ExprKind::Int(index) => {
                            fields.insert(index.to_string(), value_ty);
                            next_index = next_index.max(index + 1);
                        }
                        // Integer-like string keys canonicalize to ints.
                        ExprKind::Str(key) => match key.parse::<i64>() {
                            Ok(index) => {
                                fields.insert(index.to_string(), value_ty);
                                next_index = next_index.max(index + 1);
                            }
                            Err(_) => {
                                fields.insert(key.clone(), value_ty);
                            }
                        },
                        _ => dynamic = true,
                    }
                }
            }
        }
        if dynamic {
            let key = if key_parts.is_empty() {
                Union::int()
            } else {
                Union::from_parts(key_parts)
            };
            return Ok(Union::array(key, Union::from_parts(value_parts)));
        }
        Ok(Union::of(Atomic::Shaped {
            name: "array".to_string(),
            fields,
        }))
    }

    // ===== Operators =====

    fn check_binary(
        &mut self,
        op: BinaryOp,
        lhs: &Expr,
        rhs: &Expr,
        ctx: &mut Context,
    ) -> Result<Union, Fatal> {
        match op {
            BinaryOp::And => {
                self.check_expr(lhs, ctx)?;
                // The right side only runs when the left was truthy.
                let assertions = scrape_assertions(lhs);
                let mut rhs_ctx = ctx.clone();
                apply_silent(&assertions.if_true, &mut rhs_ctx, self.registry);
                self.check_expr(rhs, &mut rhs_ctx)?;
                ctx.absorb_possibly_defined(&rhs_ctx);
                Ok(Union::bool())
            }
            BinaryOp::Or => {
                self.check_expr(lhs, ctx)?;
                // The right side only runs when the left was falsy.
                let assertions = scrape_assertions(lhs);
                let mut rhs_ctx = ctx.clone();
                apply_silent(&assertions.if_false, &mut rhs_ctx, self.registry);
                self.check_expr(rhs, &mut rhs_ctx)?;
                ctx.absorb_possibly_defined(&rhs_ctx);
                Ok(Union::bool())
            }
            BinaryOp::Coalesce => {
                // The left side of ?? is exactly the place where reading
                // something undefined is intended.
                let saved = self.caps.check_variables;
                self.caps.check_variables = false;
                let lhs_ty = self.check_expr(lhs, ctx)?;
                self.caps.check_variables = saved;
                let rhs_ty = self.check_expr(rhs, ctx)?;
                Ok(coalesce_type(&lhs_ty, &rhs_ty))
            }
            BinaryOp::Identical
            | BinaryOp::NotIdentical
            | BinaryOp::Equal
            | BinaryOp::NotEqual
            | BinaryOp::Lt
            | BinaryOp::Le
            | BinaryOp::Gt
            | BinaryOp::Ge => {
                self.check_expr(lhs, ctx)?;
                self.check_expr(rhs, ctx)?;
                Ok(Union::bool())
            }
            BinaryOp::Concat => {
                self.check_expr(lhs, ctx)?;
                self.check_expr(rhs, ctx)?;
                Ok(Union::string())
            }
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul => {
                let lhs_ty = self.check_expr(lhs, ctx)?;
                let rhs_ty = self.check_expr(rhs, ctx)?;
                Ok(arithmetic_type(&lhs_ty, &rhs_ty))
            }
            BinaryOp::Div => {
                self.check_expr(lhs, ctx)?;
                self.check_expr(rhs, ctx)?;
                Ok(Union::float())
            }
            BinaryOp::Mod => {
                self.check_expr(lhs, ctx)?;
                self.check_expr(rhs, ctx)?;
                Ok(Union::int())
            }
        }
    }

    fn check_unary(
        &mut self,
        op: UnaryOp,
        operand: &Expr,
        ctx: &mut Context,
    ) -> Result<Union, Fatal> {
        let ty = self.check_expr(operand, ctx)?;
        Ok(match op {
            UnaryOp::Not => Union::bool(),
            UnaryOp::Neg => {
                if is_single(&ty, &Atomic::Int) {
                    Union::int()
                } else if is_single(&ty, &Atomic::Float) {
                    Union::float()
                } else {
                    Union::from_parts(vec![Atomic::Int, Atomic::Float])
                }
            }
        })
    }

    // ===== Assignment =====

    fn check_assign(
        &mut self,
        target: &Expr,
        value: &Expr,
        ctx: &mut Context,
    ) -> Result<Union, Fatal> {
        let value_ty = self.check_expr(value, ctx)?;
        self.assign_to(target, value_ty.clone(), value.span, ctx)?;
        Ok(value_ty)
    }

    /// Writes a value into an assignable expression.
    pub(crate) fn assign_to(
        &mut self,
        target: &Expr,
        ty: Union,
        span: Span,
        ctx: &mut Context,
    ) -> Result<(), Fatal> {
        match &target.kind {
            ExprKind::Variable { name } => {
                ctx.set_var(&format!("${}", name), ty);
                Ok(())
            }
            ExprKind::PropertyFetch { receiver, property } => {
                self.assign_property(receiver, property, ty, span, ctx)
            }
            ExprKind::StaticPropertyFetch { class, property } => {
                self.assign_static_property(class, property, ty, span, ctx)
            }
            ExprKind::ArrayAccess { array, index } => {
                self.assign_array_element(array, index.as_deref(), ty, span, ctx)
            }
            _ => Ok(()),
        }
    }

    fn check_compound_assign(
        &mut self,
        target: &Expr,
        op: BinaryOp,
        value: &Expr,
        ctx: &mut Context,
    ) -> Result<Union, Fatal> {
        // Read the target, apply the operator, write the result back.
        let target_ty = if op == BinaryOp::Coalesce {
            let saved = self.caps.check_variables;
            self.caps.check_variables = false;
            let ty = self.check_expr(target, ctx)?;
            self.caps.check_variables = saved;
            ty
        } else {
            self.check_expr(target, ctx)?
        };
        let value_ty = self.check_expr(value, ctx)?;
        let result = match op {
            BinaryOp::Coalesce => coalesce_type(&target_ty, &value_ty),
            BinaryOp::Concat => Union::string(),
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul => {
                arithmetic_type(&target_ty, &value_ty)
            }
            BinaryOp::Div => Union::float(),
            BinaryOp::Mod => Union::int(),
            _ => Union::bool(),
        };
        self.assign_to(target, result.clone(), target.span, ctx)?;
        Ok(result)
    }

    fn check_list_assign(
        &mut self,
        targets: &[Option<Expr>],
        value: &Expr,
        span: Span,
        ctx: &mut Context,
    ) -> Result<Union, Fatal> {
        let value_ty = self.check_expr(value, ctx)?;
        let mut reported = false;
        for (index, target) in targets.iter().enumerate() {
            let target = match target {
                Some(target) => target,
                None => continue,
            };
            let element_ty = list_element_type(&value_ty, index);
            if element_ty.is_none() && !reported && !value_ty.is_mixed() {
                self.report(
                    IssueKind::InvalidArrayOffset,
                    format!("Cannot destructure element {} from {}", index, value_ty),
                    span,
                )?;
                reported = true;
            }
            self.assign_to(
                target,
                element_ty.unwrap_or_else(Union::mixed),
                target.span,
                ctx,
            )?;
        }
        Ok(value_ty)
    }

    // ===== Conditionals =====

    fn check_ternary(
        &mut self,
        cond: &Expr,
        then: Option<&Expr>,
        otherwise: &Expr,
        ctx: &mut Context,
    ) -> Result<Union, Fatal> {
        let cond_ty = self.check_expr(cond, ctx)?;
        let assertions = scrape_assertions(cond);

        let mut else_ctx = ctx.clone();
        apply_silent(&assertions.if_false, &mut else_ctx, self.registry);

        let then_ty = match then {
            Some(then) => {
                let mut then_ctx = ctx.clone();
                self.apply_reported(&assertions.if_true, &mut then_ctx, cond.span)?;
                let ty = self.check_expr(then, &mut then_ctx)?;
                ctx.absorb_possibly_defined(&then_ctx);
                ty
            }
            // Short form: the condition's own value flows through when it
            // was truthy.
            None => reconcile(&cond_ty, &Assertion::Truthy, self.registry).ty,
        };
        let else_ty = self.check_expr(otherwise, &mut else_ctx)?;
        ctx.absorb_possibly_defined(&else_ctx);
        Ok(then_ty.combine_with(&else_ty))
    }

    fn check_isset(&mut self, targets: &[Expr], ctx: &mut Context) -> Result<Union, Fatal> {
        // isset() exists to probe things that may not be set.
        let saved = self.caps.check_variables;
        self.caps.check_variables = false;
        for target in targets {
            self.check_expr(target, ctx)?;
        }
        self.caps.check_variables = saved;
        Ok(Union::bool())
    }

    fn check_empty(&mut self, operand: &Expr, ctx: &mut Context) -> Result<Union, Fatal> {
        let saved = self.caps.check_variables;
        self.caps.check_variables = false;
        self.check_expr(operand, ctx)?;
        self.caps.check_variables = saved;
        Ok(Union::bool())
    }

    fn check_instanceof(
        &mut self,
        operand: &Expr,
        class: &str,
        span: Span,
        ctx: &mut Context,
    ) -> Result<Union, Fatal> {
        self.check_expr(operand, ctx)?;
        self.resolve_class_target(class, ctx, span)?;
        Ok(Union::bool())
    }

    // ===== Shell =====

    fn check_shell(&mut self, command: &Expr, span: Span, ctx: &mut Context) -> Result<Union, Fatal> {
        self.check_expr(command, ctx)?;
        if self.config.forbid_shell_exec {
            self.report(
                IssueKind::ForbiddenCode,
                "Shell execution is forbidden by configuration".to_string(),
                span,
            )?;
        }
        Ok(Union::string().nullable())
    }
}

// ============================================================================
// Type helpers
// ============================================================================

fn is_single(ty: &Union, part: &Atomic) -> bool {
    ty.as_single().map_or(false, |single| single == part)
}

/// `+`, `-`, `*`: int stays int, a float anywhere makes float, anything
/// else could be either.
fn arithmetic_type(lhs: &Union, rhs: &Union) -> Union {
    if is_single(lhs, &Atomic::Int) && is_single(rhs, &Atomic::Int) {
        return Union::int();
    }
    if lhs.contains("float") || rhs.contains("float") {
        return Union::float();
    }
    Union::from_parts(vec![Atomic::Int, Atomic::Float])
}

/// `??`: the left side minus null, or the right side when the left can
/// only be null.
fn coalesce_type(lhs: &Union, rhs: &Union) -> Union {
    match lhs.without("null") {
        Some(non_null) => non_null.combine_with(rhs),
        None => rhs.clone(),
    }
}

/// Element type at a positional index of a destructured value; `None` when
/// the value cannot be destructured there.
fn list_element_type(value: &Union, index: usize) -> Option<Union> {
    let mut parts: Vec<Atomic> = Vec::new();
    for part in value.parts() {
        match part {
            Atomic::Mixed => return Some(Union::mixed()),
            Atomic::Shaped { fields, .. } => {
                let field = fields.get(&index.to_string())?;
                parts.extend(field.parts().cloned());
            }
            Atomic::Generic { .. } => {
                let (_, value_ty) = part.iterable_params()?;
                parts.extend(value_ty.parts().cloned());
            }
            _ => return None,
        }
    }
    if parts.is_empty() {
        None
    } else {
        Some(Union::from_parts(parts))
    }
}
