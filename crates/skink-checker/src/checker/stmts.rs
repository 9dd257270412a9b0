//! Statement traversal
//!
//! Each statement form threads the [`Context`] through per the branching
//! rules: arms run on clones, negations narrow the fallthrough path, loops
//! snapshot contexts at `break`/`continue` and fold them into the post-loop
//! state.

use skink_ast::{
    CatchClause, DocBlock, ElseIf, Expr, ExprKind, Span, Stmt, StmtKind, SwitchCase,
};
use skink_types::{Atomic, Union};

use crate::context::Context;
use crate::issues::{Fatal, IssueKind};
use crate::reconciler::{identical_assertions, scrape_assertions, var_path};

use super::{
    apply_silent, merge_branches, stmt_exit, stmts_exit, Branch, Checker, ExitKind, LoopKind,
    LoopScope,
};

impl<'a> Checker<'a> {
    /// Walks a statement list. Returns how the list exits, when it does,
    /// and flags the first statement that can never be reached.
    pub(crate) fn check_stmts(
        &mut self,
        stmts: &[Stmt],
        ctx: &mut Context,
    ) -> Result<Option<ExitKind>, Fatal> {
        // Capability toggles from calls like method_exists() hold until
        // the end of the enclosing statement list.
        let saved_caps = self.caps;
        let mut exit: Option<ExitKind> = None;
        let mut reported_unreachable = false;
        for stmt in stmts {
            if exit.is_some() && !reported_unreachable && !stmt.is_declaration() {
                self.report(
                    IssueKind::UnreachableStatement,
                    "This statement can never be reached".to_string(),
                    stmt.span,
                )?;
                reported_unreachable = true;
            }
            self.check_stmt(stmt, ctx)?;
            if exit.is_none() {
                exit = stmt_exit(stmt);
            }
        }
        self.caps = saved_caps;
        Ok(exit)
    }

    fn check_stmt(&mut self, stmt: &Stmt, ctx: &mut Context) -> Result<(), Fatal> {
        match &stmt.kind {
            StmtKind::Expr { expr, doc } => self.check_expr_stmt(expr, doc.as_ref(), ctx),
            StmtKind::Echo { exprs } => {
                for expr in exprs {
                    self.check_expr(expr, ctx)?;
                }
                Ok(())
            }
            StmtKind::If {
                cond,
                then_branch,
                elseifs,
                else_branch,
            } => self.check_if(cond, then_branch, elseifs, else_branch.as_deref(), ctx),
            StmtKind::While { cond, body } => self.check_while(cond, body, ctx),
            StmtKind::DoWhile { body, cond } => self.check_do_while(body, cond, ctx),
            StmtKind::For {
                init,
                cond,
                step,
                body,
            } => self.check_for(init, cond.as_ref(), step, body, ctx),
            StmtKind::Foreach {
                collection,
                key_var,
                value_var,
                body,
            } => self.check_foreach(collection, key_var.as_deref(), value_var, body, ctx),
            StmtKind::Switch { subject, cases } => self.check_switch(subject, cases, ctx),
            StmtKind::Break => {
                self.record_break(ctx);
                Ok(())
            }
            StmtKind::Continue => {
                self.record_continue(ctx);
                Ok(())
            }
            StmtKind::Return { expr } => self.check_return(expr.as_ref(), stmt.span, ctx),
            StmtKind::Throw { expr } => {
                self.check_expr(expr, ctx)?;
                Ok(())
            }
            StmtKind::Try {
                body,
                catches,
                finally,
            } => self.check_try(body, catches, finally.as_deref(), ctx),
            StmtKind::Unset { targets } => {
                check_unset(targets, ctx);
                Ok(())
            }
            StmtKind::Function(decl) => {
                if !self.hoisted.contains(&stmt.id) {
                    if self.registry.function(&decl.name).is_some() {
                        return self.report(
                            IssueKind::DuplicateFunction,
                            format!("Cannot redeclare function {}", decl.name),
                            stmt.span,
                        );
                    }
                    self.hoisted.insert(stmt.id);
                }
                self.check_function_stmt(decl)
            }
            StmtKind::Class(decl) => {
                if !self.hoisted.contains(&stmt.id) {
                    if self.registry.queue_class(decl.clone()) {
                        self.hoisted.insert(stmt.id);
                    } else {
                        return self.report(
                            IssueKind::DuplicateClass,
                            format!("Cannot redeclare class {}", decl.name),
                            stmt.span,
                        );
                    }
                }
                self.ensure_class_checked(&decl.name, stmt.span)?;
                Ok(())
            }
        }
    }

    fn check_expr_stmt(
        &mut self,
        expr: &Expr,
        doc: Option<&DocBlock>,
        ctx: &mut Context,
    ) -> Result<(), Fatal> {
        self.check_expr(expr, ctx)?;
        // An @var annotation on a plain assignment overrides what was
        // inferred for the target.
        if !self.config.trust_doc_types {
            return Ok(());
        }
        let source = match doc.and_then(|d| d.var_type.as_deref()) {
            Some(source) => source,
            None => return Ok(()),
        };
        if let ExprKind::Assign { target, .. } = &expr.kind {
            if let Some(name) = target.as_variable() {
                if let Some(ty) = self.parse_type(source, expr.span)? {
                    ctx.set_var(&format!("${}", name), ty);
                }
            }
        }
        Ok(())
    }

    // ===== Branching =====

    fn check_if(
        &mut self,
        cond: &Expr,
        then_branch: &[Stmt],
        elseifs: &[ElseIf],
        else_branch: Option<&[Stmt]>,
        ctx: &mut Context,
    ) -> Result<(), Fatal> {
        self.check_expr(cond, ctx)?;
        let assertions = scrape_assertions(cond);

        let mut branches: Vec<Branch> = Vec::with_capacity(elseifs.len() + 2);

        let mut then_ctx = ctx.clone();
        self.apply_reported(&assertions.if_true, &mut then_ctx, cond.span)?;
        let then_exit = self.check_stmts(then_branch, &mut then_ctx)?;
        branches.push(Branch {
            ctx: then_ctx,
            exit: then_exit,
        });

        // Each later arm sees the accumulated negations of the arms above.
        let mut else_ctx = ctx.clone();
        apply_silent(&assertions.if_false, &mut else_ctx, self.registry);

        for elseif in elseifs {
            self.check_expr(&elseif.cond, &mut else_ctx)?;
            let arm_assertions = scrape_assertions(&elseif.cond);
            let mut arm_ctx = else_ctx.clone();
            self.apply_reported(&arm_assertions.if_true, &mut arm_ctx, elseif.cond.span)?;
            let arm_exit = self.check_stmts(&elseif.body, &mut arm_ctx)?;
            branches.push(Branch {
                ctx: arm_ctx,
                exit: arm_exit,
            });
            apply_silent(&arm_assertions.if_false, &mut else_ctx, self.registry);
        }

        match else_branch {
            Some(body) => {
                let else_exit = self.check_stmts(body, &mut else_ctx)?;
                branches.push(Branch {
                    ctx: else_ctx,
                    exit: else_exit,
                });
            }
            // No else arm written: the failed condition is still a way
            // through, carrying the negated narrowings.
            None => branches.push(Branch {
                ctx: else_ctx,
                exit: None,
            }),
        }

        merge_branches(ctx, branches);
        Ok(())
    }

    // ===== Loops =====

    fn check_while(&mut self, cond: &Expr, body: &[Stmt], ctx: &mut Context) -> Result<(), Fatal> {
        self.check_expr(cond, ctx)?;
        let assertions = scrape_assertions(cond);
        let mut loop_ctx = ctx.clone();
        self.apply_reported(&assertions.if_true, &mut loop_ctx, cond.span)?;

        self.loop_scopes.push(LoopScope::new(LoopKind::Loop));
        let body_exit = self.check_stmts(body, &mut loop_ctx)?;
        let scope = match self.loop_scopes.pop() {
            Some(scope) => scope,
            None => return Ok(()),
        };

        merge_loop(ctx, loop_ctx, body_exit, &scope);
        // A break skips the condition, so its negation only holds when no
        // break can reach the loop exit.
        if !scope.saw_break {
            apply_silent(&assertions.if_false, ctx, self.registry);
        }
        Ok(())
    }

    fn check_do_while(
        &mut self,
        body: &[Stmt],
        cond: &Expr,
        ctx: &mut Context,
    ) -> Result<(), Fatal> {
        self.loop_scopes.push(LoopScope::new(LoopKind::Loop));
        let mut body_ctx = ctx.clone();
        let body_exit = self.check_stmts(body, &mut body_ctx)?;
        let scope = match self.loop_scopes.pop() {
            Some(scope) => scope,
            None => return Ok(()),
        };

        // The body ran at least once, so every way out of it is a live
        // branch and assignments on all of them are definite.
        let mut branches = vec![Branch {
            ctx: body_ctx,
            exit: body_exit,
        }];
        for snapshot in scope.continue_contexts {
            branches.push(Branch {
                ctx: snapshot,
                exit: None,
            });
        }
        for snapshot in scope.break_contexts {
            branches.push(Branch {
                ctx: snapshot,
                exit: None,
            });
        }
        merge_branches(ctx, branches);

        self.check_expr(cond, ctx)?;
        if !scope.saw_break {
            let assertions = scrape_assertions(cond);
            apply_silent(&assertions.if_false, ctx, self.registry);
        }
        Ok(())
    }

    fn check_for(
        &mut self,
        init: &[Expr],
        cond: Option<&Expr>,
        step: &[Expr],
        body: &[Stmt],
        ctx: &mut Context,
    ) -> Result<(), Fatal> {
        for expr in init {
            self.check_expr(expr, ctx)?;
        }
        let assertions = match cond {
            Some(cond) => {
                self.check_expr(cond, ctx)?;
                Some((scrape_assertions(cond), cond.span))
            }
            None => None,
        };
        let mut loop_ctx = ctx.clone();
        if let Some((assertions, span)) = &assertions {
            self.apply_reported(&assertions.if_true, &mut loop_ctx, *span)?;
        }

        self.loop_scopes.push(LoopScope::new(LoopKind::Loop));
        let body_exit = self.check_stmts(body, &mut loop_ctx)?;
        let scope = match self.loop_scopes.pop() {
            Some(scope) => scope,
            None => return Ok(()),
        };
        if body_exit.is_none() {
            for expr in step {
                self.check_expr(expr, &mut loop_ctx)?;
            }
        }

        merge_loop(ctx, loop_ctx, body_exit, &scope);
        if let Some((assertions, _)) = &assertions {
            if !scope.saw_break {
                apply_silent(&assertions.if_false, ctx, self.registry);
            }
        }
        Ok(())
    }

    fn check_foreach(
        &mut self,
        collection: &Expr,
        key_var: Option<&str>,
        value_var: &str,
        body: &[Stmt],
        ctx: &mut Context,
    ) -> Result<(), Fatal> {
        let collection_ty = self.check_expr(collection, ctx)?;
        let mut key_ty: Option<Union> = None;
        let mut value_ty: Option<Union> = None;
        let mut bad_part: Option<String> = None;
        for part in collection_ty.parts() {
            match part.iterable_params() {
                Some((key, value)) => {
                    key_ty = Some(merge_opt(key_ty, key));
                    value_ty = Some(merge_opt(value_ty, value));
                }
                None => match part {
                    // Objects may be traversable; entries are unknown.
                    Atomic::Mixed | Atomic::Object | Atomic::Named(_) => {
                        key_ty = Some(merge_opt(key_ty, Union::mixed()));
                        value_ty = Some(merge_opt(value_ty, Union::mixed()));
                    }
                    other => {
                        if bad_part.is_none() {
                            bad_part = Some(other.to_string());
                        }
                    }
                },
            }
        }
        if let Some(part) = bad_part {
            self.report(
                IssueKind::InvalidIterator,
                format!("Cannot iterate over {}", part),
                collection.span,
            )?;
        }

        let mut body_ctx = ctx.clone();
        if let Some(key_var) = key_var {
            body_ctx.set_var(
                &format!("${}", key_var),
                key_ty.unwrap_or_else(Union::mixed),
            );
        }
        body_ctx.set_var(
            &format!("${}", value_var),
            value_ty.unwrap_or_else(Union::mixed),
        );

        self.loop_scopes.push(LoopScope::new(LoopKind::Loop));
        let body_exit = self.check_stmts(body, &mut body_ctx)?;
        let scope = match self.loop_scopes.pop() {
            Some(scope) => scope,
            None => return Ok(()),
        };
        merge_loop(ctx, body_ctx, body_exit, &scope);
        Ok(())
    }

    // ===== Switch =====

    fn check_switch(
        &mut self,
        subject: &Expr,
        cases: &[SwitchCase],
        ctx: &mut Context,
    ) -> Result<(), Fatal> {
        self.check_expr(subject, ctx)?;
        let mut has_default = false;
        for case in cases {
            match &case.value {
                Some(value) => {
                    self.check_expr(value, ctx)?;
                }
                None => has_default = true,
            }
        }

        // A case body that does not exit runs the next case's body too.
        // Build each case's effective body bottom-up; the cloned nodes
        // keep their ids, so repeated issues collapse in the sink.
        let mut effective: Vec<Vec<Stmt>> = vec![Vec::new(); cases.len()];
        for (i, case) in cases.iter().enumerate().rev() {
            let mut body = case.body.clone();
            if stmts_exit(&case.body).is_none() {
                if let Some(next) = effective.get(i + 1) {
                    body.extend(next.iter().cloned());
                }
            }
            effective[i] = body;
        }

        self.loop_scopes.push(LoopScope::new(LoopKind::Switch));
        let mut branches: Vec<Branch> = Vec::new();
        for (i, case) in cases.iter().enumerate() {
            let mut case_ctx = ctx.clone();
            if let Some(value) = &case.value {
                let assertions = identical_assertions(subject, value);
                apply_silent(&assertions.if_true, &mut case_ctx, self.registry);
            }
            let exit = self.check_stmts(&effective[i], &mut case_ctx)?;
            // Breaks and continues were snapshotted where they happened;
            // the walked-to-the-end context is live only on fallout.
            branches.push(Branch {
                ctx: case_ctx,
                exit: exit.map(|_| ExitKind::End),
            });
        }
        let scope = match self.loop_scopes.pop() {
            Some(scope) => scope,
            None => return Ok(()),
        };

        // Without a default, not matching any case is a way through.
        if !has_default {
            branches.push(Branch {
                ctx: ctx.clone(),
                exit: None,
            });
        }
        for snapshot in scope.break_contexts {
            branches.push(Branch {
                ctx: snapshot,
                exit: None,
            });
        }
        merge_branches(ctx, branches);
        Ok(())
    }

    // ===== Jumps =====

    fn record_break(&mut self, ctx: &Context) {
        if let Some(scope) = self.loop_scopes.last_mut() {
            scope.saw_break = true;
            scope.break_contexts.push(ctx.clone());
        }
    }

    fn record_continue(&mut self, ctx: &Context) {
        if let Some(scope) = self.loop_scopes.last_mut() {
            match scope.kind {
                LoopKind::Loop => scope.continue_contexts.push(ctx.clone()),
                // Inside a switch, continue leaves the switch like break.
                LoopKind::Switch => scope.break_contexts.push(ctx.clone()),
            }
        }
    }

    fn check_return(
        &mut self,
        expr: Option<&Expr>,
        span: Span,
        ctx: &mut Context,
    ) -> Result<(), Fatal> {
        let ty = match expr {
            Some(expr) => self.check_expr(expr, ctx)?,
            None => Union::void(),
        };
        let declared = match self.return_ctx.last() {
            Some(frame) => frame.declared.clone(),
            // A return outside any function body types the expression and
            // nothing else.
            None => return Ok(()),
        };
        if let Some(frame) = self.return_ctx.last_mut() {
            frame.collected.push(ty.clone());
        }
        if let Some(declared) = declared {
            if !self.types_compatible(&declared, &ty) {
                let label = self
                    .return_ctx
                    .last()
                    .map(|frame| frame.label.clone())
                    .unwrap_or_default();
                self.report(
                    IssueKind::InvalidReturnType,
                    format!("{} declares return type {}, got {}", label, declared, ty),
                    span,
                )?;
            }
        }
        Ok(())
    }

    // ===== Exceptions =====

    fn check_try(
        &mut self,
        body: &[Stmt],
        catches: &[CatchClause],
        finally: Option<&[Stmt]>,
        ctx: &mut Context,
    ) -> Result<(), Fatal> {
        let mut try_ctx = ctx.clone();
        let try_exit = self.check_stmts(body, &mut try_ctx)?;

        // A throw can happen part-way through the try, so catch bodies
        // start from the pre-try state with try assignments only possible.
        let mut catch_base = ctx.clone();
        catch_base.absorb_possibly_defined(&try_ctx);

        let mut branches = vec![Branch {
            ctx: try_ctx,
            exit: try_exit,
        }];
        for catch in catches {
            let mut catch_ctx = catch_base.clone();
            let mut caught: Vec<Atomic> = Vec::new();
            for class_name in &catch.class_names {
                match self.ensure_class_checked(class_name, catch.span)? {
                    Some(canonical) => caught.push(Atomic::Named(canonical)),
                    None => {
                        self.report(
                            IssueKind::UndefinedClass,
                            format!("Unknown exception class {}", class_name),
                            catch.span,
                        )?;
                    }
                }
            }
            if let Some(var) = &catch.var {
                let ty = if caught.is_empty() {
                    Union::mixed()
                } else {
                    Union::from_parts(caught)
                };
                catch_ctx.set_var(&format!("${}", var), ty);
            }
            let catch_exit = self.check_stmts(&catch.body, &mut catch_ctx)?;
            branches.push(Branch {
                ctx: catch_ctx,
                exit: catch_exit,
            });
        }
        merge_branches(ctx, branches);

        if let Some(finally) = finally {
            self.check_stmts(finally, ctx)?;
        }
        Ok(())
    }
}

// ============================================================================
// Loop merging
// ============================================================================

/// Folds a loop body's results back into the pre-loop context. Every body
/// assignment becomes possibly-defined; variables known before the loop
/// widen by whatever any context reaching the loop exit may have stored.
/// Zero iterations stay possible, so nothing new becomes definite.
fn merge_loop(
    outer: &mut Context,
    body_ctx: Context,
    body_exit: Option<ExitKind>,
    scope: &LoopScope,
) {
    outer.absorb_possibly_defined(&body_ctx);
    for snapshot in scope
        .break_contexts
        .iter()
        .chain(scope.continue_contexts.iter())
    {
        outer.absorb_possibly_defined(snapshot);
    }

    let mut sources: Vec<&Context> = Vec::new();
    if body_exit.is_none() {
        sources.push(&body_ctx);
    }
    sources.extend(scope.break_contexts.iter());
    sources.extend(scope.continue_contexts.iter());

    let keys: Vec<String> = outer.vars_in_scope.keys().cloned().collect();
    for key in keys {
        let mut ty = match outer.vars_in_scope.get(&key) {
            Some(ty) => ty.clone(),
            None => continue,
        };
        for source in &sources {
            if let Some(other) = source.vars_in_scope.get(&key) {
                ty = ty.combine_with(other);
            }
        }
        outer.vars_in_scope.insert(key, ty);
    }
    // Narrowings from before the loop may have been invalidated by any
    // iteration.
    outer.clauses.clear();
}

fn merge_opt(acc: Option<Union>, next: Union) -> Union {
    match acc {
        Some(acc) => acc.combine_with(&next),
        None => next,
    }
}

// ============================================================================
// Unset
// ============================================================================

/// Drops unset targets from scope; unsetting a literal key of a tracked
/// shape also removes the field.
fn check_unset(targets: &[Expr], ctx: &mut Context) {
    for target in targets {
        if let ExprKind::ArrayAccess {
            array,
            index: Some(index),
        } = &target.kind
        {
            unset_shape_key(array, index, ctx);
        }
        if let Some(path) = var_path(target) {
            ctx.remove_var(&path);
        }
    }
}

fn unset_shape_key(array: &Expr, index: &Expr, ctx: &mut Context) {
    let base = match var_path(array) {
        Some(base) => base,
        None => return,
    };
    let key = match &index.kind {
        ExprKind::Str(key) => key.clone(),
        ExprKind::Int(key) => key.to_string(),
        _ => return,
    };
    let existing = match ctx.var_type(&base) {
        Some(existing) => existing.clone(),
        None => return,
    };
    let parts: Vec<Atomic> = existing
        .parts()
        .map(|part| match part {
            Atomic::Shaped { name, fields } => {
                let mut fields = fields.clone();
                fields.remove(&key);
                Atomic::Shaped {
                    name: name.clone(),
                    fields,
                }
            }
            other => other.clone(),
        })
        .collect();
    ctx.narrow_var(&base, Union::from_parts(parts));
}
