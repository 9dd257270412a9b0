//! Flow-sensitive program traversal
//!
//! The [`Checker`] walks statements in source order, threading a [`Context`]
//! through every program point. Branching constructs clone the context, run
//! each arm on its own clone, and merge the survivors back; conditions are
//! scraped for assertions and applied to the arm that assumes them. Class
//! and function declarations are hoisted before the walk so use-before-decl
//! programs resolve.
//!
//! Types inferred for expressions land in a side table keyed by [`NodeId`];
//! the tree itself is never mutated.

use std::mem;

use rustc_hash::{FxHashMap, FxHashSet};
use skink_ast::{
    ClassDecl, ClassKind, DocBlock, Expr, ExprKind, FunctionDecl, NodeId, Param, Program,
    PropertyDecl, Span, Stmt, StmtKind, SwitchCase, UnaryOp,
};
use skink_types::{parse as parse_type_string, Atomic, Union};

use crate::config::Config;
use crate::context::Context;
use crate::issues::{Fatal, Issue, IssueKind, IssueSink};
use crate::reconciler::{apply_assertions, Assertion};
use crate::registry::{
    method_id, ClassLookup, ClassRecord, FunctionRecord, MethodRecord, ParamRecord,
    PropertyRecord, Registry,
};

pub mod calls;
pub mod exprs;
pub mod members;
pub mod stmts;

// ============================================================================
// Traversal state
// ============================================================================

/// Lookup families the checker can be told to stop reporting on, scoped to
/// the current statement list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Report calls to unknown methods.
    pub check_methods: bool,
    /// Report calls to unknown functions.
    pub check_functions: bool,
    /// Report reads of undefined variables.
    pub check_variables: bool,
}

impl Default for Capabilities {
    fn default() -> Capabilities {
        Capabilities {
            check_methods: true,
            check_functions: true,
            check_variables: true,
        }
    }
}

/// How a statement list leaves its enclosing construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitKind {
    /// Control never reaches the next statement (return or throw).
    End,
    Break,
    Continue,
}

/// One arm of a branching construct, ready for merging.
#[derive(Debug)]
pub struct Branch {
    pub ctx: Context,
    /// How the arm exited; `None` when it runs through to the merge point.
    pub exit: Option<ExitKind>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopKind {
    Loop,
    Switch,
}

/// Bookkeeping for the innermost `break`/`continue` target.
#[derive(Debug)]
pub struct LoopScope {
    pub kind: LoopKind,
    pub saw_break: bool,
    /// Context snapshots taken at each `break`.
    pub break_contexts: Vec<Context>,
    /// Context snapshots taken at each `continue`.
    pub continue_contexts: Vec<Context>,
}

impl LoopScope {
    pub fn new(kind: LoopKind) -> LoopScope {
        LoopScope {
            kind,
            saw_break: false,
            break_contexts: Vec::new(),
            continue_contexts: Vec::new(),
        }
    }
}

/// Return bookkeeping for the function body currently being traversed.
#[derive(Debug)]
pub struct ReturnCtx {
    /// Declared return type, when the signature carries one.
    pub declared: Option<Union>,
    /// Type of every `return` expression seen so far.
    pub collected: Vec<Union>,
    /// Label for messages: "function foo", "method A::b", "closure".
    pub label: String,
}

// ============================================================================
// Checker
// ============================================================================

/// The flow-sensitive traversal.
///
/// Owns the issue sink and the per-node type table; borrows the registry so
/// several programs can be checked against one symbol universe.
pub struct Checker<'a> {
    pub(crate) registry: &'a mut Registry,
    pub(crate) sink: IssueSink,
    pub(crate) config: &'a Config,
    pub(crate) file: String,
    /// Inferred type of every visited expression.
    pub(crate) node_types: FxHashMap<NodeId, Union>,
    /// Inferred return types of closure expressions, consulted by
    /// callback-aware call handling.
    pub(crate) closure_returns: FxHashMap<NodeId, Union>,
    pub(crate) caps: Capabilities,
    pub(crate) return_ctx: Vec<ReturnCtx>,
    pub(crate) loop_scopes: Vec<LoopScope>,
    /// Whether the body being checked belongs to a mixin declaration.
    pub(crate) in_mixin: bool,
    /// Issue kinds suppressed for the body being checked.
    pub(crate) suppressed: Vec<IssueKind>,
    /// Statement ids of declarations already registered, whether by the
    /// hoisting pass or by an earlier visit of the same statement.
    pub(crate) hoisted: FxHashSet<NodeId>,
}

impl<'a> Checker<'a> {
    pub fn new(registry: &'a mut Registry, config: &'a Config) -> Checker<'a> {
        Checker {
            registry,
            sink: IssueSink::new(config),
            config,
            file: String::new(),
            node_types: FxHashMap::default(),
            closure_returns: FxHashMap::default(),
            caps: Capabilities::default(),
            return_ctx: Vec::new(),
            loop_scopes: Vec::new(),
            in_mixin: false,
            suppressed: Vec::new(),
            hoisted: FxHashSet::default(),
        }
    }

    /// Checks one program top to bottom.
    pub fn check_program(&mut self, program: &Program) -> Result<(), Fatal> {
        self.file = program.path.clone();
        // Declarations hoist: a call may precede its declaration in source
        // order.
        for stmt in &program.stmts {
            match &stmt.kind {
                StmtKind::Function(decl) => self.hoist_function(decl, stmt.id, stmt.span)?,
                StmtKind::Class(decl) => self.hoist_class(decl, stmt.id, stmt.span)?,
                _ => {}
            }
        }
        let mut ctx = Context::new();
        self.check_stmts(&program.stmts, &mut ctx)?;
        // Classes referenced only from other pending classes still need
        // their bodies checked. Sorted so issue order is stable.
        let mut leftover = self.registry.pending_names();
        leftover.sort();
        for name in leftover {
            self.ensure_class_checked(&name, Span::default())?;
        }
        Ok(())
    }

    pub fn issues(&self) -> &[Issue] {
        self.sink.issues()
    }

    /// Consumes the checker, yielding collected issues and the node-type
    /// table.
    pub fn into_results(mut self) -> (Vec<Issue>, FxHashMap<NodeId, Union>) {
        (self.sink.drain(), self.node_types)
    }

    // ===== Issue reporting =====

    /// Routes an issue through suppression and severity policy.
    pub(crate) fn report(
        &mut self,
        kind: IssueKind,
        message: String,
        span: Span,
    ) -> Result<(), Fatal> {
        let issue = Issue::new(kind, message, self.file.clone(), span);
        self.sink.report(issue, &self.suppressed)?;
        Ok(())
    }

    // ===== Declaration hoisting =====

    fn hoist_function(
        &mut self,
        decl: &FunctionDecl,
        stmt_id: NodeId,
        span: Span,
    ) -> Result<(), Fatal> {
        let record = self.function_record(decl)?;
        if self.registry.register_function(record) {
            self.hoisted.insert(stmt_id);
        } else {
            self.report(
                IssueKind::DuplicateFunction,
                format!("Cannot redeclare function {}", decl.name),
                span,
            )?;
        }
        Ok(())
    }

    fn hoist_class(&mut self, decl: &ClassDecl, stmt_id: NodeId, span: Span) -> Result<(), Fatal> {
        let name = decl.name.clone();
        if self.registry.queue_class(decl.clone()) {
            self.hoisted.insert(stmt_id);
        } else {
            self.report(
                IssueKind::DuplicateClass,
                format!("Cannot redeclare class {}", name),
                span,
            )?;
        }
        Ok(())
    }

    pub(crate) fn function_record(&mut self, decl: &FunctionDecl) -> Result<FunctionRecord, Fatal> {
        let params = self.param_records(&decl.params, decl.doc.as_ref())?;
        let return_type = self.declared_return(decl)?;
        Ok(FunctionRecord {
            name: decl.name.clone(),
            params,
            return_type,
            inferred_return: None,
            deprecated: decl.doc.as_ref().map(|d| d.deprecated).unwrap_or(false),
            suppressed: suppressed_kinds(decl.doc.as_ref()),
        })
    }

    // ===== Class registration =====

    /// Makes sure a class is registered (and its body checked), resolving
    /// the name case-insensitively and pulling builtins in on demand.
    ///
    /// Returns the canonical name, or `None` when the class does not exist
    /// anywhere. Callers report their own contextual issue for `None`.
    pub(crate) fn ensure_class_checked(
        &mut self,
        name: &str,
        span: Span,
    ) -> Result<Option<String>, Fatal> {
        let canonical = match self.registry.resolve_class_name(name) {
            ClassLookup::Found(c) => c,
            ClassLookup::WrongCase(c) => {
                self.report(
                    IssueKind::InvalidClassCasing,
                    format!("Class {} should be referenced as {}", name, c),
                    span,
                )?;
                c
            }
            ClassLookup::Missing => return Ok(self.registry.load_builtin_class(name)),
        };
        if self.registry.class(&canonical).is_some() {
            return Ok(Some(canonical));
        }
        if !self.registry.mark_registering(&canonical) {
            // Already mid-registration further up the stack: the hierarchy
            // loops back on itself.
            self.report(
                IssueKind::CircularHierarchy,
                format!("Circular inheritance involving {}", canonical),
                span,
            )?;
            return Ok(Some(canonical));
        }
        let decl = self.registry.take_pending(&canonical);
        let result = match decl {
            Some(decl) => self.register_and_check_class(&canonical, &decl),
            None => Ok(()),
        };
        self.registry.unmark_registering(&canonical);
        result?;
        Ok(Some(canonical))
    }

    /// Builds the class record (ancestors first), commits it, then checks
    /// method bodies against the committed member tables.
    fn register_and_check_class(
        &mut self,
        canonical: &str,
        decl: &ClassDecl,
    ) -> Result<(), Fatal> {
        let mut record = ClassRecord::new(canonical, decl.kind);

        if let Some(parent_name) = &decl.parent {
            match self.ensure_class_checked(parent_name, decl.span)? {
                Some(parent) => record.parent = Some(parent),
                None => {
                    self.report(
                        IssueKind::UndefinedClass,
                        format!("{} extends unknown class {}", canonical, parent_name),
                        decl.span,
                    )?;
                }
            }
        }
        for interface in &decl.interfaces {
            match self.ensure_class_checked(interface, decl.span)? {
                Some(name) => record.interfaces.push(name),
                None => {
                    self.report(
                        IssueKind::UndefinedClass,
                        format!("{} implements unknown interface {}", canonical, interface),
                        decl.span,
                    )?;
                }
            }
        }
        for mixin in &decl.mixins {
            match self.ensure_class_checked(mixin, decl.span)? {
                Some(name) => record.mixins.push(name),
                None => {
                    self.report(
                        IssueKind::UndefinedClass,
                        format!("{} uses unknown mixin {}", canonical, mixin),
                        decl.span,
                    )?;
                }
            }
        }

        for constant in &decl.constants {
            record
                .constants
                .insert(constant.name.clone(), literal_union(&constant.value));
        }
        for property in &decl.properties {
            let ty = self.property_type(property)?;
            let prop = PropertyRecord {
                visibility: property.visibility,
                ty,
                declaring_class: canonical.to_string(),
            };
            if property.is_static {
                record.static_properties.insert(property.name.clone(), prop);
            } else {
                record
                    .instance_properties
                    .insert(property.name.clone(), prop);
            }
        }

        let mut methods = Vec::with_capacity(decl.methods.len());
        for method in &decl.methods {
            methods.push(self.method_record(canonical, method)?);
        }
        self.registry.commit_class(record, methods);

        self.check_class_body(canonical, decl)
    }

    fn property_type(&mut self, property: &PropertyDecl) -> Result<Union, Fatal> {
        let doc_ty = if self.config.trust_doc_types {
            property.doc.as_ref().and_then(|d| d.var_type.as_deref())
        } else {
            None
        };
        if let Some(source) = doc_ty.or(property.ty.as_deref()) {
            if let Some(ty) = self.parse_type(source, property.span)? {
                return Ok(ty);
            }
        }
        if let Some(default) = &property.default {
            return Ok(literal_union(default));
        }
        Ok(Union::mixed())
    }

    fn method_record(&mut self, class: &str, decl: &FunctionDecl) -> Result<MethodRecord, Fatal> {
        let params = self.param_records(&decl.params, decl.doc.as_ref())?;
        let return_type = self.declared_return(decl)?;
        Ok(MethodRecord {
            declaring_class: class.to_string(),
            name: decl.name.clone(),
            params,
            return_type,
            inferred_return: None,
            visibility: decl.visibility,
            is_static: decl.is_static,
            is_abstract: decl.is_abstract,
            deprecated: decl.doc.as_ref().map(|d| d.deprecated).unwrap_or(false),
            suppressed: suppressed_kinds(decl.doc.as_ref()),
        })
    }

    fn declared_return(&mut self, decl: &FunctionDecl) -> Result<Option<Union>, Fatal> {
        let doc_ty = if self.config.trust_doc_types {
            decl.doc.as_ref().and_then(|d| d.return_type.as_deref())
        } else {
            None
        };
        match doc_ty.or(decl.return_type.as_deref()) {
            Some(source) => self.parse_type(source, decl.span),
            None => Ok(None),
        }
    }

    /// Builds parameter records, with docblock types taking precedence over
    /// inline ones.
    pub(crate) fn param_records(
        &mut self,
        params: &[Param],
        doc: Option<&DocBlock>,
    ) -> Result<Vec<ParamRecord>, Fatal> {
        let mut records = Vec::with_capacity(params.len());
        for param in params {
            let doc_ty = if self.config.trust_doc_types {
                doc.and_then(|d| d.param_type(&param.name))
            } else {
                None
            };
            let ty = match doc_ty.or(param.ty.as_deref()) {
                Some(source) => self.parse_type(source, param.span)?,
                None => None,
            };
            records.push(ParamRecord {
                name: param.name.clone(),
                ty,
                by_ref: param.by_ref,
                optional: param.default.is_some(),
                variadic: param.variadic,
            });
        }
        Ok(records)
    }

    // ===== Bodies =====

    fn check_class_body(&mut self, canonical: &str, decl: &ClassDecl) -> Result<(), Fatal> {
        // Interface methods carry no bodies worth walking.
        if decl.kind == ClassKind::Interface {
            return Ok(());
        }
        let parent = self
            .registry
            .class(canonical)
            .and_then(|r| r.parent.clone());
        let class_suppressed = suppressed_kinds(decl.doc.as_ref());
        let was_in_mixin = self.in_mixin;
        self.in_mixin = decl.kind == ClassKind::Mixin;
        let mut result = Ok(());
        for method in &decl.methods {
            if method.is_abstract {
                continue;
            }
            result = self.check_method_body(canonical, parent.as_deref(), method, &class_suppressed);
            if result.is_err() {
                break;
            }
        }
        self.in_mixin = was_in_mixin;
        result
    }

    fn check_method_body(
        &mut self,
        class: &str,
        parent: Option<&str>,
        decl: &FunctionDecl,
        class_suppressed: &[IssueKind],
    ) -> Result<(), Fatal> {
        let id = method_id(class, &decl.name);
        let record = match self.registry.method(&id) {
            Some(record) => record.clone(),
            None => return Ok(()),
        };

        let mut ctx = Context::new();
        ctx.self_class = Some(class.to_string());
        ctx.parent_class = parent.map(str::to_string);
        ctx.inside_static = decl.is_static;
        if !decl.is_static {
            ctx.set_var("$this", Union::named(class));
            let props: Vec<(String, Union)> = self
                .registry
                .class(class)
                .map(|r| {
                    r.instance_properties
                        .iter()
                        .map(|(name, prop)| (name.clone(), prop.ty.clone()))
                        .collect()
                })
                .unwrap_or_default();
            for (name, ty) in props {
                ctx.set_var(&format!("$this->{}", name), ty);
            }
        }
        for param in &record.params {
            let ty = param.ty.clone().unwrap_or_else(Union::mixed);
            ctx.set_var(&format!("${}", param.name), ty);
        }

        let mut suppressed = class_suppressed.to_vec();
        suppressed.extend(record.suppressed.iter().copied());
        let inferred = self.check_body(
            &decl.body,
            ctx,
            record.return_type.clone(),
            suppressed,
            format!("method {}", id),
            decl.span,
        )?;
        self.registry.set_inferred_return(&id, inferred);
        Ok(())
    }

    /// Checks a free function declaration's body against its registered
    /// signature (registering first when the declaration was not hoisted).
    pub(crate) fn check_function_stmt(&mut self, decl: &FunctionDecl) -> Result<(), Fatal> {
        let record = match self.registry.function(&decl.name) {
            Some(record) => record.clone(),
            None => {
                let record = self.function_record(decl)?;
                self.registry.register_function(record.clone());
                record
            }
        };
        let mut ctx = Context::new();
        for param in &record.params {
            let ty = param.ty.clone().unwrap_or_else(Union::mixed);
            ctx.set_var(&format!("${}", param.name), ty);
        }
        let inferred = self.check_body(
            &decl.body,
            ctx,
            record.return_type.clone(),
            record.suppressed.clone(),
            format!("function {}", decl.name),
            decl.span,
        )?;
        self.registry
            .set_inferred_function_return(&decl.name, inferred);
        Ok(())
    }

    /// Shared body traversal for functions, methods and closures: fresh
    /// capability and loop state, a return frame, and return-path
    /// validation afterwards. Returns the inferred return type.
    pub(crate) fn check_body(
        &mut self,
        body: &[Stmt],
        mut ctx: Context,
        declared: Option<Union>,
        suppressed: Vec<IssueKind>,
        label: String,
        span: Span,
    ) -> Result<Union, Fatal> {
        let saved_caps = mem::replace(&mut self.caps, Capabilities::default());
        let saved_suppressed = mem::replace(&mut self.suppressed, suppressed);
        let saved_loops = mem::take(&mut self.loop_scopes);
        self.return_ctx.push(ReturnCtx {
            declared: declared.clone(),
            collected: Vec::new(),
            label,
        });

        let walked = self.check_stmts(body, &mut ctx);

        let frame = self.return_ctx.pop();
        self.caps = saved_caps;
        self.suppressed = saved_suppressed;
        self.loop_scopes = saved_loops;
        let exit = walked?;
        let mut frame = match frame {
            Some(frame) => frame,
            None => return Ok(Union::void()),
        };

        if exit != Some(ExitKind::End) {
            // The body can run off its end, which returns null at runtime.
            if let Some(declared_ty) = &declared {
                if !declared_ty.has_void() && !declared_ty.has_null() && !declared_ty.is_mixed() {
                    self.report(
                        IssueKind::InvalidReturnType,
                        format!(
                            "Not all paths of {} return a value of type {}",
                            frame.label, declared_ty
                        ),
                        span,
                    )?;
                }
            }
            frame.collected.push(Union::void());
        }
        let parts: Vec<Atomic> = frame
            .collected
            .drain(..)
            .flat_map(|ty| ty.parts().cloned().collect::<Vec<_>>())
            .collect();
        if parts.is_empty() {
            Ok(Union::void())
        } else {
            Ok(Union::from_parts(parts))
        }
    }

    // ===== Type compatibility =====

    /// Whether a value of type `actual` is acceptable where `expected` is
    /// required. Lenient mode accepts any overlapping part; strict
    /// nullability requires every part (so `int|null` no longer satisfies
    /// `int`).
    pub(crate) fn types_compatible(&self, expected: &Union, actual: &Union) -> bool {
        if expected.is_mixed() || actual.is_mixed() {
            return true;
        }
        if self.config.strict_nullability {
            actual
                .parts()
                .all(|part| expected.parts().any(|e| self.part_fits(part, e)))
        } else {
            actual
                .parts()
                .any(|part| expected.parts().any(|e| self.part_fits(part, e)))
        }
    }

    fn part_fits(&self, actual: &Atomic, expected: &Atomic) -> bool {
        if *expected == Atomic::Mixed || *actual == Atomic::Mixed {
            return true;
        }
        if actual.key() == expected.key() {
            return true;
        }
        if *expected == Atomic::Scalar && actual.is_scalar() {
            return true;
        }
        if *actual == Atomic::Scalar && expected.is_scalar() {
            return true;
        }
        if *expected == Atomic::Bool && matches!(actual, Atomic::True | Atomic::False) {
            return true;
        }
        // Implicit int-to-float widening.
        if *expected == Atomic::Float && *actual == Atomic::Int {
            return true;
        }
        if *expected == Atomic::Callable && matches!(actual, Atomic::Named(name) if name == "Closure")
        {
            return true;
        }
        let actual_is_array = actual.is_array_like() || *actual == Atomic::Empty;
        if actual_is_array && expected.is_array_like() {
            // Container parameters are matched shallowly.
            return true;
        }
        if *expected == Atomic::Object && actual.class_name().is_some() {
            return true;
        }
        if *actual == Atomic::Object && expected.class_name().is_some() {
            return true;
        }
        if let (Some(actual_class), Some(expected_class)) =
            (actual.class_name(), expected.class_name())
        {
            if actual_class == expected_class || self.registry.is_ancestor(expected_class, actual_class)
            {
                return true;
            }
        }
        false
    }

    // ===== Class name resolution =====

    /// Resolves a `::` target or `new` class name, expanding `self`,
    /// `static` and `parent` against the enclosing class.
    pub(crate) fn resolve_class_target(
        &mut self,
        class: &str,
        ctx: &Context,
        span: Span,
    ) -> Result<Option<String>, Fatal> {
        match class {
            "self" | "static" => {
                let found = ctx.self_class.clone();
                if found.is_none() {
                    self.report(
                        IssueKind::InvalidScope,
                        format!("Cannot use {} outside a class", class),
                        span,
                    )?;
                }
                Ok(found)
            }
            "parent" => {
                let found = ctx.parent_class.clone();
                if found.is_none() {
                    self.report(
                        IssueKind::InvalidScope,
                        "Cannot use parent when the current class has no parent".to_string(),
                        span,
                    )?;
                }
                Ok(found)
            }
            _ => {
                let found = self.ensure_class_checked(class, span)?;
                if found.is_none() {
                    self.report(
                        IssueKind::UndefinedClass,
                        format!("Class {} does not exist", class),
                        span,
                    )?;
                }
                Ok(found)
            }
        }
    }

    /// Parses a type string, reporting malformed ones as docblock issues.
    pub(crate) fn parse_type(&mut self, source: &str, span: Span) -> Result<Option<Union>, Fatal> {
        match parse_type_string(source) {
            Ok(ty) => Ok(Some(ty)),
            Err(err) => {
                self.report(
                    IssueKind::InvalidDocblock,
                    format!("Could not parse type '{}': {}", source, err),
                    span,
                )?;
                Ok(None)
            }
        }
    }

    // ===== Assertion application =====

    /// Applies condition assertions to the arm that assumes them,
    /// reporting facts that are already established and narrowings that
    /// leave no type behind.
    ///
    /// Only this positive application reports; negations applied to the
    /// opposite arm stay silent, so one odd condition yields one issue.
    pub(crate) fn apply_reported(
        &mut self,
        assertions: &FxHashMap<String, Vec<Assertion>>,
        ctx: &mut Context,
        span: Span,
    ) -> Result<(), Fatal> {
        let outcome = apply_assertions(ctx, assertions, self.registry);
        for (path, assertion) in &outcome.redundant {
            self.report(
                IssueKind::RedundantCondition,
                format!("{} is always {}", path, assertion),
                span,
            )?;
        }
        for (path, assertion, existing) in &outcome.failed {
            self.report(
                IssueKind::FailedTypeResolution,
                format!("{} of type {} can never be {}", path, existing, assertion),
                span,
            )?;
        }
        Ok(())
    }
}

/// Applies assertions without reporting, for negated and implied arms.
pub(crate) fn apply_silent(
    assertions: &FxHashMap<String, Vec<Assertion>>,
    ctx: &mut Context,
    registry: &Registry,
) {
    let _ = apply_assertions(ctx, assertions, registry);
}

// ============================================================================
// Branch merging
// ============================================================================

/// Merges branch contexts back into the context the branches forked from.
///
/// Assignments from every branch become possibly-defined. Branches that
/// exited (returned, threw, broke, continued) contribute nothing else. A
/// variable is definite after the merge when every live branch knows it,
/// typed as the union across live branches; the union replaces the
/// pre-branch type, since the branches cover every way control reaches this
/// point. With no live branch the pre-branch state stands, except that
/// subsequent statements are unreachable anyway.
pub(crate) fn merge_branches(outer: &mut Context, branches: Vec<Branch>) {
    for branch in &branches {
        outer.absorb_possibly_defined(&branch.ctx);
    }
    let live: Vec<&Context> = branches
        .iter()
        .filter(|b| b.exit.is_none())
        .map(|b| &b.ctx)
        .collect();
    let first = match live.first() {
        Some(first) => first,
        None => return,
    };

    let existing: Vec<String> = outer.vars_in_scope.keys().cloned().collect();
    for key in existing {
        match union_across(&live, &key) {
            Some(ty) => {
                outer.vars_in_scope.insert(key, ty);
            }
            None => {
                outer.vars_in_scope.remove(&key);
            }
        }
    }

    // Variables first assigned inside the branches are definite when every
    // live branch assigned them.
    let candidates: Vec<String> = first
        .vars_in_scope
        .keys()
        .filter(|key| !outer.vars_in_scope.contains_key(*key))
        .cloned()
        .collect();
    for key in candidates {
        if let Some(ty) = union_across(&live, &key) {
            outer.vars_possibly_in_scope.insert(key.clone());
            outer.vars_in_scope.insert(key, ty);
        }
    }

    // A narrowing fact survives only when every live branch still holds it.
    outer
        .clauses
        .retain(|clause| live.iter().all(|ctx| ctx.clauses.contains(clause)));
}

/// Union of a variable's type across contexts; `None` when any context does
/// not know the variable as definite.
fn union_across(contexts: &[&Context], key: &str) -> Option<Union> {
    let mut merged: Option<Union> = None;
    for ctx in contexts {
        let ty = ctx.vars_in_scope.get(key)?;
        merged = Some(match merged {
            Some(acc) => acc.combine_with(ty),
            None => ty.clone(),
        });
    }
    merged
}

// ============================================================================
// Exit classification
// ============================================================================

/// First unavoidable exit of a statement list, in syntax only.
pub(crate) fn stmts_exit(stmts: &[Stmt]) -> Option<ExitKind> {
    stmts.iter().find_map(stmt_exit)
}

fn stmt_exit(stmt: &Stmt) -> Option<ExitKind> {
    match &stmt.kind {
        StmtKind::Return { .. } | StmtKind::Throw { .. } => Some(ExitKind::End),
        StmtKind::Break => Some(ExitKind::Break),
        StmtKind::Continue => Some(ExitKind::Continue),
        StmtKind::If {
            then_branch,
            elseifs,
            else_branch: Some(else_branch),
            ..
        } => {
            // Without an else the condition may fail and fall through.
            let mut exits = Vec::with_capacity(elseifs.len() + 2);
            exits.push(stmts_exit(then_branch)?);
            for elseif in elseifs {
                exits.push(stmts_exit(&elseif.body)?);
            }
            exits.push(stmts_exit(else_branch)?);
            Some(combine_exits(&exits))
        }
        StmtKind::Switch { cases, .. } => switch_exit(cases),
        StmtKind::Try {
            body,
            catches,
            finally,
        } => {
            if let Some(finally) = finally {
                if let Some(exit) = stmts_exit(finally) {
                    return Some(exit);
                }
            }
            let mut exits = vec![stmts_exit(body)?];
            for catch in catches {
                exits.push(stmts_exit(&catch.body)?);
            }
            Some(combine_exits(&exits))
        }
        _ => None,
    }
}

/// A `continue` or `break` anywhere keeps the construct from counting as a
/// hard end.
fn combine_exits(exits: &[ExitKind]) -> ExitKind {
    if exits.contains(&ExitKind::Continue) {
        ExitKind::Continue
    } else if exits.contains(&ExitKind::Break) {
        ExitKind::Break
    } else {
        ExitKind::End
    }
}

/// A switch exits only when it has a default and every case, after
/// following fallthrough into the next case, ends hard. A `break` targets
/// the switch itself, so it means falling out of it.
fn switch_exit(cases: &[SwitchCase]) -> Option<ExitKind> {
    if !cases.iter().any(|case| case.value.is_none()) {
        return None;
    }
    let mut next_effective: Option<ExitKind> = None;
    let mut all_end = true;
    for case in cases.iter().rev() {
        let effective = stmts_exit(&case.body).or(next_effective);
        if effective != Some(ExitKind::End) {
            all_end = false;
        }
        next_effective = effective;
    }
    if all_end {
        Some(ExitKind::End)
    } else {
        None
    }
}

// ============================================================================
// Literal defaults
// ============================================================================

/// Type of a constant or property initializer expression. Anything beyond
/// literal shapes falls back to mixed.
pub(crate) fn literal_union(expr: &Expr) -> Union {
    match &expr.kind {
        ExprKind::Int(_) => Union::int(),
        ExprKind::Float(_) => Union::float(),
        ExprKind::Str(_) => Union::string(),
        ExprKind::Bool(true) => Union::of(Atomic::True),
        ExprKind::Bool(false) => Union::of(Atomic::False),
        ExprKind::Null => Union::null(),
        ExprKind::Array { entries } if entries.is_empty() => Union::empty_array(),
        ExprKind::Array { .. } => Union::array(Union::mixed(), Union::mixed()),
        ExprKind::Unary {
            op: UnaryOp::Neg,
            operand,
        } => literal_union(operand),
        _ => Union::mixed(),
    }
}

fn suppressed_kinds(doc: Option<&DocBlock>) -> Vec<IssueKind> {
    doc.map(|d| {
        d.suppressed
            .iter()
            .filter_map(|name| IssueKind::from_name(name))
            .collect()
    })
    .unwrap_or_default()
}
