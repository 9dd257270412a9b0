//! Call checking
//!
//! Calls resolve their callee through the registry, with the builtin call
//! map as fallback, then validate arguments against the recorded
//! parameters and produce the declared or inferred return type. Closures
//! are checked here too; their inferred returns are kept aside so the
//! call map's callback cases can read them.

use skink_ast::{Arg, ClassKind, ClosureUse, Expr, ExprKind, NodeId, Param, Span, Stmt, Visibility};
use skink_types::{Atomic, Union};

use crate::context::Context;
use crate::issues::{Fatal, IssueKind};
use crate::registry::{call_map_entry, CallMapEntry, MethodRecord, ParamRecord, SpecialCase};

use super::Checker;

impl<'a> Checker<'a> {
    // ===== Function calls =====

    pub(crate) fn check_function_call(
        &mut self,
        name: &str,
        args: &[Arg],
        span: Span,
        ctx: &mut Context,
    ) -> Result<Union, Fatal> {
        // Reflection guards relax checking until the end of the enclosing
        // statement list.
        match name {
            "method_exists" => self.caps.check_methods = false,
            "function_exists" => self.caps.check_functions = false,
            "extract" => self.caps.check_variables = false,
            _ => {}
        }
        if self.config.forbid_shell_exec
            && matches!(name, "shell_exec" | "exec" | "system" | "passthru")
        {
            self.report(
                IssueKind::ForbiddenCode,
                format!("Call to {} is forbidden by configuration", name),
                span,
            )?;
        }
        if self.config.forbid_debug_dumps && matches!(name, "var_dump" | "print_r" | "var_export") {
            self.report(
                IssueKind::ForbiddenCode,
                format!("Call to {} is forbidden by configuration", name),
                span,
            )?;
        }

        let label = format!("function {}", name);
        if let Some(record) = self.registry.function(name).cloned() {
            self.check_args(&record.params, args, ctx, span, &label)?;
            if record.deprecated {
                self.report(
                    IssueKind::DeprecatedMethod,
                    format!("Function {} is deprecated", name),
                    span,
                )?;
            }
            let ret = record
                .return_type
                .or(record.inferred_return)
                .unwrap_or_else(Union::mixed);
            return Ok(ret);
        }

        if let Some(entry) = call_map_entry(name) {
            let arg_types = self.check_args(&entry.params, args, ctx, span, &label)?;
            return Ok(self.call_map_return(entry, args, &arg_types));
        }

        if let Some(record) = self.registry.builtin_function(name).cloned() {
            self.check_args(&record.params, args, ctx, span, &label)?;
            return Ok(record.return_type.unwrap_or_else(Union::mixed));
        }

        // Unknown callee; the arguments still get typed.
        for arg in args {
            self.check_expr(&arg.value, ctx)?;
        }
        if self.caps.check_functions {
            self.report(
                IssueKind::UndefinedFunction,
                format!("Function {} does not exist", name),
                span,
            )?;
        }
        Ok(Union::mixed())
    }

    /// Computes a call-map return, deriving the special cases from the
    /// argument types at the call site.
    fn call_map_return(&self, entry: &CallMapEntry, args: &[Arg], arg_types: &[Union]) -> Union {
        let special = match entry.special {
            Some(special) => special,
            None => return entry.return_type.clone(),
        };
        match special {
            SpecialCase::MapValues => {
                let key = arg_types
                    .get(1)
                    .and_then(iterable_key)
                    .unwrap_or_else(Union::mixed);
                let value = args
                    .first()
                    .and_then(|arg| self.closure_returns.get(&arg.value.id))
                    .cloned()
                    .unwrap_or_else(Union::mixed);
                Union::array(key, value)
            }
            SpecialCase::FilterValues => {
                let key = arg_types
                    .first()
                    .and_then(iterable_key)
                    .unwrap_or_else(Union::mixed);
                let mut value = arg_types
                    .first()
                    .and_then(iterable_value)
                    .unwrap_or_else(Union::mixed);
                if args.len() < 2 {
                    // Without a callback the falsy members drop out.
                    if let Some(kept) = value.without("null") {
                        value = kept;
                    }
                    if let Some(kept) = value.without("false") {
                        value = kept;
                    }
                }
                Union::array(key, value)
            }
            SpecialCase::MergeArrays => {
                let mut merged: Option<Union> = None;
                for ty in arg_types {
                    merged = Some(match merged {
                        Some(acc) => acc.combine_with(ty),
                        None => ty.clone(),
                    });
                }
                merged.unwrap_or_else(Union::empty_array)
            }
            SpecialCase::DiffArrays => arg_types
                .first()
                .cloned()
                .unwrap_or_else(|| entry.return_type.clone()),
            SpecialCase::ArrayKeys => {
                let key = arg_types
                    .first()
                    .and_then(iterable_key)
                    .unwrap_or_else(Union::mixed);
                Union::array(Union::int(), key)
            }
            SpecialCase::ArrayValues => {
                let value = arg_types
                    .first()
                    .and_then(iterable_value)
                    .unwrap_or_else(Union::mixed);
                Union::array(Union::int(), value)
            }
        }
    }

    // ===== Arguments =====

    /// Evaluates arguments against a parameter list, enforcing arity and
    /// per-argument compatibility. A by-reference parameter writes its
    /// declared type into a plain variable argument instead of reading it.
    pub(crate) fn check_args(
        &mut self,
        params: &[ParamRecord],
        args: &[Arg],
        ctx: &mut Context,
        span: Span,
        label: &str,
    ) -> Result<Vec<Union>, Fatal> {
        let mut arg_types = Vec::with_capacity(args.len());
        for (i, arg) in args.iter().enumerate() {
            let param = params.get(i).or_else(|| params.last().filter(|p| p.variadic));
            let by_ref_var = param
                .filter(|p| p.by_ref)
                .and_then(|_| arg.value.as_variable());
            match by_ref_var {
                Some(name) if !arg.spread => {
                    let ty = param
                        .and_then(|p| p.ty.clone())
                        .unwrap_or_else(Union::mixed);
                    ctx.set_var(&format!("${}", name), ty.clone());
                    self.node_types.insert(arg.value.id, ty.clone());
                    arg_types.push(ty);
                }
                _ => arg_types.push(self.check_expr(&arg.value, ctx)?),
            }
        }

        // Spread arguments make the given count unknowable.
        let has_spread = args.iter().any(|arg| arg.spread);
        if !has_spread {
            let required = params.iter().filter(|p| !p.optional && !p.variadic).count();
            let variadic = params.last().map_or(false, |p| p.variadic);
            if args.len() < required {
                self.report(
                    IssueKind::TooFewArguments,
                    format!(
                        "Too few arguments to {}: {} given, at least {} expected",
                        label,
                        args.len(),
                        required
                    ),
                    span,
                )?;
            } else if args.len() > params.len() && !variadic {
                self.report(
                    IssueKind::TooManyArguments,
                    format!(
                        "Too many arguments to {}: {} given, at most {} expected",
                        label,
                        args.len(),
                        params.len()
                    ),
                    span,
                )?;
            }
        }

        for (i, arg) in args.iter().enumerate() {
            if arg.spread {
                continue;
            }
            let param = match params.get(i).or_else(|| params.last().filter(|p| p.variadic)) {
                Some(param) if !param.by_ref => param,
                _ => continue,
            };
            let expected = match &param.ty {
                Some(expected) => expected,
                None => continue,
            };
            if !self.types_compatible(expected, &arg_types[i]) {
                self.report(
                    IssueKind::InvalidArgument,
                    format!(
                        "Argument {} of {} expects {}, got {}",
                        i + 1,
                        label,
                        expected,
                        arg_types[i]
                    ),
                    span,
                )?;
            }
        }
        Ok(arg_types)
    }

    // ===== Method calls =====

    pub(crate) fn check_method_call(
        &mut self,
        receiver: &Expr,
        method: &str,
        args: &[Arg],
        span: Span,
        ctx: &mut Context,
    ) -> Result<Union, Fatal> {
        let receiver_ty = self.check_expr(receiver, ctx)?;
        let receiver_is_this =
            matches!(&receiver.kind, ExprKind::Variable { name } if name == "this");
        let single = receiver_ty.len() == 1;
        let parts: Vec<Atomic> = receiver_ty.parts().cloned().collect();

        let mut returns: Vec<Atomic> = Vec::new();
        let mut args_checked = false;
        let mut reported_null = false;
        for part in &parts {
            match part {
                Atomic::Null | Atomic::Void => {
                    if !reported_null {
                        reported_null = true;
                        if single {
                            self.report(
                                IssueKind::NullReference,
                                format!("Cannot call method {} on null", method),
                                span,
                            )?;
                        } else {
                            self.report(
                                IssueKind::PossiblyNullReference,
                                format!("Cannot call method {} on possibly null value", method),
                                span,
                            )?;
                        }
                    }
                }
                Atomic::Mixed => {
                    if self.caps.check_methods {
                        self.report(
                            IssueKind::MixedMethodCall,
                            format!("Cannot verify method {} on mixed", method),
                            span,
                        )?;
                    }
                    returns.push(Atomic::Mixed);
                }
                Atomic::Object => returns.push(Atomic::Mixed),
                other => match other.class_name() {
                    Some(class) => {
                        let class = class.to_string();
                        self.call_on_class(
                            &class,
                            method,
                            args,
                            receiver_is_this,
                            span,
                            ctx,
                            &mut args_checked,
                            &mut returns,
                        )?;
                    }
                    None => {
                        self.report(
                            IssueKind::UndefinedMethod,
                            format!("Cannot call method {} on {}", method, other),
                            span,
                        )?;
                    }
                },
            }
        }

        if !args_checked {
            for arg in args {
                self.check_expr(&arg.value, ctx)?;
            }
        }
        if returns.is_empty() {
            Ok(Union::mixed())
        } else {
            Ok(Union::from_parts(returns))
        }
    }

    /// Resolves one method call against a single class part of the
    /// receiver. The first resolved signature validates the arguments;
    /// later parts only contribute their return types.
    fn call_on_class(
        &mut self,
        class: &str,
        method: &str,
        args: &[Arg],
        receiver_is_this: bool,
        span: Span,
        ctx: &mut Context,
        args_checked: &mut bool,
        returns: &mut Vec<Atomic>,
    ) -> Result<(), Fatal> {
        let canonical = match self.ensure_class_checked(class, span)? {
            Some(canonical) => canonical,
            None => {
                self.report(
                    IssueKind::UndefinedClass,
                    format!("Class {} does not exist", class),
                    span,
                )?;
                returns.push(Atomic::Mixed);
                return Ok(());
            }
        };
        let found = self
            .registry
            .method_on(&canonical, method)
            .map(|(id, record)| (id, record.clone()));
        let Some((declaring_id, record)) = found else {
            if self.in_mixin && receiver_is_this {
                // Mixin bodies may call into their eventual host class.
                returns.push(Atomic::Mixed);
            } else if self.caps.check_methods {
                self.report(
                    IssueKind::UndefinedMethod,
                    format!("Method {}::{} does not exist", canonical, method),
                    span,
                )?;
            }
            return Ok(());
        };

        let file = self.file.clone();
        self.registry.record_invocation(&declaring_id, &file, span);
        if !self.registry.can_access(
            record.visibility,
            &record.declaring_class,
            ctx.self_class.as_deref(),
            self.in_mixin,
        ) {
            self.report(
                IssueKind::InaccessibleMethod,
                format!(
                    "Method {} is {} and cannot be called from this scope",
                    declaring_id,
                    visibility_name(record.visibility)
                ),
                span,
            )?;
        }
        if record.deprecated {
            self.report(
                IssueKind::DeprecatedMethod,
                format!("Method {} is deprecated", declaring_id),
                span,
            )?;
        }
        if !*args_checked {
            *args_checked = true;
            self.check_args(
                &record.params,
                args,
                ctx,
                span,
                &format!("method {}", declaring_id),
            )?;
        }
        let ret = self.method_return(&record, &canonical);
        returns.extend(ret.parts().cloned());
        Ok(())
    }

    /// Declared-or-inferred return with `self`, `static` and `$this`
    /// substituted against the receiving class.
    fn method_return(&self, record: &MethodRecord, receiving: &str) -> Union {
        let ret = record
            .return_type
            .clone()
            .or_else(|| record.inferred_return.clone())
            .unwrap_or_else(Union::mixed);
        let ret = ret.substitute("self", &Union::named(&record.declaring_class));
        let ret = ret.substitute("static", &Union::named(receiving));
        ret.substitute("$this", &Union::named(receiving))
    }

    // ===== Static calls =====

    pub(crate) fn check_static_call(
        &mut self,
        class: &str,
        method: &str,
        args: &[Arg],
        span: Span,
        ctx: &mut Context,
    ) -> Result<Union, Fatal> {
        let relative = matches!(class, "self" | "parent" | "static");
        let canonical = match self.resolve_class_target(class, ctx, span)? {
            Some(canonical) => canonical,
            None => {
                for arg in args {
                    self.check_expr(&arg.value, ctx)?;
                }
                return Ok(Union::mixed());
            }
        };
        let found = self
            .registry
            .method_on(&canonical, method)
            .map(|(id, record)| (id, record.clone()));
        let Some((declaring_id, record)) = found else {
            if !(self.in_mixin && relative) && self.caps.check_methods {
                self.report(
                    IssueKind::UndefinedMethod,
                    format!("Method {}::{} does not exist", canonical, method),
                    span,
                )?;
            }
            for arg in args {
                self.check_expr(&arg.value, ctx)?;
            }
            return Ok(Union::mixed());
        };

        let file = self.file.clone();
        self.registry.record_invocation(&declaring_id, &file, span);
        // self::m() and parent::m() from an instance method are valid ways
        // to reach instance methods up the hierarchy.
        if !record.is_static && !(relative && !ctx.inside_static) {
            self.report(
                IssueKind::InvalidStaticInvocation,
                format!("Method {} is not static", declaring_id),
                span,
            )?;
        }
        if !self.registry.can_access(
            record.visibility,
            &record.declaring_class,
            ctx.self_class.as_deref(),
            self.in_mixin,
        ) {
            self.report(
                IssueKind::InaccessibleMethod,
                format!(
                    "Method {} is {} and cannot be called from this scope",
                    declaring_id,
                    visibility_name(record.visibility)
                ),
                span,
            )?;
        }
        if record.deprecated {
            self.report(
                IssueKind::DeprecatedMethod,
                format!("Method {} is deprecated", declaring_id),
                span,
            )?;
        }
        self.check_args(
            &record.params,
            args,
            ctx,
            span,
            &format!("method {}", declaring_id),
        )?;
        Ok(self.method_return(&record, &canonical))
    }

    // ===== Instantiation =====

    pub(crate) fn check_new(
        &mut self,
        class: &str,
        args: &[Arg],
        span: Span,
        ctx: &mut Context,
    ) -> Result<Union, Fatal> {
        let canonical = match self.resolve_class_target(class, ctx, span)? {
            Some(canonical) => canonical,
            None => {
                for arg in args {
                    self.check_expr(&arg.value, ctx)?;
                }
                return Ok(Union::mixed());
            }
        };
        let kind = self.registry.class(&canonical).map(|r| r.kind);
        match kind {
            Some(ClassKind::Interface) => {
                self.report(
                    IssueKind::InvalidScope,
                    format!("Cannot instantiate interface {}", canonical),
                    span,
                )?;
            }
            Some(ClassKind::Mixin) => {
                self.report(
                    IssueKind::InvalidScope,
                    format!("Cannot instantiate mixin {}", canonical),
                    span,
                )?;
            }
            _ => {}
        }

        let ctor = self
            .registry
            .method_on(&canonical, "__construct")
            .map(|(id, record)| (id, record.clone()));
        match ctor {
            Some((declaring_id, record)) => {
                let file = self.file.clone();
                self.registry.record_invocation(&declaring_id, &file, span);
                if !self.registry.can_access(
                    record.visibility,
                    &record.declaring_class,
                    ctx.self_class.as_deref(),
                    self.in_mixin,
                ) {
                    self.report(
                        IssueKind::InaccessibleMethod,
                        format!(
                            "Constructor {} is {} and cannot be called from this scope",
                            declaring_id,
                            visibility_name(record.visibility)
                        ),
                        span,
                    )?;
                }
                self.check_args(
                    &record.params,
                    args,
                    ctx,
                    span,
                    &format!("constructor {}", declaring_id),
                )?;
            }
            None => {
                for arg in args {
                    self.check_expr(&arg.value, ctx)?;
                }
                if !args.is_empty() {
                    self.report(
                        IssueKind::TooManyArguments,
                        format!(
                            "Class {} has no constructor but {} arguments were given",
                            canonical,
                            args.len()
                        ),
                        span,
                    )?;
                }
            }
        }
        Ok(Union::named(&canonical))
    }

    // ===== Closures =====

    /// Checks a closure body in a fresh scope seeded from the captures,
    /// keeping the inferred return for the call map's callback cases.
    pub(crate) fn check_closure(
        &mut self,
        id: NodeId,
        params: &[Param],
        uses: &[ClosureUse],
        return_type: Option<&str>,
        body: &[Stmt],
        span: Span,
        ctx: &mut Context,
    ) -> Result<Union, Fatal> {
        let mut closure_ctx = Context::new();
        closure_ctx.self_class = ctx.self_class.clone();
        closure_ctx.parent_class = ctx.parent_class.clone();
        closure_ctx.inside_static = ctx.inside_static;
        // $this travels into closures automatically.
        if let Some(this_ty) = ctx.var_type("$this") {
            closure_ctx.set_var("$this", this_ty.clone());
        }
        for (path, ty) in &ctx.vars_in_scope {
            if path.starts_with("$this->") {
                closure_ctx.narrow_var(path, ty.clone());
            }
        }

        for capture in uses {
            let path = format!("${}", capture.name);
            match ctx.var_type(&path) {
                Some(ty) => closure_ctx.set_var(&path, ty.clone()),
                None if capture.by_ref => {
                    // A by-reference capture springs into both scopes.
                    closure_ctx.set_var(&path, Union::mixed());
                    ctx.set_var(&path, Union::mixed());
                }
                None => {
                    if self.caps.check_variables {
                        self.report(
                            IssueKind::UndefinedVariable,
                            format!("Variable {} is not defined in the enclosing scope", path),
                            span,
                        )?;
                    }
                    closure_ctx.set_var(&path, Union::mixed());
                }
            }
        }

        let declared = match return_type {
            Some(source) => self.parse_type(source, span)?,
            None => None,
        };
        let param_records = self.param_records(params, None)?;
        for param in &param_records {
            closure_ctx.set_var(
                &format!("${}", param.name),
                param.ty.clone().unwrap_or_else(Union::mixed),
            );
        }

        let suppressed = self.suppressed.clone();
        let inferred =
            self.check_body(body, closure_ctx, declared, suppressed, "closure".to_string(), span)?;
        self.closure_returns.insert(id, inferred);
        Ok(Union::named("Closure"))
    }
}

// ===== Iterable projections =====

/// Union of key types across the iterable parts, `None` when nothing
/// iterates.
fn iterable_key(ty: &Union) -> Option<Union> {
    let mut parts: Vec<Atomic> = Vec::new();
    for part in ty.parts() {
        if let Some((key, _)) = part.iterable_params() {
            parts.extend(key.parts().cloned());
        }
    }
    if parts.is_empty() {
        None
    } else {
        Some(Union::from_parts(parts))
    }
}

fn iterable_value(ty: &Union) -> Option<Union> {
    let mut parts: Vec<Atomic> = Vec::new();
    for part in ty.parts() {
        if let Some((_, value)) = part.iterable_params() {
            parts.extend(value.parts().cloned());
        }
    }
    if parts.is_empty() {
        None
    } else {
        Some(Union::from_parts(parts))
    }
}

/// Lowercase visibility keyword for messages.
pub(crate) fn visibility_name(visibility: Visibility) -> &'static str {
    match visibility {
        Visibility::Public => "public",
        Visibility::Protected => "protected",
        Visibility::Private => "private",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iterable_key_value() {
        let ty = Union::array(Union::string(), Union::int());
        assert_eq!(iterable_key(&ty).unwrap().to_string(), "string");
        assert_eq!(iterable_value(&ty).unwrap().to_string(), "int");
        assert!(iterable_key(&Union::int()).is_none());
    }

    #[test]
    fn test_iterable_projections_union_across_parts() {
        let ty = Union::from_parts(vec![
            Atomic::Generic {
                name: "array".to_string(),
                params: vec![Union::int(), Union::string()],
            },
            Atomic::Generic {
                name: "array".to_string(),
                params: vec![Union::string(), Union::null()],
            },
        ]);
        assert_eq!(iterable_key(&ty).unwrap().to_string(), "int|string");
        assert_eq!(iterable_value(&ty).unwrap().to_string(), "null|string");
    }

    #[test]
    fn test_visibility_names() {
        assert_eq!(visibility_name(Visibility::Private), "private");
        assert_eq!(visibility_name(Visibility::Protected), "protected");
        assert_eq!(visibility_name(Visibility::Public), "public");
    }
}
