//! Member access
//!
//! Property fetches, static properties, class constants, and array
//! offsets. Reads walk every part of the receiver union, reporting against
//! the parts that cannot carry the member; the result is recorded under
//! the member's access path so later reads and narrowings agree with it.

use std::collections::BTreeMap;

use skink_ast::{Expr, ExprKind, Span};
use skink_types::{Atomic, Union};

use crate::context::Context;
use crate::issues::{Fatal, IssueKind};
use crate::reconciler::var_path;

use super::calls::visibility_name;
use super::Checker;

impl<'a> Checker<'a> {
    // ===== Instance properties =====

    pub(crate) fn check_property_fetch(
        &mut self,
        receiver: &Expr,
        property: &str,
        span: Span,
        ctx: &mut Context,
    ) -> Result<Union, Fatal> {
        // A narrowed path entry wins over recomputation from the class.
        let path = var_path(receiver).map(|base| format!("{}->{}", base, property));
        if let Some(path) = &path {
            if let Some(ty) = ctx.var_type(path) {
                return Ok(ty.clone());
            }
        }

        let receiver_ty = self.check_expr(receiver, ctx)?;
        let receiver_is_this =
            matches!(&receiver.kind, ExprKind::Variable { name } if name == "this");
        let single = receiver_ty.len() == 1;
        let parts: Vec<Atomic> = receiver_ty.parts().cloned().collect();

        let mut results: Vec<Atomic> = Vec::new();
        let mut reported_null = false;
        for part in &parts {
            match part {
                Atomic::Null | Atomic::Void => {
                    if !reported_null {
                        reported_null = true;
                        if single {
                            self.report(
                                IssueKind::NullReference,
                                format!("Cannot read property {} on null", property),
                                span,
                            )?;
                        } else {
                            self.report(
                                IssueKind::PossiblyNullReference,
                                format!("Cannot read property {} on possibly null value", property),
                                span,
                            )?;
                        }
                    }
                }
                Atomic::Mixed => {
                    self.report(
                        IssueKind::MixedPropertyFetch,
                        format!("Cannot verify property {} on mixed", property),
                        span,
                    )?;
                    results.push(Atomic::Mixed);
                }
                Atomic::Object => results.push(Atomic::Mixed),
                other => match other.class_name() {
                    Some(class) => {
                        let class = class.to_string();
                        let ty = self.property_on_class(
                            &class,
                            property,
                            receiver_is_this,
                            ctx,
                            span,
                        )?;
                        results.extend(ty.parts().cloned());
                    }
                    None => {
                        self.report(
                            IssueKind::UndefinedProperty,
                            format!("Cannot read property {} on {}", property, other),
                            span,
                        )?;
                    }
                },
            }
        }

        let result = if results.is_empty() {
            Union::mixed()
        } else {
            Union::from_parts(results)
        };
        if let Some(path) = path {
            ctx.narrow_var(&path, result.clone());
        }
        Ok(result)
    }

    /// Looks a property up on one class part, enforcing visibility.
    fn property_on_class(
        &mut self,
        class: &str,
        property: &str,
        receiver_is_this: bool,
        ctx: &Context,
        span: Span,
    ) -> Result<Union, Fatal> {
        let canonical = match self.ensure_class_checked(class, span)? {
            Some(canonical) => canonical,
            None => {
                self.report(
                    IssueKind::UndefinedClass,
                    format!("Class {} does not exist", class),
                    span,
                )?;
                return Ok(Union::mixed());
            }
        };
        let found = self
            .registry
            .property_on(&canonical, property)
            .map(|record| (record.visibility, record.declaring_class.clone(), record.ty.clone()));
        match found {
            Some((visibility, declaring, ty)) => {
                if !self.registry.can_access(
                    visibility,
                    &declaring,
                    ctx.self_class.as_deref(),
                    self.in_mixin,
                ) {
                    self.report(
                        IssueKind::InaccessibleProperty,
                        format!(
                            "Property {}::${} is {} and cannot be read from this scope",
                            declaring,
                            property,
                            visibility_name(visibility)
                        ),
                        span,
                    )?;
                }
                Ok(ty)
            }
            None => {
                if self.in_mixin && receiver_is_this {
                    // Mixin bodies may touch host-class properties.
                    return Ok(Union::mixed());
                }
                // stdClass grows properties at runtime.
                if canonical == "stdClass" {
                    return Ok(Union::mixed());
                }
                self.report(
                    IssueKind::UndefinedProperty,
                    format!("Property {}::${} is not defined", canonical, property),
                    span,
                )?;
                Ok(Union::mixed())
            }
        }
    }

    pub(crate) fn assign_property(
        &mut self,
        receiver: &Expr,
        property: &str,
        ty: Union,
        span: Span,
        ctx: &mut Context,
    ) -> Result<(), Fatal> {
        let receiver_ty = self.check_expr(receiver, ctx)?;
        let receiver_is_this =
            matches!(&receiver.kind, ExprKind::Variable { name } if name == "this");
        let single = receiver_ty.len() == 1;
        let parts: Vec<Atomic> = receiver_ty.parts().cloned().collect();

        let mut reported_null = false;
        for part in &parts {
            match part {
                Atomic::Null | Atomic::Void => {
                    if !reported_null {
                        reported_null = true;
                        if single {
                            self.report(
                                IssueKind::NullReference,
                                format!("Cannot write property {} on null", property),
                                span,
                            )?;
                        } else {
                            self.report(
                                IssueKind::PossiblyNullReference,
                                format!(
                                    "Cannot write property {} on possibly null value",
                                    property
                                ),
                                span,
                            )?;
                        }
                    }
                }
                Atomic::Mixed => {
                    self.report(
                        IssueKind::MixedPropertyFetch,
                        format!("Cannot verify property {} on mixed", property),
                        span,
                    )?;
                }
                Atomic::Object => {}
                other => match other.class_name() {
                    Some(class) => {
                        let class = class.to_string();
                        self.assign_property_on_class(
                            &class,
                            property,
                            &ty,
                            receiver_is_this,
                            ctx,
                            span,
                        )?;
                    }
                    None => {
                        self.report(
                            IssueKind::UndefinedProperty,
                            format!("Cannot write property {} on {}", property, other),
                            span,
                        )?;
                    }
                },
            }
        }

        // The path follows the assigned value regardless of the declared
        // property type.
        if let Some(base) = var_path(receiver) {
            ctx.set_var(&format!("{}->{}", base, property), ty);
        }
        Ok(())
    }

    fn assign_property_on_class(
        &mut self,
        class: &str,
        property: &str,
        value: &Union,
        receiver_is_this: bool,
        ctx: &Context,
        span: Span,
    ) -> Result<(), Fatal> {
        let canonical = match self.ensure_class_checked(class, span)? {
            Some(canonical) => canonical,
            None => {
                self.report(
                    IssueKind::UndefinedClass,
                    format!("Class {} does not exist", class),
                    span,
                )?;
                return Ok(());
            }
        };
        let found = self
            .registry
            .property_on(&canonical, property)
            .map(|record| (record.visibility, record.declaring_class.clone(), record.ty.clone()));
        match found {
            Some((visibility, declaring, expected)) => {
                if !self.registry.can_access(
                    visibility,
                    &declaring,
                    ctx.self_class.as_deref(),
                    self.in_mixin,
                ) {
                    self.report(
                        IssueKind::InaccessibleProperty,
                        format!(
                            "Property {}::${} is {} and cannot be written from this scope",
                            declaring,
                            property,
                            visibility_name(visibility)
                        ),
                        span,
                    )?;
                }
                if !self.types_compatible(&expected, value) {
                    self.report(
                        IssueKind::InvalidPropertyAssignment,
                        format!(
                            "Property {}::${} expects {}, got {}",
                            declaring, property, expected, value
                        ),
                        span,
                    )?;
                }
            }
            None => {
                if self.in_mixin && receiver_is_this {
                    return Ok(());
                }
                if canonical == "stdClass" {
                    return Ok(());
                }
                self.report(
                    IssueKind::UndefinedProperty,
                    format!("Property {}::${} is not defined", canonical, property),
                    span,
                )?;
            }
        }
        Ok(())
    }

    // ===== Static properties =====

    pub(crate) fn check_static_property(
        &mut self,
        class: &str,
        property: &str,
        span: Span,
        ctx: &mut Context,
    ) -> Result<Union, Fatal> {
        let canonical = match self.resolve_class_target(class, ctx, span)? {
            Some(canonical) => canonical,
            None => return Ok(Union::mixed()),
        };
        let found = self
            .registry
            .static_property_on(&canonical, property)
            .map(|record| (record.visibility, record.declaring_class.clone(), record.ty.clone()));
        match found {
            Some((visibility, declaring, ty)) => {
                if !self.registry.can_access(
                    visibility,
                    &declaring,
                    ctx.self_class.as_deref(),
                    self.in_mixin,
                ) {
                    self.report(
                        IssueKind::InaccessibleProperty,
                        format!(
                            "Static property {}::${} is {} and cannot be read from this scope",
                            declaring,
                            property,
                            visibility_name(visibility)
                        ),
                        span,
                    )?;
                }
                Ok(ty)
            }
            None => {
                if self.registry.property_on(&canonical, property).is_some() {
                    self.report(
                        IssueKind::InvalidStaticInvocation,
                        format!("Property {}::${} is not static", canonical, property),
                        span,
                    )?;
                } else {
                    self.report(
                        IssueKind::UndefinedProperty,
                        format!("Static property {}::${} is not defined", canonical, property),
                        span,
                    )?;
                }
                Ok(Union::mixed())
            }
        }
    }

    pub(crate) fn assign_static_property(
        &mut self,
        class: &str,
        property: &str,
        ty: Union,
        span: Span,
        ctx: &mut Context,
    ) -> Result<(), Fatal> {
        let canonical = match self.resolve_class_target(class, ctx, span)? {
            Some(canonical) => canonical,
            None => return Ok(()),
        };
        let found = self
            .registry
            .static_property_on(&canonical, property)
            .map(|record| (record.visibility, record.declaring_class.clone(), record.ty.clone()));
        match found {
            Some((visibility, declaring, expected)) => {
                if !self.registry.can_access(
                    visibility,
                    &declaring,
                    ctx.self_class.as_deref(),
                    self.in_mixin,
                ) {
                    self.report(
                        IssueKind::InaccessibleProperty,
                        format!(
                            "Static property {}::${} is {} and cannot be written from this scope",
                            declaring,
                            property,
                            visibility_name(visibility)
                        ),
                        span,
                    )?;
                }
                if !self.types_compatible(&expected, &ty) {
                    self.report(
                        IssueKind::InvalidPropertyAssignment,
                        format!(
                            "Property {}::${} expects {}, got {}",
                            declaring, property, expected, ty
                        ),
                        span,
                    )?;
                }
            }
            None => {
                if self.registry.property_on(&canonical, property).is_some() {
                    self.report(
                        IssueKind::InvalidStaticInvocation,
                        format!("Property {}::${} is not static", canonical, property),
                        span,
                    )?;
                } else {
                    self.report(
                        IssueKind::UndefinedProperty,
                        format!("Static property {}::${} is not defined", canonical, property),
                        span,
                    )?;
                }
            }
        }
        Ok(())
    }

    // ===== Class constants =====

    pub(crate) fn check_class_const(
        &mut self,
        class: &str,
        constant: &str,
        span: Span,
        ctx: &mut Context,
    ) -> Result<Union, Fatal> {
        let canonical = match self.resolve_class_target(class, ctx, span)? {
            Some(canonical) => canonical,
            None => return Ok(Union::mixed()),
        };
        // Foo::class is the class name string.
        if constant == "class" {
            return Ok(Union::string());
        }
        match self.registry.constant_on(&canonical, constant) {
            Some(ty) => Ok(ty.clone()),
            None => {
                self.report(
                    IssueKind::UndefinedConstant,
                    format!("Constant {}::{} is not defined", canonical, constant),
                    span,
                )?;
                Ok(Union::mixed())
            }
        }
    }

    // ===== Array offsets =====

    pub(crate) fn check_array_read(
        &mut self,
        array: &Expr,
        index: Option<&Expr>,
        span: Span,
        ctx: &mut Context,
    ) -> Result<Union, Fatal> {
        // A narrowed path entry ($row['id']) wins over recomputation.
        if let Some(index) = index {
            if let Some(path) = access_path(array, index) {
                if let Some(ty) = ctx.var_type(&path) {
                    return Ok(ty.clone());
                }
            }
        }

        let array_ty = self.check_expr(array, ctx)?;
        let index_ty = match index {
            Some(index) => self.check_expr(index, ctx)?,
            None => {
                self.report(
                    IssueKind::InvalidArrayOffset,
                    "Cannot read an append offset".to_string(),
                    span,
                )?;
                return Ok(Union::mixed());
            }
        };
        let literal_key = index.and_then(literal_index_key);

        let single = array_ty.len() == 1;
        let parts: Vec<Atomic> = array_ty.parts().cloned().collect();
        let mut results: Vec<Atomic> = Vec::new();
        let mut reported_offset = false;
        let mut reported_null = false;
        for part in &parts {
            match part {
                Atomic::Shaped { fields, .. } => match &literal_key {
                    Some(key) => match fields.get(key) {
                        Some(ty) => results.extend(ty.parts().cloned()),
                        None => {
                            if !reported_offset {
                                reported_offset = true;
                                self.report(
                                    IssueKind::InvalidArrayOffset,
                                    format!("Offset '{}' does not exist on {}", key, part),
                                    span,
                                )?;
                            }
                            results.push(Atomic::Mixed);
                        }
                    },
                    None => {
                        // A computed key reads some field of the shape.
                        for ty in fields.values() {
                            results.extend(ty.parts().cloned());
                        }
                    }
                },
                Atomic::Generic { .. } => match part.iterable_params() {
                    Some((key_ty, value_ty)) => {
                        if value_ty.as_single() == Some(&Atomic::Empty) {
                            if !reported_offset {
                                reported_offset = true;
                                self.report(
                                    IssueKind::InvalidArrayOffset,
                                    "Cannot read an offset of an empty array".to_string(),
                                    span,
                                )?;
                            }
                            results.push(Atomic::Mixed);
                        } else {
                            if !key_ty.is_mixed()
                                && !self.types_compatible(&key_ty, &index_ty)
                                && !reported_offset
                            {
                                reported_offset = true;
                                self.report(
                                    IssueKind::InvalidArrayOffset,
                                    format!(
                                        "Offset of type {} does not fit array key {}",
                                        index_ty, key_ty
                                    ),
                                    span,
                                )?;
                            }
                            results.extend(value_ty.parts().cloned());
                        }
                    }
                    None => results.push(Atomic::Mixed),
                },
                Atomic::String => results.push(Atomic::String),
                Atomic::Mixed => results.push(Atomic::Mixed),
                Atomic::Null | Atomic::Void => {
                    if !reported_null {
                        reported_null = true;
                        if single {
                            self.report(
                                IssueKind::NullReference,
                                "Cannot read an array offset on null".to_string(),
                                span,
                            )?;
                        } else {
                            self.report(
                                IssueKind::PossiblyNullReference,
                                "Cannot read an array offset on possibly null value".to_string(),
                                span,
                            )?;
                        }
                    }
                }
                // Objects may implement offset access; stay quiet.
                Atomic::Named(_) | Atomic::Object => results.push(Atomic::Mixed),
                other => {
                    if !reported_offset {
                        reported_offset = true;
                        self.report(
                            IssueKind::InvalidArrayOffset,
                            format!("Cannot access an array offset on {}", other),
                            span,
                        )?;
                    }
                }
            }
        }

        let result = if results.is_empty() {
            Union::mixed()
        } else {
            Union::from_parts(results)
        };
        if let Some(index) = index {
            if let Some(path) = access_path(array, index) {
                ctx.narrow_var(&path, result.clone());
            }
        }
        Ok(result)
    }

    pub(crate) fn assign_array_element(
        &mut self,
        array: &Expr,
        index: Option<&Expr>,
        ty: Union,
        span: Span,
        ctx: &mut Context,
    ) -> Result<(), Fatal> {
        // Writing through an unset variable vivifies a fresh array, and an
        // existing base is read without definedness complaints.
        let base_ty = match &array.kind {
            ExprKind::Variable { name } if !ctx.has_var(&format!("${}", name)) => {
                Union::of(Atomic::Empty)
            }
            _ => {
                let saved = self.caps.check_variables;
                self.caps.check_variables = false;
                let result = self.check_expr(array, ctx);
                self.caps.check_variables = saved;
                result?
            }
        };
        let index_ty = match index {
            Some(index) => Some(self.check_expr(index, ctx)?),
            None => None,
        };
        let literal_key = index.and_then(literal_index_key);

        let mut updated: Vec<Atomic> = Vec::new();
        let mut can_hold = false;
        for part in base_ty.parts() {
            match part {
                Atomic::Generic { name, params } => {
                    can_hold = true;
                    let key_ty = params.first().cloned().unwrap_or_else(Union::mixed);
                    let value_ty = params.get(1).cloned().unwrap_or_else(Union::mixed);
                    let added_key = match (&literal_key, &index_ty) {
                        (Some(key), _) => {
                            if key.parse::<i64>().is_ok() {
                                Union::int()
                            } else {
                                Union::string()
                            }
                        }
                        (None, Some(index_ty)) => index_ty.clone(),
                        (None, None) => Union::int(),
                    };
                    updated.push(Atomic::Generic {
                        name: name.clone(),
                        params: vec![key_ty.combine_with(&added_key), value_ty.combine_with(&ty)],
                    });
                }
                Atomic::Shaped { name, fields } => {
                    can_hold = true;
                    let mut fields = fields.clone();
                    match (&literal_key, index) {
                        (Some(key), _) => {
                            fields.insert(key.clone(), ty.clone());
                            updated.push(Atomic::Shaped {
                                name: name.clone(),
                                fields,
                            });
                        }
                        (None, None) => {
                            // Append takes the next free integer key.
                            let next = fields
                                .keys()
                                .filter_map(|k| k.parse::<i64>().ok())
                                .max()
                                .map_or(0, |max| max + 1);
                            fields.insert(next.to_string(), ty.clone());
                            updated.push(Atomic::Shaped {
                                name: name.clone(),
                                fields,
                            });
                        }
                        (None, Some(_)) => {
                            // A computed key folds the shape into a
                            // container.
                            if let Some((key_ty, value_ty)) = part.iterable_params() {
                                let added_key =
                                    index_ty.clone().unwrap_or_else(Union::mixed);
                                updated.push(Atomic::Generic {
                                    name: "array".to_string(),
                                    params: vec![
                                        key_ty.combine_with(&added_key),
                                        value_ty.combine_with(&ty),
                                    ],
                                });
                            }
                        }
                    }
                }
                Atomic::Null | Atomic::Void | Atomic::Empty => {
                    can_hold = true;
                    match (&literal_key, &index_ty) {
                        (Some(key), _) => {
                            let mut fields = BTreeMap::new();
                            fields.insert(key.clone(), ty.clone());
                            updated.push(Atomic::Shaped {
                                name: "array".to_string(),
                                fields,
                            });
                        }
                        (None, Some(index_ty)) => updated.push(Atomic::Generic {
                            name: "array".to_string(),
                            params: vec![index_ty.clone(), ty.clone()],
                        }),
                        (None, None) => {
                            let mut fields = BTreeMap::new();
                            fields.insert("0".to_string(), ty.clone());
                            updated.push(Atomic::Shaped {
                                name: "array".to_string(),
                                fields,
                            });
                        }
                    }
                }
                Atomic::Mixed => {
                    can_hold = true;
                    updated.push(Atomic::Mixed);
                }
                // String offsets are writable; objects may implement
                // offset access.
                Atomic::String => {
                    can_hold = true;
                    updated.push(Atomic::String);
                }
                Atomic::Named(_) | Atomic::Object => {
                    can_hold = true;
                    updated.push(part.clone());
                }
                other => updated.push(other.clone()),
            }
        }

        if !can_hold {
            self.report(
                IssueKind::InvalidArrayOffset,
                format!("Cannot write an array offset on {}", base_ty),
                span,
            )?;
        } else if let ExprKind::Variable { name } = &array.kind {
            if !updated.is_empty() {
                ctx.narrow_var(&format!("${}", name), Union::from_parts(updated));
            }
        }

        if let Some(index) = index {
            if let Some(path) = access_path(array, index) {
                ctx.set_var(&path, ty);
            }
        }
        Ok(())
    }
}

// ===== Path helpers =====

/// Access path for a base expression and a literal index, matching the
/// reconciler's path syntax.
fn access_path(array: &Expr, index: &Expr) -> Option<String> {
    let base = var_path(array)?;
    match &index.kind {
        ExprKind::Str(key) => Some(format!("{}['{}']", base, key)),
        ExprKind::Int(key) => Some(format!("{}[{}]", base, key)),
        _ => None,
    }
}

/// Shape field name for a literal index expression.
fn literal_index_key(index: &Expr) -> Option<String> {
    match &index.kind {
        ExprKind::Str(key) => Some(key.clone()),
        ExprKind::Int(key) => Some(key.to_string()),
        _ => None,
    }
}
