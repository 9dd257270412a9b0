//! Condition scraping and type reconciliation
//!
//! Turns a condition expression into sets of [`Assertion`]s about variable
//! paths (one set for the branch where the condition held, one for where it
//! failed), and narrows a [`Union`] against a single assertion.
//!
//! Scraping is conservative. A construct it does not understand simply
//! contributes no assertions, which leaves types unchanged in both
//! branches. `&&` is the one asymmetric case: its assertions hold when the
//! whole conjunction is true, but its failure proves nothing about any
//! individual operand, so the false set stays empty.

use std::fmt;

use rustc_hash::FxHashMap;
use skink_ast::{Arg, BinaryOp, Expr, ExprKind, UnaryOp};
use skink_types::{combine_opt, Atomic, Union};

use crate::context::Context;
use crate::registry::Registry;

/// A single narrowing fact about one variable path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assertion {
    Truthy,
    Falsy,
    IsNull,
    NotNull,
    IsClass(String),
    NotClass(String),
    IsArray,
    NotArray,
    IsInt,
    NotInt,
    IsFloat,
    NotFloat,
    IsString,
    NotString,
    IsBool,
    NotBool,
}

impl Assertion {
    pub fn negate(&self) -> Assertion {
        match self {
            Assertion::Truthy => Assertion::Falsy,
            Assertion::Falsy => Assertion::Truthy,
            Assertion::IsNull => Assertion::NotNull,
            Assertion::NotNull => Assertion::IsNull,
            Assertion::IsClass(name) => Assertion::NotClass(name.clone()),
            Assertion::NotClass(name) => Assertion::IsClass(name.clone()),
            Assertion::IsArray => Assertion::NotArray,
            Assertion::NotArray => Assertion::IsArray,
            Assertion::IsInt => Assertion::NotInt,
            Assertion::NotInt => Assertion::IsInt,
            Assertion::IsFloat => Assertion::NotFloat,
            Assertion::NotFloat => Assertion::IsFloat,
            Assertion::IsString => Assertion::NotString,
            Assertion::NotString => Assertion::IsString,
            Assertion::IsBool => Assertion::NotBool,
            Assertion::NotBool => Assertion::IsBool,
        }
    }
}

impl fmt::Display for Assertion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Assertion::Truthy => write!(f, "truthy"),
            Assertion::Falsy => write!(f, "falsy"),
            Assertion::IsNull => write!(f, "null"),
            Assertion::NotNull => write!(f, "!null"),
            Assertion::IsClass(name) => write!(f, "instanceof {}", name),
            Assertion::NotClass(name) => write!(f, "!instanceof {}", name),
            Assertion::IsArray => write!(f, "array"),
            Assertion::NotArray => write!(f, "!array"),
            Assertion::IsInt => write!(f, "int"),
            Assertion::NotInt => write!(f, "!int"),
            Assertion::IsFloat => write!(f, "float"),
            Assertion::NotFloat => write!(f, "!float"),
            Assertion::IsString => write!(f, "string"),
            Assertion::NotString => write!(f, "!string"),
            Assertion::IsBool => write!(f, "bool"),
            Assertion::NotBool => write!(f, "!bool"),
        }
    }
}

/// Assertions scraped from one condition, split by outcome.
#[derive(Debug, Clone, Default)]
pub struct Assertions {
    pub if_true: FxHashMap<String, Vec<Assertion>>,
    pub if_false: FxHashMap<String, Vec<Assertion>>,
}

impl Assertions {
    fn single(path: String, on_true: Assertion, on_false: Assertion) -> Assertions {
        let mut out = Assertions::default();
        out.if_true.insert(path.clone(), vec![on_true]);
        out.if_false.insert(path, vec![on_false]);
        out
    }

    fn truth_only(path: String, on_true: Assertion) -> Assertions {
        let mut out = Assertions::default();
        out.if_true.insert(path, vec![on_true]);
        out
    }

    /// Facts for `!cond`: the outcomes swap.
    pub fn negated(self) -> Assertions {
        Assertions {
            if_true: self.if_false,
            if_false: self.if_true,
        }
    }

    /// Facts for `lhs && rhs`. Truth proves both sides; failure proves
    /// nothing about either.
    fn and(mut self, other: Assertions) -> Assertions {
        for (path, list) in other.if_true {
            self.if_true.entry(path).or_default().extend(list);
        }
        Assertions {
            if_true: self.if_true,
            if_false: FxHashMap::default(),
        }
    }

    /// Facts for `lhs || rhs`. Truth keeps only facts both sides agree on;
    /// failure proves both sides failed.
    fn or(self, other: Assertions) -> Assertions {
        let mut if_true = FxHashMap::default();
        for (path, list) in &self.if_true {
            if other.if_true.get(path) == Some(list) {
                if_true.insert(path.clone(), list.clone());
            }
        }
        let mut if_false = self.if_false;
        for (path, list) in other.if_false {
            if_false.entry(path).or_default().extend(list);
        }
        Assertions { if_true, if_false }
    }

    pub fn is_empty(&self) -> bool {
        self.if_true.is_empty() && self.if_false.is_empty()
    }
}

/// The variable path an expression narrows, if it is one the context can
/// track: `$x`, `$x->prop`, `$x['key']`, `$x[0]`, and chains thereof.
pub fn var_path(expr: &Expr) -> Option<String> {
    match &expr.kind {
        ExprKind::Variable { name } => Some(format!("${}", name)),
        ExprKind::PropertyFetch { receiver, property } => {
            let base = var_path(receiver)?;
            Some(format!("{}->{}", base, property))
        }
        ExprKind::ArrayAccess {
            array,
            index: Some(index),
        } => {
            let base = var_path(array)?;
            match &index.kind {
                ExprKind::Str(key) => Some(format!("{}['{}']", base, key)),
                ExprKind::Int(key) => Some(format!("{}[{}]", base, key)),
                _ => None,
            }
        }
        _ => None,
    }
}

/// Extracts the assertions a condition makes about variable paths.
pub fn scrape_assertions(expr: &Expr) -> Assertions {
    match &expr.kind {
        ExprKind::Unary {
            op: UnaryOp::Not,
            operand,
        } => scrape_assertions(operand).negated(),
        ExprKind::Binary { op, lhs, rhs } => match op {
            BinaryOp::And => scrape_assertions(lhs).and(scrape_assertions(rhs)),
            BinaryOp::Or => scrape_assertions(lhs).or(scrape_assertions(rhs)),
            BinaryOp::Identical => identical_assertions(lhs, rhs),
            BinaryOp::NotIdentical => identical_assertions(lhs, rhs).negated(),
            BinaryOp::Equal => loose_assertions(lhs, rhs),
            BinaryOp::NotEqual => loose_assertions(lhs, rhs).negated(),
            _ => Assertions::default(),
        },
        ExprKind::Instanceof { operand, class } => match var_path(operand) {
            Some(path) => Assertions::single(
                path,
                Assertion::IsClass(class.clone()),
                Assertion::NotClass(class.clone()),
            ),
            None => Assertions::default(),
        },
        ExprKind::Isset { targets } => {
            let mut out = Assertions::default();
            for target in targets {
                if let Some(path) = var_path(target) {
                    out.if_true
                        .entry(path.clone())
                        .or_default()
                        .push(Assertion::NotNull);
                    // A failed isset() of several targets does not tell
                    // which one was unset.
                    if targets.len() == 1 {
                        out.if_false.entry(path).or_default().push(Assertion::IsNull);
                    }
                }
            }
            out
        }
        ExprKind::Empty { operand } => match var_path(operand) {
            Some(path) => Assertions::single(path, Assertion::Falsy, Assertion::Truthy),
            None => Assertions::default(),
        },
        ExprKind::FunctionCall { name, args } => predicate_assertions(name, args),
        ExprKind::Assign { target, .. } => match var_path(target) {
            Some(path) => Assertions::single(path, Assertion::Truthy, Assertion::Falsy),
            None => Assertions::default(),
        },
        _ => match var_path(expr) {
            Some(path) => Assertions::single(path, Assertion::Truthy, Assertion::Falsy),
            None => Assertions::default(),
        },
    }
}

pub(crate) fn identical_assertions(lhs: &Expr, rhs: &Expr) -> Assertions {
    let (literal, other) = if lhs.is_literal() {
        (lhs, rhs)
    } else if rhs.is_literal() {
        (rhs, lhs)
    } else {
        return Assertions::default();
    };
    let Some(path) = var_path(other) else {
        return Assertions::default();
    };
    match &literal.kind {
        ExprKind::Null => Assertions::single(path, Assertion::IsNull, Assertion::NotNull),
        ExprKind::Bool(true) => Assertions::single(path, Assertion::Truthy, Assertion::Falsy),
        ExprKind::Bool(false) => Assertions::single(path, Assertion::Falsy, Assertion::Truthy),
        // Matching one specific value pins the kind; failing to match
        // proves nothing.
        ExprKind::Str(_) => Assertions::truth_only(path, Assertion::IsString),
        ExprKind::Int(_) => Assertions::truth_only(path, Assertion::IsInt),
        ExprKind::Float(_) => Assertions::truth_only(path, Assertion::IsFloat),
        _ => Assertions::default(),
    }
}

fn loose_assertions(lhs: &Expr, rhs: &Expr) -> Assertions {
    let (literal, other) = if lhs.is_literal() {
        (lhs, rhs)
    } else if rhs.is_literal() {
        (rhs, lhs)
    } else {
        return Assertions::default();
    };
    let Some(path) = var_path(other) else {
        return Assertions::default();
    };
    match &literal.kind {
        // Loose comparison against null/false/true is a truthiness test.
        ExprKind::Null | ExprKind::Bool(false) => {
            Assertions::single(path, Assertion::Falsy, Assertion::Truthy)
        }
        ExprKind::Bool(true) => Assertions::single(path, Assertion::Truthy, Assertion::Falsy),
        _ => Assertions::default(),
    }
}

fn predicate_assertions(name: &str, args: &[Arg]) -> Assertions {
    if args.len() != 1 || args[0].spread {
        return Assertions::default();
    }
    let Some(path) = var_path(&args[0].value) else {
        return Assertions::default();
    };
    let (on_true, on_false) = match name {
        "is_int" | "is_integer" => (Assertion::IsInt, Assertion::NotInt),
        "is_float" => (Assertion::IsFloat, Assertion::NotFloat),
        "is_string" => (Assertion::IsString, Assertion::NotString),
        "is_bool" => (Assertion::IsBool, Assertion::NotBool),
        "is_array" => (Assertion::IsArray, Assertion::NotArray),
        "is_null" => (Assertion::IsNull, Assertion::NotNull),
        _ => return Assertions::default(),
    };
    Assertions::single(path, on_true, on_false)
}

// ===== Reconciliation =====

/// Outcome of narrowing one union against one assertion.
#[derive(Debug, Clone)]
pub struct Reconciled {
    pub ty: Union,
    /// The assertion contradicts the existing type. `ty` still carries the
    /// best recovery type so checking can continue.
    pub failed: bool,
}

fn ok(ty: Union) -> Reconciled {
    Reconciled { ty, failed: false }
}

fn contradiction(ty: Union) -> Reconciled {
    Reconciled { ty, failed: true }
}

fn narrowed(parts: Vec<Atomic>, fallback: Union) -> Reconciled {
    match combine_opt(parts) {
        Some(ty) => ok(ty),
        None => contradiction(fallback),
    }
}

/// Narrows `existing` under `assertion`. The registry supplies the class
/// hierarchy for `instanceof` reasoning.
pub fn reconcile(existing: &Union, assertion: &Assertion, registry: &Registry) -> Reconciled {
    match assertion {
        Assertion::Truthy => {
            let parts = existing
                .parts()
                .filter(|p| !matches!(p, Atomic::Null | Atomic::False | Atomic::Void))
                .cloned()
                .map(|p| if p == Atomic::Bool { Atomic::True } else { p })
                .collect();
            narrowed(parts, Union::mixed())
        }
        Assertion::Falsy => {
            let parts = existing
                .parts()
                .filter(|p| !always_truthy(p))
                .cloned()
                .map(|p| if p == Atomic::Bool { Atomic::False } else { p })
                .collect();
            narrowed(parts, Union::mixed())
        }
        Assertion::IsNull => {
            if existing.is_mixed() || existing.has_null() || existing.has_void() {
                ok(Union::null())
            } else {
                contradiction(Union::null())
            }
        }
        Assertion::NotNull => {
            let parts = existing
                .parts()
                .filter(|p| !matches!(p, Atomic::Null | Atomic::Void))
                .cloned()
                .collect();
            narrowed(parts, Union::mixed())
        }
        Assertion::IsClass(class) => reconcile_is_class(existing, class, registry),
        Assertion::NotClass(class) => {
            let parts = existing
                .parts()
                .filter(|p| match p.class_name() {
                    Some(name) => name != class && !registry.is_ancestor(class, name),
                    None => true,
                })
                .cloned()
                .collect();
            narrowed(parts, Union::mixed())
        }
        Assertion::IsArray => {
            if existing.is_mixed() {
                return ok(Union::array(Union::mixed(), Union::mixed()));
            }
            let parts: Vec<Atomic> = existing
                .parts()
                .filter(|p| p.is_array_like() || **p == Atomic::Empty)
                .cloned()
                .collect();
            narrowed(parts, Union::array(Union::mixed(), Union::mixed()))
        }
        Assertion::NotArray => {
            let parts = existing
                .parts()
                .filter(|p| !p.is_array_like() && **p != Atomic::Empty)
                .cloned()
                .collect();
            narrowed(parts, Union::mixed())
        }
        Assertion::IsInt => select_scalar(existing, &[Atomic::Int], Union::int()),
        Assertion::NotInt => drop_kind(existing, &[Atomic::Int]),
        Assertion::IsFloat => select_scalar(existing, &[Atomic::Float], Union::float()),
        Assertion::NotFloat => drop_kind(existing, &[Atomic::Float]),
        Assertion::IsString => select_scalar(existing, &[Atomic::String], Union::string()),
        Assertion::NotString => drop_kind(existing, &[Atomic::String]),
        Assertion::IsBool => select_scalar(
            existing,
            &[Atomic::Bool, Atomic::True, Atomic::False],
            Union::bool(),
        ),
        Assertion::NotBool => drop_kind(existing, &[Atomic::Bool, Atomic::True, Atomic::False]),
    }
}

fn always_truthy(part: &Atomic) -> bool {
    if part.is_always_truthy() {
        return true;
    }
    // A shape with known fields has elements, so it cannot be falsy.
    matches!(part, Atomic::Shaped { fields, .. } if !fields.is_empty())
}

fn reconcile_is_class(existing: &Union, class: &str, registry: &Registry) -> Reconciled {
    // Parts already at or below the asserted class survive unchanged, so
    // a subclass stays narrowed to itself.
    let kept: Vec<Atomic> = existing
        .parts()
        .filter(|p| match p.class_name() {
            Some(name) => name == class || registry.is_ancestor(class, name),
            None => false,
        })
        .cloned()
        .collect();
    if !kept.is_empty() {
        return narrowed(kept, Union::named(class));
    }
    let downcastable = existing.parts().any(|p| {
        matches!(p, Atomic::Mixed | Atomic::Object) || p.class_name().is_some()
    });
    if downcastable {
        ok(Union::named(class))
    } else {
        contradiction(Union::named(class))
    }
}

fn select_scalar(existing: &Union, wanted: &[Atomic], result: Union) -> Reconciled {
    if existing.is_mixed() {
        return ok(result);
    }
    let kept: Vec<Atomic> = existing
        .parts()
        .filter(|p| wanted.contains(*p))
        .cloned()
        .collect();
    if !kept.is_empty() {
        return narrowed(kept, result);
    }
    if existing.contains("scalar") {
        return ok(result);
    }
    contradiction(result)
}

fn drop_kind(existing: &Union, unwanted: &[Atomic]) -> Reconciled {
    let parts = existing
        .parts()
        .filter(|p| !unwanted.contains(*p))
        .cloned()
        .collect();
    narrowed(parts, Union::mixed())
}

// ===== Application =====

/// What applying a set of assertions found, for the caller to report.
#[derive(Debug, Default)]
pub struct AppliedOutcome {
    /// Assertions already implied by clauses in force.
    pub redundant: Vec<(String, Assertion)>,
    /// Assertions that contradicted the variable's type, with the type it
    /// held at that point.
    pub failed: Vec<(String, Assertion, Union)>,
}

/// Applies one outcome's assertion set to a context, narrowing variables
/// in place. Paths the context does not track are skipped.
pub fn apply_assertions(
    ctx: &mut Context,
    assertions: &FxHashMap<String, Vec<Assertion>>,
    registry: &Registry,
) -> AppliedOutcome {
    let mut outcome = AppliedOutcome::default();
    let mut paths: Vec<&String> = assertions.keys().collect();
    paths.sort();
    for path in paths {
        for assertion in &assertions[path] {
            let Some(existing) = ctx.var_type(path) else {
                continue;
            };
            if ctx.implies(path, assertion) {
                outcome.redundant.push((path.clone(), assertion.clone()));
                continue;
            }
            let existing = existing.clone();
            let result = reconcile(&existing, assertion, registry);
            if result.failed {
                outcome
                    .failed
                    .push((path.clone(), assertion.clone(), existing));
            }
            ctx.narrow_var(path, result.ty);
            ctx.add_clause(path, assertion.clone());
        }
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use skink_ast::AstBuilder;

    #[test]
    fn test_negate_roundtrip() {
        let all = [
            Assertion::Truthy,
            Assertion::IsNull,
            Assertion::IsClass("Foo".to_string()),
            Assertion::IsArray,
            Assertion::IsInt,
            Assertion::IsBool,
        ];
        for a in all {
            assert_eq!(a.negate().negate(), a);
        }
    }

    #[test]
    fn test_scrape_identical_null() {
        let mut b = AstBuilder::new();
        let x = b.var("x");
        let null = b.null();
        let cond = b.identical(x, null);

        let assertions = scrape_assertions(&cond);
        assert_eq!(assertions.if_true["$x"], vec![Assertion::IsNull]);
        assert_eq!(assertions.if_false["$x"], vec![Assertion::NotNull]);
    }

    #[test]
    fn test_scrape_not_swaps_outcomes() {
        let mut b = AstBuilder::new();
        let x = b.var("x");
        let null = b.null();
        let eq = b.identical(x, null);
        let cond = b.not(eq);

        let assertions = scrape_assertions(&cond);
        assert_eq!(assertions.if_true["$x"], vec![Assertion::NotNull]);
        assert_eq!(assertions.if_false["$x"], vec![Assertion::IsNull]);
    }

    #[test]
    fn test_scrape_and_concats_truths_only() {
        let mut b = AstBuilder::new();
        let x = b.var("x");
        let null = b.null();
        let lhs = b.not_identical(x, null);
        let y = b.var("y");
        let cond = b.and(lhs, y);

        let assertions = scrape_assertions(&cond);
        assert_eq!(assertions.if_true["$x"], vec![Assertion::NotNull]);
        assert_eq!(assertions.if_true["$y"], vec![Assertion::Truthy]);
        // Failure of a conjunction proves nothing about its operands.
        assert!(assertions.if_false.is_empty());
    }

    #[test]
    fn test_scrape_or_intersects_truths() {
        let mut b = AstBuilder::new();
        let x1 = b.var("x");
        let n1 = b.null();
        let lhs = b.identical(x1, n1);
        let y = b.var("y");
        let n2 = b.null();
        let rhs = b.identical(y, n2);
        let cond = b.or(lhs, rhs);

        let assertions = scrape_assertions(&cond);
        assert!(assertions.if_true.is_empty());
        assert_eq!(assertions.if_false["$x"], vec![Assertion::NotNull]);
        assert_eq!(assertions.if_false["$y"], vec![Assertion::NotNull]);
    }

    #[test]
    fn test_scrape_property_path() {
        let mut b = AstBuilder::new();
        let this = b.var("this");
        let prop = b.prop_fetch(this, "name");
        let cond = b.isset(vec![prop]);

        let assertions = scrape_assertions(&cond);
        assert_eq!(assertions.if_true["$this->name"], vec![Assertion::NotNull]);
        assert_eq!(assertions.if_false["$this->name"], vec![Assertion::IsNull]);
    }

    #[test]
    fn test_reconcile_truthy_strips_null_and_false() {
        let registry = Registry::new();
        let existing = Union::from_parts(vec![
            Atomic::Named("SomeClass".to_string()),
            Atomic::Null,
            Atomic::False,
        ]);
        let result = reconcile(&existing, &Assertion::Truthy, &registry);
        assert!(!result.failed);
        assert_eq!(result.ty.to_string(), "SomeClass");
    }

    #[test]
    fn test_reconcile_falsy_bool_becomes_false() {
        let registry = Registry::new();
        let result = reconcile(&Union::bool(), &Assertion::Falsy, &registry);
        assert!(!result.failed);
        assert_eq!(result.ty.to_string(), "false");
    }

    #[test]
    fn test_reconcile_not_null() {
        let registry = Registry::new();
        let result = reconcile(&Union::int().nullable(), &Assertion::NotNull, &registry);
        assert!(!result.failed);
        assert_eq!(result.ty.to_string(), "int");
    }

    #[test]
    fn test_reconcile_is_null_contradiction() {
        let registry = Registry::new();
        let result = reconcile(&Union::int(), &Assertion::IsNull, &registry);
        assert!(result.failed);
        assert_eq!(result.ty.to_string(), "null");
    }

    #[test]
    fn test_reconcile_instanceof_keeps_subclass() {
        use crate::registry::ClassRecord;
        use skink_ast::ClassKind;

        let mut registry = Registry::new();
        registry.commit_class(ClassRecord::new("Base", ClassKind::Class), vec![]);
        let mut child = ClassRecord::new("Child", ClassKind::Class);
        child.parent = Some("Base".to_string());
        registry.commit_class(child, vec![]);

        let existing = Union::named("Child").nullable();
        let result = reconcile(&existing, &Assertion::IsClass("Base".to_string()), &registry);
        assert!(!result.failed);
        assert_eq!(result.ty.to_string(), "Child");
    }

    #[test]
    fn test_reconcile_instanceof_on_scalar_fails() {
        let registry = Registry::new();
        let result = reconcile(
            &Union::int(),
            &Assertion::IsClass("Foo".to_string()),
            &registry,
        );
        assert!(result.failed);
        assert_eq!(result.ty.to_string(), "Foo");
    }

    #[test]
    fn test_reconcile_is_array_on_mixed() {
        let registry = Registry::new();
        let result = reconcile(&Union::mixed(), &Assertion::IsArray, &registry);
        assert!(!result.failed);
        assert_eq!(result.ty.to_string(), "array<mixed, mixed>");
    }

    #[test]
    fn test_reconcile_is_int_refines_scalar() {
        let registry = Registry::new();
        let result = reconcile(&Union::of(Atomic::Scalar), &Assertion::IsInt, &registry);
        assert!(!result.failed);
        assert_eq!(result.ty.to_string(), "int");
    }

    #[test]
    fn test_apply_reports_redundant_and_failed() {
        let registry = Registry::new();
        let mut ctx = Context::new();
        ctx.set_var("$x", Union::int().nullable());
        ctx.set_var("$y", Union::string());

        let mut assertions: FxHashMap<String, Vec<Assertion>> = FxHashMap::default();
        assertions.insert(
            "$x".to_string(),
            vec![Assertion::NotNull, Assertion::NotNull],
        );
        assertions.insert("$y".to_string(), vec![Assertion::IsNull]);
        assertions.insert("$unknown".to_string(), vec![Assertion::Truthy]);

        let outcome = apply_assertions(&mut ctx, &assertions, &registry);
        assert_eq!(ctx.var_type("$x").unwrap().to_string(), "int");
        assert_eq!(outcome.redundant.len(), 1);
        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(outcome.failed[0].0, "$y");
        // The failed path recovers to the asserted type.
        assert_eq!(ctx.var_type("$y").unwrap().to_string(), "null");
    }
}
