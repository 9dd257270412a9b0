//! Union combination
//!
//! Merges atomic parts into a canonical [`Union`]. The rules:
//!
//! - `mixed` absorbs everything
//! - `void` folds into `null` when combined with anything else
//! - `true`/`false` fold into `bool` when `bool` is present, and
//!   `true|false` collapses to `bool`
//! - `scalar` absorbs `int`/`float`/`string`/`bool`
//! - same-name generics merge their parameters pairwise (right-aligned so
//!   value-only containers line up with key/value ones)
//! - the `empty` placeholder yields to any concrete part
//! - same-name shapes merge per key; a shape folds into a same-name
//!   generic
//!
//! The result is independent of input order.

use std::collections::BTreeMap;

use crate::atomic::Atomic;
use crate::union::Union;

/// Combines parts into a union; an empty input degrades to `mixed`.
pub fn combine(parts: Vec<Atomic>) -> Union {
    combine_opt(parts).unwrap_or_else(Union::mixed)
}

/// Combines parts into a union, or `None` when nothing was contributed.
pub fn combine_opt(input: Vec<Atomic>) -> Option<Union> {
    let mut scalars: BTreeMap<String, Atomic> = BTreeMap::new();
    let mut generics: BTreeMap<String, Vec<Union>> = BTreeMap::new();
    let mut shapes: BTreeMap<String, BTreeMap<String, Union>> = BTreeMap::new();
    let mut saw_void = false;
    let mut saw_any = false;

    for part in input {
        saw_any = true;
        match part {
            Atomic::Mixed => return Some(Union::of(Atomic::Mixed)),
            Atomic::Void => saw_void = true,
            Atomic::Generic { name, params } => match generics.remove(&name) {
                Some(existing) => {
                    let merged = merge_params(&existing, &params);
                    generics.insert(name, merged);
                }
                None => {
                    generics.insert(name, params);
                }
            },
            Atomic::Shaped { name, fields } => {
                let entry = shapes.entry(name).or_default();
                for (key, ty) in fields {
                    match entry.remove(&key) {
                        Some(existing) => {
                            entry.insert(key, existing.combine_with(&ty));
                        }
                        None => {
                            entry.insert(key, ty);
                        }
                    }
                }
            }
            other => {
                scalars.insert(other.key(), other);
            }
        }
    }

    if !saw_any {
        return None;
    }

    // empty yields to any concrete part
    let concrete_present =
        scalars.len() > 1 || !generics.is_empty() || !shapes.is_empty() || saw_void;
    if concrete_present {
        scalars.remove("empty");
    }

    // void folds into null when anything else is present
    if saw_void {
        if scalars.is_empty() && generics.is_empty() && shapes.is_empty() {
            scalars.insert("void".to_string(), Atomic::Void);
        } else {
            scalars.insert("null".to_string(), Atomic::Null);
        }
    }

    // true/false fold into bool
    if scalars.contains_key("bool") {
        scalars.remove("true");
        scalars.remove("false");
    } else if scalars.contains_key("true") && scalars.contains_key("false") {
        scalars.remove("true");
        scalars.remove("false");
        scalars.insert("bool".to_string(), Atomic::Bool);
    }

    // scalar absorbs the concrete scalar kinds
    if scalars.contains_key("scalar") {
        for key in ["int", "float", "string", "bool", "true", "false"] {
            scalars.remove(key);
        }
    }

    // a shape folds into a same-name generic
    let shape_names: Vec<String> = shapes.keys().cloned().collect();
    for name in shape_names {
        if let Some(params) = generics.remove(&name) {
            let fields = shapes.remove(&name).unwrap_or_default();
            let folded = merge_params(&params, &shape_params(&fields));
            generics.insert(name, folded);
        }
    }

    let mut out = scalars;
    for (name, params) in generics {
        let part = Atomic::Generic { name, params };
        out.insert(part.key(), part);
    }
    for (name, fields) in shapes {
        let part = Atomic::Shaped { name, fields };
        out.insert(part.key(), part);
    }
    Union::from_map(out)
}

/// Pairwise parameter merge, aligned from the right so that the value
/// parameter of `array<V>` lines up with the value of `array<K, V>`.
fn merge_params(a: &[Union], b: &[Union]) -> Vec<Union> {
    let n = a.len().max(b.len());
    let mut out = Vec::with_capacity(n);
    for i in 0..n {
        let pa = (a.len() + i).checked_sub(n).and_then(|j| a.get(j));
        let pb = (b.len() + i).checked_sub(n).and_then(|j| b.get(j));
        let merged = match (pa, pb) {
            (Some(x), Some(y)) => x.combine_with(y),
            (Some(x), None) => x.clone(),
            (None, Some(y)) => y.clone(),
            (None, None) => Union::mixed(),
        };
        out.push(merged);
    }
    out
}

/// Key/value parameter pair equivalent to a shape's fields.
fn shape_params(fields: &BTreeMap<String, Union>) -> Vec<Union> {
    if fields.is_empty() {
        return vec![Union::of(Atomic::Empty), Union::of(Atomic::Empty)];
    }
    let mut key_parts = Vec::new();
    for key in fields.keys() {
        if key.parse::<i64>().is_ok() {
            key_parts.push(Atomic::Int);
        } else {
            key_parts.push(Atomic::String);
        }
    }
    let value_parts: Vec<Atomic> = fields.values().flat_map(|u| u.parts().cloned()).collect();
    vec![combine(key_parts), combine(value_parts)]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(n: &str) -> Atomic {
        Atomic::Named(n.to_string())
    }

    fn array2(key: Union, value: Union) -> Atomic {
        Atomic::Generic {
            name: "array".to_string(),
            params: vec![key, value],
        }
    }

    #[test]
    fn test_combine_is_order_independent() {
        let a = vec![Atomic::Int, named("Foo"), Atomic::Null];
        let b = vec![Atomic::Null, Atomic::Int, named("Foo")];
        let c = vec![named("Foo"), Atomic::Null, Atomic::Int];
        let ua = combine(a).to_string();
        let ub = combine(b).to_string();
        let uc = combine(c).to_string();
        assert_eq!(ua, ub);
        assert_eq!(ub, uc);
        assert_eq!(ua, "Foo|int|null");
    }

    #[test]
    fn test_nested_combine_matches_flat() {
        let ab = combine(vec![Atomic::Int, Atomic::String]);
        let abc = ab.combine_atomic(Atomic::Null);
        let flat = combine(vec![Atomic::Null, Atomic::String, Atomic::Int]);
        assert_eq!(abc, flat);
    }

    #[test]
    fn test_mixed_absorbs() {
        let u = combine(vec![Atomic::Int, Atomic::Mixed, named("Foo")]);
        assert!(u.is_mixed());
    }

    #[test]
    fn test_void_folds_into_null() {
        let u = combine(vec![Atomic::Void, Atomic::Int]);
        assert_eq!(u.to_string(), "int|null");
        let alone = combine(vec![Atomic::Void]);
        assert_eq!(alone.to_string(), "void");
    }

    #[test]
    fn test_false_folds_into_bool() {
        let u = combine(vec![Atomic::False, Atomic::Bool]);
        assert_eq!(u.to_string(), "bool");
        let tf = combine(vec![Atomic::True, Atomic::False]);
        assert_eq!(tf.to_string(), "bool");
        let f = combine(vec![Atomic::False, Atomic::Null]);
        assert_eq!(f.to_string(), "false|null");
    }

    #[test]
    fn test_scalar_absorbs_concrete_scalars() {
        let u = combine(vec![Atomic::Scalar, Atomic::Int, Atomic::String, named("Foo")]);
        assert_eq!(u.to_string(), "Foo|scalar");
    }

    #[test]
    fn test_same_name_generics_merge_params() {
        let a = Atomic::Generic {
            name: "array".to_string(),
            params: vec![Union::int()],
        };
        let b = Atomic::Generic {
            name: "array".to_string(),
            params: vec![Union::string()],
        };
        let u = combine(vec![a, b]);
        assert_eq!(u.to_string(), "array<int|string>");
    }

    #[test]
    fn test_value_only_aligns_with_key_value() {
        let a = Atomic::Generic {
            name: "array".to_string(),
            params: vec![Union::bool()],
        };
        let b = array2(Union::string(), Union::int());
        let u = combine(vec![a, b]);
        assert_eq!(u.to_string(), "array<string, bool|int>");
    }

    #[test]
    fn test_empty_container_yields() {
        let empty = array2(Union::of(Atomic::Empty), Union::of(Atomic::Empty));
        let concrete = array2(Union::int(), Union::string());
        let u = combine(vec![empty, concrete]);
        assert_eq!(u.to_string(), "array<int, string>");
    }

    #[test]
    fn test_shapes_merge_per_key() {
        let mut f1 = BTreeMap::new();
        f1.insert("id".to_string(), Union::int());
        let mut f2 = BTreeMap::new();
        f2.insert("id".to_string(), Union::string());
        f2.insert("name".to_string(), Union::string());
        let u = combine(vec![
            Atomic::Shaped {
                name: "array".to_string(),
                fields: f1,
            },
            Atomic::Shaped {
                name: "array".to_string(),
                fields: f2,
            },
        ]);
        assert_eq!(u.to_string(), "array{id: int|string, name: string}");
    }

    #[test]
    fn test_shape_folds_into_generic() {
        let mut fields = BTreeMap::new();
        fields.insert("a".to_string(), Union::int());
        let shape = Atomic::Shaped {
            name: "array".to_string(),
            fields,
        };
        let gen = array2(Union::string(), Union::float());
        let u = combine(vec![shape, gen]);
        assert_eq!(u.to_string(), "array<string, float|int>");
    }

    #[test]
    fn test_empty_input_degrades_to_mixed() {
        assert!(combine(Vec::new()).is_mixed());
        assert!(combine_opt(Vec::new()).is_none());
    }
}
