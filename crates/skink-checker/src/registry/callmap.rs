//! Builtin function call map
//!
//! Signatures for the builtin functions the checker understands, keyed by
//! name. Entries whose return type depends on the arguments carry a
//! [`SpecialCase`] tag; the checker computes those returns itself and uses
//! the entry's return type as the fallback.

use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;
use skink_types::{Atomic, Union};

use super::ParamRecord;

/// Signature of one builtin function.
pub struct CallMapEntry {
    pub params: Vec<ParamRecord>,
    pub return_type: Union,
    pub special: Option<SpecialCase>,
}

/// Builtins whose return type is derived from the call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialCase {
    /// `array_map`: keys kept, values from the callback's return.
    MapValues,
    /// `array_filter`: element type kept, `null`/`false` stripped
    /// when no callback is given.
    FilterValues,
    /// `array_merge`: combination of all argument types.
    MergeArrays,
    /// `array_diff`: type of the first argument.
    DiffArrays,
    /// `array_keys`: list of the key type.
    ArrayKeys,
    /// `array_values`: list of the value type.
    ArrayValues,
}

pub fn call_map_entry(name: &str) -> Option<&'static CallMapEntry> {
    CALL_MAP.get(name)
}

fn req(name: &str, ty: Union) -> ParamRecord {
    ParamRecord {
        name: name.to_string(),
        ty: Some(ty),
        by_ref: false,
        optional: false,
        variadic: false,
    }
}

fn opt(name: &str, ty: Union) -> ParamRecord {
    ParamRecord {
        name: name.to_string(),
        ty: Some(ty),
        by_ref: false,
        optional: true,
        variadic: false,
    }
}

fn rest(name: &str, ty: Union) -> ParamRecord {
    ParamRecord {
        name: name.to_string(),
        ty: Some(ty),
        by_ref: false,
        optional: true,
        variadic: true,
    }
}

fn out(name: &str, ty: Union) -> ParamRecord {
    ParamRecord {
        name: name.to_string(),
        ty: Some(ty),
        by_ref: true,
        optional: true,
        variadic: false,
    }
}

fn any_array() -> Union {
    Union::array(Union::mixed(), Union::mixed())
}

fn int_or_string() -> Union {
    Union::from_parts(vec![Atomic::Int, Atomic::String])
}

fn int_or_float() -> Union {
    Union::from_parts(vec![Atomic::Int, Atomic::Float])
}

fn string_or_false() -> Union {
    Union::from_parts(vec![Atomic::String, Atomic::False])
}

static CALL_MAP: Lazy<FxHashMap<&'static str, CallMapEntry>> = Lazy::new(|| {
    let mut map = FxHashMap::default();
    let mut add = |name: &'static str, params: Vec<ParamRecord>, return_type: Union| {
        map.insert(
            name,
            CallMapEntry {
                params,
                return_type,
                special: None,
            },
        );
    };

    // ===== Arrays =====
    add("count", vec![req("value", any_array())], Union::int());
    add(
        "in_array",
        vec![
            req("needle", Union::mixed()),
            req("haystack", any_array()),
            opt("strict", Union::bool()),
        ],
        Union::bool(),
    );
    add(
        "array_key_exists",
        vec![req("key", int_or_string()), req("array", any_array())],
        Union::bool(),
    );
    add(
        "array_push",
        vec![out("array", any_array()), rest("values", Union::mixed())],
        Union::int(),
    );
    add(
        "implode",
        vec![req("separator", Union::string()), req("array", any_array())],
        Union::string(),
    );
    add(
        "explode",
        vec![
            req("separator", Union::string()),
            req("string", Union::string()),
            opt("limit", Union::int()),
        ],
        Union::array(Union::int(), Union::string()),
    );

    // ===== Strings =====
    add("strlen", vec![req("string", Union::string())], Union::int());
    add(
        "str_replace",
        vec![
            req("search", Union::mixed()),
            req("replace", Union::mixed()),
            req("subject", Union::mixed()),
        ],
        Union::string(),
    );
    add(
        "sprintf",
        vec![req("format", Union::string()), rest("values", Union::mixed())],
        Union::string(),
    );
    add(
        "trim",
        vec![req("string", Union::string()), opt("characters", Union::string())],
        Union::string(),
    );
    add("strtolower", vec![req("string", Union::string())], Union::string());
    add("strtoupper", vec![req("string", Union::string())], Union::string());
    add(
        "substr",
        vec![
            req("string", Union::string()),
            req("offset", Union::int()),
            opt("length", Union::int()),
        ],
        Union::string(),
    );
    add(
        "strpos",
        vec![
            req("haystack", Union::string()),
            req("needle", Union::string()),
            opt("offset", Union::int()),
        ],
        Union::from_parts(vec![Atomic::Int, Atomic::False]),
    );

    // ===== Conversions and math =====
    add("intval", vec![req("value", Union::mixed())], Union::int());
    add("strval", vec![req("value", Union::mixed())], Union::string());
    add("floatval", vec![req("value", Union::mixed())], Union::float());
    add("floor", vec![req("num", int_or_float())], Union::float());
    add("ceil", vec![req("num", int_or_float())], Union::float());
    add("abs", vec![req("num", int_or_float())], int_or_float());
    add(
        "round",
        vec![req("num", int_or_float()), opt("precision", Union::int())],
        Union::float(),
    );
    add("max", vec![req("value", Union::mixed()), rest("values", Union::mixed())], Union::mixed());
    add("min", vec![req("value", Union::mixed()), rest("values", Union::mixed())], Union::mixed());

    // ===== Type predicates =====
    for name in [
        "is_int",
        "is_integer",
        "is_string",
        "is_float",
        "is_bool",
        "is_array",
        "is_null",
        "is_callable",
        "is_object",
        "is_numeric",
    ] {
        add(name, vec![req("value", Union::mixed())], Union::bool());
    }

    // ===== Reflection-flavored =====
    add(
        "method_exists",
        vec![req("object_or_class", Union::mixed()), req("method", Union::string())],
        Union::bool(),
    );
    add(
        "function_exists",
        vec![req("function", Union::string())],
        Union::bool(),
    );
    add("extract", vec![req("array", any_array())], Union::int());
    add("get_class", vec![req("object", Union::mixed())], Union::string());
    add("gettype", vec![req("value", Union::mixed())], Union::string());

    // ===== Output and process =====
    add("var_dump", vec![req("value", Union::mixed()), rest("values", Union::mixed())], Union::void());
    add(
        "print_r",
        vec![req("value", Union::mixed()), opt("return", Union::bool())],
        Union::from_parts(vec![Atomic::String, Atomic::Bool]),
    );
    add(
        "var_export",
        vec![req("value", Union::mixed()), opt("return", Union::bool())],
        Union::string().nullable(),
    );
    add(
        "shell_exec",
        vec![req("command", Union::string())],
        Union::string().nullable(),
    );
    add(
        "exec",
        vec![
            req("command", Union::string()),
            out("output", any_array()),
            out("result_code", Union::int()),
        ],
        string_or_false(),
    );
    add(
        "system",
        vec![req("command", Union::string()), out("result_code", Union::int())],
        string_or_false(),
    );
    add(
        "passthru",
        vec![req("command", Union::string()), out("result_code", Union::int())],
        Union::from_parts(vec![Atomic::Null, Atomic::False]),
    );

    // Entries whose returns the checker derives from the call site.
    let mut special = |name: &'static str,
                       params: Vec<ParamRecord>,
                       return_type: Union,
                       case: SpecialCase| {
        map.insert(
            name,
            CallMapEntry {
                params,
                return_type,
                special: Some(case),
            },
        );
    };
    special(
        "array_map",
        vec![req("callback", Union::of(Atomic::Callable)), req("array", any_array())],
        any_array(),
        SpecialCase::MapValues,
    );
    special(
        "array_filter",
        vec![req("array", any_array()), opt("callback", Union::of(Atomic::Callable))],
        any_array(),
        SpecialCase::FilterValues,
    );
    special(
        "array_merge",
        vec![req("array", any_array()), rest("arrays", any_array())],
        any_array(),
        SpecialCase::MergeArrays,
    );
    special(
        "array_diff",
        vec![req("array", any_array()), rest("excludes", any_array())],
        any_array(),
        SpecialCase::DiffArrays,
    );
    special(
        "array_keys",
        vec![req("array", any_array())],
        Union::array(Union::int(), Union::mixed()),
        SpecialCase::ArrayKeys,
    );
    special(
        "array_values",
        vec![req("array", any_array())],
        Union::array(Union::int(), Union::mixed()),
        SpecialCase::ArrayValues,
    );

    map
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_entries() {
        let strlen = call_map_entry("strlen").unwrap();
        assert_eq!(strlen.return_type.to_string(), "int");
        assert_eq!(strlen.params.len(), 1);
        assert!(call_map_entry("not_a_builtin").is_none());
    }

    #[test]
    fn test_special_cases_tagged() {
        assert_eq!(
            call_map_entry("array_map").unwrap().special,
            Some(SpecialCase::MapValues)
        );
        assert_eq!(
            call_map_entry("array_filter").unwrap().special,
            Some(SpecialCase::FilterValues)
        );
        assert!(call_map_entry("count").unwrap().special.is_none());
    }

    #[test]
    fn test_optional_params_counted() {
        let explode = call_map_entry("explode").unwrap();
        let required = explode.params.iter().filter(|p| !p.optional).count();
        assert_eq!(required, 2);
        assert_eq!(explode.params.len(), 3);
    }

    #[test]
    fn test_strpos_returns_int_or_false() {
        let strpos = call_map_entry("strpos").unwrap();
        assert_eq!(strpos.return_type.to_string(), "false|int");
    }
}
