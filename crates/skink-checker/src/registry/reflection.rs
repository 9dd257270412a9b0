//! Builtin symbol provider
//!
//! The registry resolves unknown names against a [`Reflection`]
//! implementation before declaring them undefined. The default
//! [`CoreReflection`] ships the handful of classes the language runtime
//! always provides; embedders can substitute a richer provider.

use skink_ast::{ClassKind, Visibility};
use skink_types::Union;

use super::{ClassRecord, FunctionRecord, MethodRecord, ParamRecord, PropertyRecord};

/// A builtin class definition as handed to the registry.
pub struct BuiltinClass {
    pub record: ClassRecord,
    pub methods: Vec<MethodRecord>,
}

/// Source of builtin classes and functions.
pub trait Reflection {
    fn class(&self, name: &str) -> Option<BuiltinClass>;
    fn function(&self, name: &str) -> Option<FunctionRecord>;
}

/// The always-available runtime classes.
#[derive(Debug, Clone, Copy, Default)]
pub struct CoreReflection;

impl Reflection for CoreReflection {
    fn class(&self, name: &str) -> Option<BuiltinClass> {
        match name {
            "Exception" => Some(exception_class()),
            "stdClass" => Some(std_class()),
            _ => None,
        }
    }

    fn function(&self, _name: &str) -> Option<FunctionRecord> {
        // Builtin functions come from the call map instead.
        None
    }
}

fn builtin_method(
    class: &str,
    name: &str,
    params: Vec<ParamRecord>,
    return_type: Option<Union>,
) -> MethodRecord {
    MethodRecord {
        declaring_class: class.to_string(),
        name: name.to_string(),
        params,
        return_type,
        inferred_return: None,
        visibility: Visibility::Public,
        is_static: false,
        is_abstract: false,
        deprecated: false,
        suppressed: Vec::new(),
    }
}

fn optional_param(name: &str, ty: Union) -> ParamRecord {
    ParamRecord {
        name: name.to_string(),
        ty: Some(ty),
        by_ref: false,
        optional: true,
        variadic: false,
    }
}

fn exception_class() -> BuiltinClass {
    let mut record = ClassRecord::new("Exception", ClassKind::Class);
    record.is_builtin = true;
    record.instance_properties.insert(
        "message".to_string(),
        PropertyRecord {
            visibility: Visibility::Protected,
            ty: Union::string(),
            declaring_class: "Exception".to_string(),
        },
    );
    record.instance_properties.insert(
        "code".to_string(),
        PropertyRecord {
            visibility: Visibility::Protected,
            ty: Union::int(),
            declaring_class: "Exception".to_string(),
        },
    );

    let methods = vec![
        builtin_method(
            "Exception",
            "__construct",
            vec![
                optional_param("message", Union::string()),
                optional_param("code", Union::int()),
                optional_param("previous", Union::named("Exception").nullable()),
            ],
            None,
        ),
        builtin_method("Exception", "getMessage", vec![], Some(Union::string())),
        builtin_method("Exception", "getCode", vec![], Some(Union::int())),
        builtin_method(
            "Exception",
            "getPrevious",
            vec![],
            Some(Union::named("Exception").nullable()),
        ),
        builtin_method("Exception", "getFile", vec![], Some(Union::string())),
        builtin_method("Exception", "getLine", vec![], Some(Union::int())),
        builtin_method(
            "Exception",
            "getTraceAsString",
            vec![],
            Some(Union::string()),
        ),
    ];

    BuiltinClass { record, methods }
}

fn std_class() -> BuiltinClass {
    let mut record = ClassRecord::new("stdClass", ClassKind::Class);
    record.is_builtin = true;
    BuiltinClass {
        record,
        methods: Vec::new(),
    }
}
