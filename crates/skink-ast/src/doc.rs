//! Structured annotation comments
//!
//! Annotation comments ("docblocks") are lexed upstream; by the time they
//! reach the analyzer they are plain type strings and flags. Type strings
//! are parsed lazily by the type model when the checker needs them.

/// Parsed body of an annotation comment attached to a declaration or
/// statement.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DocBlock {
    /// `@var` type string, applied to the assignment it annotates.
    pub var_type: Option<String>,
    /// `@param` entries: parameter name (without sigil) and type string.
    pub param_types: Vec<(String, String)>,
    /// `@return` type string.
    pub return_type: Option<String>,
    /// `@suppress` issue kind names.
    pub suppressed: Vec<String>,
    /// `@deprecated` marker.
    pub deprecated: bool,
}

impl DocBlock {
    /// Looks up the annotated type string for a parameter.
    pub fn param_type(&self, name: &str) -> Option<&str> {
        self.param_types
            .iter()
            .find(|(param, _)| param == name)
            .map(|(_, ty)| ty.as_str())
    }
}
