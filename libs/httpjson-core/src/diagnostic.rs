use std::fmt;

use crate::value::{Value, render, runtime_type};

/// A key the target shape does not declare, or a value whose structure does
/// not match the shape at its position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownField {
    structure: String,
    path: String,
    runtime_type: &'static str,
    runtime_value: String,
}

impl UnknownField {
    pub(crate) fn new(structure: &str, path: String, value: &Value) -> Self {
        Self {
            structure: structure.to_owned(),
            path,
            runtime_type: runtime_type(value),
            runtime_value: render(value),
        }
    }

    /// Label of the shape that rejected the key.
    #[must_use]
    pub fn structure(&self) -> &str {
        &self.structure
    }

    /// Dotted path of the key, e.g. `Nested.Extra[0].Field`. Empty for the
    /// document root.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn runtime_type(&self) -> &'static str {
        self.runtime_type
    }

    /// Compact JSON rendering of the offending value.
    #[must_use]
    pub fn runtime_value(&self) -> &str {
        &self.runtime_value
    }

    /// `unknown field <path> of type <type> with value <value>`
    #[must_use]
    pub fn describe(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for UnknownField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = if self.path.is_empty() {
            "<root>"
        } else {
            &self.path
        };
        write!(
            f,
            "unknown field {path} of type {} with value {}",
            self.runtime_type, self.runtime_value
        )
    }
}

impl std::error::Error for UnknownField {}
