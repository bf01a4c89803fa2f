//! Core identifier and small value types shared across every component.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU32;

macro_rules! id_type {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(NonZeroU32);

        impl $name {
            pub fn new(value: u32) -> Option<Self> {
                NonZeroU32::new(value).map(Self)
            }

            pub fn value(&self) -> u32 {
                self.0.get()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0.get())
            }
        }
    };
}

id_type!(RepositoryId);
id_type!(FileId);
id_type!(SymbolId);

/// The kind of a symbol. Intentionally an opaque, open string rather than a
/// closed enum: the Storage Layer must treat `kind` as opaque so that
/// language plugins can introduce kinds the core never special-cases.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SymbolKind(Box<str>);

impl SymbolKind {
    pub fn new(s: impl Into<Box<str>>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Rank used to break ties in `find_symbol_definition`: definitions
    /// (class/struct/function/trait/...) outrank variables, which outrank
    /// imports. Unknown kinds fall in the middle.
    pub fn definition_rank(&self) -> u8 {
        match self.0.as_ref() {
            "class" | "struct" | "function" | "trait" | "interface" | "enum" | "module"
            | "actor" | "controller" => 3,
            "method" | "type_alias" | "macro" | "enum_case" => 2,
            "constant" | "setting" | "dependency" | "package" => 1,
            "variable" | "field" | "parameter" => 0,
            "import" => 0,
            _ => 1,
        }
    }
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SymbolKind {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for SymbolKind {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Common, well-known kind vocabulary. Plugins are not limited to these.
pub mod known_kind {
    pub const FUNCTION: &str = "function";
    pub const CLASS: &str = "class";
    pub const METHOD: &str = "method";
    pub const STRUCT: &str = "struct";
    pub const TRAIT: &str = "trait";
    pub const INTERFACE: &str = "interface";
    pub const ENUM: &str = "enum";
    pub const ENUM_CASE: &str = "enum_case";
    pub const TYPE_ALIAS: &str = "type_alias";
    pub const MODULE: &str = "module";
    pub const IMPORT: &str = "import";
    pub const CONSTANT: &str = "constant";
    pub const VARIABLE: &str = "variable";
    pub const MACRO: &str = "macro";
    pub const OPERATOR: &str = "operator";
    pub const PACKAGE: &str = "package";
    pub const DEPENDENCY: &str = "dependency";
    pub const SETTING: &str = "setting";
    pub const ACTOR: &str = "actor";
    pub const CONTROLLER: &str = "controller";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_zero_is_rejected() {
        assert!(SymbolId::new(0).is_none());
        assert_eq!(SymbolId::new(7).unwrap().value(), 7);
    }

    #[test]
    fn definition_rank_orders_kinds() {
        let class = SymbolKind::new("class");
        let variable = SymbolKind::new("variable");
        let import = SymbolKind::new("import");
        assert!(class.definition_rank() > variable.definition_rank());
        assert!(variable.definition_rank() >= import.definition_rank());
    }
}
