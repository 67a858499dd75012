//! Parser Registry: maps a file extension to a language parser, which
//! emits semantic units and call sites. Feature-gated behind
//! `tree-sitter-parsing` (default-on), with a stub-module fallback when the
//! feature is disabled.

#[cfg(feature = "tree-sitter-parsing")]
mod calls;
#[cfg(feature = "tree-sitter-parsing")]
mod languages;
#[cfg(feature = "tree-sitter-parsing")]
mod registry;
#[cfg(feature = "tree-sitter-parsing")]
mod tree_sitter;

#[cfg(feature = "tree-sitter-parsing")]
pub use languages::SupportedLanguage;
#[cfg(feature = "tree-sitter-parsing")]
pub use registry::{ParseResult, ParsedUnit, ParserRegistry};
#[cfg(feature = "tree-sitter-parsing")]
pub use tree_sitter::{CodeParser, ParseStats, ParsedCode, ParsedSymbol, ParsingConfig, SymbolKind, SymbolType};

#[cfg(not(feature = "tree-sitter-parsing"))]
pub mod stub {
    //! Stub implementations when tree-sitter parsing is not enabled.
    use crate::error::{EngineError, EngineResult};
    use crate::model::{CallSite, InterfaceImplementation, UnitKind};

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum SupportedLanguage {
        Rust,
        Python,
    }

    #[derive(Debug, Clone)]
    pub struct ParsedUnit {
        pub kind: UnitKind,
        pub name: String,
        pub qualified_name: String,
        pub start_line: usize,
        pub end_line: usize,
        pub snippet: String,
        pub is_exported: bool,
    }

    pub struct ParseResult {
        pub language: SupportedLanguage,
        pub units: Vec<ParsedUnit>,
        pub calls: Vec<CallSite>,
        pub implementations: Vec<InterfaceImplementation>,
        pub errors: Vec<String>,
    }

    pub struct ParserRegistry;

    impl ParserRegistry {
        pub fn new() -> anyhow::Result<Self> {
            Err(anyhow::anyhow!(
                "tree-sitter parsing not enabled; enable the `tree-sitter-parsing` feature"
            ))
        }

        pub fn parse(&self, path: &str, _content: &str) -> EngineResult<ParseResult> {
            Err(EngineError::UnsupportedLanguage {
                extension: path.to_string(),
            })
        }
    }
}

#[cfg(not(feature = "tree-sitter-parsing"))]
pub use stub::*;

#[cfg(test)]
#[cfg(feature = "tree-sitter-parsing")]
mod tests {
    use super::*;

    #[test]
    fn registry_round_trips_a_rust_file() {
        let registry = ParserRegistry::new().unwrap();
        let content = "fn main() { helper(); }\nfn helper() {}\n";
        let result = registry.parse("src/main.rs", content).unwrap();
        assert_eq!(result.language, SupportedLanguage::Rust);
        assert!(!result.units.is_empty());
    }

    #[test]
    fn registry_rejects_unknown_extensions() {
        let registry = ParserRegistry::new().unwrap();
        assert!(registry.parse("file.unknownlang", "x").is_err());
    }
}
