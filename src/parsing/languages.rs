//! Supported languages and their tree-sitter grammars.
//!
//! Generalizes a `SupportedLanguage` enum originally scoped to Rust/Python
//! only to the full required set, plus three structured-config formats that
//! are indexed as opaque single units rather than parsed.

use serde::{Deserialize, Serialize};
use tree_sitter::Language;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SupportedLanguage {
    Rust,
    Python,
    JavaScript,
    TypeScript,
    Java,
    Go,
    C,
    Cpp,
    CSharp,
    Sql,
    Ruby,
    Swift,
    Kotlin,
    Json,
    Yaml,
    Toml,
}

impl SupportedLanguage {
    /// Config formats have no grammar; the file is indexed as one opaque
    /// `Module`-kind unit and contributes no call sites.
    pub fn is_opaque(&self) -> bool {
        matches!(self, Self::Json | Self::Yaml | Self::Toml)
    }

    pub fn tree_sitter_language(&self) -> anyhow::Result<Language> {
        use anyhow::bail;
        Ok(match self {
            Self::Rust => tree_sitter_rust::LANGUAGE.into(),
            Self::Python => tree_sitter_python::LANGUAGE.into(),
            Self::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
            Self::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            Self::Java => tree_sitter_java::LANGUAGE.into(),
            Self::Go => tree_sitter_go::LANGUAGE.into(),
            Self::C => tree_sitter_c::LANGUAGE.into(),
            Self::Cpp => tree_sitter_cpp::LANGUAGE.into(),
            Self::CSharp => tree_sitter_c_sharp::LANGUAGE.into(),
            Self::Sql => tree_sitter_sequel::LANGUAGE.into(),
            Self::Ruby => tree_sitter_ruby::LANGUAGE.into(),
            Self::Swift => tree_sitter_swift::LANGUAGE.into(),
            Self::Kotlin => tree_sitter_kotlin_ng::LANGUAGE.into(),
            Self::Json | Self::Yaml | Self::Toml => {
                bail!("{:?} is an opaque format and has no tree-sitter grammar", self)
            }
        })
    }

    pub fn from_extension(extension: &str) -> Option<Self> {
        Some(match extension.to_lowercase().as_str() {
            "rs" => Self::Rust,
            "py" | "pyi" => Self::Python,
            "js" | "mjs" | "cjs" | "jsx" => Self::JavaScript,
            "ts" | "mts" | "cts" | "tsx" => Self::TypeScript,
            "java" => Self::Java,
            "go" => Self::Go,
            "c" | "h" => Self::C,
            "cc" | "cpp" | "cxx" | "hpp" | "hh" => Self::Cpp,
            "cs" => Self::CSharp,
            "sql" => Self::Sql,
            "rb" => Self::Ruby,
            "swift" => Self::Swift,
            "kt" | "kts" => Self::Kotlin,
            "json" => Self::Json,
            "yaml" | "yml" => Self::Yaml,
            "toml" => Self::Toml,
            _ => return None,
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Rust => "rust",
            Self::Python => "python",
            Self::JavaScript => "javascript",
            Self::TypeScript => "typescript",
            Self::Java => "java",
            Self::Go => "go",
            Self::C => "c",
            Self::Cpp => "cpp",
            Self::CSharp => "csharp",
            Self::Sql => "sql",
            Self::Ruby => "ruby",
            Self::Swift => "swift",
            Self::Kotlin => "kotlin",
            Self::Json => "json",
            Self::Yaml => "yaml",
            Self::Toml => "toml",
        }
    }

    pub fn all() -> &'static [SupportedLanguage] {
        &[
            Self::Rust,
            Self::Python,
            Self::JavaScript,
            Self::TypeScript,
            Self::Java,
            Self::Go,
            Self::C,
            Self::Cpp,
            Self::CSharp,
            Self::Sql,
            Self::Ruby,
            Self::Swift,
            Self::Kotlin,
            Self::Json,
            Self::Yaml,
            Self::Toml,
        ]
    }

    pub fn parseable() -> impl Iterator<Item = SupportedLanguage> {
        Self::all().iter().copied().filter(|l| !l.is_opaque())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_round_trips_for_every_language() {
        for lang in SupportedLanguage::all() {
            assert_eq!(lang.name().is_empty(), false);
        }
        assert_eq!(SupportedLanguage::from_extension("rs"), Some(SupportedLanguage::Rust));
        assert_eq!(SupportedLanguage::from_extension("tsx"), Some(SupportedLanguage::TypeScript));
        assert_eq!(SupportedLanguage::from_extension("toml"), Some(SupportedLanguage::Toml));
        assert_eq!(SupportedLanguage::from_extension("unknown"), None);
    }

    #[test]
    fn config_formats_are_opaque() {
        assert!(SupportedLanguage::Json.is_opaque());
        assert!(!SupportedLanguage::Rust.is_opaque());
    }
}
