//! Tree-sitter symbol extraction, generalized from a Rust/Python-only
//! walker to the full supported language set. The recursive node-kind
//! matching strategy is kept unchanged; only the node-kind tables grow to
//! cover the added grammars, since many of them reuse the same node-kind
//! names (`function_declaration`, `class_declaration`, `call_expression`, ...).

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tree_sitter::{Node, Parser, Tree};

use super::languages::SupportedLanguage;

const FUNCTION_NODES: &[&str] = &[
    "function_item",       // Rust
    "function_definition",  // Python, C, C++
    "function_declaration", // JS, TS, Go, Swift, Kotlin
];
const METHOD_NODES: &[&str] = &[
    "method_definition",      // JS, TS, Ruby
    "method_declaration",     // Java, Go, C#
    "constructor_declaration", // Java, C#
];
const STRUCT_NODES: &[&str] = &["struct_item", "struct_declaration", "struct_specifier"];
const CLASS_NODES: &[&str] = &[
    "class_declaration", // JS, TS, Java, C#, Kotlin
    "class_definition",  // Python
    "class_specifier",   // C++
    "object_declaration", // Kotlin singletons
];
const ENUM_NODES: &[&str] = &["enum_item", "enum_declaration"];
const VARIABLE_NODES: &[&str] = &["let_declaration", "variable_declarator", "var_declaration"];
const CONST_NODES: &[&str] = &["const_item", "const_declaration"];
const MODULE_NODES: &[&str] = &["mod_item", "module_declaration", "namespace_declaration"];
const IMPORT_NODES: &[&str] = &[
    "use_declaration",        // Rust
    "import_statement",       // Python, JS, TS, Java
    "import_from_statement",  // Python
    "future_import_statement", // Python
    "import_declaration",     // Java, Kotlin
    "using_directive",        // C#
];
const COMMENT_NODES: &[&str] = &["line_comment", "block_comment", "comment"];

const TRAIT_NODE: &str = "trait_item";
const IMPL_NODE: &str = "impl_item";
const INTERFACE_NODES: &[&str] = &["interface_declaration", "protocol_declaration"];

const DECORATED_DEFINITION: &str = "decorated_definition";
const LAMBDA_NODE: &str = "lambda";

const PYTHON_VARIABLE_NODES: &[&str] = &["assignment", "augmented_assignment", "named_expression"];

const IDENTIFIER_NODES: &[&str] = &["identifier", "type_identifier", "name", "field_identifier"];

/// Nodes whose bodies own the methods nested inside them: a function found
/// inside one of these is reclassified from `Function` to `Method`.
const METHOD_CONTAINER_NODES: &[&str] = &[
    "trait_item",
    "impl_item",
    "class_definition",
    "class_declaration",
    "class_specifier",
    "class_body",
    "struct_specifier",
    "object_declaration",
    "interface_declaration",
    "protocol_declaration",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SymbolType {
    Function,
    Method,
    Class,
    Struct,
    Interface,
    Enum,
    Variable,
    Constant,
    Module,
    Import,
    Comment,
    Other(String),
}

impl std::fmt::Display for SymbolType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SymbolType::Function => write!(f, "function"),
            SymbolType::Method => write!(f, "method"),
            SymbolType::Class => write!(f, "class"),
            SymbolType::Struct => write!(f, "struct"),
            SymbolType::Interface => write!(f, "interface"),
            SymbolType::Enum => write!(f, "enum"),
            SymbolType::Variable => write!(f, "variable"),
            SymbolType::Constant => write!(f, "constant"),
            SymbolType::Module => write!(f, "module"),
            SymbolType::Import => write!(f, "import"),
            SymbolType::Comment => write!(f, "comment"),
            SymbolType::Other(s) => write!(f, "other({s})"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SymbolKind {
    Public,
    Private,
    Protected,
    Internal,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedSymbol {
    pub name: String,
    pub symbol_type: SymbolType,
    pub kind: SymbolKind,
    pub start_line: usize,
    pub end_line: usize,
    pub start_column: usize,
    pub end_column: usize,
    pub text: String,
    pub documentation: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedCode {
    pub language: SupportedLanguage,
    pub symbols: Vec<ParsedSymbol>,
    pub stats: ParseStats,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseStats {
    pub total_nodes: usize,
    pub named_nodes: usize,
    pub max_depth: usize,
    pub error_count: usize,
}

#[derive(Debug, Clone)]
pub struct ParsingConfig {
    pub extract_documentation: bool,
    pub include_private: bool,
    pub max_file_size: usize,
    pub languages: Option<Vec<SupportedLanguage>>,
}

impl Default for ParsingConfig {
    fn default() -> Self {
        Self {
            extract_documentation: true,
            include_private: true,
            max_file_size: 2 * 1024 * 1024,
            languages: None,
        }
    }
}

/// Multi-language symbol walker. One `tree_sitter::Parser` per language,
/// built eagerly so `parse_content` never pays grammar-load cost per call.
pub struct CodeParser {
    parsers: HashMap<SupportedLanguage, Parser>,
    config: ParsingConfig,
}

impl CodeParser {
    pub fn new() -> Result<Self> {
        Self::with_config(ParsingConfig::default())
    }

    pub fn with_config(config: ParsingConfig) -> Result<Self> {
        let mut parsers = HashMap::new();

        let languages = config
            .languages
            .clone()
            .unwrap_or_else(|| SupportedLanguage::parseable().collect());

        for language in languages {
            if language.is_opaque() {
                continue;
            }
            let mut parser = Parser::new();
            let tree_sitter_lang = language
                .tree_sitter_language()
                .with_context(|| format!("failed to load tree-sitter grammar for {language:?}"))?;
            parser
                .set_language(&tree_sitter_lang)
                .with_context(|| format!("failed to set parser language for {language:?}"))?;
            parsers.insert(language, parser);
        }

        Ok(Self { parsers, config })
    }

    pub fn parse_file(&mut self, file_path: &Path) -> Result<ParsedCode> {
        let extension = file_path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| anyhow::anyhow!("could not determine file extension"))?;

        let language = SupportedLanguage::from_extension(extension)
            .ok_or_else(|| anyhow::anyhow!("unsupported file extension: {extension}"))?;

        let content = std::fs::read_to_string(file_path)
            .with_context(|| format!("failed to read file: {}", file_path.display()))?;

        self.parse_content(&content, language)
    }

    pub fn parse_content(&mut self, content: &str, language: SupportedLanguage) -> Result<ParsedCode> {
        if content.len() > self.config.max_file_size {
            return Err(anyhow::anyhow!(
                "file size {} exceeds limit {}",
                content.len(),
                self.config.max_file_size
            ));
        }

        let parser = self
            .parsers
            .get_mut(&language)
            .ok_or_else(|| anyhow::anyhow!("parser not available for language: {language:?}"))?;

        let tree = parser
            .parse(content, None)
            .ok_or_else(|| anyhow::anyhow!("failed to parse content"))?;

        let symbols = self.extract_symbols(&tree, content);
        let stats = self.calculate_stats(&tree);
        let errors = self.collect_errors(&tree, content);

        Ok(ParsedCode {
            language,
            symbols,
            stats,
            errors,
        })
    }

    pub(crate) fn parse_tree(&mut self, content: &str, language: SupportedLanguage) -> Result<Tree> {
        let parser = self
            .parsers
            .get_mut(&language)
            .ok_or_else(|| anyhow::anyhow!("parser not available for language: {language:?}"))?;
        parser
            .parse(content, None)
            .ok_or_else(|| anyhow::anyhow!("failed to parse content"))
    }

    fn extract_symbols(&self, tree: &Tree, content: &str) -> Vec<ParsedSymbol> {
        let mut symbols = Vec::new();
        self.extract_symbols_recursive(tree.root_node(), content, &mut symbols);
        symbols
    }

    fn extract_symbols_recursive(&self, node: Node, content: &str, symbols: &mut Vec<ParsedSymbol>) {
        let node_type = node.kind();

        let symbol_type = if FUNCTION_NODES.contains(&node_type) {
            if self.is_inside_trait_or_impl(node) {
                Some(SymbolType::Method)
            } else {
                Some(SymbolType::Function)
            }
        } else if node_type == DECORATED_DEFINITION {
            self.extract_decorated_symbol_type(node)
        } else if node_type == LAMBDA_NODE {
            Some(SymbolType::Function)
        } else if METHOD_NODES.contains(&node_type) {
            Some(SymbolType::Method)
        } else if STRUCT_NODES.contains(&node_type) {
            Some(SymbolType::Struct)
        } else if node_type == TRAIT_NODE {
            Some(SymbolType::Interface)
        } else if node_type == IMPL_NODE || CLASS_NODES.contains(&node_type) {
            Some(SymbolType::Class)
        } else if INTERFACE_NODES.contains(&node_type) {
            Some(SymbolType::Interface)
        } else if ENUM_NODES.contains(&node_type) {
            Some(SymbolType::Enum)
        } else if VARIABLE_NODES.contains(&node_type) || PYTHON_VARIABLE_NODES.contains(&node_type) {
            Some(SymbolType::Variable)
        } else if CONST_NODES.contains(&node_type) {
            Some(SymbolType::Constant)
        } else if MODULE_NODES.contains(&node_type) {
            Some(SymbolType::Module)
        } else if IMPORT_NODES.contains(&node_type) {
            Some(SymbolType::Import)
        } else if COMMENT_NODES.contains(&node_type) {
            Some(SymbolType::Comment)
        } else {
            None
        };

        if let Some(sym_type) = symbol_type {
            let name = self
                .extract_symbol_name(node, content)
                .unwrap_or_else(|| self.generate_fallback_name(node, &sym_type));
            let kind = self.extract_symbol_visibility(node, content);
            let start_pos = node.start_position();
            let end_pos = node.end_position();

            symbols.push(ParsedSymbol {
                name,
                symbol_type: sym_type,
                kind,
                start_line: start_pos.row + 1,
                end_line: end_pos.row + 1,
                start_column: start_pos.column,
                end_column: end_pos.column,
                text: node.utf8_text(content.as_bytes()).unwrap_or("").to_string(),
                documentation: None,
            });
        }

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.extract_symbols_recursive(child, content, symbols);
        }
    }

    pub(crate) fn is_inside_trait_or_impl(&self, node: Node) -> bool {
        let mut current = node.parent();
        while let Some(parent) = current {
            if METHOD_CONTAINER_NODES.contains(&parent.kind()) {
                return true;
            }
            current = parent.parent();
        }
        false
    }

    fn extract_decorated_symbol_type(&self, node: Node) -> Option<SymbolType> {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            let child_kind = child.kind();
            if FUNCTION_NODES.contains(&child_kind) {
                return if self.is_inside_trait_or_impl(node) {
                    Some(SymbolType::Method)
                } else {
                    Some(SymbolType::Function)
                };
            } else if CLASS_NODES.contains(&child_kind) {
                return Some(SymbolType::Class);
            }
        }
        Some(SymbolType::Function)
    }

    fn extract_symbol_name(&self, node: Node, content: &str) -> Option<String> {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if IDENTIFIER_NODES.contains(&child.kind()) {
                if let Ok(name) = child.utf8_text(content.as_bytes()) {
                    let trimmed = name.trim();
                    if !trimmed.is_empty() {
                        return Some(trimmed.to_string());
                    }
                }
            }
        }
        None
    }

    fn generate_fallback_name(&self, node: Node, symbol_type: &SymbolType) -> String {
        let start_pos = node.start_position();
        match symbol_type {
            SymbolType::Function => format!("function_at_line_{}", start_pos.row + 1),
            SymbolType::Struct => format!("struct_at_line_{}", start_pos.row + 1),
            SymbolType::Enum => format!("enum_at_line_{}", start_pos.row + 1),
            SymbolType::Class => format!("class_at_line_{}", start_pos.row + 1),
            SymbolType::Variable => format!("variable_at_line_{}", start_pos.row + 1),
            SymbolType::Constant => format!("constant_at_line_{}", start_pos.row + 1),
            SymbolType::Comment => format!("comment_at_line_{}", start_pos.row + 1),
            _ => format!("symbol_at_line_{}", start_pos.row + 1),
        }
    }

    fn extract_symbol_visibility(&self, node: Node, content: &str) -> SymbolKind {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.kind() == "visibility_modifier" {
                if let Ok(text) = child.utf8_text(content.as_bytes()) {
                    return match text.trim() {
                        "pub" => SymbolKind::Public,
                        "pub(crate)" => SymbolKind::Internal,
                        "pub(super)" => SymbolKind::Protected,
                        _ => SymbolKind::Unknown,
                    };
                }
            }
            if child.kind() == "modifiers" {
                if let Ok(text) = child.utf8_text(content.as_bytes()) {
                    if text.contains("public") {
                        return SymbolKind::Public;
                    } else if text.contains("private") {
                        return SymbolKind::Private;
                    } else if text.contains("protected") {
                        return SymbolKind::Protected;
                    } else if text.contains("internal") {
                        return SymbolKind::Internal;
                    }
                }
            }
        }

        if let Ok(node_text) = node.utf8_text(content.as_bytes()) {
            let trimmed = node_text.trim();
            if trimmed.starts_with("pub(crate)") {
                return SymbolKind::Internal;
            } else if trimmed.starts_with("pub(super)") {
                return SymbolKind::Protected;
            } else if trimmed.starts_with("pub ") {
                return SymbolKind::Public;
            } else if trimmed.starts_with("export ") || trimmed.starts_with("public ") {
                return SymbolKind::Public;
            } else if trimmed.starts_with('_') {
                return SymbolKind::Private;
            }
        }

        SymbolKind::Private
    }

    fn calculate_stats(&self, tree: &Tree) -> ParseStats {
        let root = tree.root_node();
        let (total_nodes, named_nodes, max_depth) = self.count_nodes_recursive(root, 0);
        let error_count = self.count_errors_recursive(root);

        ParseStats {
            total_nodes,
            named_nodes,
            max_depth,
            error_count,
        }
    }

    #[allow(clippy::only_used_in_recursion)]
    fn count_nodes_recursive(&self, node: Node, depth: usize) -> (usize, usize, usize) {
        let mut total = 1;
        let mut named = if node.is_named() { 1 } else { 0 };
        let mut max_depth = depth;

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            let (child_total, child_named, child_depth) = self.count_nodes_recursive(child, depth + 1);
            total += child_total;
            named += child_named;
            max_depth = max_depth.max(child_depth);
        }

        (total, named, max_depth)
    }

    #[allow(clippy::only_used_in_recursion)]
    fn count_errors_recursive(&self, node: Node) -> usize {
        let mut error_count = if node.is_error() { 1 } else { 0 };
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            error_count += self.count_errors_recursive(child);
        }
        error_count
    }

    fn collect_errors(&self, tree: &Tree, content: &str) -> Vec<String> {
        let mut errors = Vec::new();
        self.collect_errors_recursive(tree.root_node(), content, &mut errors);
        errors
    }

    #[allow(clippy::only_used_in_recursion)]
    fn collect_errors_recursive(&self, node: Node, content: &str, errors: &mut Vec<String>) {
        if node.is_error() {
            let start_pos = node.start_position();
            let error_text = node.utf8_text(content.as_bytes()).unwrap_or("<unknown>");
            errors.push(format!(
                "parse error at line {}, column {}: {}",
                start_pos.row + 1,
                start_pos.column,
                error_text
            ));
        }
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.collect_errors_recursive(child, content, errors);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_rust_function_and_struct() {
        let mut parser = CodeParser::new().unwrap();
        let code = r#"
        fn main() {
            println!("hello");
        }

        struct Person {
            name: String,
        }
        "#;
        let parsed = parser.parse_content(code, SupportedLanguage::Rust).unwrap();
        assert!(parsed.symbols.iter().any(|s| s.name == "main" && s.symbol_type == SymbolType::Function));
        assert!(parsed.symbols.iter().any(|s| s.name == "Person" && s.symbol_type == SymbolType::Struct));
    }

    #[test]
    fn empty_code_has_no_symbols() {
        let mut parser = CodeParser::new().unwrap();
        let parsed = parser.parse_content("", SupportedLanguage::Rust).unwrap();
        assert!(parsed.symbols.is_empty());
    }

    #[test]
    fn malformed_code_is_recorded_as_errors_not_a_hard_failure() {
        let mut parser = CodeParser::new().unwrap();
        let code = "fn broken( {\n";
        let parsed = parser.parse_content(code, SupportedLanguage::Rust).unwrap();
        assert!(parsed.stats.error_count > 0 || !parsed.errors.is_empty());
    }

    #[test]
    fn python_method_is_distinguished_from_function() {
        let mut parser = CodeParser::new().unwrap();
        let code = r#"
def standalone():
    pass

class Greeter:
    def greet(self):
        pass
"#;
        let parsed = parser.parse_content(code, SupportedLanguage::Python).unwrap();
        let standalone = parsed.symbols.iter().find(|s| s.name == "standalone").unwrap();
        let greet = parsed.symbols.iter().find(|s| s.name == "greet").unwrap();
        assert_eq!(standalone.symbol_type, SymbolType::Function);
        assert_eq!(greet.symbol_type, SymbolType::Method);
    }
}
