//! Parser Registry facade: given a path and its bytes, returns a
//! `ParseResult` of semantic units, call sites, and interface implementations,
//! or fails with `UnsupportedLanguage` / `ParseTooLarge`. A syntactically
//! invalid file yields an empty-ish `ParseResult` with `errors` populated
//! rather than a hard failure.

use std::path::Path;

use crate::error::{EngineError, EngineResult};
use crate::model::{CallSite, InterfaceImplementation, UnitKind};

use super::calls::CallExtractor;
use super::languages::SupportedLanguage;
use super::tree_sitter::{CodeParser, ParsedSymbol, SymbolKind, SymbolType};

/// A CodeUnit-shaped record without an id or embedding; the Incremental
/// Indexer attaches both before handing these to the Vector Store.
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

/// Byte threshold above which a file is rejected outright rather than parsed.
const MAX_PARSE_BYTES: usize = 4 * 1024 * 1024;

pub struct ParserRegistry {
    parser: std::sync::Mutex<CodeParser>,
    calls: CallExtractor,
}

impl ParserRegistry {
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self {
            parser: std::sync::Mutex::new(CodeParser::new()?),
            calls: CallExtractor::new()?,
        })
    }

    pub fn parse(&self, path: &str, content: &str) -> EngineResult<ParseResult> {
        if content.len() > MAX_PARSE_BYTES {
            return Err(EngineError::ParseTooLarge {
                path: path.to_string(),
                size: content.len(),
                limit: MAX_PARSE_BYTES,
            });
        }

        let extension = Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");
        let language = SupportedLanguage::from_extension(extension).ok_or_else(|| EngineError::UnsupportedLanguage {
            extension: extension.to_string(),
        })?;

        if language.is_opaque() {
            return Ok(opaque_result(path, language, content));
        }

        let mut parser = self.parser.lock().expect("parser mutex poisoned");
        let parsed = match parser.parse_content(content, language) {
            Ok(parsed) => parsed,
            Err(err) => {
                return Ok(ParseResult {
                    language,
                    units: Vec::new(),
                    calls: Vec::new(),
                    implementations: Vec::new(),
                    errors: vec![err.to_string()],
                });
            }
        };

        let units = qualify_units(&parsed.symbols, path);

        let tree = match parser.parse_tree(content, language) {
            Ok(tree) => tree,
            Err(err) => {
                return Ok(ParseResult {
                    language,
                    units,
                    calls: Vec::new(),
                    implementations: Vec::new(),
                    errors: vec![err.to_string()],
                });
            }
        };
        drop(parser);

        let raw_calls = self.calls.extract_calls(language, &tree, content);
        let calls = resolve_calls(&raw_calls, &units, path);

        let raw_impls = self.calls.extract_implementations(language, &tree, content);
        let implementations = resolve_implementations(&raw_impls, &units, path);

        Ok(ParseResult {
            language,
            units,
            calls,
            implementations,
            errors: parsed.errors,
        })
    }
}

fn opaque_result(path: &str, language: SupportedLanguage, content: &str) -> ParseResult {
    let line_count = content.lines().count().max(1);
    let snippet: String = content.chars().take(2000).collect();
    ParseResult {
        language,
        units: vec![ParsedUnit {
            kind: UnitKind::Module,
            name: Path::new(path)
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or(path)
                .to_string(),
            qualified_name: path.to_string(),
            start_line: 1,
            end_line: line_count,
            snippet,
            is_exported: true,
        }],
        calls: Vec::new(),
        implementations: Vec::new(),
        errors: Vec::new(),
    }
}

/// Assigns qualified names by nesting each unit inside its smallest
/// enclosing class/struct, using line-range containment since the flat
/// symbol walk doesn't track a parent stack.
fn qualify_units(symbols: &[ParsedSymbol], path: &str) -> Vec<ParsedUnit> {
    symbols
        .iter()
        .filter_map(|s| {
            let kind = match s.symbol_type {
                SymbolType::Function => UnitKind::Function,
                SymbolType::Method => UnitKind::Method,
                SymbolType::Class | SymbolType::Struct => UnitKind::Class,
                SymbolType::Module => UnitKind::Module,
                _ => return None,
            };

            let container = symbols
                .iter()
                .filter(|c| {
                    matches!(c.symbol_type, SymbolType::Class | SymbolType::Struct)
                        && !std::ptr::eq(c, s)
                        && c.start_line <= s.start_line
                        && c.end_line >= s.end_line
                })
                .min_by_key(|c| c.end_line - c.start_line);

            let qualified_name = match container {
                Some(c) => format!("{path}::{}::{}", c.name, s.name),
                None => format!("{path}::{}", s.name),
            };

            Some(ParsedUnit {
                kind,
                name: s.name.clone(),
                qualified_name,
                start_line: s.start_line,
                end_line: s.end_line,
                snippet: s.text.clone(),
                is_exported: matches!(s.kind, SymbolKind::Public),
            })
        })
        .collect()
}

/// Resolves a raw textual callee into a `CallSite`. The caller is the
/// smallest unit enclosing the call's line; the callee qualified name is
/// left bare (best-effort — cross-file/cross-type resolution
/// happens, if at all, when the Call-Graph Store upserts the edge against
/// its own node index).
fn resolve_calls(raw_calls: &[super::calls::RawCall], units: &[ParsedUnit], path: &str) -> Vec<CallSite> {
    raw_calls
        .iter()
        .filter_map(|call| {
            let caller = units
                .iter()
                .filter(|u| matches!(u.kind, UnitKind::Function | UnitKind::Method) && u.start_line <= call.line && u.end_line >= call.line)
                .min_by_key(|u| u.end_line - u.start_line)?;

            Some(CallSite {
                caller_qname: caller.qualified_name.clone(),
                callee_qname: call.callee.clone(),
                caller_file: path.to_string(),
                caller_line: call.line,
                kind: call.kind,
            })
        })
        .collect()
}

fn resolve_implementations(
    raw_impls: &[super::calls::RawImplementation],
    units: &[ParsedUnit],
    path: &str,
) -> Vec<InterfaceImplementation> {
    raw_impls
        .iter()
        .map(|raw| {
            let concrete_qname = format!("{path}::{}", raw.class_name);
            let methods = units
                .iter()
                .filter(|u| u.kind == UnitKind::Method && u.qualified_name.starts_with(&format!("{path}::{}::", raw.class_name)))
                .map(|u| u.name.clone())
                .collect();

            InterfaceImplementation {
                interface_qname: format!("{path}::{}", raw.base_name),
                concrete_qname,
                methods,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_extension_is_reported() {
        let registry = ParserRegistry::new().unwrap();
        let err = registry.parse("weird.xyz", "content").unwrap_err();
        assert!(matches!(err, EngineError::UnsupportedLanguage { .. }));
    }

    #[test]
    fn oversized_file_is_rejected() {
        let registry = ParserRegistry::new().unwrap();
        let big = "a".repeat(MAX_PARSE_BYTES + 1);
        let err = registry.parse("big.rs", &big).unwrap_err();
        assert!(matches!(err, EngineError::ParseTooLarge { .. }));
    }

    #[test]
    fn opaque_config_file_yields_one_module_unit() {
        let registry = ParserRegistry::new().unwrap();
        let result = registry.parse("config.toml", "[package]\nname = \"x\"\n").unwrap();
        assert_eq!(result.units.len(), 1);
        assert_eq!(result.units[0].kind, UnitKind::Module);
        assert!(result.calls.is_empty());
    }

    #[test]
    fn rust_file_produces_units_and_call_edges() {
        let registry = ParserRegistry::new().unwrap();
        let content = "fn main() { helper(); }\n\nfn helper() {}\n";
        let result = registry.parse("src/main.rs", content).unwrap();
        assert!(result.units.iter().any(|u| u.name == "main"));
        assert!(result.units.iter().any(|u| u.name == "helper"));
        assert!(result.calls.iter().any(|c| c.callee_qname == "helper"));
    }

    #[test]
    fn malformed_file_returns_errors_not_a_hard_failure() {
        let registry = ParserRegistry::new().unwrap();
        let content = "fn broken( {\n";
        let result = registry.parse("src/broken.rs", content).unwrap();
        assert!(!result.errors.is_empty() || result.units.is_empty());
    }
}
