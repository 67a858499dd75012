//! Call-site and interface-implementation extraction, grounded on
//! `dependency_extractor.rs`'s `Query`/`QueryCursor` approach (one compiled
//! query per language per extraction kind), generalized across the
//! supported language set.

use std::collections::HashMap;

use anyhow::{Context, Result};
use tree_sitter::{Query, QueryCursor, StreamingIterator, Tree};

use crate::model::CallKind;

use super::languages::SupportedLanguage;

pub struct RawCall {
    pub callee: String,
    pub line: usize,
    pub kind: CallKind,
}

pub struct RawImplementation {
    pub class_name: String,
    pub base_name: String,
}

struct LanguageQueries {
    calls: Option<Query>,
    constructors: Option<Query>,
    bases: Option<Query>,
}

/// Compiles and holds the per-language `Query` objects used to pull call
/// sites and base/interface lists out of an already-parsed tree.
pub struct CallExtractor {
    queries: HashMap<SupportedLanguage, LanguageQueries>,
}

impl CallExtractor {
    pub fn new() -> Result<Self> {
        let mut queries = HashMap::new();
        for language in SupportedLanguage::parseable() {
            let compiled = Self::build(language).with_context(|| format!("building queries for {language:?}"))?;
            queries.insert(language, compiled);
        }
        Ok(Self { queries })
    }

    fn build(language: SupportedLanguage) -> Result<LanguageQueries> {
        let lang = language.tree_sitter_language()?;
        let compile = |src: &str| -> Option<Query> {
            if src.is_empty() {
                return None;
            }
            Query::new(&lang, src).ok()
        };

        let (calls_src, ctor_src, bases_src): (&str, &str, &str) = match language {
            SupportedLanguage::Rust => (
                r#"
                (call_expression function: (identifier) @callee)
                (call_expression function: (scoped_identifier name: (identifier) @callee))
                (call_expression function: (field_expression field: (field_identifier) @method_callee))
                "#,
                "",
                r#"(impl_item trait: (type_identifier) @base_name type: (type_identifier) @class_name)"#,
            ),
            SupportedLanguage::Python => (
                r#"
                (call function: (identifier) @callee)
                (call function: (attribute attribute: (identifier) @method_callee))
                "#,
                "",
                r#"(class_definition name: (identifier) @class_name superclasses: (argument_list (identifier) @base_name))"#,
            ),
            SupportedLanguage::JavaScript | SupportedLanguage::TypeScript => (
                r#"
                (call_expression function: (identifier) @callee)
                (call_expression function: (member_expression property: (property_identifier) @method_callee))
                "#,
                r#"(new_expression constructor: (identifier) @ctor_callee)"#,
                r#"(class_declaration name: (identifier) @class_name (class_heritage (extends_clause value: (identifier) @base_name)))"#,
            ),
            SupportedLanguage::Java => (
                r#"
                (method_invocation name: (identifier) @method_callee)
                "#,
                r#"(object_creation_expression type: (type_identifier) @ctor_callee)"#,
                r#"
                (class_declaration name: (identifier) @class_name superclass: (superclass (type_identifier) @base_name))
                (class_declaration name: (identifier) @class_name interfaces: (super_interfaces (type_list (type_identifier) @base_name)))
                "#,
            ),
            SupportedLanguage::Go => (
                r#"
                (call_expression function: (identifier) @callee)
                (call_expression function: (selector_expression field: (field_identifier) @method_callee))
                "#,
                "",
                "",
            ),
            SupportedLanguage::C => (
                r#"(call_expression function: (identifier) @callee)"#,
                "",
                "",
            ),
            SupportedLanguage::Cpp => (
                r#"
                (call_expression function: (identifier) @callee)
                (call_expression function: (field_expression field: (field_identifier) @method_callee))
                "#,
                r#"(new_expression type: (type_identifier) @ctor_callee)"#,
                r#"(class_specifier name: (type_identifier) @class_name (base_class_clause (type_identifier) @base_name))"#,
            ),
            SupportedLanguage::CSharp => (
                r#"
                (invocation_expression function: (identifier) @callee)
                (invocation_expression function: (member_access_expression name: (identifier) @method_callee))
                "#,
                r#"(object_creation_expression type: (identifier) @ctor_callee)"#,
                r#"(class_declaration name: (identifier) @class_name (base_list (identifier) @base_name))"#,
            ),
            SupportedLanguage::Sql => ("", "", ""),
            SupportedLanguage::Ruby => (
                r#"
                (call method: (identifier) @callee)
                (call receiver: (_) method: (identifier) @method_callee)
                "#,
                "",
                r#"(class name: (constant) @class_name superclass: (superclass (constant) @base_name))"#,
            ),
            SupportedLanguage::Swift => (
                r#"(call_expression (simple_identifier) @callee)"#,
                "",
                r#"(class_declaration name: (type_identifier) @class_name (inheritance_specifier (user_type (type_identifier) @base_name)))"#,
            ),
            SupportedLanguage::Kotlin => (
                r#"(call_expression (simple_identifier) @callee)"#,
                "",
                r#"(class_declaration (type_identifier) @class_name (delegation_specifier (user_type (type_identifier) @base_name)))"#,
            ),
            SupportedLanguage::Json | SupportedLanguage::Yaml | SupportedLanguage::Toml => {
                unreachable!("opaque languages never reach query compilation")
            }
        };

        Ok(LanguageQueries {
            calls: compile(calls_src),
            constructors: compile(ctor_src),
            bases: compile(bases_src),
        })
    }

    pub fn extract_calls(&self, language: SupportedLanguage, tree: &Tree, content: &str) -> Vec<RawCall> {
        let Some(compiled) = self.queries.get(&language) else {
            return Vec::new();
        };
        let mut calls = Vec::new();

        if let Some(query) = &compiled.calls {
            run_query(query, tree, content, |name, node, text| {
                let kind = if name == "method_callee" { CallKind::Method } else { CallKind::Direct };
                calls.push(RawCall {
                    callee: text.to_string(),
                    line: node.start_position().row + 1,
                    kind,
                });
            });
        }
        if let Some(query) = &compiled.constructors {
            run_query(query, tree, content, |_, node, text| {
                calls.push(RawCall {
                    callee: text.to_string(),
                    line: node.start_position().row + 1,
                    kind: CallKind::Constructor,
                });
            });
        }

        calls
    }

    pub fn extract_implementations(&self, language: SupportedLanguage, tree: &Tree, content: &str) -> Vec<RawImplementation> {
        let Some(compiled) = self.queries.get(&language) else {
            return Vec::new();
        };
        let Some(query) = &compiled.bases else {
            return Vec::new();
        };

        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(query, tree.root_node(), content.as_bytes());
        let mut out = Vec::new();
        while let Some(m) = matches.next() {
            let mut class_name = None;
            let mut base_name = None;
            for capture in m.captures {
                let text = capture.node.utf8_text(content.as_bytes()).unwrap_or("");
                match query.capture_names()[capture.index as usize] {
                    "class_name" => class_name = Some(text.to_string()),
                    "base_name" => base_name = Some(text.to_string()),
                    _ => {}
                }
            }
            if let (Some(class_name), Some(base_name)) = (class_name, base_name) {
                out.push(RawImplementation { class_name, base_name });
            }
        }
        out
    }
}

fn run_query<'a>(query: &Query, tree: &'a Tree, content: &str, mut on_capture: impl FnMut(&str, tree_sitter::Node<'a>, &str)) {
    let mut cursor = QueryCursor::new();
    let mut matches = cursor.matches(query, tree.root_node(), content.as_bytes());
    while let Some(m) = matches.next() {
        for capture in m.captures {
            let name = query.capture_names()[capture.index as usize];
            let Ok(text) = capture.node.utf8_text(content.as_bytes()) else { continue };
            on_capture(name, capture.node, text);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tree_sitter::Parser;

    fn parse(language: SupportedLanguage, content: &str) -> Tree {
        let mut parser = Parser::new();
        parser.set_language(&language.tree_sitter_language().unwrap()).unwrap();
        parser.parse(content, None).unwrap()
    }

    #[test]
    fn rust_direct_and_method_calls_are_distinguished() {
        let extractor = CallExtractor::new().unwrap();
        let content = "fn caller() { helper(); obj.method_on_receiver(); }";
        let tree = parse(SupportedLanguage::Rust, content);
        let calls = extractor.extract_calls(SupportedLanguage::Rust, &tree, content);
        assert!(calls.iter().any(|c| c.callee == "helper" && c.kind == CallKind::Direct));
        assert!(calls.iter().any(|c| c.callee == "method_on_receiver" && c.kind == CallKind::Method));
    }

    #[test]
    fn rust_trait_impl_yields_an_implementation() {
        let extractor = CallExtractor::new().unwrap();
        let content = "trait Greeter {} struct English; impl Greeter for English {}";
        let tree = parse(SupportedLanguage::Rust, content);
        let impls = extractor.extract_implementations(SupportedLanguage::Rust, &tree, content);
        assert!(impls.iter().any(|i| i.class_name == "English" && i.base_name == "Greeter"));
    }
}
