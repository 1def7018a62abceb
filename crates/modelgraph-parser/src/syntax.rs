// ABOUTME: Narrow syntax-tree extraction API shared by the module parser, serializer and router.
// ABOUTME: Exposes default-export lookup, object property access and literal string decoding.

use crate::language::create_parser;
use modelgraph_core::Span;
use tree_sitter::{Node, Tree};

/// Create a Span from a tree-sitter Node
#[inline]
pub fn span_for(node: &Node) -> Span {
    Span::new(node.start_byte(), node.end_byte())
}

/// Extract text from a tree-sitter Node
#[inline]
pub fn node_text<'a>(node: &Node, content: &'a str) -> &'a str {
    node.utf8_text(content.as_bytes()).unwrap_or("")
}

/// Find first child of a specific kind, anonymous tokens included
pub fn child_by_kind<'a>(node: &Node<'a>, kind: &str) -> Option<Node<'a>> {
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).find(|child| child.kind() == kind);
    found
}

/// Named children that are not comments
pub fn significant_children<'a>(node: &Node<'a>) -> Vec<Node<'a>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|child| child.kind() != "comment")
        .collect()
}

/// Strip any number of wrapping parentheses.
pub fn unwrap_parens(mut node: Node<'_>) -> Node<'_> {
    while node.kind() == "parenthesized_expression" {
        match significant_children(&node).into_iter().next() {
            Some(inner) => node = inner,
            None => break,
        }
    }
    node
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKind {
    /// `key: value`
    Pair,
    /// `name(args) { ... }`, including generator and async forms
    Method,
    /// `{ name }`
    Shorthand,
}

/// One member of an object literal.
#[derive(Debug, Clone, Copy)]
pub struct Property<'t> {
    pub kind: PropertyKind,
    pub node: Node<'t>,
    pub key: Option<Node<'t>>,
    pub value: Option<Node<'t>>,
}

impl<'t> Property<'t> {
    pub fn name(&self, content: &str) -> Option<String> {
        match self.kind {
            PropertyKind::Shorthand => Some(node_text(&self.node, content).to_string()),
            _ => self.key.and_then(|key| property_key_name(&key, content)),
        }
    }
}

/// Members of an object literal in source order.
///
/// Spread elements carry no name and are returned with `key == None` so callers
/// still see their position.
pub fn object_properties<'t>(object: &Node<'t>) -> Vec<Property<'t>> {
    let mut properties = Vec::new();
    for child in significant_children(object) {
        let property = match child.kind() {
            "pair" => Property {
                kind: PropertyKind::Pair,
                node: child,
                key: child.child_by_field_name("key"),
                value: child.child_by_field_name("value"),
            },
            "method_definition" => Property {
                kind: PropertyKind::Method,
                node: child,
                key: child.child_by_field_name("name"),
                value: None,
            },
            "shorthand_property_identifier" => Property {
                kind: PropertyKind::Shorthand,
                node: child,
                key: None,
                value: Some(child),
            },
            _ => Property {
                kind: PropertyKind::Pair,
                node: child,
                key: None,
                value: None,
            },
        };
        properties.push(property);
    }
    properties
}

pub fn find_property<'t>(object: &Node<'t>, name: &str, content: &str) -> Option<Property<'t>> {
    object_properties(object)
        .into_iter()
        .find(|property| property.name(content).as_deref() == Some(name))
}

/// Static name of an object key, if it has one.
pub fn property_key_name(key: &Node, content: &str) -> Option<String> {
    match key.kind() {
        "property_identifier" | "identifier" | "private_property_identifier" | "number" => {
            Some(node_text(key, content).to_string())
        }
        "string" => string_literal_value(key, content),
        "computed_property_name" => significant_children(key)
            .into_iter()
            .next()
            .and_then(|inner| string_literal_value(&inner, content)),
        _ => None,
    }
}

/// Decoded value of a quoted string or a substitution-free template literal.
pub fn string_literal_value(node: &Node, content: &str) -> Option<String> {
    match node.kind() {
        "string" => {}
        "template_string" => {
            if child_by_kind(node, "template_substitution").is_some() {
                return None;
            }
        }
        _ => return None,
    }
    let raw = node_text(node, content);
    if raw.len() < 2 {
        return None;
    }
    Some(unescape(&raw[1..raw.len() - 1]))
}

/// Quote character used by a string literal node's text.
pub fn quote_char(literal_text: &str) -> char {
    match literal_text.chars().next() {
        Some('"') => '"',
        _ => '\'',
    }
}

pub fn quote_string(value: &str, quote: char) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push(quote);
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

/// Object key text for `name`: bare when it is a plain identifier, quoted otherwise.
pub fn property_key_text(name: &str) -> String {
    let mut chars = name.chars();
    let is_identifier = match chars.next() {
        Some(first) if first == '_' || first == '$' || first.is_alphabetic() => {
            chars.all(|c| c == '_' || c == '$' || c.is_alphanumeric())
        }
        _ => false,
    };
    if is_identifier {
        name.to_string()
    } else {
        quote_string(name, '\'')
    }
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('b') => out.push('\u{8}'),
            Some('f') => out.push('\u{c}'),
            Some('v') => out.push('\u{b}'),
            Some('0') => out.push('\0'),
            Some('\n') => {}
            Some('\r') => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
            }
            Some('x') => {
                let hex: String = chars.by_ref().take(2).collect();
                push_code_point(&mut out, &hex);
            }
            Some('u') => {
                let hex: String = if chars.peek() == Some(&'{') {
                    chars.next();
                    chars.by_ref().take_while(|c| *c != '}').collect()
                } else {
                    chars.by_ref().take(4).collect()
                };
                push_code_point(&mut out, &hex);
            }
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

fn push_code_point(out: &mut String, hex: &str) {
    match u32::from_str_radix(hex, 16).ok().and_then(char::from_u32) {
        Some(ch) => out.push(ch),
        None => out.push('\u{fffd}'),
    }
}

/// The object literal a module default-exports, if any.
///
/// Handles `export default { ... }` and `export default name` where `name` is a
/// top-level `const`/`let`/`var` initialised with an object literal.
pub fn default_export_object<'t>(root: &Node<'t>, content: &str) -> Option<Node<'t>> {
    let exported = default_export_value(root)?;
    let exported = unwrap_parens(exported);
    match exported.kind() {
        "object" => Some(exported),
        "identifier" => top_level_object_binding(root, node_text(&exported, content), content),
        _ => None,
    }
}

/// The expression or declaration after `export default`.
pub fn default_export_value<'t>(root: &Node<'t>) -> Option<Node<'t>> {
    significant_children(root)
        .into_iter()
        .filter(|child| child.kind() == "export_statement")
        .find(|statement| child_by_kind(statement, "default").is_some())
        .and_then(|statement| {
            statement
                .child_by_field_name("value")
                .or_else(|| statement.child_by_field_name("declaration"))
        })
}

fn top_level_object_binding<'t>(root: &Node<'t>, name: &str, content: &str) -> Option<Node<'t>> {
    for statement in significant_children(root) {
        if !matches!(statement.kind(), "lexical_declaration" | "variable_declaration") {
            continue;
        }
        for declarator in significant_children(&statement) {
            if declarator.kind() != "variable_declarator" {
                continue;
            }
            let Some(binding) = declarator.child_by_field_name("name") else {
                continue;
            };
            if node_text(&binding, content) != name {
                continue;
            }
            return declarator
                .child_by_field_name("value")
                .map(unwrap_parens)
                .filter(|value| value.kind() == "object");
        }
    }
    None
}

/// A standalone expression parsed on its own, e.g. a handler body or a state literal.
pub struct ExpressionSnippet {
    text: String,
    tree: Tree,
}

impl ExpressionSnippet {
    const PREFIX: &'static str = "(";
    const SUFFIX: &'static str = "\n)";

    /// Parse `source` as exactly one expression.
    pub fn parse(source: &str) -> Result<Self, String> {
        if source.trim().is_empty() {
            return Err("expression is empty".to_string());
        }
        let text = format!("{}{}{}", Self::PREFIX, source, Self::SUFFIX);
        let mut parser = create_parser()?;
        let tree = parser
            .parse(&text, None)
            .ok_or_else(|| "parser produced no tree".to_string())?;
        let root = tree.root_node();
        if root.has_error() {
            return Err(format!("'{}' is not a valid expression", source.trim()));
        }
        let statements = significant_children(&root);
        let single = statements.len() == 1
            && statements[0].kind() == "expression_statement"
            && statements[0]
                .named_child(0)
                .map(|expr| {
                    expr.kind() == "parenthesized_expression"
                        && expr.start_byte() == 0
                        && expr.end_byte() == text.len()
                })
                .unwrap_or(false);
        if !single {
            return Err(format!("'{}' is not a single expression", source.trim()));
        }
        Ok(Self { text, tree })
    }

    /// Text the tree was parsed from; node offsets index into this.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn expression(&self) -> Option<Node<'_>> {
        let root = self.tree.root_node();
        let statement = root.named_child(0)?;
        let wrapper = statement.named_child(0)?;
        significant_children(&wrapper).into_iter().next()
    }

    /// Source of the expression alone, without surrounding whitespace or comments.
    pub fn expression_text(&self) -> Option<&str> {
        self.expression().map(|expr| &self.text[expr.start_byte()..expr.end_byte()])
    }

    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::parse_tree;

    #[test]
    fn finds_inline_default_export() {
        let text = "import x from 'y';\nexport default { namespace: 'count', state: 0 };\n";
        let tree = parse_tree(text).unwrap();
        let object = default_export_object(&tree.root_node(), text).unwrap();
        let namespace = find_property(&object, "namespace", text).unwrap();
        assert_eq!(
            string_literal_value(&namespace.value.unwrap(), text).as_deref(),
            Some("count")
        );
    }

    #[test]
    fn resolves_exported_binding() {
        let text = "const model = { namespace: \"users\" };\nexport default model;\n";
        let tree = parse_tree(text).unwrap();
        let object = default_export_object(&tree.root_node(), text).unwrap();
        assert!(find_property(&object, "namespace", text).is_some());
    }

    #[test]
    fn no_default_export_object() {
        let text = "export default function App() { return null; }\n";
        let tree = parse_tree(text).unwrap();
        assert!(default_export_object(&tree.root_node(), text).is_none());
    }

    #[test]
    fn property_kinds_and_names() {
        let text = "export default { 'a-b': 1, *fetch() {}, setup, ...rest, [`c`]: 2 };";
        let tree = parse_tree(text).unwrap();
        let object = default_export_object(&tree.root_node(), text).unwrap();
        let props = object_properties(&object);
        let names: Vec<_> = props.iter().map(|p| p.name(text)).collect();
        assert_eq!(
            names,
            vec![
                Some("a-b".to_string()),
                Some("fetch".to_string()),
                Some("setup".to_string()),
                None,
                Some("c".to_string()),
            ]
        );
        assert_eq!(props[1].kind, PropertyKind::Method);
        assert_eq!(props[2].kind, PropertyKind::Shorthand);
    }

    #[test]
    fn template_with_substitution_is_not_static() {
        let text = "export default { namespace: `a${b}` };";
        let tree = parse_tree(text).unwrap();
        let object = default_export_object(&tree.root_node(), text).unwrap();
        let value = find_property(&object, "namespace", text).unwrap().value.unwrap();
        assert_eq!(string_literal_value(&value, text), None);
    }

    #[test]
    fn decodes_escapes() {
        assert_eq!(unescape(r"a\'b\nA\u{1F600}\x41"), "a'b\nA\u{1F600}A");
    }

    #[test]
    fn quoting_and_keys() {
        assert_eq!(quote_string("it's", '\''), r"'it\'s'");
        assert_eq!(quote_string("say \"hi\"", '"'), r#""say \"hi\"""#);
        assert_eq!(property_key_text("add"), "add");
        assert_eq!(property_key_text("$set_1"), "$set_1");
        assert_eq!(property_key_text("count/add"), "'count/add'");
    }

    #[test]
    fn snippet_accepts_single_expression_only() {
        let snippet = ExpressionSnippet::parse("{ a: 1 }").unwrap();
        assert_eq!(snippet.expression().unwrap().kind(), "object");

        let snippet = ExpressionSnippet::parse("function*({ payload }, { put }) { yield put({ type: 'x' }); }").unwrap();
        assert!(snippet.expression().is_some());

        let snippet = ExpressionSnippet::parse("/* inc */ (s) => s + 1 // one").unwrap();
        assert_eq!(snippet.expression_text(), Some("(s) => s + 1"));

        assert!(ExpressionSnippet::parse("").is_err());
        assert!(ExpressionSnippet::parse("1); foo(").is_err());
        assert!(ExpressionSnippet::parse("{ a: ").is_err());
    }
}
