// ABOUTME: Builds Tree-sitter parsers for the JavaScript dialect used by module files.
// ABOUTME: JSX is part of the grammar, so router files parse with the same parser.
use modelgraph_core::DiscoveryConfig;
use std::path::Path;
use tree_sitter::{Parser, Tree};

pub fn javascript_language() -> tree_sitter::Language {
    tree_sitter_javascript::LANGUAGE.into()
}

pub fn create_parser() -> Result<Parser, String> {
    let mut parser = Parser::new();
    parser
        .set_language(&javascript_language())
        .map_err(|e| format!("failed to load JavaScript grammar: {}", e))?;
    Ok(parser)
}

/// Parse a whole source file. Trees containing syntax errors are rejected.
pub fn parse_tree(text: &str) -> Result<Tree, String> {
    let mut parser = create_parser()?;
    let tree = parser
        .parse(text, None)
        .ok_or_else(|| "parser produced no tree".to_string())?;
    if tree.root_node().has_error() {
        return Err(first_error_message(&tree));
    }
    Ok(tree)
}

fn first_error_message(tree: &Tree) -> String {
    let mut cursor = tree.walk();
    loop {
        let node = cursor.node();
        if node.is_error() || node.is_missing() {
            let pos = node.start_position();
            return format!("syntax error at line {}, column {}", pos.row + 1, pos.column + 1);
        }
        if node.has_error() && cursor.goto_first_child() {
            continue;
        }
        while !cursor.goto_next_sibling() {
            if !cursor.goto_parent() {
                return "syntax error".to_string();
            }
        }
    }
}

pub fn has_supported_extension(path: &Path, config: &DiscoveryConfig) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| config.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tree_sitter::{LANGUAGE_VERSION, MIN_COMPATIBLE_LANGUAGE_VERSION};

    #[test]
    #[allow(deprecated)]
    fn grammar_uses_supported_version() {
        let version = javascript_language().version();
        assert!(
            (MIN_COMPATIBLE_LANGUAGE_VERSION..=LANGUAGE_VERSION).contains(&version),
            "JavaScript grammar uses incompatible Tree-sitter version {}",
            version
        );
    }

    #[test]
    fn rejects_broken_source() {
        assert!(parse_tree("export default { namespace: 'a', };").is_ok());
        let err = parse_tree("export default { namespace: ").unwrap_err();
        assert!(err.contains("syntax error"), "{}", err);
    }

    #[test]
    fn extension_filter() {
        let config = DiscoveryConfig::default();
        assert!(has_supported_extension(Path::new("models/a.js"), &config));
        assert!(has_supported_extension(Path::new("router.JSX"), &config));
        assert!(!has_supported_extension(Path::new("styles.css"), &config));
        assert!(!has_supported_extension(Path::new("Makefile"), &config));
    }
}
