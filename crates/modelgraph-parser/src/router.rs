// ABOUTME: Extracts the route tree and route-bound components from a JSX router file.
// ABOUTME: Component identifiers are paired with the import that brings them into scope.

use crate::language::parse_tree;
use crate::literal::evaluate_literal;
use crate::syntax::{node_text, significant_children, string_literal_value};
use modelgraph_core::{EntityId, EntityKind, ModelGraphError, Result, RouteNode, Router, RouterConfig};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tree_sitter::Node;

/// Local name of the router entity inside its identifier.
pub const ROUTER_LOCAL_NAME: &str = "router";

/// A `component={X}` binding together with the module `X` was imported from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentImport {
    pub component_name: String,
    pub import_path: String,
}

#[derive(Debug, Clone)]
pub struct ParsedRouter {
    pub router: Router,
    /// First-use order, no duplicates; components without an import are left out
    pub components: Vec<ComponentImport>,
}

pub fn parse_router(file_path: &str, text: &str, config: &RouterConfig) -> Result<ParsedRouter> {
    let tree = parse_tree(text).map_err(|reason| ModelGraphError::module_parse(file_path, reason))?;
    let root = tree.root_node();

    let imports = collect_imports(&root, text);
    let mut collector = RouteCollector {
        content: text,
        route_tags: &config.route_tags,
        component_refs: Vec::new(),
    };
    let routes = collector.collect_children(&root);

    let components = collector
        .component_refs
        .into_iter()
        .filter_map(|name| {
            imports.get(&name).map(|import_path| ComponentImport {
                component_name: name.clone(),
                import_path: import_path.clone(),
            })
        })
        .collect();

    Ok(ParsedRouter {
        router: Router {
            id: EntityId::new(EntityKind::Router, file_path, ROUTER_LOCAL_NAME),
            file_path: file_path.to_string(),
            routes,
        },
        components,
    })
}

/// Local binding name → import source for every default or named import.
fn collect_imports(root: &Node, text: &str) -> HashMap<String, String> {
    let mut imports = HashMap::new();
    for statement in significant_children(root) {
        if statement.kind() != "import_statement" {
            continue;
        }
        let Some(source) = statement
            .child_by_field_name("source")
            .and_then(|node| string_literal_value(&node, text))
        else {
            continue;
        };
        for clause in significant_children(&statement) {
            if clause.kind() != "import_clause" {
                continue;
            }
            for binding in significant_children(&clause) {
                match binding.kind() {
                    "identifier" => {
                        imports.insert(node_text(&binding, text).to_string(), source.clone());
                    }
                    "named_imports" => {
                        for specifier in significant_children(&binding) {
                            let local = specifier
                                .child_by_field_name("alias")
                                .or_else(|| specifier.child_by_field_name("name"));
                            if let Some(local) = local {
                                imports.insert(node_text(&local, text).to_string(), source.clone());
                            }
                        }
                    }
                    _ => {}
                }
            }
        }
    }
    imports
}

struct RouteCollector<'a> {
    content: &'a str,
    route_tags: &'a [String],
    component_refs: Vec<String>,
}

impl<'a> RouteCollector<'a> {
    /// Outermost route elements below `node`, in source order.
    fn collect_children(&mut self, node: &Node) -> Vec<RouteNode> {
        let mut routes = Vec::new();
        let mut cursor = node.walk();
        let children: Vec<Node> = node.named_children(&mut cursor).collect();
        for child in children {
            self.collect_into(&child, &mut routes);
        }
        routes
    }

    fn collect_into(&mut self, node: &Node, routes: &mut Vec<RouteNode>) {
        let opening = match node.kind() {
            "jsx_element" => node.child_by_field_name("open_tag"),
            "jsx_self_closing_element" => Some(*node),
            _ => None,
        };

        if let Some(opening) = opening {
            let tag = opening
                .child_by_field_name("name")
                .map(|name| node_text(&name, self.content).to_string())
                .unwrap_or_default();
            if self.route_tags.iter().any(|route_tag| *route_tag == tag) {
                let attributes = self.attributes(&opening);
                let children = if node.kind() == "jsx_element" {
                    self.collect_children(node)
                } else {
                    Vec::new()
                };
                routes.push(RouteNode {
                    tag,
                    attributes,
                    children,
                });
                return;
            }
        }

        routes.extend(self.collect_children(node));
    }

    fn attributes(&mut self, opening: &Node) -> BTreeMap<String, Value> {
        let mut attributes = BTreeMap::new();
        for attribute in significant_children(opening) {
            if attribute.kind() != "jsx_attribute" {
                continue;
            }
            let parts = significant_children(&attribute);
            let Some(name_node) = parts.first() else {
                continue;
            };
            let name = node_text(name_node, self.content).to_string();
            let value = match parts.get(1) {
                None => Value::Bool(true),
                Some(value) => self.attribute_value(&name, value),
            };
            attributes.insert(name, value);
        }
        attributes
    }

    fn attribute_value(&mut self, name: &str, value: &Node) -> Value {
        if value.kind() == "string" {
            return string_literal_value(value, self.content)
                .map(Value::String)
                .unwrap_or(Value::Null);
        }
        if value.kind() == "jsx_expression" {
            if let Some(inner) = significant_children(value).into_iter().next() {
                if name == "component" && inner.kind() == "identifier" {
                    let component = node_text(&inner, self.content).to_string();
                    if !self.component_refs.contains(&component) {
                        self.component_refs.push(component);
                    }
                }
                return evaluate_literal(&inner, self.content)
                    .unwrap_or_else(|| Value::String(node_text(&inner, self.content).to_string()));
            }
            return Value::Null;
        }
        Value::String(node_text(value, self.content).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const ROUTER: &str = r#"
import React from 'react';
import { Router, Route, IndexRoute } from 'dva/router';
import IndexPage from './routes/IndexPage';
import { Users as UserList } from './routes/Users';

export default function RouterConfig({ history }) {
  return (
    <Router history={history}>
      <Route path="/" component={App}>
        <IndexRoute component={IndexPage} />
        <div>
          <Route path="users" component={UserList} exact />
        </div>
      </Route>
      <Route path="/again" component={IndexPage} />
    </Router>
  );
}
"#;

    #[test]
    fn builds_route_tree() {
        let parsed = parse_router("./router.js", ROUTER, &RouterConfig::default()).unwrap();
        let router = &parsed.router;
        assert_eq!(router.id.to_string(), "Router^^./router.js^^router");
        assert_eq!(router.routes.len(), 1);

        let root = &router.routes[0];
        assert_eq!(root.tag, "Router");
        assert_eq!(root.attributes["history"], json!("history"));
        assert_eq!(root.children.len(), 2);

        let app = &root.children[0];
        assert_eq!(app.attributes["path"], json!("/"));
        assert_eq!(
            app.children.iter().map(|r| r.tag.as_str()).collect::<Vec<_>>(),
            vec!["IndexRoute", "Route"]
        );
        assert_eq!(app.children[1].attributes["exact"], json!(true));
    }

    #[test]
    fn pairs_components_with_imports() {
        let parsed = parse_router("./router.js", ROUTER, &RouterConfig::default()).unwrap();
        assert_eq!(
            parsed.components,
            vec![
                ComponentImport {
                    component_name: "IndexPage".to_string(),
                    import_path: "./routes/IndexPage".to_string(),
                },
                ComponentImport {
                    component_name: "UserList".to_string(),
                    import_path: "./routes/Users".to_string(),
                },
            ]
        );
    }

    #[test]
    fn file_without_routes() {
        let parsed = parse_router("./router.js", "export default () => null;", &RouterConfig::default()).unwrap();
        assert!(parsed.router.routes.is_empty());
        assert!(parsed.components.is_empty());
    }
}
