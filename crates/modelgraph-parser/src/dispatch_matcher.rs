// ABOUTME: Static recognition of dispatch call-sites inside handler bodies.
// ABOUTME: Matchers are pluggable; a shape no matcher accepts produces no edge.

use crate::syntax::{
    find_property, node_text, significant_children, string_literal_value, ExpressionSnippet,
};
use modelgraph_core::DispatchConfig;
use std::collections::HashSet;
use tracing::debug;
use tree_sitter::{Node, TreeCursor};

/// Decides whether one call expression dispatches an action.
pub trait DispatchMatcher {
    /// The raw action type named by `call`, e.g. `add` or `count/add`.
    fn match_call(&self, call: &Node, content: &str) -> Option<String>;
}

/// Matches `callee({ type: '<action>', ... })` for a fixed set of callee expressions.
///
/// The callee is compared with whitespace removed, so `put.resolve` also matches
/// `put . resolve`. The first argument must be an object literal whose `type` is a
/// string literal or a substitution-free template; anything else is ignored.
#[derive(Debug, Clone)]
pub struct CalleeMatcher {
    callees: HashSet<String>,
}

impl CalleeMatcher {
    pub fn new<I, S>(callees: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            callees: callees
                .into_iter()
                .map(|callee| strip_whitespace(callee.as_ref()))
                .collect(),
        }
    }

    pub fn from_config(config: &DispatchConfig) -> Self {
        Self::new(&config.callees)
    }
}

impl DispatchMatcher for CalleeMatcher {
    fn match_call(&self, call: &Node, content: &str) -> Option<String> {
        let callee = call.child_by_field_name("function")?;
        if !self.callees.contains(&strip_whitespace(node_text(&callee, content))) {
            return None;
        }
        let arguments = call.child_by_field_name("arguments")?;
        let action = significant_children(&arguments).into_iter().next()?;
        if action.kind() != "object" {
            return None;
        }
        let action_type = find_property(&action, "type", content)?.value?;
        string_literal_value(&action_type, content).filter(|name| !name.is_empty())
    }
}

fn strip_whitespace(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Walks a handler body and collects the actions its call-sites dispatch.
pub struct DispatchVisitor<'m> {
    matchers: &'m [Box<dyn DispatchMatcher + Send + Sync>],
}

impl<'m> DispatchVisitor<'m> {
    pub fn new(matchers: &'m [Box<dyn DispatchMatcher + Send + Sync>]) -> Self {
        Self { matchers }
    }

    /// Raw action types in first-occurrence order, without duplicates.
    pub fn collect(&self, handler_source: &str) -> Vec<String> {
        let snippet = match ExpressionSnippet::parse(handler_source) {
            Ok(snippet) => snippet,
            Err(reason) => {
                debug!("Skipping dispatch scan: {}", reason);
                return Vec::new();
            }
        };
        let mut actions = Vec::new();
        let mut cursor = snippet.root().walk();
        self.visit_node(&mut cursor, snippet.text(), &mut actions);
        actions
    }

    fn visit_node(&self, cursor: &mut TreeCursor, content: &str, actions: &mut Vec<String>) {
        let node = cursor.node();

        if node.kind() == "call_expression" {
            if let Some(action) = self
                .matchers
                .iter()
                .find_map(|matcher| matcher.match_call(&node, content))
            {
                if !actions.contains(&action) {
                    actions.push(action);
                }
            }
        }

        if cursor.goto_first_child() {
            loop {
                self.visit_node(cursor, content, actions);
                if !cursor.goto_next_sibling() {
                    break;
                }
            }
            cursor.goto_parent();
        }
    }
}

/// Resolve a raw action type against the namespace of the dispatching module.
pub fn qualify_action(namespace: &str, action: &str) -> String {
    if action.contains('/') {
        action.to_string()
    } else {
        format!("{}/{}", namespace, action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_matchers() -> Vec<Box<dyn DispatchMatcher + Send + Sync>> {
        vec![Box::new(CalleeMatcher::from_config(&DispatchConfig::default()))]
    }

    #[test]
    fn finds_put_and_dispatch_calls() {
        let matchers = default_matchers();
        let visitor = DispatchVisitor::new(&matchers);
        let source = r#"function*({ payload }, { put, call }) {
            yield put({ type: 'save', payload });
            yield put.resolve({ type: `user/fetch` });
            yield put({ type: 'save' });
        }"#;
        assert_eq!(visitor.collect(source), vec!["save", "user/fetch"]);

        let subscription = r#"({ dispatch, history }) => {
            history.listen(() => dispatch({ type: 'query' }));
        }"#;
        assert_eq!(visitor.collect(subscription), vec!["query"]);
    }

    #[test]
    fn ignores_shapes_it_does_not_know() {
        let matchers = default_matchers();
        let visitor = DispatchVisitor::new(&matchers);
        let source = r#"function*({ type }, { put }) {
            yield put({ type });
            yield put({ type: `a/${type}` });
            yield put(action);
            yield emit({ type: 'other' });
            yield call(api, { type: 'nope' });
        }"#;
        assert!(visitor.collect(source).is_empty());
        assert!(visitor.collect("1").is_empty());
        assert!(visitor.collect("not valid ((").is_empty());
    }

    #[test]
    fn custom_callees() {
        let matchers: Vec<Box<dyn DispatchMatcher + Send + Sync>> =
            vec![Box::new(CalleeMatcher::new(["this.props.dispatch"]))];
        let visitor = DispatchVisitor::new(&matchers);
        let source = "function() { this.props.dispatch({ type: 'a/b' }); put({ type: 'c' }); }";
        assert_eq!(visitor.collect(source), vec!["a/b"]);
    }

    #[test]
    fn qualifies_local_actions() {
        assert_eq!(qualify_action("count", "add"), "count/add");
        assert_eq!(qualify_action("count", "user/fetch"), "user/fetch");
    }
}
