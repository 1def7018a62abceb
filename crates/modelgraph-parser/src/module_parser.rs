use crate::language::parse_tree;
use crate::literal::state_value;
use crate::syntax::{
    child_by_kind, default_export_object, node_text, object_properties, span_for,
    string_literal_value, Property, PropertyKind,
};
use modelgraph_core::{Handler, HandlerKind, ModelGraphError, Module, Result, Span};
use serde_json::Value;
use tracing::{debug, warn};
use tree_sitter::Node;

/// Position of one handler entry inside its collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryLayout {
    pub name: String,
    pub kind: PropertyKind,
    /// Whole property, key included
    pub span: Span,
    /// Value of a `key: value` pair
    pub value: Option<Span>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionLayout {
    pub property: Span,
    /// `None` when the collection value is not an object literal
    pub object: Option<Span>,
    /// Every member of the object, spreads included
    pub members: Vec<Span>,
    pub entries: Vec<EntryLayout>,
}

impl CollectionLayout {
    pub fn entry(&self, name: &str) -> Option<(usize, &EntryLayout)> {
        self.entries
            .iter()
            .enumerate()
            .find(|(_, entry)| entry.name == name)
    }

    /// Position of `span` among all members.
    pub fn member_index(&self, span: Span) -> Option<usize> {
        self.members.iter().position(|member| *member == span)
    }
}

/// Byte spans the serializer needs to rewrite a module in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleLayout {
    /// The exported object literal, braces included
    pub object: Span,
    /// Every member of the exported object in source order
    pub properties: Vec<Span>,
    /// The namespace string literal, quotes included
    pub namespace: Span,
    pub state: Option<Span>,
    pub reducers: Option<CollectionLayout>,
    pub effects: Option<CollectionLayout>,
    pub subscriptions: Option<CollectionLayout>,
}

impl ModuleLayout {
    pub fn collection(&self, kind: HandlerKind) -> Option<&CollectionLayout> {
        match kind {
            HandlerKind::Reducer => self.reducers.as_ref(),
            HandlerKind::Effect => self.effects.as_ref(),
            HandlerKind::Subscription => self.subscriptions.as_ref(),
        }
    }

    fn collection_mut(&mut self, kind: HandlerKind) -> &mut Option<CollectionLayout> {
        match kind {
            HandlerKind::Reducer => &mut self.reducers,
            HandlerKind::Effect => &mut self.effects,
            HandlerKind::Subscription => &mut self.subscriptions,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ParsedModule {
    pub module: Module,
    /// Reducers, then effects, then subscriptions, each in declaration order
    pub handlers: Vec<Handler>,
    pub layout: ModuleLayout,
}

impl ParsedModule {
    pub fn handler(&self, kind: HandlerKind, name: &str) -> Option<&Handler> {
        self.handlers
            .iter()
            .find(|handler| handler.kind == kind && handler.name == name)
    }

    pub fn handlers_of(&self, kind: HandlerKind) -> impl Iterator<Item = &Handler> {
        self.handlers.iter().filter(move |handler| handler.kind == kind)
    }
}

/// Parse one module file into its entities without executing it.
pub fn parse_module(file_path: &str, text: &str) -> Result<ParsedModule> {
    let tree = parse_tree(text).map_err(|reason| ModelGraphError::module_parse(file_path, reason))?;
    let root = tree.root_node();

    let object = default_export_object(&root, text).ok_or_else(|| {
        ModelGraphError::module_parse(file_path, "no default-exported object literal")
    })?;
    let properties = object_properties(&object);

    let namespace_property = properties
        .iter()
        .find(|property| property.name(text).as_deref() == Some("namespace"))
        .ok_or_else(|| ModelGraphError::module_parse(file_path, "namespace is missing"))?;
    let namespace_node = namespace_property
        .value
        .filter(|_| namespace_property.kind == PropertyKind::Pair)
        .ok_or_else(|| ModelGraphError::module_parse(file_path, "namespace is not a string"))?;
    let namespace = string_literal_value(&namespace_node, text)
        .ok_or_else(|| ModelGraphError::module_parse(file_path, "namespace is not a string"))?;

    let state_node = properties
        .iter()
        .find(|property| property.name(text).as_deref() == Some("state"))
        .and_then(|property| property.value);
    let state = state_node
        .map(|node| state_value(&node, text))
        .unwrap_or_else(|| Value::Object(Default::default()));

    let mut module = Module::new(file_path, &namespace, state);
    let mut layout = ModuleLayout {
        object: span_for(&object),
        properties: properties.iter().map(|property| span_for(&property.node)).collect(),
        namespace: span_for(&namespace_node),
        state: state_node.map(|node| span_for(&node)),
        reducers: None,
        effects: None,
        subscriptions: None,
    };

    let mut handlers = Vec::new();
    for kind in HandlerKind::ALL {
        let Some(collection) = properties
            .iter()
            .find(|property| property.name(text).as_deref() == Some(kind.collection_key()))
        else {
            continue;
        };
        let collection_layout = collect_handlers(kind, collection, text, &mut module, &mut handlers);
        *layout.collection_mut(kind) = Some(collection_layout);
    }

    debug!(
        "Parsed module '{}' from {}: {} handlers",
        module.namespace,
        file_path,
        handlers.len()
    );

    Ok(ParsedModule {
        module,
        handlers,
        layout,
    })
}

fn collect_handlers(
    kind: HandlerKind,
    collection: &Property,
    text: &str,
    module: &mut Module,
    handlers: &mut Vec<Handler>,
) -> CollectionLayout {
    let object = collection
        .value
        .filter(|value| collection.kind == PropertyKind::Pair && value.kind() == "object");

    let mut layout = CollectionLayout {
        property: span_for(&collection.node),
        object: object.map(|node| span_for(&node)),
        members: Vec::new(),
        entries: Vec::new(),
    };

    let Some(object) = object else {
        debug!(
            "{} of '{}' in {} is not an object literal; no handlers extracted",
            kind.collection_key(),
            module.namespace,
            module.file_path
        );
        return layout;
    };

    let entries = object_properties(&object);
    layout.members = entries.iter().map(|entry| span_for(&entry.node)).collect();

    for entry in entries {
        let Some(name) = entry.name(text) else {
            continue;
        };
        layout.entries.push(EntryLayout {
            name: name.clone(),
            kind: entry.kind,
            span: span_for(&entry.node),
            value: entry
                .value
                .filter(|_| entry.kind == PropertyKind::Pair)
                .map(|value| span_for(&value)),
        });

        if module.handler_ids(kind).iter().any(|id| id.local_name == name) {
            warn!(
                "Duplicate {} '{}' in {}; keeping the first declaration",
                kind, name, module.file_path
            );
            continue;
        }
        let Some(source) = entry_source(&entry, text) else {
            continue;
        };
        let handler = Handler::new(kind, module, &name, &source);
        module.handler_ids_mut(kind).push(handler.id.clone());
        handlers.push(handler);
    }

    layout
}

/// Handler body text for one collection entry.
fn entry_source(entry: &Property, text: &str) -> Option<String> {
    match entry.kind {
        PropertyKind::Pair => entry.value.map(|value| node_text(&value, text).to_string()),
        PropertyKind::Shorthand => Some(node_text(&entry.node, text).to_string()),
        PropertyKind::Method => Some(method_source(&entry.node, text)),
    }
}

/// `*name(args) { ... }` becomes `function*(args) { ... }`.
fn method_source(method: &Node, text: &str) -> String {
    let is_async = child_by_kind(method, "async").is_some();
    let is_generator = child_by_kind(method, "*").is_some();
    let parameters = method
        .child_by_field_name("parameters")
        .map(|node| node_text(&node, text))
        .unwrap_or("()");
    let body = method
        .child_by_field_name("body")
        .map(|node| node_text(&node, text))
        .unwrap_or("{}");
    format!(
        "{}function{}{} {}",
        if is_async { "async " } else { "" },
        if is_generator { "*" } else { "" },
        parameters,
        body
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const COUNT: &str = r#"
import { delay } from './utils';

export default {
  namespace: 'count',
  state: { total: 0 },
  reducers: {
    add(state) { return { total: state.total + 1 }; },
    minus: (state) => ({ total: state.total - 1 }),
  },
  effects: {
    *addRemote({ payload }, { put, call }) {
      yield call(delay, 100);
      yield put({ type: 'add' });
    },
  },
  subscriptions: {
    setup,
  },
};
"#;

    #[test]
    fn parses_full_module() {
        let parsed = parse_module("./models/count.js", COUNT).unwrap();
        let module = &parsed.module;
        assert_eq!(module.id.to_string(), "Model^^./models/count.js^^count");
        assert_eq!(module.state, json!({"total": 0}));
        assert_eq!(
            module.reducers.iter().map(|id| id.to_string()).collect::<Vec<_>>(),
            vec!["Reducer^^./models/count.js^^add", "Reducer^^./models/count.js^^minus"]
        );
        assert_eq!(module.effects.len(), 1);
        assert_eq!(module.subscriptions.len(), 1);

        let add = parsed.handler(HandlerKind::Reducer, "add").unwrap();
        assert_eq!(add.source, "function(state) { return { total: state.total + 1 }; }");
        assert_eq!(add.dispatches, None);

        let minus = parsed.handler(HandlerKind::Reducer, "minus").unwrap();
        assert_eq!(minus.source, "(state) => ({ total: state.total - 1 })");

        let effect = parsed.handler(HandlerKind::Effect, "addRemote").unwrap();
        assert!(effect.source.starts_with("function*({ payload }, { put, call }) {"));
        assert_eq!(effect.dispatches, Some(vec![]));
        assert_eq!(effect.model_id, module.id);

        let setup = parsed.handler(HandlerKind::Subscription, "setup").unwrap();
        assert_eq!(setup.source, "setup");
    }

    #[test]
    fn missing_state_and_collections_default() {
        let parsed = parse_module("./a.js", "export default { namespace: 'a' };").unwrap();
        assert_eq!(parsed.module.state, json!({}));
        assert!(parsed.handlers.is_empty());
        assert!(parsed.layout.reducers.is_none());
        assert!(parsed.layout.state.is_none());
    }

    #[test]
    fn non_object_collection_yields_no_handlers() {
        let text = "export default { namespace: 'a', reducers: base.reducers };";
        let parsed = parse_module("./a.js", text).unwrap();
        assert!(parsed.module.reducers.is_empty());
        let layout = parsed.layout.reducers.unwrap();
        assert!(layout.object.is_none());
    }

    #[test]
    fn duplicate_handler_keeps_first() {
        let text = "export default { namespace: 'a', reducers: { x: 1, x: 2 } };";
        let parsed = parse_module("./a.js", text).unwrap();
        assert_eq!(parsed.module.reducers.len(), 1);
        assert_eq!(parsed.handler(HandlerKind::Reducer, "x").unwrap().source, "1");
        assert_eq!(parsed.layout.reducers.unwrap().entries.len(), 2);
    }

    #[test]
    fn async_method_source() {
        let text = "export default { namespace: 'a', effects: { async load(action) { await x; } } };";
        let parsed = parse_module("./a.js", text).unwrap();
        assert_eq!(
            parsed.handler(HandlerKind::Effect, "load").unwrap().source,
            "async function(action) { await x; }"
        );
    }

    #[test]
    fn malformed_modules_are_rejected() {
        let cases = [
            ("export const a = 1;", "no default-exported object literal"),
            ("export default { state: 0 };", "namespace is missing"),
            ("export default { namespace: 42 };", "namespace is not a string"),
            ("export default { namespace };", "namespace is not a string"),
            ("export default { namespace: 'a', ", "syntax error"),
        ];
        for (text, expected) in cases {
            match parse_module("./bad.js", text) {
                Err(ModelGraphError::ModuleParse { file, reason }) => {
                    assert_eq!(file, "./bad.js");
                    assert!(reason.contains(expected), "{}: {}", text, reason);
                }
                other => panic!("expected parse error for {}, got {:?}", text, other),
            }
        }
    }

    #[test]
    fn layout_points_at_literals() {
        let text = "export default { namespace: \"count\", state: 0 };";
        let parsed = parse_module("./a.js", text).unwrap();
        assert_eq!(parsed.layout.namespace.text(text), "\"count\"");
        assert_eq!(parsed.layout.state.unwrap().text(text), "0");
        assert_eq!(parsed.layout.properties.len(), 2);
    }
}
