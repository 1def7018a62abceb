use crate::{EntityId, HandlerKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Byte range inside a source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    pub start_byte: usize,
    pub end_byte: usize,
}

impl Span {
    pub fn new(start_byte: usize, end_byte: usize) -> Self {
        Self {
            start_byte,
            end_byte,
        }
    }

    pub fn len(&self) -> usize {
        self.end_byte.saturating_sub(self.start_byte)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.start_byte..self.end_byte]
    }
}

/// A declarative unit: one default-exported literal per file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Module {
    pub id: EntityId,
    pub file_path: String,
    pub namespace: String,
    pub state: Value,
    pub reducers: Vec<EntityId>,
    pub effects: Vec<EntityId>,
    pub subscriptions: Vec<EntityId>,
}

impl Module {
    pub fn new(file_path: &str, namespace: &str, state: Value) -> Self {
        Self {
            id: EntityId::model(file_path, namespace),
            file_path: file_path.to_string(),
            namespace: namespace.to_string(),
            state,
            reducers: Vec::new(),
            effects: Vec::new(),
            subscriptions: Vec::new(),
        }
    }

    pub fn handler_ids(&self, kind: HandlerKind) -> &[EntityId] {
        match kind {
            HandlerKind::Reducer => &self.reducers,
            HandlerKind::Effect => &self.effects,
            HandlerKind::Subscription => &self.subscriptions,
        }
    }

    pub fn handler_ids_mut(&mut self, kind: HandlerKind) -> &mut Vec<EntityId> {
        match kind {
            HandlerKind::Reducer => &mut self.reducers,
            HandlerKind::Effect => &mut self.effects,
            HandlerKind::Subscription => &mut self.subscriptions,
        }
    }

    /// Action key `namespace/name` for a handler living in this module.
    pub fn action_key(&self, name: &str) -> String {
        format!("{}/{}", self.namespace, name)
    }
}

/// A reducer, effect or subscription attached to a module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handler {
    #[serde(skip, default = "default_handler_kind")]
    pub kind: HandlerKind,
    pub id: EntityId,
    pub model_id: EntityId,
    pub file_path: String,
    pub name: String,
    pub source: String,
    /// Present for effects and subscriptions only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dispatches: Option<Vec<EntityId>>,
}

fn default_handler_kind() -> HandlerKind {
    HandlerKind::Reducer
}

impl Handler {
    pub fn new(kind: HandlerKind, model: &Module, name: &str, source: &str) -> Self {
        Self {
            kind,
            id: EntityId::handler(kind, &model.file_path, name),
            model_id: model.id.clone(),
            file_path: model.file_path.clone(),
            name: name.to_string(),
            source: source.to_string(),
            dispatches: kind.can_dispatch().then(Vec::new),
        }
    }
}

/// One route element found in the router file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteNode {
    #[serde(rename = "type")]
    pub tag: String,
    pub attributes: BTreeMap<String, Value>,
    pub children: Vec<RouteNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Router {
    pub id: EntityId,
    pub file_path: String,
    pub routes: Vec<RouteNode>,
}

/// A component bound to a route, resolved through the router's imports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteComponent {
    pub id: EntityId,
    pub file_path: String,
    pub component_name: String,
    pub import_path: String,
}

/// Handlers that emit (`input`) and handle (`output`) one action.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchEntry {
    pub input: Vec<EntityId>,
    pub output: Vec<EntityId>,
}

pub type DispatchIndex = BTreeMap<String, DispatchEntry>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelsView {
    pub data: Vec<Module>,
    pub reducer_by_ids: BTreeMap<EntityId, Handler>,
    pub effect_by_ids: BTreeMap<EntityId, Handler>,
    pub subscription_by_ids: BTreeMap<EntityId, Handler>,
}

impl ModelsView {
    pub fn handlers(&self, kind: HandlerKind) -> &BTreeMap<EntityId, Handler> {
        match kind {
            HandlerKind::Reducer => &self.reducer_by_ids,
            HandlerKind::Effect => &self.effect_by_ids,
            HandlerKind::Subscription => &self.subscription_by_ids,
        }
    }

    pub fn handlers_mut(&mut self, kind: HandlerKind) -> &mut BTreeMap<EntityId, Handler> {
        match kind {
            HandlerKind::Reducer => &mut self.reducer_by_ids,
            HandlerKind::Effect => &mut self.effect_by_ids,
            HandlerKind::Subscription => &mut self.subscription_by_ids,
        }
    }
}

/// Full state returned by every command.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub models: ModelsView,
    pub router: Option<Router>,
    pub route_components: Vec<RouteComponent>,
    pub dispatches: DispatchIndex,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reducer_serializes_without_dispatches() {
        let model = Module::new("./tmp/a.js", "count", json!(0));
        let reducer = Handler::new(HandlerKind::Reducer, &model, "add", "1");
        assert_eq!(
            serde_json::to_value(&reducer).unwrap(),
            json!({
                "id": "Reducer^^./tmp/a.js^^add",
                "modelId": "Model^^./tmp/a.js^^count",
                "filePath": "./tmp/a.js",
                "name": "add",
                "source": "1",
            })
        );

        let effect = Handler::new(HandlerKind::Effect, &model, "fetch", "1");
        assert_eq!(serde_json::to_value(&effect).unwrap()["dispatches"], json!([]));
    }

    #[test]
    fn empty_snapshot_shape() {
        assert_eq!(
            serde_json::to_value(Snapshot::default()).unwrap(),
            json!({
                "models": {
                    "data": [],
                    "reducerByIds": {},
                    "effectByIds": {},
                    "subscriptionByIds": {},
                },
                "router": null,
                "routeComponents": [],
                "dispatches": {},
            })
        );
    }
}
