// ABOUTME: Derives the action dispatch graph from the handlers of every loaded module.
// ABOUTME: Output comes from reducers and effects, input from effects and subscriptions.

use modelgraph_core::{DispatchConfig, DispatchIndex, EntityId, HandlerKind, ModelsView};
use modelgraph_parser::{qualify_action, CalleeMatcher, DispatchMatcher, DispatchVisitor};
use tracing::debug;

/// Handler kinds that handle actions dispatched under their `namespace/name` key.
const OUTPUT_KINDS: [HandlerKind; 2] = [HandlerKind::Reducer, HandlerKind::Effect];

pub struct DispatchGraphBuilder {
    matchers: Vec<Box<dyn DispatchMatcher + Send + Sync>>,
}

impl DispatchGraphBuilder {
    pub fn new(matchers: Vec<Box<dyn DispatchMatcher + Send + Sync>>) -> Self {
        Self { matchers }
    }

    pub fn from_config(config: &DispatchConfig) -> Self {
        Self::new(vec![Box::new(CalleeMatcher::from_config(config))])
    }

    pub fn with_matcher(mut self, matcher: Box<dyn DispatchMatcher + Send + Sync>) -> Self {
        self.matchers.push(matcher);
        self
    }

    /// Rebuild the index from scratch and refill every dispatching handler's `dispatches`.
    pub fn build(&self, models: &mut ModelsView) -> DispatchIndex {
        let mut index = DispatchIndex::new();

        for module in &models.data {
            for kind in OUTPUT_KINDS {
                for id in module.handler_ids(kind) {
                    let entry = index.entry(module.action_key(&id.local_name)).or_default();
                    push_unique(&mut entry.output, id);
                }
            }
        }

        let mut emitters = Vec::new();
        for module in &models.data {
            for kind in HandlerKind::ALL.into_iter().filter(HandlerKind::can_dispatch) {
                for id in module.handler_ids(kind) {
                    emitters.push((module.namespace.clone(), kind, id.clone()));
                }
            }
        }

        let visitor = DispatchVisitor::new(&self.matchers);
        for (namespace, kind, id) in emitters {
            let Some(handler) = models.handlers_mut(kind).get_mut(&id) else {
                continue;
            };
            let mut dispatches = Vec::new();
            for action in visitor.collect(&handler.source) {
                let key = qualify_action(&namespace, &action);
                let Some(entry) = index.get_mut(&key) else {
                    debug!("{} dispatches unknown action '{}'", id, key);
                    continue;
                };
                push_unique(&mut entry.input, &id);
                for output in &entry.output {
                    push_unique(&mut dispatches, output);
                }
            }
            handler.dispatches = Some(dispatches);
        }

        debug!("Dispatch graph has {} actions", index.len());
        index
    }
}

fn push_unique(ids: &mut Vec<EntityId>, id: &EntityId) {
    if !ids.contains(id) {
        ids.push(id.clone());
    }
}
