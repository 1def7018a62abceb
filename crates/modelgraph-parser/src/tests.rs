use crate::{apply, parse_module, SourceEdit};
use modelgraph_core::HandlerKind;
use serde_json::json;

const USERS: &str = r#"import * as usersService from '../services/users';

export default {
  namespace: 'users',
  state: {
    list: [],
    total: null,
    page: 1,
  },
  reducers: {
    save(state, { payload: { data: list, total, page } }) {
      return { ...state, list, total, page };
    },
  },
  effects: {
    *fetch({ payload: { page = 1 } }, { call, put }) {
      const { data, headers } = yield call(usersService.fetch, { page });
      yield put({ type: 'save', payload: { data, total: headers['x-total-count'], page } });
    },
    *remove({ payload: id }, { call, put }) {
      yield call(usersService.remove, id);
      yield put({ type: 'reload' });
    },
  },
  subscriptions: {
    setup({ dispatch, history }) {
      return history.listen(({ pathname, query }) => {
        if (pathname === '/users') {
          dispatch({ type: 'fetch', payload: query });
        }
      });
    },
  },
};
"#;

fn handler_names(text: &str, kind: HandlerKind) -> Vec<String> {
    parse_module("./models/users.js", text)
        .unwrap()
        .handlers_of(kind)
        .map(|handler| handler.name.clone())
        .collect()
}

#[test]
fn parses_realistic_module() {
    let parsed = parse_module("./models/users.js", USERS).unwrap();
    assert_eq!(parsed.module.namespace, "users");
    assert_eq!(parsed.module.state, json!({"list": [], "total": null, "page": 1}));
    assert_eq!(handler_names(USERS, HandlerKind::Reducer), vec!["save"]);
    assert_eq!(handler_names(USERS, HandlerKind::Effect), vec!["fetch", "remove"]);
    assert_eq!(handler_names(USERS, HandlerKind::Subscription), vec!["setup"]);
}

#[test]
fn edit_sequence_keeps_other_handlers_intact() {
    let path = "./models/users.js";
    let original = parse_module(path, USERS).unwrap();

    let added = apply(
        path,
        USERS,
        &SourceEdit::AddHandler {
            kind: HandlerKind::Effect,
            name: "reload".to_string(),
            source: "function*(action, { put, select }) { yield put({ type: 'fetch' }); }".to_string(),
        },
    )
    .unwrap();
    assert_eq!(handler_names(&added, HandlerKind::Effect), vec!["fetch", "remove", "reload"]);

    let removed = apply(
        path,
        &added,
        &SourceEdit::RemoveHandler {
            kind: HandlerKind::Effect,
            name: "remove".to_string(),
        },
    )
    .unwrap();
    assert_eq!(handler_names(&removed, HandlerKind::Effect), vec!["fetch", "reload"]);

    let reparsed = parse_module(path, &removed).unwrap();
    for kind in [HandlerKind::Reducer, HandlerKind::Subscription] {
        let before: Vec<_> = original.handlers_of(kind).map(|h| &h.source).collect();
        let after: Vec<_> = reparsed.handlers_of(kind).map(|h| &h.source).collect();
        assert_eq!(before, after);
    }
    assert_eq!(
        reparsed.handler(HandlerKind::Effect, "fetch").unwrap().source,
        original.handler(HandlerKind::Effect, "fetch").unwrap().source
    );
    assert!(removed.starts_with("import * as usersService from '../services/users';\n"));
}

#[test]
fn state_update_round_trips() {
    let path = "./models/users.js";
    let edit = SourceEdit::SetState {
        source: "{ list: [], total: 0 }".to_string(),
    };
    let once = apply(path, USERS, &edit).unwrap();
    let twice = apply(path, &once, &edit).unwrap();
    assert_eq!(once, twice);
    assert_eq!(
        parse_module(path, &twice).unwrap().module.state,
        json!({"list": [], "total": 0})
    );
}

#[test]
fn rename_changes_only_the_model_id() {
    let path = "./models/users.js";
    let renamed = apply(
        path,
        USERS,
        &SourceEdit::SetNamespace {
            namespace: "members".to_string(),
        },
    )
    .unwrap();
    let before = parse_module(path, USERS).unwrap();
    let after = parse_module(path, &renamed).unwrap();
    assert_eq!(after.module.id.to_string(), "Model^^./models/users.js^^members");
    assert_eq!(before.module.reducers, after.module.reducers);
    assert_eq!(before.module.effects, after.module.effects);
    assert_eq!(renamed.len(), USERS.len() + "members".len() - "users".len());
}
