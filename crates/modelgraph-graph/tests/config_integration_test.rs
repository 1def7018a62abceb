use modelgraph_core::ConfigManager;
use modelgraph_graph::CommandProcessor;
use serde_json::json;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write_file(root: &Path, relative: &str, text: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, text).unwrap();
}

#[test]
fn configured_discovery_and_dispatch_are_used() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("modelgraph.toml");
    fs::write(
        &config_path,
        r#"
[discovery]
exclude_patterns = ["**/legacy/**"]

[router]
file_names = ["routes.js"]

[dispatch]
callees = ["emit"]
"#,
    )
    .unwrap();

    let root = dir.path().join("app");
    write_file(
        &root,
        "models/count.js",
        r#"export default {
  namespace: 'count',
  reducers: { add: (n) => n + 1 },
  effects: {
    *bump(_, { put, emit }) {
      yield emit({ type: 'add' });
      yield put({ type: 'add' });
    },
  },
};
"#,
    );
    write_file(&root, "legacy/old.js", "export default { namespace: 'old' };");
    write_file(&root, "router.js", "export default { namespace: 'notARouter' };");
    write_file(&root, "routes.js", "export default () => null;");

    let manager = ConfigManager::from_path(&config_path).unwrap();
    let processor = CommandProcessor::new(manager.config().clone());
    let snapshot = processor
        .execute("models.load", &json!({ "sourcePath": root.to_string_lossy() }))
        .unwrap();

    let namespaces: Vec<_> = snapshot.models.data.iter().map(|m| m.namespace.as_str()).collect();
    assert_eq!(namespaces, vec!["count", "notARouter"]);

    let add = &snapshot.dispatches["count/add"];
    assert_eq!(add.input.len(), 1);
    assert_eq!(add.input[0].to_string(), "Effect^^./models/count.js^^bump");

    let router = snapshot.router.unwrap();
    assert_eq!(router.file_path, "./routes.js");
    assert!(router.routes.is_empty());
}

#[test]
fn invalid_config_is_rejected() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("modelgraph.toml");
    fs::write(&config_path, "[logging]\nlevel = \"chatty\"\n").unwrap();
    assert!(ConfigManager::from_path(&config_path).is_err());

    assert!(ConfigManager::from_path(&dir.path().join("missing.toml")).is_err());
}
