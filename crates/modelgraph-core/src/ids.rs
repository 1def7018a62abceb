use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::path::{Component, Path};
use std::str::FromStr;

/// Separator between the three parts of a composite identifier.
pub const ID_SEPARATOR: &str = "^^";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    Model,
    Reducer,
    Effect,
    Subscription,
    Router,
    RouteComponent,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Model => "Model",
            EntityKind::Reducer => "Reducer",
            EntityKind::Effect => "Effect",
            EntityKind::Subscription => "Subscription",
            EntityKind::Router => "Router",
            EntityKind::RouteComponent => "RouteComponent",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Model" => Ok(EntityKind::Model),
            "Reducer" => Ok(EntityKind::Reducer),
            "Effect" => Ok(EntityKind::Effect),
            "Subscription" => Ok(EntityKind::Subscription),
            "Router" => Ok(EntityKind::Router),
            "RouteComponent" => Ok(EntityKind::RouteComponent),
            other => Err(format!("unknown entity kind: {}", other)),
        }
    }
}

/// The three kinds of named behaviour a module can own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HandlerKind {
    Reducer,
    Effect,
    Subscription,
}

impl HandlerKind {
    pub const ALL: [HandlerKind; 3] = [
        HandlerKind::Reducer,
        HandlerKind::Effect,
        HandlerKind::Subscription,
    ];

    /// Property name of the collection inside the module literal.
    pub fn collection_key(&self) -> &'static str {
        match self {
            HandlerKind::Reducer => "reducers",
            HandlerKind::Effect => "effects",
            HandlerKind::Subscription => "subscriptions",
        }
    }

    pub fn from_collection_key(key: &str) -> Option<Self> {
        match key {
            "reducers" => Some(HandlerKind::Reducer),
            "effects" => Some(HandlerKind::Effect),
            "subscriptions" => Some(HandlerKind::Subscription),
            _ => None,
        }
    }

    pub fn entity_kind(&self) -> EntityKind {
        match self {
            HandlerKind::Reducer => EntityKind::Reducer,
            HandlerKind::Effect => EntityKind::Effect,
            HandlerKind::Subscription => EntityKind::Subscription,
        }
    }

    /// Reducers are pure and never dispatch; only effects and subscriptions are scanned.
    pub fn can_dispatch(&self) -> bool {
        !matches!(self, HandlerKind::Reducer)
    }
}

impl fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.entity_kind().as_str())
    }
}

impl FromStr for HandlerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "reducer" | "reducers" => Ok(HandlerKind::Reducer),
            "effect" | "effects" => Ok(HandlerKind::Effect),
            "subscription" | "subscriptions" => Ok(HandlerKind::Subscription),
            other => Err(format!("unknown handler kind: {}", other)),
        }
    }
}

/// Composite identifier `Kind^^filePath^^localName`.
///
/// For a module the local name is its namespace; for every other entity it is the
/// entity's own name, so child ids never depend on the owning namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId {
    pub kind: EntityKind,
    pub file_path: String,
    pub local_name: String,
}

impl EntityId {
    pub fn new(kind: EntityKind, file_path: impl Into<String>, local_name: impl Into<String>) -> Self {
        Self {
            kind,
            file_path: file_path.into(),
            local_name: local_name.into(),
        }
    }

    pub fn model(file_path: &str, namespace: &str) -> Self {
        Self::new(EntityKind::Model, file_path, namespace)
    }

    pub fn handler(kind: HandlerKind, file_path: &str, name: &str) -> Self {
        Self::new(kind.entity_kind(), file_path, name)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{sep}{}{sep}{}",
            self.kind,
            self.file_path,
            self.local_name,
            sep = ID_SEPARATOR
        )
    }
}

impl FromStr for EntityId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, ID_SEPARATOR);
        let (Some(kind), Some(file_path), Some(local_name)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return Err(format!("malformed entity id: {}", s));
        };
        Ok(EntityId::new(kind.parse()?, file_path, local_name))
    }
}

impl Serialize for EntityId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for EntityId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Canonical `./a/b.js` form used for file paths inside identifiers.
pub fn normalize_file_path(path: &str) -> String {
    let unified = path.replace('\\', "/");
    let mut rest = unified.as_str();
    while let Some(stripped) = rest.strip_prefix("./") {
        rest = stripped;
    }
    let rest = rest.trim_start_matches('/');
    format!("./{}", rest)
}

/// Canonical form of a file path that names a file strictly below the scan root.
///
/// `None` for empty paths, paths ending in a separator and paths with `.` or `..` segments.
pub fn contained_file_path(path: &str) -> Option<String> {
    let normalized = normalize_file_path(path);
    let rest = normalized.trim_start_matches("./");
    if rest.is_empty() || rest.split('/').any(|segment| matches!(segment, "" | "." | "..")) {
        return None;
    }
    Some(normalized)
}

/// Express `path` relative to `root` in canonical form, or `None` when it lies outside.
pub fn relative_file_path(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let segments: Vec<String> = relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(segment) => Some(segment.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    if segments.is_empty() {
        return None;
    }
    Some(format!("./{}", segments.join("/")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn formats_and_parses_composite_ids() {
        let id = EntityId::model("./tmp/a.js", "count");
        assert_eq!(id.to_string(), "Model^^./tmp/a.js^^count");
        assert_eq!("Model^^./tmp/a.js^^count".parse::<EntityId>().unwrap(), id);

        let reducer = EntityId::handler(HandlerKind::Reducer, "./tmp/a.js", "add");
        assert_eq!(reducer.to_string(), "Reducer^^./tmp/a.js^^add");
    }

    #[test]
    fn rejects_malformed_ids() {
        assert!("Model^^only-two".parse::<EntityId>().is_err());
        assert!("Widget^^./a.js^^x".parse::<EntityId>().is_err());
    }

    #[test]
    fn serializes_as_plain_string() {
        let id = EntityId::handler(HandlerKind::Effect, "./m.js", "fetch");
        let json = serde_json::to_value(&id).unwrap();
        assert_eq!(json, serde_json::json!("Effect^^./m.js^^fetch"));
        let back: EntityId = serde_json::from_value(json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn normalizes_paths() {
        assert_eq!(normalize_file_path("tmp/a.js"), "./tmp/a.js");
        assert_eq!(normalize_file_path("./tmp/a.js"), "./tmp/a.js");
        assert_eq!(normalize_file_path(".\\tmp\\a.js"), "./tmp/a.js");

        let root = PathBuf::from("/work/app");
        assert_eq!(
            relative_file_path(&root, &root.join("models").join("user.js")).as_deref(),
            Some("./models/user.js")
        );
        assert_eq!(relative_file_path(&root, Path::new("/elsewhere/x.js")), None);
    }

    #[test]
    fn contained_paths_stay_below_root() {
        assert_eq!(contained_file_path("models/a.js").as_deref(), Some("./models/a.js"));
        assert_eq!(contained_file_path("/models/a.js").as_deref(), Some("./models/a.js"));
        assert_eq!(contained_file_path("../escape.js"), None);
        assert_eq!(contained_file_path("./models/../../escape.js"), None);
        assert_eq!(contained_file_path("models\\..\\a.js"), None);
        assert_eq!(contained_file_path("models//a.js"), None);
        assert_eq!(contained_file_path("./"), None);
        assert_eq!(contained_file_path(""), None);
    }

    #[test]
    fn handler_kind_collection_keys() {
        for kind in HandlerKind::ALL {
            assert_eq!(HandlerKind::from_collection_key(kind.collection_key()), Some(kind));
        }
        assert!(!HandlerKind::Reducer.can_dispatch());
        assert!(HandlerKind::Subscription.can_dispatch());
    }
}
