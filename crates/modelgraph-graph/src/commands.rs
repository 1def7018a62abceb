// ABOUTME: Named editing commands over a scan root: rescan, validate, rewrite, write, snapshot.
// ABOUTME: Each call builds a fresh store; nothing is cached between commands.

use crate::io::FsSourceIo;
use crate::store::ModuleGraphStore;
use modelgraph_core::{
    contained_file_path, HandlerKind, ModelGraphConfig, ModelGraphError, ModuleDiscovery, Result, Snapshot,
    SourceIo,
};
use modelgraph_parser::{apply, SourceEdit, WalkDiscovery};
use serde::Deserialize;
use serde_json::Value;
use std::path::PathBuf;
use tracing::info;

const COMMAND_PREFIX: &str = "models.";

/// Fields a command may read; which ones are required depends on the command.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payload {
    pub file_path: Option<String>,
    pub source_path: Option<String>,
    pub namespace: Option<String>,
    pub new_namespace: Option<String>,
    pub name: Option<String>,
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Load,
    Create {
        namespace: String,
    },
    UpdateNamespace {
        namespace: String,
        new_namespace: String,
    },
    UpdateState {
        namespace: String,
        source: String,
    },
    AddHandler {
        kind: HandlerKind,
        namespace: String,
        name: String,
        source: String,
    },
    UpdateHandler {
        kind: HandlerKind,
        namespace: String,
        name: String,
        source: String,
    },
    RemoveHandler {
        kind: HandlerKind,
        namespace: String,
        name: String,
    },
}

impl Command {
    /// Resolve a command name (with or without the `models.` prefix) against its payload.
    pub fn parse(command_name: &str, payload: &Payload) -> Result<Self> {
        let name = command_name.strip_prefix(COMMAND_PREFIX).unwrap_or(command_name);
        let field = |value: &Option<String>, key: &str| -> Result<String> {
            value.clone().ok_or_else(|| ModelGraphError::InvalidPayload {
                command: name.to_string(),
                reason: format!("missing field '{}'", key),
            })
        };
        let namespace = || field(&payload.namespace, "namespace");
        let handler_name = || field(&payload.name, "name");
        let source = || field(&payload.source, "source");

        let command = match name {
            "load" => Command::Load,
            "create" => Command::Create {
                namespace: namespace()?,
            },
            "updateNamespace" => Command::UpdateNamespace {
                namespace: namespace()?,
                new_namespace: field(&payload.new_namespace, "newNamespace")?,
            },
            "updateState" => Command::UpdateState {
                namespace: namespace()?,
                source: source()?,
            },
            _ => {
                let (verb, kind) = split_handler_command(name)
                    .ok_or_else(|| ModelGraphError::UnknownCommand(command_name.to_string()))?;
                match verb {
                    "add" => Command::AddHandler {
                        kind,
                        namespace: namespace()?,
                        name: handler_name()?,
                        source: source()?,
                    },
                    "update" => Command::UpdateHandler {
                        kind,
                        namespace: namespace()?,
                        name: handler_name()?,
                        source: source()?,
                    },
                    _ => Command::RemoveHandler {
                        kind,
                        namespace: namespace()?,
                        name: handler_name()?,
                    },
                }
            }
        };
        Ok(command)
    }

    pub fn name(&self) -> String {
        match self {
            Command::Load => "load".to_string(),
            Command::Create { .. } => "create".to_string(),
            Command::UpdateNamespace { .. } => "updateNamespace".to_string(),
            Command::UpdateState { .. } => "updateState".to_string(),
            Command::AddHandler { kind, .. } => format!("add{}", kind),
            Command::UpdateHandler { kind, .. } => format!("update{}", kind),
            Command::RemoveHandler { kind, .. } => format!("remove{}", kind),
        }
    }

    fn namespace(&self) -> Option<&str> {
        match self {
            Command::Load | Command::Create { .. } => None,
            Command::UpdateNamespace { namespace, .. }
            | Command::UpdateState { namespace, .. }
            | Command::AddHandler { namespace, .. }
            | Command::UpdateHandler { namespace, .. }
            | Command::RemoveHandler { namespace, .. } => Some(namespace),
        }
    }

    fn edit(&self) -> Option<SourceEdit> {
        let edit = match self {
            Command::Load => return None,
            Command::Create { namespace } => SourceEdit::CreateModule {
                namespace: namespace.clone(),
            },
            Command::UpdateNamespace { new_namespace, .. } => SourceEdit::SetNamespace {
                namespace: new_namespace.clone(),
            },
            Command::UpdateState { source, .. } => SourceEdit::SetState {
                source: source.clone(),
            },
            Command::AddHandler {
                kind, name, source, ..
            } => SourceEdit::AddHandler {
                kind: *kind,
                name: name.clone(),
                source: source.clone(),
            },
            Command::UpdateHandler {
                kind, name, source, ..
            } => SourceEdit::UpdateHandler {
                kind: *kind,
                name: name.clone(),
                source: source.clone(),
            },
            Command::RemoveHandler { kind, name, .. } => SourceEdit::RemoveHandler {
                kind: *kind,
                name: name.clone(),
            },
        };
        Some(edit)
    }
}

/// `addReducer` → (`add`, Reducer) and so on for every handler kind.
fn split_handler_command(name: &str) -> Option<(&str, HandlerKind)> {
    for verb in ["add", "update", "remove"] {
        if let Some(rest) = name.strip_prefix(verb) {
            let kind = HandlerKind::ALL
                .into_iter()
                .find(|kind| kind.to_string() == rest)?;
            return Some((verb, kind));
        }
    }
    None
}

pub struct CommandProcessor {
    config: ModelGraphConfig,
    discovery: Box<dyn ModuleDiscovery>,
    io: Box<dyn SourceIo>,
}

impl CommandProcessor {
    /// Processor over the local file system with directory-walk discovery.
    pub fn new(config: ModelGraphConfig) -> Self {
        let discovery = WalkDiscovery::new(config.discovery.clone());
        Self::with_io(config, Box::new(discovery), Box::new(FsSourceIo))
    }

    pub fn with_io(config: ModelGraphConfig, discovery: Box<dyn ModuleDiscovery>, io: Box<dyn SourceIo>) -> Self {
        Self { config, discovery, io }
    }

    pub fn config(&self) -> &ModelGraphConfig {
        &self.config
    }

    /// Run one named command and return the snapshot after it.
    pub fn execute(&self, command_name: &str, payload: &Value) -> Result<Snapshot> {
        let bare_name = command_name.strip_prefix(COMMAND_PREFIX).unwrap_or(command_name);
        let payload: Payload =
            serde_json::from_value(payload.clone()).map_err(|err| ModelGraphError::InvalidPayload {
                command: bare_name.to_string(),
                reason: err.to_string(),
            })?;
        let command = Command::parse(command_name, &payload)?;
        self.run(&command, &payload)
    }

    pub fn run(&self, command: &Command, payload: &Payload) -> Result<Snapshot> {
        let invalid = |reason: String| ModelGraphError::InvalidPayload {
            command: command.name(),
            reason,
        };
        let root = PathBuf::from(
            payload
                .source_path
                .as_deref()
                .ok_or_else(|| invalid("missing field 'sourcePath'".to_string()))?,
        );
        let edit = command.edit();
        let target = match &edit {
            Some(_) => {
                let raw = payload
                    .file_path
                    .as_deref()
                    .ok_or_else(|| invalid("missing field 'filePath'".to_string()))?;
                let file_path = contained_file_path(raw)
                    .ok_or_else(|| invalid(format!("filePath '{}' must name a file inside the scan root", raw)))?;
                Some(file_path)
            }
            None => None,
        };

        let mut store = ModuleGraphStore::load(&root, self.discovery.as_ref(), self.io.as_ref(), &self.config)?;
        let (Some(edit), Some(file_path)) = (edit, target) else {
            return Ok(store.snapshot());
        };

        let absolute = store.absolute_path(&file_path);
        let text = self.io.read_text(&absolute)?;
        // The next scan has to see whatever the edit leaves behind.
        if !store.is_discovered(&file_path) {
            let creatable = text.is_none() && self.discovery.accepts(&root, &absolute)?;
            if !creatable {
                return Err(invalid(format!(
                    "'{}' is not a module file under the discovery settings",
                    file_path
                )));
            }
        }

        self.validate_target(&store, command, &file_path)?;

        let new_text = apply(&file_path, text.as_deref().unwrap_or_default(), &edit)?;
        self.io.write_text(&absolute, &new_text)?;
        store.refresh_file(&file_path, &new_text)?;

        info!("{} applied to {}", command.name(), file_path);
        Ok(store.snapshot())
    }

    fn validate_target(&self, store: &ModuleGraphStore, command: &Command, file_path: &str) -> Result<()> {
        if let Command::Create { .. } = command {
            // One module per file.
            if let Some(existing) = store.module_at(file_path) {
                return Err(ModelGraphError::DuplicateModule {
                    file: file_path.to_string(),
                    namespace: existing.module.namespace.clone(),
                });
            }
            return Ok(());
        }

        let Some(namespace) = command.namespace() else {
            return Ok(());
        };
        if store.find_module(file_path, namespace).is_none() {
            return Err(ModelGraphError::ModuleNotFound {
                file: file_path.to_string(),
                namespace: namespace.to_string(),
            });
        }

        match command {
            Command::AddHandler { kind, name, .. } => {
                if store.handler(*kind, file_path, name).is_some() {
                    return Err(ModelGraphError::DuplicateHandler {
                        kind: *kind,
                        file: file_path.to_string(),
                        name: name.clone(),
                    });
                }
            }
            Command::UpdateHandler { kind, name, .. } | Command::RemoveHandler { kind, name, .. } => {
                if store.handler(*kind, file_path, name).is_none() {
                    return Err(ModelGraphError::HandlerNotFound {
                        kind: *kind,
                        file: file_path.to_string(),
                        name: name.clone(),
                    });
                }
            }
            _ => {}
        }
        Ok(())
    }
}
