// ABOUTME: In-memory graph of every module found below a scan root.
// ABOUTME: Built fresh per command; snapshots recompute the dispatch graph each time.

use crate::dispatch::DispatchGraphBuilder;
use modelgraph_core::{
    normalize_file_path, relative_file_path, EntityId, EntityKind, Handler, HandlerKind, ModelGraphConfig,
    ModelsView, Module, ModuleDiscovery, Result, RouteComponent, Snapshot, SourceIo,
};
use modelgraph_parser::{parse_module, parse_router, ParsedModule, ParsedRouter};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// A discovered file that did not yield a module or router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    pub file_path: String,
    pub reason: String,
}

pub struct ModuleGraphStore {
    root: PathBuf,
    config: ModelGraphConfig,
    dispatch: DispatchGraphBuilder,
    /// Keyed by canonical file path, which is also the snapshot order
    modules: BTreeMap<String, ParsedModule>,
    router: Option<ParsedRouter>,
    route_components: Vec<RouteComponent>,
    skipped: Vec<SkippedFile>,
    /// Every file the last scan returned, parsed or not
    discovered: BTreeSet<String>,
}

impl ModuleGraphStore {
    pub fn new(root: &Path, config: &ModelGraphConfig) -> Self {
        Self {
            root: root.to_path_buf(),
            config: config.clone(),
            dispatch: DispatchGraphBuilder::from_config(&config.dispatch),
            modules: BTreeMap::new(),
            router: None,
            route_components: Vec::new(),
            skipped: Vec::new(),
            discovered: BTreeSet::new(),
        }
    }

    /// Scan `root` and parse every discovered file.
    pub fn load(
        root: &Path,
        discovery: &dyn ModuleDiscovery,
        io: &dyn SourceIo,
        config: &ModelGraphConfig,
    ) -> Result<Self> {
        let mut store = Self::new(root, config);

        for path in discovery.discover(root)? {
            let Some(file_path) = relative_file_path(root, &path) else {
                debug!("Ignoring {:?}: outside of scan root", path);
                continue;
            };
            store.discovered.insert(file_path.clone());
            let Some(text) = io.read_text(&path)? else {
                continue;
            };
            // Parse failures are recorded in `skipped`; the scan goes on.
            let _ = store.ingest(&file_path, &text);
        }

        info!(
            "Loaded {} modules from {:?} ({} files skipped)",
            store.modules.len(),
            root,
            store.skipped.len()
        );
        Ok(store)
    }

    /// Location on disk of a canonical `./…` file path.
    pub fn absolute_path(&self, file_path: &str) -> PathBuf {
        self.root.join(normalize_file_path(file_path).trim_start_matches("./"))
    }

    /// Re-parse one file and replace whatever the store held for it.
    pub fn refresh_file(&mut self, file_path: &str, text: &str) -> Result<()> {
        let file_path = normalize_file_path(file_path);
        self.ingest(&file_path, text)
    }

    /// Whether the scan this store was loaded from returned `file_path`.
    pub fn is_discovered(&self, file_path: &str) -> bool {
        self.discovered.contains(&normalize_file_path(file_path))
    }

    pub fn module_at(&self, file_path: &str) -> Option<&ParsedModule> {
        self.modules.get(&normalize_file_path(file_path))
    }

    pub fn find_module(&self, file_path: &str, namespace: &str) -> Option<&Module> {
        self.module_at(file_path)
            .map(|parsed| &parsed.module)
            .filter(|module| module.namespace == namespace)
    }

    pub fn handler(&self, kind: HandlerKind, file_path: &str, name: &str) -> Option<&Handler> {
        self.module_at(file_path)
            .and_then(|parsed| parsed.handler(kind, name))
    }

    pub fn modules(&self) -> impl Iterator<Item = &Module> {
        self.modules.values().map(|parsed| &parsed.module)
    }

    pub fn skipped(&self) -> &[SkippedFile] {
        &self.skipped
    }

    pub fn snapshot(&self) -> Snapshot {
        let mut models = ModelsView::default();
        for parsed in self.modules.values() {
            for handler in &parsed.handlers {
                models
                    .handlers_mut(handler.kind)
                    .insert(handler.id.clone(), handler.clone());
            }
            models.data.push(parsed.module.clone());
        }
        let dispatches = self.dispatch.build(&mut models);

        Snapshot {
            models,
            router: self.router.as_ref().map(|parsed| parsed.router.clone()),
            route_components: self.route_components.clone(),
            dispatches,
        }
    }

    fn ingest(&mut self, file_path: &str, text: &str) -> Result<()> {
        self.skipped.retain(|skipped| skipped.file_path != file_path);

        if self.is_router_file(file_path) {
            return self.ingest_router(file_path, text);
        }

        match parse_module(file_path, text) {
            Ok(parsed) => {
                debug!("Indexed module '{}' from {}", parsed.module.namespace, file_path);
                self.modules.insert(file_path.to_string(), parsed);
                Ok(())
            }
            Err(err) => {
                warn!("Skipping {}: {}", file_path, err);
                self.modules.remove(file_path);
                self.skip(file_path, &err.to_string());
                Err(err)
            }
        }
    }

    fn ingest_router(&mut self, file_path: &str, text: &str) -> Result<()> {
        if let Some(existing) = &self.router {
            if existing.router.file_path != file_path {
                debug!(
                    "Ignoring router candidate {}; already using {}",
                    file_path, existing.router.file_path
                );
                return Ok(());
            }
        }

        match parse_router(file_path, text, &self.config.router) {
            Ok(parsed) => {
                self.route_components = self.resolve_components(&parsed);
                debug!(
                    "Indexed router {} with {} route components",
                    file_path,
                    self.route_components.len()
                );
                self.router = Some(parsed);
                Ok(())
            }
            Err(err) => {
                warn!("Skipping router {}: {}", file_path, err);
                self.router = None;
                self.route_components.clear();
                self.skip(file_path, &err.to_string());
                Err(err)
            }
        }
    }

    fn skip(&mut self, file_path: &str, reason: &str) {
        self.skipped.push(SkippedFile {
            file_path: file_path.to_string(),
            reason: reason.to_string(),
        });
    }

    fn is_router_file(&self, file_path: &str) -> bool {
        let file_name = file_path.rsplit('/').next().unwrap_or(file_path);
        self.config
            .router
            .file_names
            .iter()
            .any(|candidate| candidate == file_name)
    }

    fn resolve_components(&self, parsed: &ParsedRouter) -> Vec<RouteComponent> {
        let mut components: Vec<RouteComponent> = Vec::new();
        for import in &parsed.components {
            let Some(file_path) = self.resolve_import(&parsed.router.file_path, &import.import_path) else {
                debug!("Route component {} imports a package; ignored", import.component_name);
                continue;
            };
            let id = EntityId::new(EntityKind::RouteComponent, file_path.as_str(), import.component_name.as_str());
            if components.iter().any(|component| component.id == id) {
                continue;
            }
            components.push(RouteComponent {
                id,
                file_path,
                component_name: import.component_name.clone(),
                import_path: import.import_path.clone(),
            });
        }
        components
    }

    /// Root-relative path of a relative import made from `from_file`.
    fn resolve_import(&self, from_file: &str, import_path: &str) -> Option<String> {
        if !(import_path.starts_with("./") || import_path.starts_with("../")) {
            return None;
        }
        let mut segments: Vec<&str> = from_file.trim_start_matches("./").split('/').collect();
        segments.pop();
        for part in import_path.split('/') {
            match part {
                "" | "." => {}
                ".." => {
                    segments.pop()?;
                }
                other => segments.push(other),
            }
        }
        Some(self.probe_extension(&format!("./{}", segments.join("/"))))
    }

    fn probe_extension(&self, base: &str) -> String {
        let extensions = &self.config.discovery.extensions;
        let has_extension = Path::new(base)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
            .unwrap_or(false);
        if has_extension {
            return base.to_string();
        }

        let candidates = extensions
            .iter()
            .map(|ext| format!("{}.{}", base, ext))
            .chain(extensions.iter().map(|ext| format!("{}/index.{}", base, ext)));
        for candidate in candidates {
            if self.absolute_path(&candidate).is_file() {
                return candidate;
            }
        }
        base.to_string()
    }
}
