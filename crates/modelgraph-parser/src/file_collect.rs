use crate::language::has_supported_extension;
use ignore::{
    overrides::{Override, OverrideBuilder},
    WalkBuilder,
};
use modelgraph_core::{DiscoveryConfig, ModelGraphError, ModuleDiscovery, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Directory walker honouring `.gitignore`, extension filters and exclude globs.
#[derive(Debug, Clone, Default)]
pub struct WalkDiscovery {
    config: DiscoveryConfig,
}

impl WalkDiscovery {
    pub fn new(config: DiscoveryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }
}

impl ModuleDiscovery for WalkDiscovery {
    fn discover(&self, root: &Path) -> Result<Vec<PathBuf>> {
        collect_module_files(root, &self.config)
    }

    fn accepts(&self, root: &Path, path: &Path) -> Result<bool> {
        accepts_module_file(root, path, &self.config)
    }
}

/// Candidate module files below `dir`, sorted by path.
pub fn collect_module_files(dir: &Path, config: &DiscoveryConfig) -> Result<Vec<PathBuf>> {
    info!("Collecting module files from: {:?}", dir);
    debug!(
        "Collection config: recursive={}, extensions={:?}",
        config.recursive, config.extensions
    );

    if !dir.exists() {
        debug!("Scan root {:?} does not exist yet", dir);
        return Ok(Vec::new());
    }

    let overrides = build_overrides(dir, config)?;

    let mut walker_builder = WalkBuilder::new(dir);
    walker_builder
        .hidden(false)
        .git_ignore(true)
        .git_exclude(true)
        .ignore(true)
        .overrides(overrides);

    if !config.recursive {
        walker_builder.max_depth(Some(1));
        debug!("Non-recursive: limited to depth 1");
    }

    let mut paths = Vec::new();
    let mut total_files = 0;

    for dent in walker_builder.build() {
        let dent = match dent {
            Ok(d) => d,
            Err(e) => {
                warn!("Walker error: {}", e);
                continue;
            }
        };

        let path = dent.path();
        if !path.is_file() {
            continue;
        }
        total_files += 1;

        if !has_supported_extension(path, config) {
            continue;
        }
        paths.push(path.to_path_buf());
    }

    paths.sort();

    info!(
        "File collection complete: {} files found, {} passed filters",
        total_files,
        paths.len()
    );

    Ok(paths)
}

/// Whether the walk from `root` would yield `path`, judged by extension, depth and
/// override globs. `.gitignore` rules are only applied during the walk itself.
pub fn accepts_module_file(root: &Path, path: &Path, config: &DiscoveryConfig) -> Result<bool> {
    if !has_supported_extension(path, config) {
        return Ok(false);
    }
    let Ok(relative) = path.strip_prefix(root) else {
        return Ok(false);
    };
    let components: Vec<_> = relative.components().collect();
    if components.is_empty() || (!config.recursive && components.len() > 1) {
        return Ok(false);
    }

    let overrides = build_overrides(root, config)?;
    // Directories first: the walker never descends into an ignored one.
    let mut current = root.to_path_buf();
    for (position, component) in components.iter().enumerate() {
        current.push(component);
        let is_dir = position + 1 < components.len();
        if overrides.matched(&current, is_dir).is_ignore() {
            debug!("{:?} is excluded by discovery patterns", path);
            return Ok(false);
        }
    }
    Ok(true)
}

fn build_overrides(dir: &Path, config: &DiscoveryConfig) -> Result<Override> {
    let mut ovr = OverrideBuilder::new(dir);

    // Plain override globs whitelist, so excludes need the `!` form.
    for exclude in &config.exclude_patterns {
        let pattern = if exclude.starts_with('!') {
            exclude.clone()
        } else {
            format!("!{}", exclude)
        };
        ovr.add(&pattern).map_err(override_error)?;
        debug!("Added exclude pattern: {}", pattern);
    }

    for include in &config.include_patterns {
        let pattern = include.trim_start_matches('!');
        ovr.add(pattern).map_err(override_error)?;
        debug!("Added include pattern: {}", pattern);
    }

    ovr.build().map_err(override_error)
}

fn override_error(err: ignore::Error) -> ModelGraphError {
    ModelGraphError::Config(format!("invalid discovery pattern: {}", err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "export default {};\n").unwrap();
    }

    fn relative(root: &Path, paths: Vec<PathBuf>) -> Vec<String> {
        paths
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"))
            .collect()
    }

    #[test]
    fn filters_extensions_and_excludes() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "models/b.js");
        touch(dir.path(), "models/a.jsx");
        touch(dir.path(), "models/readme.md");
        touch(dir.path(), "node_modules/dep/index.js");
        touch(dir.path(), "router.js");

        let found = WalkDiscovery::default().discover(dir.path()).unwrap();
        assert_eq!(
            relative(dir.path(), found),
            vec!["models/a.jsx", "models/b.js", "router.js"]
        );
    }

    #[test]
    fn non_recursive_and_includes() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "top.js");
        touch(dir.path(), "models/a.js");
        touch(dir.path(), "services/api.js");

        let shallow = DiscoveryConfig {
            recursive: false,
            ..DiscoveryConfig::default()
        };
        let found = collect_module_files(dir.path(), &shallow).unwrap();
        assert_eq!(relative(dir.path(), found), vec!["top.js"]);

        let only_models = DiscoveryConfig {
            include_patterns: vec!["models/**".to_string()],
            ..DiscoveryConfig::default()
        };
        let found = collect_module_files(dir.path(), &only_models).unwrap();
        assert_eq!(relative(dir.path(), found), vec!["models/a.js"]);
    }

    #[test]
    fn missing_root_is_empty() {
        let dir = TempDir::new().unwrap();
        let found = WalkDiscovery::default()
            .discover(&dir.path().join("absent"))
            .unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn accepts_files_the_walk_would_find() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        let discovery = WalkDiscovery::default();
        let accepts = |relative: &str| discovery.accepts(root, &root.join(relative)).unwrap();

        assert!(accepts("models/a.js"));
        assert!(accepts("router.jsx"));
        assert!(!accepts("models/a.ts"));
        assert!(!accepts("dist/a.js"));
        assert!(!accepts("packages/ui/node_modules/dep/index.js"));

        touch(root, "models/a.js");
        touch(root, "dist/a.js");
        let found = relative(root, discovery.discover(root).unwrap());
        assert_eq!(found, vec!["models/a.js"]);

        let shallow = WalkDiscovery::new(DiscoveryConfig {
            recursive: false,
            include_patterns: vec!["*.js".to_string()],
            ..DiscoveryConfig::default()
        });
        assert!(shallow.accepts(root, &root.join("top.js")).unwrap());
        assert!(!shallow.accepts(root, &root.join("models/a.js")).unwrap());
        assert!(!shallow.accepts(root, &root.join("top.jsx")).unwrap());
        assert!(!shallow.accepts(root, Path::new("/elsewhere/top.js")).unwrap());
    }
}
