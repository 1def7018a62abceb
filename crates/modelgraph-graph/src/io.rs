use modelgraph_core::{Result, SourceIo};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;

/// Local file system access; writes go through a sibling temp file and an atomic rename.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsSourceIo;

impl SourceIo for FsSourceIo {
    fn read_text(&self, path: &Path) -> Result<Option<String>> {
        match fs::read_to_string(path) {
            Ok(text) => Ok(Some(text)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn write_text(&self, path: &Path, text: &str) -> Result<()> {
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent)?;

        let mut temp_file = NamedTempFile::new_in(parent)?;
        temp_file.write_all(text.as_bytes())?;
        temp_file.flush()?;

        if let Ok(meta) = fs::metadata(path) {
            fs::set_permissions(temp_file.path(), meta.permissions())?;
        }

        temp_file.persist(path).map_err(|e| e.error)?;
        debug!("Wrote {} bytes to {:?}", text.len(), path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn writes_into_new_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tmp/nested/a.js");
        let io = FsSourceIo;

        assert_eq!(io.read_text(&path).unwrap(), None);
        io.write_text(&path, "export default {};\n").unwrap();
        assert_eq!(io.read_text(&path).unwrap().as_deref(), Some("export default {};\n"));

        io.write_text(&path, "").unwrap();
        assert_eq!(io.read_text(&path).unwrap().as_deref(), Some(""));
        assert_eq!(fs::read_dir(path.parent().unwrap()).unwrap().count(), 1);
    }
}
