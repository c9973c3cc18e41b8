use std::path::{Component, Path, PathBuf};

use tokio::fs;

use crate::error::{MirrorError, Result};
use crate::url_resolver::sanitize_segment;

/// Fixed subfolders created in every mirror.
pub const LAYOUT_DIRS: &[&str] = &["images", "css", "js", "external"];

pub const DOCUMENT_FILE: &str = "index.html";

/// The `cloned-<hostname>` output tree of one mirror.
#[derive(Debug, Clone)]
pub struct FileManager {
    base_dir: PathBuf,
}

impl FileManager {
    /// Directory name used for a mirror of `hostname`.
    pub fn directory_name(hostname: &str) -> String {
        format!("cloned-{}", sanitize_segment(hostname))
    }

    /// Creates (or reuses) `<output_root>/cloned-<hostname>` and its fixed subfolders.
    pub async fn create(output_root: &Path, hostname: &str) -> Result<Self> {
        let base_dir = output_root.join(Self::directory_name(hostname));

        for dir in std::iter::once(base_dir.clone()).chain(LAYOUT_DIRS.iter().map(|d| base_dir.join(d))) {
            fs::create_dir_all(&dir)
                .await
                .map_err(|e| MirrorError::filesystem(&dir, e))?;
        }

        Ok(Self { base_dir })
    }

    /// Opens an existing mirror without creating anything.
    pub fn open(base_dir: &Path) -> Self {
        Self {
            base_dir: base_dir.to_path_buf(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Joins a relative local path onto the base directory.
    ///
    /// Only normal components are kept, so `/`, `..` and prefixes can never
    /// move the result outside the base directory.
    pub fn path_for(&self, local_path: &str) -> PathBuf {
        let mut path = self.base_dir.clone();
        for component in Path::new(local_path).components() {
            if let Component::Normal(segment) = component {
                path.push(segment);
            }
        }
        path
    }

    /// Writes `content` to `local_path`, creating parent directories as needed.
    pub async fn save_file(&self, local_path: &str, content: &[u8]) -> Result<PathBuf> {
        let file_path = self.path_for(local_path);
        if file_path == self.base_dir {
            return Err(MirrorError::filesystem(
                file_path,
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty local path"),
            ));
        }

        if let Some(parent) = file_path.parent() {
            // create_dir_all succeeds when the directory already exists or
            // another task creates it concurrently.
            fs::create_dir_all(parent)
                .await
                .map_err(|e| MirrorError::filesystem(parent, e))?;
        }

        fs::write(&file_path, content)
            .await
            .map_err(|e| MirrorError::filesystem(&file_path, e))?;

        Ok(file_path)
    }

    pub async fn save_document(&self, html: &str) -> Result<PathBuf> {
        self.save_file(DOCUMENT_FILE, html.as_bytes()).await
    }

    pub async fn read_document(&self) -> Result<String> {
        let path = self.path_for(DOCUMENT_FILE);
        match fs::read_to_string(&path).await {
            Ok(html) => Ok(html),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(MirrorError::MissingDocument(self.base_dir.clone()))
            }
            Err(e) => Err(MirrorError::filesystem(path, e)),
        }
    }
}
