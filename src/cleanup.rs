use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::Result;
use crate::file_manager::{FileManager, DOCUMENT_FILE};
use crate::html_parser::{get_attr, set_attr, Document};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupReport {
    pub document: PathBuf,
    pub references_fixed: usize,
}

impl CleanupReport {
    pub fn message(&self) -> String {
        format!(
            "Asset references cleaned up in {} ({} fixed)",
            self.document.display(),
            self.references_fixed
        )
    }
}

/// Normalizes local asset references in an existing mirror's `index.html`.
///
/// Repeated slashes collapse and leading slashes are dropped; remote, protocol-relative
/// and inline references are left alone. The document is only rewritten when a
/// reference changed, so running this on a clean mirror does nothing.
pub async fn fix_asset_paths(directory: &Path) -> Result<CleanupReport> {
    let files = FileManager::open(directory);
    let html = files.read_document().await?;
    let document = Document::parse(&html);

    info!("🔧 Final asset path cleanup...");
    let mut references_fixed = 0;
    for (tag, attr) in [("img", "src"), ("link", "href"), ("script", "src")] {
        for element in document.find(tag) {
            if tag == "link" && !is_stylesheet_link(&element) {
                continue;
            }
            let Some(value) = get_attr(&element, attr) else {
                continue;
            };
            if let Some(clean) = clean_reference(&value) {
                set_attr(&element, attr, &clean);
                references_fixed += 1;
            }
        }
    }

    if references_fixed > 0 {
        files.save_document(&document.serialize()?).await?;
    }

    Ok(CleanupReport {
        document: files.path_for(DOCUMENT_FILE),
        references_fixed,
    })
}

fn is_stylesheet_link(element: &markup5ever_rcdom::Handle) -> bool {
    get_attr(element, "rel").is_some_and(|rel| {
        rel.split_ascii_whitespace()
            .any(|token| token.eq_ignore_ascii_case("stylesheet"))
    })
}

/// The cleaned form of a local reference, or `None` when nothing changes.
fn clean_reference(value: &str) -> Option<String> {
    if value.starts_with("http") || value.starts_with("//") || value.starts_with("data:") {
        return None;
    }

    let mut clean = String::with_capacity(value.len());
    for c in value.chars() {
        if c == '/' && (clean.is_empty() || clean.ends_with('/')) {
            continue;
        }
        clean.push(c);
    }

    (clean != value).then_some(clean)
}
