use std::path::{Component, Path};
use std::sync::LazyLock;

use regex::{Captures, Regex};
use tracing::{debug, warn};
use url::{Origin, Url};

use crate::url_resolver::{is_fetchable, is_inline_data, local_path, resolve, split_fragment};

/// `url(...)` with a double-quoted, single-quoted or bare argument.
static CSS_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)url\s*\(\s*(?:"([^"]*)"|'([^']*)'|([^"'()\s]+))\s*\)"#)
        .expect("css url pattern is valid")
});

/// Result of rewriting one piece of CSS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CssRewrite {
    pub text: String,
    /// Absolute URLs referenced by the CSS, fragment stripped, in source order.
    pub discovered: Vec<Url>,
    pub substitutions: usize,
}

/// Rewrites `url()` references in CSS text to local mirror paths.
#[derive(Debug, Clone)]
pub struct CssRewriter {
    target_origin: Origin,
}

impl CssRewriter {
    pub fn new(target_origin: Origin) -> Self {
        Self { target_origin }
    }

    /// Rewrites every remote `url()` in `css`.
    ///
    /// References resolve against `base`. Rewritten references are relative to
    /// `from_dir`, the directory (inside the output root) of the file the CSS
    /// ends up in: empty for the page itself.
    pub fn rewrite(&self, css: &str, base: &Url, from_dir: &Path) -> CssRewrite {
        let mut discovered = Vec::new();
        let mut substitutions = 0;

        let text = CSS_URL.replace_all(css, |caps: &Captures| {
            let original = caps[0].to_string();
            let Some(reference) = caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3)) else {
                return original;
            };
            let reference = reference.as_str().trim();
            if reference.is_empty() || reference.starts_with('#') || is_inline_data(reference) {
                return original;
            }

            let absolute = match resolve(reference, base) {
                Ok(url) => url,
                Err(e) => {
                    warn!("⚠️ Failed to process CSS URL {}: {}", reference, e);
                    return original;
                }
            };
            if !is_fetchable(&absolute) {
                debug!("Skipping non-HTTP CSS reference {}", absolute);
                return original;
            }

            let (absolute, fragment) = split_fragment(&absolute);
            let local = relative_reference(&local_path(&absolute, &self.target_origin), from_dir);
            discovered.push(absolute);
            substitutions += 1;

            match fragment {
                Some(fragment) => format!("url(\"{}#{}\")", local, fragment),
                None => format!("url(\"{}\")", local),
            }
        });

        CssRewrite {
            text: text.into_owned(),
            discovered,
            substitutions,
        }
    }
}

/// Expresses `local` (relative to the output root) relative to `from_dir`.
pub fn relative_reference(local: &str, from_dir: &Path) -> String {
    if from_dir.as_os_str().is_empty() {
        return local.to_string();
    }

    match pathdiff::diff_paths(local, from_dir) {
        Some(relative) => relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                Component::ParentDir => Some("..".to_string()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("/"),
        None => local.to_string(),
    }
}
