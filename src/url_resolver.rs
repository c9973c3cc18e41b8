use url::{Origin, Url};

use crate::error::{MirrorError, Result};

/// Longest query suffix (including its leading `_`) kept in a local file name.
pub const MAX_QUERY_SUFFIX: usize = 100;

/// Resolves a possibly-relative reference against `base`.
///
/// Absolute and protocol-relative references ignore `base` apart from its scheme.
pub fn resolve(reference: &str, base: &Url) -> Result<Url> {
    let reference = reference.trim();
    base.join(reference).map_err(|e| MirrorError::InvalidUrl {
        reference: reference.to_string(),
        reason: e.to_string(),
    })
}

pub fn is_fetchable(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https")
}

/// References that are already embedded in the document and need no fetch.
pub fn is_inline_data(reference: &str) -> bool {
    let reference = reference.trim_start();
    reference
        .get(..5)
        .is_some_and(|scheme| scheme.eq_ignore_ascii_case("data:"))
}

/// Splits off the fragment, which never takes part in discovery identity.
pub fn split_fragment(url: &Url) -> (Url, Option<String>) {
    let fragment = url.fragment().map(str::to_string);
    let mut url = url.clone();
    url.set_fragment(None);
    (url, fragment)
}

/// Maps an absolute URL to a relative path inside the output directory.
///
/// Pure: the same URL and origin always give the same path. Foreign-origin
/// assets land under `external/<hostname>/`, the query string is folded into
/// the file name, and the result never starts with `/` or contains `..`.
pub fn local_path(url: &Url, target_origin: &Origin) -> String {
    let mut segments: Vec<String> = Vec::new();

    if url.origin() != *target_origin {
        segments.push("external".to_string());
        segments.push(sanitize_segment(url.host_str().unwrap_or("unknown-host")));
    }

    let prefix_len = segments.len();
    let path = url.path();
    segments.extend(
        path.split('/')
            .filter(|s| !s.is_empty() && *s != "." && *s != "..")
            .map(sanitize_segment),
    );

    // Directory-like URLs still need a file name.
    if path.ends_with('/') || segments.len() == prefix_len {
        segments.push("index.html".to_string());
    }

    if let Some(query) = url.query().filter(|q| !q.is_empty()) {
        if let Some(last) = segments.last_mut() {
            last.push_str(&sanitize_query(query));
        }
    }

    segments.join("/")
}

/// Keeps `[A-Za-z0-9._~-]`, replaces everything else with `_`.
pub fn sanitize_segment(segment: &str) -> String {
    segment
        .chars()
        .map(|c| match c {
            c if c.is_ascii_alphanumeric() => c,
            '.' | '-' | '~' => c,
            _ => '_',
        })
        .collect()
}

/// Folds a query string into a file-name suffix: `w=640&q=75` -> `_w_640_q_75`.
pub fn sanitize_query(query: &str) -> String {
    std::iter::once('_')
        .chain(query.chars().map(|c| if c.is_ascii_alphanumeric() { c } else { '_' }))
        .take(MAX_QUERY_SUFFIX)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin() -> Origin {
        Url::parse("https://example.com/").unwrap().origin()
    }

    fn map(url: &str) -> String {
        local_path(&Url::parse(url).unwrap(), &origin())
    }

    #[test]
    fn test_url_resolution() {
        let base = Url::parse("https://example.com/subdir/").unwrap();

        let test_cases = vec![
            ("../style.css", "https://example.com/style.css"),
            ("./script.js", "https://example.com/subdir/script.js"),
            ("images/photo.jpg", "https://example.com/subdir/images/photo.jpg"),
            ("https://cdn.example.com/style.css", "https://cdn.example.com/style.css"),
            ("//cdn.example.com/script.js", "https://cdn.example.com/script.js"),
            ("  /logo.png ", "https://example.com/logo.png"),
        ];

        for (input, expected) in test_cases {
            let result = resolve(input, &base).unwrap();
            assert_eq!(result.as_str(), expected, "Failed for input: {}", input);
        }
    }

    #[test]
    fn test_same_origin_paths() {
        assert_eq!(map("https://example.com/logo.png"), "logo.png");
        assert_eq!(map("https://example.com/css/site.css"), "css/site.css");
        assert_eq!(map("https://example.com/"), "index.html");
        assert_eq!(map("https://example.com/blog/"), "blog/index.html");
    }

    #[test]
    fn test_external_paths() {
        assert_eq!(
            map("https://cdn.example.com/app.css"),
            "external/cdn.example.com/app.css"
        );
        assert_eq!(
            map("http://example.com/logo.png"),
            "external/example.com/logo.png"
        );
        assert_eq!(
            map("https://fonts.example.org/"),
            "external/fonts.example.org/index.html"
        );
    }

    #[test]
    fn test_query_is_folded_into_file_name() {
        assert_eq!(
            map("https://example.com/a.png?w=640&q=75"),
            "a.png_w_640_q_75"
        );

        let long = format!("https://example.com/a.png?{}", "k=v&".repeat(100));
        let path = map(&long);
        assert_eq!(path.len(), "a.png".len() + MAX_QUERY_SUFFIX);
        assert!(!path.contains('?') && !path.contains('&') && !path.contains('='));
    }

    #[test]
    fn test_path_sanitization() {
        let test_cases = vec![
            ("normal", "normal"),
            ("with%20space", "with_20space"),
            ("a=b", "a_b"),
            ("file.min.js", "file.min.js"),
        ];

        for (input, expected) in test_cases {
            assert_eq!(sanitize_segment(input), expected, "Failed for input: {}", input);
        }
    }

    #[test]
    fn test_inline_data_detection() {
        assert!(is_inline_data("data:image/png;base64,AAAA"));
        assert!(is_inline_data("  DATA:image/svg+xml,<svg/>"));
        assert!(!is_inline_data("/data/image.png"));
        assert!(!is_inline_data("dat"));
    }

    #[test]
    fn test_split_fragment() {
        let url = Url::parse("https://example.com/sprite.svg#icon").unwrap();
        let (bare, fragment) = split_fragment(&url);
        assert_eq!(bare.as_str(), "https://example.com/sprite.svg");
        assert_eq!(fragment.as_deref(), Some("icon"));
    }
}
