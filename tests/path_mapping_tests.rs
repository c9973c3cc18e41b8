// Invariants of the URL -> local path mapping, checked over a spread of URLs.

use page_mirror::{local_path, resolve, Document, DiscoverySet, MarkupRewriter, ProxyUnwrapper};
use url::Url;

const TARGET: &str = "https://example.com/";

const SAMPLE_URLS: &[&str] = &[
    "https://example.com/",
    "https://example.com/logo.png",
    "https://example.com/a/b/c/d.js",
    "https://example.com/dir/",
    "https://example.com/a.png?w=640&q=75",
    "https://example.com/search?q=a=b&x=%2F..%2F",
    "https://example.com/%2e%2e/%2e%2e/etc/passwd",
    "https://example.com/a/../../../../etc/passwd",
    "https://example.com/with%20space/file name.css",
    "https://example.com/unicode/caf%C3%A9.jpg",
    "https://cdn.example.com/app.css",
    "https://cdn.example.com/css/fonts/a.woff2?v=1.2.3#iefix",
    "http://example.com/insecure.png",
    "https://example.com:8443/other-port.png",
    "https://[::1]/ipv6.png",
    "https://127.0.0.1:9000/ip.png?x=1",
];

fn target_origin() -> url::Origin {
    Url::parse(TARGET).unwrap().origin()
}

fn urls() -> Vec<Url> {
    SAMPLE_URLS.iter().map(|u| Url::parse(u).unwrap()).collect()
}

#[test]
fn test_path_mapping_is_idempotent() {
    let origin = target_origin();
    for url in urls() {
        assert_eq!(local_path(&url, &origin), local_path(&url, &origin), "for {}", url);
    }
}

#[test]
fn test_foreign_origins_are_segregated() {
    let origin = target_origin();
    for url in urls().into_iter().filter(|u| u.origin() != origin) {
        let path = local_path(&url, &origin);
        let host = url.host_str().unwrap();
        let expected_prefix = format!("external/{}/", page_mirror::url_resolver::sanitize_segment(host));
        assert!(path.starts_with(&expected_prefix), "{} mapped to {}", url, path);
    }
}

#[test]
fn test_query_strings_are_safe() {
    let origin = target_origin();
    for url in urls().into_iter().filter(|u| u.query().is_some_and(|q| !q.is_empty())) {
        let path = local_path(&url, &origin);
        assert!(
            !path.contains('?') && !path.contains('&') && !path.contains('='),
            "{} mapped to {}",
            url,
            path
        );
    }
}

#[test]
fn test_paths_never_escape_the_output_root() {
    let origin = target_origin();
    for url in urls() {
        let path = local_path(&url, &origin);
        assert!(!path.starts_with('/'), "{} mapped to {}", url, path);
        assert!(!path.split('/').any(|segment| segment == ".."), "{} mapped to {}", url, path);
        assert!(!path.is_empty(), "{} mapped to an empty path", url);
    }
}

#[test]
fn test_distinct_query_variants_do_not_collide() {
    let origin = target_origin();
    let a = local_path(&Url::parse("https://example.com/a.png?w=640").unwrap(), &origin);
    let b = local_path(&Url::parse("https://example.com/a.png?w=1080").unwrap(), &origin);
    assert_ne!(a, b);
}

#[test]
fn test_discovery_is_complete() {
    // 4 distinct markup references (one repeated) and 2 distinct url() references.
    let html = r#"<html><head>
        <link rel="stylesheet" href="/site.css">
        <script src="https://cdn.example.com/lib.js"></script>
        <style>
            .a { background: url(/a.png); }
            .b { background: url("/b.png"); }
            .c { background: url('/a.png'); }
        </style>
    </head><body>
        <img src="/logo.png"><img src="/logo.png">
        <img srcset="/hero.jpg 2x">
    </body></html>"#;

    let base = resolve(TARGET, &Url::parse(TARGET).unwrap()).unwrap();
    let proxies = ProxyUnwrapper::default();
    let document = Document::parse(html);
    let mut discovered = DiscoverySet::new();
    MarkupRewriter::new(&base, &proxies).rewrite(&document, &mut discovered);

    assert_eq!(discovered.len(), 4 + 2);
}
