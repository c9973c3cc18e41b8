use std::collections::BTreeSet;

use url::Url;

use crate::url_resolver::split_fragment;

/// Absolute asset URLs found while scanning a page.
///
/// Identity is the exact URL string without its fragment; differently spelled
/// URLs for the same resource stay distinct. The set only ever grows.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DiscoverySet {
    urls: BTreeSet<String>,
}

impl DiscoverySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `url`; returns `false` if it was already present.
    pub fn insert(&mut self, url: &Url) -> bool {
        let (url, _) = split_fragment(url);
        self.urls.insert(url.into())
    }

    pub fn extend<'a>(&mut self, urls: impl IntoIterator<Item = &'a Url>) {
        for url in urls {
            self.insert(url);
        }
    }

    pub fn contains(&self, url: &str) -> bool {
        self.urls.contains(url)
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.urls.iter().map(String::as_str)
    }
}
