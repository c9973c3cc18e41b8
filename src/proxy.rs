//! Unwrapping of image-optimization proxy references.
//!
//! Frameworks such as Next.js serve images through their own endpoint
//! (`/_next/image?url=<encoded upstream>&w=640`). The proxied endpoint is
//! useless offline, so the real upstream reference is extracted before the
//! value is resolved and mirrored.

use std::borrow::Cow;

use tracing::debug;
use url::form_urlencoded;

use crate::error::{MirrorError, Result};

/// One proxy convention.
pub trait ProxyPattern: Send + Sync {
    fn name(&self) -> &'static str;

    /// Cheap check whether `value` is wrapped by this proxy.
    fn matches(&self, value: &str) -> bool;

    /// Extracts the decoded upstream reference from a matching value.
    fn upstream(&self, value: &str) -> Result<String>;
}

/// `/_next/image?url=...` as emitted by `next/image`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NextImageProxy;

impl NextImageProxy {
    const MARKER: &'static str = "/_next/image";
}

impl ProxyPattern for NextImageProxy {
    fn name(&self) -> &'static str {
        "next/image"
    }

    fn matches(&self, value: &str) -> bool {
        value.contains(Self::MARKER) && value.contains("url=")
    }

    fn upstream(&self, value: &str) -> Result<String> {
        let query = value
            .split_once('?')
            .map(|(_, q)| q.split('#').next().unwrap_or(q))
            .ok_or_else(|| MirrorError::ProxyDecode(value.to_string()))?;

        form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == "url")
            .map(|(_, upstream)| upstream.trim().to_string())
            .filter(|upstream| !upstream.is_empty())
            .ok_or_else(|| MirrorError::ProxyDecode(value.to_string()))
    }
}

/// Ordered set of proxy patterns; the first match wins.
pub struct ProxyUnwrapper {
    patterns: Vec<Box<dyn ProxyPattern>>,
}

impl ProxyUnwrapper {
    pub fn empty() -> Self {
        Self {
            patterns: Vec::new(),
        }
    }

    pub fn with_pattern(mut self, pattern: Box<dyn ProxyPattern>) -> Self {
        self.patterns.push(pattern);
        self
    }

    /// Returns the upstream reference for a proxied value, or the value itself.
    pub fn unwrap_reference<'v>(&self, value: &'v str) -> Result<Cow<'v, str>> {
        match self.patterns.iter().find(|p| p.matches(value)) {
            Some(pattern) => {
                let upstream = pattern.upstream(value)?;
                debug!("Unwrapped {} reference {} -> {}", pattern.name(), value, upstream);
                Ok(Cow::Owned(upstream))
            }
            None => Ok(Cow::Borrowed(value)),
        }
    }
}

impl Default for ProxyUnwrapper {
    fn default() -> Self {
        Self::empty().with_pattern(Box::new(NextImageProxy))
    }
}

impl std::fmt::Debug for ProxyUnwrapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.patterns.iter().map(|p| p.name()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_image_is_unwrapped() {
        let unwrapper = ProxyUnwrapper::default();
        let value = "/_next/image?url=https%3A%2F%2Fcdn.example.com%2Fa.png&w=640";

        assert_eq!(unwrapper.unwrap_reference(value).unwrap(), "https://cdn.example.com/a.png");
    }

    #[test]
    fn test_relative_upstream_is_kept_relative() {
        let unwrapper = ProxyUnwrapper::default();
        let value = "https://example.com/_next/image?w=1080&url=%2Fstatic%2Fhero.jpg&q=75";

        assert_eq!(unwrapper.unwrap_reference(value).unwrap(), "/static/hero.jpg");
    }

    #[test]
    fn test_plain_values_pass_through() {
        let unwrapper = ProxyUnwrapper::default();
        let value = "/images/logo.png?url=unrelated";

        assert!(matches!(unwrapper.unwrap_reference(value).unwrap(), Cow::Borrowed("/images/logo.png?url=unrelated")));
    }

    #[test]
    fn test_missing_upstream_is_an_error() {
        let unwrapper = ProxyUnwrapper::default();

        assert!(matches!(
            unwrapper.unwrap_reference("/_next/image?imgurl=x&w=640"),
            Err(MirrorError::ProxyDecode(_))
        ));
        assert!(matches!(
            unwrapper.unwrap_reference("/_next/image?url=&w=640"),
            Err(MirrorError::ProxyDecode(_))
        ));
    }

    #[test]
    fn test_custom_patterns_can_be_added() {
        struct Thumbor;

        impl ProxyPattern for Thumbor {
            fn name(&self) -> &'static str {
                "thumbor"
            }

            fn matches(&self, value: &str) -> bool {
                value.starts_with("/thumbor/")
            }

            fn upstream(&self, value: &str) -> Result<String> {
                value
                    .rsplit_once("/unsafe/")
                    .map(|(_, rest)| rest.to_string())
                    .ok_or_else(|| MirrorError::ProxyDecode(value.to_string()))
            }
        }

        let unwrapper = ProxyUnwrapper::default().with_pattern(Box::new(Thumbor));
        assert_eq!(
            unwrapper.unwrap_reference("/thumbor/unsafe/https://img.example.com/b.jpg").unwrap(),
            "https://img.example.com/b.jpg"
        );
    }
}
