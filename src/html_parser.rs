use std::path::Path;
use std::rc::Rc;

use html5ever::serialize::{serialize, SerializeOpts};
use html5ever::tendril::{StrTendril, TendrilSink};
use html5ever::parse_document;
use markup5ever_rcdom::{Handle, NodeData, RcDom, SerializableHandle};
use tracing::{debug, warn};
use url::{Origin, Url};

use crate::css_rewriter::CssRewriter;
use crate::discovery::DiscoverySet;
use crate::downloader::AssetFailure;
use crate::error::{MirrorError, Result};
use crate::proxy::ProxyUnwrapper;
use crate::url_resolver::{is_fetchable, is_inline_data, local_path, resolve, split_fragment};

/// Image attributes holding a single reference, lazy-load fallbacks included.
const IMAGE_SOURCE_ATTRS: &[&str] = &["src", "data-src", "data-lazy-src"];

/// Attributes holding a responsive candidate list.
const CANDIDATE_LIST_ATTRS: &[&str] = &["srcset", "data-srcset"];

/// Client-side loading hints with no meaning in a static mirror.
const STRIPPED_IMAGE_ATTRS: &[&str] = &["data-nimg", "decoding", "loading"];

/// `rel` tokens for which a `<link href>` points at an asset worth mirroring.
const ASSET_LINK_RELS: &[&str] = &[
    "stylesheet",
    "icon",
    "apple-touch-icon",
    "apple-touch-icon-precomposed",
    "mask-icon",
    "preload",
    "modulepreload",
    "prefetch",
    "manifest",
];

/// A parsed HTML document.
pub struct Document {
    dom: RcDom,
}

impl Document {
    pub fn parse(html: &str) -> Self {
        let dom = parse_document(RcDom::default(), Default::default()).one(html);
        Self { dom }
    }

    pub fn serialize(&self) -> Result<String> {
        let mut bytes = Vec::new();
        let handle: SerializableHandle = self.dom.document.clone().into();
        serialize(&mut bytes, &handle, SerializeOpts::default()).map_err(MirrorError::Serialize)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Every element in document order.
    pub fn elements(&self) -> Vec<Handle> {
        let mut elements = Vec::new();
        let mut stack = vec![self.dom.document.clone()];

        while let Some(node) = stack.pop() {
            if matches!(node.data, NodeData::Element { .. }) {
                elements.push(node.clone());
            }
            stack.extend(node.children.borrow().iter().rev().cloned());
        }

        elements
    }

    /// Elements with the given local tag name.
    pub fn find(&self, tag: &str) -> Vec<Handle> {
        self.elements()
            .into_iter()
            .filter(|el| tag_name(el).is_some_and(|name| name == tag))
            .collect()
    }
}

pub fn tag_name(handle: &Handle) -> Option<String> {
    match handle.data {
        NodeData::Element { ref name, .. } => Some(name.local.to_string()),
        _ => None,
    }
}

pub fn get_attr(handle: &Handle, name: &str) -> Option<String> {
    match handle.data {
        NodeData::Element { ref attrs, .. } => attrs
            .borrow()
            .iter()
            .find(|attr| &*attr.name.local == name)
            .map(|attr| attr.value.to_string()),
        _ => None,
    }
}

pub fn set_attr(handle: &Handle, name: &str, value: &str) {
    if let NodeData::Element { ref attrs, .. } = handle.data {
        if let Some(attr) = attrs.borrow_mut().iter_mut().find(|attr| &*attr.name.local == name) {
            attr.value = StrTendril::from_slice(value);
        }
    }
}

pub fn remove_attrs(handle: &Handle, names: &[&str]) {
    if let NodeData::Element { ref attrs, .. } = handle.data {
        attrs
            .borrow_mut()
            .retain(|attr| !names.iter().any(|name| *name == &*attr.name.local));
    }
}

/// Concatenated text content of an element's direct text children.
pub fn text_content(handle: &Handle) -> String {
    handle
        .children
        .borrow()
        .iter()
        .filter_map(|child| match child.data {
            NodeData::Text { ref contents } => Some(contents.borrow().to_string()),
            _ => None,
        })
        .collect()
}

/// Replaces an element's text children with a single text node holding `text`.
fn replace_text(handle: &Handle, text: &str) {
    let mut children = handle.children.borrow_mut();
    let Some(first) = children
        .iter()
        .find(|child| matches!(child.data, NodeData::Text { .. }))
        .cloned()
    else {
        return;
    };

    if let NodeData::Text { ref contents } = first.data {
        *contents.borrow_mut() = StrTendril::from_slice(text);
    }
    children.retain(|child| Rc::ptr_eq(child, &first) || !matches!(child.data, NodeData::Text { .. }));
}

/// Counters for one rewriting pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RewriteStats {
    pub references_rewritten: usize,
    pub references_skipped: usize,
    /// Proxied references whose upstream could not be decoded.
    pub failures: Vec<AssetFailure>,
}

/// Rewrites every asset reference in a document to its local mirror path.
pub struct MarkupRewriter<'a> {
    base: Url,
    origin: Origin,
    proxies: &'a ProxyUnwrapper,
    css: CssRewriter,
}

impl<'a> MarkupRewriter<'a> {
    pub fn new(base: &Url, proxies: &'a ProxyUnwrapper) -> Self {
        let origin = base.origin();
        Self {
            base: base.clone(),
            css: CssRewriter::new(origin.clone()),
            origin,
            proxies,
        }
    }

    /// Rewrites the document in place, recording each absolute URL in `discovered`.
    pub fn rewrite(&self, document: &Document, discovered: &mut DiscoverySet) -> RewriteStats {
        let mut stats = RewriteStats::default();

        // Handles are collected up front; only attributes and text change below.
        for element in document.elements() {
            let Some(tag) = tag_name(&element) else {
                continue;
            };

            match tag.as_str() {
                "img" => {
                    self.rewrite_single(&element, IMAGE_SOURCE_ATTRS, true, discovered, &mut stats);
                    self.rewrite_candidates(&element, discovered, &mut stats);
                    remove_attrs(&element, STRIPPED_IMAGE_ATTRS);
                }
                "source" => self.rewrite_candidates(&element, discovered, &mut stats),
                "link" if is_asset_link(&element) => {
                    self.rewrite_single(&element, &["href"], false, discovered, &mut stats);
                }
                "script" => self.rewrite_single(&element, &["src"], false, discovered, &mut stats),
                "style" => self.rewrite_style_block(&element, discovered, &mut stats),
                _ => {}
            }

            self.rewrite_style_attr(&element, discovered, &mut stats);
        }

        stats
    }

    fn rewrite_single(
        &self,
        element: &Handle,
        attrs: &[&str],
        unwrap_proxy: bool,
        discovered: &mut DiscoverySet,
        stats: &mut RewriteStats,
    ) {
        for attr in attrs {
            let Some(value) = get_attr(element, attr) else {
                continue;
            };
            match self.localize(&value, unwrap_proxy, discovered, stats) {
                Some(local) => {
                    set_attr(element, attr, &local);
                    stats.references_rewritten += 1;
                }
                None => stats.references_skipped += 1,
            }
        }
    }

    fn rewrite_candidates(&self, element: &Handle, discovered: &mut DiscoverySet, stats: &mut RewriteStats) {
        for attr in CANDIDATE_LIST_ATTRS {
            let Some(value) = get_attr(element, attr) else {
                continue;
            };

            let mut candidates = Vec::new();
            for (reference, descriptor) in parse_candidates(&value) {
                let reference = match self.localize(reference, true, discovered, stats) {
                    Some(local) => {
                        stats.references_rewritten += 1;
                        local
                    }
                    None => {
                        stats.references_skipped += 1;
                        reference.to_string()
                    }
                };
                candidates.push(match descriptor {
                    Some(descriptor) => format!("{} {}", reference, descriptor),
                    None => reference,
                });
            }

            set_attr(element, attr, &candidates.join(", "));
        }
    }

    fn rewrite_style_block(&self, element: &Handle, discovered: &mut DiscoverySet, stats: &mut RewriteStats) {
        let css = text_content(element);
        if css.trim().is_empty() {
            return;
        }

        let result = self.css.rewrite(&css, &self.base, Path::new(""));
        if result.substitutions > 0 {
            discovered.extend(&result.discovered);
            replace_text(element, &result.text);
            stats.references_rewritten += result.substitutions;
        }
    }

    fn rewrite_style_attr(&self, element: &Handle, discovered: &mut DiscoverySet, stats: &mut RewriteStats) {
        let Some(style) = get_attr(element, "style") else {
            return;
        };

        let result = self.css.rewrite(&style, &self.base, Path::new(""));
        if result.substitutions > 0 {
            discovered.extend(&result.discovered);
            set_attr(element, "style", &result.text);
            stats.references_rewritten += result.substitutions;
        }
    }

    /// Unwraps, resolves and records one reference, returning its local path.
    fn localize(
        &self,
        value: &str,
        unwrap_proxy: bool,
        discovered: &mut DiscoverySet,
        stats: &mut RewriteStats,
    ) -> Option<String> {
        let value = value.trim();
        if value.is_empty() || value.starts_with('#') || is_inline_data(value) {
            return None;
        }

        let reference = if unwrap_proxy {
            match self.proxies.unwrap_reference(value) {
                Ok(reference) => reference,
                Err(e) => {
                    warn!("⚠️ {}", e);
                    stats.failures.push(AssetFailure {
                        url: value.to_string(),
                        reason: e.to_string(),
                    });
                    return None;
                }
            }
        } else {
            value.into()
        };

        let absolute = match resolve(&reference, &self.base) {
            Ok(url) => url,
            Err(e) => {
                debug!("Skipping reference: {}", e);
                return None;
            }
        };
        if !is_fetchable(&absolute) {
            debug!("Skipping non-HTTP reference {}", absolute);
            return None;
        }

        let (absolute, fragment) = split_fragment(&absolute);
        let local = local_path(&absolute, &self.origin);
        discovered.insert(&absolute);

        Some(match fragment {
            Some(fragment) => format!("{}#{}", local, fragment),
            None => local,
        })
    }
}

/// Splits a `srcset` value into `(url, descriptors)` pairs.
///
/// A URL runs to the next whitespace, so commas inside it (as in `data:` URIs)
/// do not split candidates. A URL ending in `,` has no descriptors.
fn parse_candidates(value: &str) -> Vec<(&str, Option<&str>)> {
    let mut candidates = Vec::new();
    let mut rest = value;

    loop {
        rest = rest.trim_start_matches(|c: char| c.is_ascii_whitespace() || c == ',');
        if rest.is_empty() {
            break;
        }

        let url_end = rest.find(|c: char| c.is_ascii_whitespace()).unwrap_or(rest.len());
        let (url, after) = rest.split_at(url_end);
        rest = after;
        if url.ends_with(',') {
            candidates.push((url.trim_end_matches(','), None));
            continue;
        }

        // Descriptors end at the first comma outside parentheses.
        let mut depth = 0usize;
        let mut descriptor_end = rest.len();
        for (i, c) in rest.char_indices() {
            match c {
                '(' => depth += 1,
                ')' => depth = depth.saturating_sub(1),
                ',' if depth == 0 => {
                    descriptor_end = i;
                    break;
                }
                _ => {}
            }
        }
        let (descriptor, after) = rest.split_at(descriptor_end);
        rest = after;

        let descriptor = descriptor.trim();
        candidates.push((url, (!descriptor.is_empty()).then_some(descriptor)));
    }

    candidates
}

fn is_asset_link(element: &Handle) -> bool {
    match get_attr(element, "rel") {
        None => true,
        Some(rel) => rel
            .split_ascii_whitespace()
            .any(|token| ASSET_LINK_RELS.iter().any(|asset| token.eq_ignore_ascii_case(asset))),
    }
}
