use crate::dom::dom_tree::{Document, Node};
use crate::error::UnsupportedSelector;
use crate::parser::dom_indices::DomIndices;
use crate::parser::html::create_dom_tree;
use crate::style::css_matcher::{matches_complex_selector, parse_selector};
use html5ever::interface::QuirksMode;
use log::debug;
use url::Url;

/// One rendered state of a page that selectors can be tested against.
pub trait DomSnapshot {
    /// Whether at least one element of this snapshot matches `selector`.
    ///
    /// A selector the snapshot cannot evaluate is reported, never guessed.
    fn matches(&self, selector: &str) -> Result<bool, UnsupportedSelector>;
}

/// A snapshot captured as serialized HTML.
#[derive(Debug)]
pub struct HtmlSnapshot {
    label: String,
    document: Document,
    indices: DomIndices,
    fold_case: bool,
}

impl HtmlSnapshot {
    /// `label` names the snapshot in logs, usually the page URL.
    pub fn parse(label: impl Into<String>, html: &str) -> Self {
        let document = create_dom_tree(html);
        let fold_case = *document.quirks_mode.borrow() == QuirksMode::Quirks;
        let indices = DomIndices::build(&document, fold_case);
        let label = label.into();
        debug!(
            "snapshot {}: {} elements{}",
            label,
            indices.elements.len(),
            if fold_case { " (quirks mode)" } else { "" }
        );
        HtmlSnapshot {
            label,
            document,
            indices,
            fold_case,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Absolute URLs of the stylesheets this page links, in document order.
    ///
    /// A `<link>` counts when it has an `href`, its `rel` includes
    /// `stylesheet` or its href ends in `.css`, the href is not a `blob:`
    /// URL and its `media` is not `print`.
    pub fn stylesheet_hrefs(&self, page_url: &Url) -> Vec<String> {
        let mut hrefs = Vec::new();
        for handle in self.indices.candidates(None, None, Some("link"), false) {
            let node = handle.borrow();
            let Node::Element(link) = &*node else {
                continue;
            };
            let Some(raw_href) = link.attribute("href").map(str::trim) else {
                continue;
            };
            if raw_href.is_empty() {
                continue;
            }
            let href = match page_url.join(raw_href) {
                Ok(href) => href.to_string(),
                Err(e) => {
                    debug!("{}: ignoring link href `{}`: {}", self.label, raw_href, e);
                    continue;
                }
            };
            let lower = href.to_lowercase();
            let is_stylesheet = link.attribute("rel").is_some_and(|rel| {
                rel.split_whitespace()
                    .any(|token| token.eq_ignore_ascii_case("stylesheet"))
            }) || lower.ends_with(".css");
            let is_print = link
                .attribute("media")
                .is_some_and(|media| media.trim().eq_ignore_ascii_case("print"));
            if is_stylesheet && !lower.starts_with("blob:") && !is_print {
                hrefs.push(href);
            }
        }
        hrefs
    }
}

impl DomSnapshot for HtmlSnapshot {
    fn matches(&self, selector: &str) -> Result<bool, UnsupportedSelector> {
        let complex = parse_selector(selector)?;
        let key = &complex.key;
        let candidates = self.indices.candidates(
            key.ids.first().map(String::as_str),
            key.classes.first().map(String::as_str),
            key.tag.as_deref(),
            self.fold_case,
        );
        Ok(candidates
            .iter()
            .any(|handle| matches_complex_selector(handle, &complex, self.fold_case)))
    }
}
