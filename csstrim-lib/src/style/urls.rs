//! Rewrites relative `url()` references so they stay valid once every
//! stylesheet is merged into one document served from the page.

use crate::style::owned_css::{AtruleBlock, Declaration, Node, Stylesheet};
use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use url::Url;

static URL_FUNCTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)url\(\s*(?:"([^"]*)"|'([^']*)'|([^)\s]*))\s*\)"#)
        .expect("url() pattern compiles")
});

static HAS_SCHEME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z][a-zA-Z0-9+.\-]*:")
        .expect("scheme pattern compiles")
});

/// Resolves `url()` values of `sheet` against its `source_url`.
///
/// `page_url` decides what counts as the same host; without it every
/// stylesheet is treated as foreign and resolved URLs are written absolute.
pub fn rewrite_relative_urls(sheet: Stylesheet, page_url: Option<&Url>) -> Stylesheet {
    let Ok(base) = Url::parse(&sheet.source_url) else {
        warn!("not rewriting urls of {}: not an absolute URL", sheet.source_url);
        return sheet;
    };
    let same_host = page_url.is_some_and(|page| page.host_str() == base.host_str());
    let rewriter = Rewriter { base, same_host };
    Stylesheet {
        nodes: rewriter.nodes(sheet.nodes),
        source_url: sheet.source_url,
    }
}

struct Rewriter {
    base: Url,
    same_host: bool,
}

impl Rewriter {
    fn nodes(&self, nodes: Vec<Node>) -> Vec<Node> {
        nodes.into_iter().map(|node| self.node(node)).collect()
    }

    fn node(&self, node: Node) -> Node {
        match node {
            Node::Rule(mut rule) => {
                self.declarations(&mut rule.block.declarations);
                Node::Rule(rule)
            }
            Node::Atrule(mut atrule) => {
                atrule.block = atrule.block.map(|block| match block {
                    AtruleBlock::Rules(rules) => AtruleBlock::Rules(self.nodes(rules)),
                    AtruleBlock::Declarations(mut block) => {
                        self.declarations(&mut block.declarations);
                        AtruleBlock::Declarations(block)
                    }
                    raw @ AtruleBlock::Raw(_) => raw,
                });
                Node::Atrule(atrule)
            }
            comment @ Node::Comment(_) => comment,
        }
    }

    fn declarations(&self, declarations: &mut [Declaration]) {
        for decl in declarations {
            if decl.value.to_ascii_lowercase().contains("url(") {
                decl.value = self.value(&decl.value);
            }
        }
    }

    fn value(&self, value: &str) -> String {
        URL_FUNCTION
            .replace_all(value, |caps: &Captures| {
                let path = caps
                    .get(1)
                    .or_else(|| caps.get(2))
                    .or_else(|| caps.get(3))
                    .map_or("", |m| m.as_str());
                match self.resolve(path) {
                    Some(resolved) => format!("url(\"{}\")", resolved),
                    None => caps[0].to_string(),
                }
            })
            .into_owned()
    }

    /// `None` leaves the reference untouched.
    fn resolve(&self, path: &str) -> Option<String> {
        if path.is_empty() || path.starts_with('#') {
            return None;
        }
        if HAS_SCHEME.is_match(path) || path.starts_with("//") {
            return None;
        }
        if path.starts_with('/') && self.same_host {
            return None;
        }
        let resolved = match self.base.join(path) {
            Ok(resolved) => resolved,
            Err(e) => {
                debug!("cannot resolve url({}) against {}: {}", path, self.base, e);
                return None;
            }
        };
        if self.same_host {
            let mut local = resolved.path().to_string();
            if let Some(query) = resolved.query() {
                local.push('?');
                local.push_str(query);
            }
            if let Some(fragment) = resolved.fragment() {
                local.push('#');
                local.push_str(fragment);
            }
            Some(local)
        } else {
            Some(resolved.to_string())
        }
    }
}
