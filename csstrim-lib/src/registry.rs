use crate::error::TrimError;
use log::debug;
use std::collections::{HashMap, HashSet};

/// Longest redirect chain followed before giving up.
pub const MAX_REDIRECTS: usize = 20;

/// Stylesheet hrefs discovered across all snapshots, in cascade order.
#[derive(Debug, Default, Clone)]
pub struct HrefRegistry {
    hrefs: Vec<String>,
    redirects: HashMap<String, String>,
    skipped: HashSet<String>,
}

impl HrefRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a stylesheet link. A href seen before moves to the end, where
    /// its latest occurrence puts it in the cascade.
    pub fn discover(&mut self, href: impl Into<String>) {
        let href = href.into();
        self.hrefs.retain(|known| *known != href);
        self.hrefs.push(href);
    }

    /// `from` answered with a redirect to `to`.
    pub fn add_redirect(&mut self, from: impl Into<String>, to: impl Into<String>) {
        self.redirects.insert(from.into(), to.into());
    }

    /// `href` was deliberately not loaded.
    pub fn skip(&mut self, href: impl Into<String>) {
        self.skipped.insert(href.into());
    }

    pub fn discovered(&self) -> &[String] {
        &self.hrefs
    }

    pub fn is_skipped(&self, href: &str) -> bool {
        self.skipped.contains(href)
    }

    /// Final URL of `href` after following its redirects.
    pub fn final_href<'s>(&'s self, href: &'s str) -> Result<&'s str, TrimError> {
        let mut current = href;
        let mut chain = vec![href.to_string()];
        let mut visited = HashSet::from([href]);
        while let Some(next) = self.redirects.get(current) {
            chain.push(next.clone());
            if !visited.insert(next.as_str()) || chain.len() > MAX_REDIRECTS + 1 {
                return Err(TrimError::RedirectCycle {
                    href: href.to_string(),
                    chain,
                });
            }
            current = next.as_str();
        }
        Ok(current)
    }

    /// The hrefs to prune, in cascade order: redirects followed, skipped hrefs
    /// left out, duplicates collapsed onto their latest position.
    ///
    /// Every href that ends up neither fetched nor skipped is reported at once.
    pub fn resolve(&self, is_fetched: impl Fn(&str) -> bool) -> Result<Vec<String>, TrimError> {
        let mut resolved: Vec<String> = Vec::new();
        let mut missing = Vec::new();
        for href in &self.hrefs {
            if self.is_skipped(href) {
                debug!("skipping {}", href);
                continue;
            }
            let target = self.final_href(href)?;
            if target != href {
                debug!("{} redirects to {}", href, target);
            }
            if self.is_skipped(target) {
                debug!("skipping {} (via {})", target, href);
                continue;
            }
            if !is_fetched(target) {
                missing.push(href.clone());
                continue;
            }
            resolved.retain(|known| known != target);
            resolved.push(target.to_string());
        }
        if !missing.is_empty() {
            return Err(TrimError::MissingStylesheets { hrefs: missing });
        }
        Ok(resolved)
    }
}
