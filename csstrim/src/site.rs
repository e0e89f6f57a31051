use anyhow::{Context, Result};
use csstrim_lib::{HrefRegistry, HtmlSnapshot};
use log::{debug, warn};
use regex::Regex;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use url::Url;

/// Pages and stylesheets of a static site checked out under `root`.
pub struct Site {
    pub snapshots: Vec<HtmlSnapshot>,
    pub registry: HrefRegistry,
    pub stylesheets: HashMap<String, String>,
    pub origin: Option<Url>,
}

pub struct SiteOptions<'a> {
    pub root: &'a Path,
    pub base_url: &'a Url,
    pub skip: &'a [Regex],
    pub redirects: &'a [(String, String)],
}

impl Site {
    /// Parses every page, then reads the same-origin stylesheets they link.
    ///
    /// Links to other origins and links matching a skip pattern are recorded
    /// as skipped. A same-origin link without a file stays unfetched.
    pub fn load(pages: &[PathBuf], options: &SiteOptions) -> Result<Site> {
        let mut snapshots = Vec::with_capacity(pages.len());
        let mut registry = HrefRegistry::new();
        let mut origin = None;

        for page in pages {
            let page_url = page_url(options, page)?;
            let html = fs::read_to_string(page)
                .with_context(|| format!("reading page {}", page.display()))?;
            let snapshot = HtmlSnapshot::parse(page_url.as_str(), &html);
            for href in snapshot.stylesheet_hrefs(&page_url) {
                registry.discover(href);
            }
            origin.get_or_insert(page_url);
            snapshots.push(snapshot);
        }

        for (from, to) in options.redirects {
            let from = options.base_url.join(from).with_context(|| format!("redirect source {}", from))?;
            let to = options.base_url.join(to).with_context(|| format!("redirect target {}", to))?;
            registry.add_redirect(from.as_str(), to.as_str());
        }

        let mut stylesheets = HashMap::new();
        let mut targets: Vec<String> = Vec::new();
        for href in registry.discovered() {
            let target = registry.final_href(href)?.to_string();
            if !targets.contains(&target) {
                targets.push(target);
            }
        }
        for href in targets {
            if options.skip.iter().any(|pattern| pattern.is_match(&href)) {
                debug!("skipping {} (matches --skip)", href);
                registry.skip(href);
                continue;
            }
            let Some(path) = local_path(options, &href) else {
                debug!("skipping {} (other origin)", href);
                registry.skip(href);
                continue;
            };
            match fs::read_to_string(&path) {
                Ok(text) => {
                    stylesheets.insert(href, text);
                }
                Err(e) => warn!("cannot read {} for {}: {}", path.display(), href, e),
            }
        }

        Ok(Site {
            snapshots,
            registry,
            stylesheets,
            origin,
        })
    }
}

fn page_url(options: &SiteOptions, page: &Path) -> Result<Url> {
    let absolute = page
        .canonicalize()
        .with_context(|| format!("resolving page {}", page.display()))?;
    let root = options
        .root
        .canonicalize()
        .with_context(|| format!("resolving root {}", options.root.display()))?;
    let relative = absolute
        .strip_prefix(&root)
        .with_context(|| format!("{} is not under {}", page.display(), root.display()))?;
    let path = relative
        .components()
        .map(|part| part.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    options
        .base_url
        .join(&path)
        .with_context(|| format!("building URL for {}", page.display()))
}

/// File under the site root serving `href`, when `href` shares the base origin.
fn local_path(options: &SiteOptions, href: &str) -> Option<PathBuf> {
    let url = Url::parse(href).ok()?;
    if url.origin() != options.base_url.origin() {
        return None;
    }
    let mut path = options.root.to_path_buf();
    for segment in url.path_segments()? {
        if segment.is_empty() || segment == "." || segment == ".." {
            continue;
        }
        path.push(segment);
    }
    Some(path)
}
