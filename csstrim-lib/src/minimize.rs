use crate::config::TrimOptions;
use crate::error::TrimError;
use crate::liveness::remove_dead_at_rules;
use crate::merger::{lift_important_comments, merge};
use crate::pruner::RulePruner;
use crate::reachability::Reachability;
use crate::registry::HrefRegistry;
use crate::snapshot::DomSnapshot;
use crate::style::codec;
use crate::style::owned_css::{Node, Stylesheet};
use crate::style::urls::rewrite_relative_urls;
use log::{debug, info};
use rayon::prelude::*;
use std::collections::HashMap;
use std::time::Instant;
use url::Url;

/// Everything one run needs, gathered by the caller.
pub struct TrimInput<'a> {
    pub snapshots: Vec<&'a dyn DomSnapshot>,
    /// Stylesheet links in discovery order, with redirect and skip metadata.
    pub registry: HrefRegistry,
    /// Raw text of every fetched stylesheet, keyed by its final href.
    pub stylesheets: HashMap<String, String>,
    /// URL of the page the snapshots were taken from; decides which
    /// stylesheets are on the same host when rewriting `url()`s.
    pub origin: Option<Url>,
}

#[derive(Debug)]
pub struct TrimOutput {
    /// The merged tree after pruning, before minification.
    pub nodes: Vec<Node>,
    /// Final minified CSS.
    pub css: String,
    /// Raw text of every stylesheet that went into `css`.
    pub stylesheet_contents: HashMap<String, String>,
}

/// Runs the whole pipeline: resolve, parse, prune, merge, sweep, minify.
pub fn minimize(input: TrimInput<'_>, options: &TrimOptions) -> Result<TrimOutput, TrimError> {
    let started = Instant::now();
    let TrimInput {
        snapshots,
        registry,
        mut stylesheets,
        origin,
    } = input;

    let order = registry.resolve(|href| stylesheets.contains_key(href))?;
    debug!("cascade order: {:?}", order);

    let parsed = order
        .par_iter()
        .map(|href| {
            let text = stylesheets.get(href).map(String::as_str).unwrap_or_default();
            let sheet = codec::parse_stylesheet(href, text, options.ignore_css_errors)?;
            Ok(if options.rewrite_relative_urls {
                rewrite_relative_urls(sheet, origin.as_ref())
            } else {
                sheet
            })
        })
        .collect::<Result<Vec<Stylesheet>, TrimError>>()?;

    let nodes = prune_parsed(&snapshots, &order, parsed, options)?;
    let css = codec::minify_css(&codec::render(&nodes))?;

    stylesheets.retain(|href, _| order.contains(href));
    info!(
        "trimmed {} stylesheets to {} bytes in {:?}",
        order.len(),
        css.len(),
        started.elapsed()
    );
    Ok(TrimOutput {
        nodes,
        css,
        stylesheet_contents: stylesheets,
    })
}

/// The pruning core over already parsed stylesheets.
///
/// `order` is the cascade order; `sheets` may come in any order.
pub fn prune_parsed(
    snapshots: &[&dyn DomSnapshot],
    order: &[String],
    sheets: Vec<Stylesheet>,
    options: &TrimOptions,
) -> Result<Vec<Node>, TrimError> {
    let mut reachability = Reachability::new(snapshots.to_vec(), &options.whitelist, options.debug);
    let mut pruned = Vec::with_capacity(sheets.len());
    {
        let mut pruner = RulePruner::new(&mut reachability, options.ignore_css_errors);
        for sheet in sheets {
            pruned.push(pruner.prune(sheet)?);
        }
    }
    let stats = reachability.stats();
    info!(
        "{} selectors decided: {} DOM queries, {} cache hits, {} short circuits",
        reachability.decided(),
        stats.dom_queries,
        stats.cache_hits,
        stats.short_circuits
    );

    let merged = merge(order, pruned);
    let lifted = lift_important_comments(merged, options.dedupe_important_comments);
    Ok(remove_dead_at_rules(lifted))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::HtmlSnapshot;
    use crate::style::owned_css::{Atrule, Comment, Declaration, Rule};
    use pretty_assertions::assert_eq;

    const PAGE: &str = r#"<!DOCTYPE html>
<html><body><div class="card"><p>Hi</p></div></body></html>"#;

    fn rule(prelude: &str) -> Node {
        Node::Rule(Rule::new(prelude, vec![Declaration::new("color", "red")]))
    }

    #[test]
    fn prunes_merges_and_sweeps() {
        let snapshot = HtmlSnapshot::parse("page", PAGE);
        let order = vec!["b.css".to_string(), "a.css".to_string()];
        let sheets = vec![
            Stylesheet::new(
                "a.css",
                vec![
                    Node::Comment(Comment::new("! a license ")),
                    rule(".card p, .gone"),
                    Node::Atrule(Atrule::with_rules("keyframes", "unused", vec![])),
                ],
            ),
            Stylesheet::new(
                "b.css",
                vec![
                    Node::Comment(Comment::new("! b license ")),
                    rule("div"),
                    Node::Atrule(Atrule::with_rules("media", "print", vec![rule("p")])),
                ],
            ),
        ];
        let nodes = prune_parsed(&[&snapshot], &order, sheets, &TrimOptions::default()).unwrap();
        assert_eq!(
            codec::render(&nodes),
            "/*! b license */\n/*! a license */\ndiv{color:red}\n.card p{color:red}\n"
        );
    }

    #[test]
    fn end_to_end_through_lightningcss() {
        let snapshot = HtmlSnapshot::parse("page", PAGE);
        let mut registry = HrefRegistry::new();
        registry.discover("https://example.com/site.css");
        let stylesheets = HashMap::from([(
            "https://example.com/site.css".to_string(),
            ".card { color: red } .nope { color: blue } p:hover { color: green }".to_string(),
        )]);
        let output = minimize(
            TrimInput {
                snapshots: vec![&snapshot],
                registry,
                stylesheets,
                origin: Url::parse("https://example.com/").ok(),
            },
            &TrimOptions::default(),
        )
        .unwrap();
        assert!(output.css.contains(".card"));
        assert!(output.css.contains("p:hover"));
        assert!(!output.css.contains(".nope"));
        assert_eq!(output.stylesheet_contents.len(), 1);
    }

    #[test]
    fn missing_stylesheet_stops_the_run() {
        let snapshot = HtmlSnapshot::parse("page", PAGE);
        let mut registry = HrefRegistry::new();
        registry.discover("https://example.com/missing.css");
        let err = minimize(
            TrimInput {
                snapshots: vec![&snapshot],
                registry,
                stylesheets: HashMap::new(),
                origin: None,
            },
            &TrimOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, TrimError::MissingStylesheets { .. }));
    }
}
