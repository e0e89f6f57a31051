use crate::error::TrimError;
use crate::reachability::Reachability;
use crate::style::owned_css::{Atrule, AtruleBlock, Node, Rule, Stylesheet};
use crate::style::selector_utils::split_selector_group;
use log::{trace, warn};

/// Removes every selector, rule and `@media` block that no snapshot can reach.
pub struct RulePruner<'r, 'a> {
    reachability: &'r mut Reachability<'a>,
    ignore_css_errors: bool,
}

impl<'r, 'a> RulePruner<'r, 'a> {
    pub fn new(reachability: &'r mut Reachability<'a>, ignore_css_errors: bool) -> Self {
        RulePruner {
            reachability,
            ignore_css_errors,
        }
    }

    /// Builds the pruned copy of `stylesheet`.
    ///
    /// Anything other than style rules and `@media` passes through untouched;
    /// keyframes and font faces are left to the liveness pass.
    pub fn prune(&mut self, stylesheet: Stylesheet) -> Result<Stylesheet, TrimError> {
        let nodes = self.prune_nodes(&stylesheet.source_url, stylesheet.nodes)?;
        Ok(Stylesheet::new(stylesheet.source_url, nodes))
    }

    fn prune_nodes(&mut self, href: &str, nodes: Vec<Node>) -> Result<Vec<Node>, TrimError> {
        let mut kept = Vec::with_capacity(nodes.len());
        for node in nodes {
            let pruned = match node {
                Node::Rule(rule) => self.prune_rule(href, rule)?.map(Node::Rule),
                Node::Atrule(atrule) if atrule.base_name() == "media" => {
                    self.prune_media(href, atrule)?.map(Node::Atrule)
                }
                other => Some(other),
            };
            kept.extend(pruned);
        }
        Ok(kept)
    }

    fn prune_rule(&mut self, href: &str, mut rule: Rule) -> Result<Option<Rule>, TrimError> {
        let selectors = match split_selector_group(&rule.prelude) {
            Ok(selectors) => selectors,
            Err(reason) if self.ignore_css_errors => {
                warn!("{}: dropping `{}`: {}", href, rule.prelude, reason);
                return Ok(None);
            }
            Err(reason) => {
                return Err(TrimError::InvalidCss {
                    href: href.to_string(),
                    prelude: rule.prelude,
                    reason,
                })
            }
        };

        let live: Vec<String> = selectors
            .into_iter()
            .filter(|selector| self.reachability.is_live(selector))
            .collect();
        if live.is_empty() {
            trace!("{}: dropping `{}`", href, rule.prelude);
            return Ok(None);
        }
        rule.prelude = live.join(", ");
        Ok(Some(rule))
    }

    fn prune_media(&mut self, href: &str, mut atrule: Atrule) -> Result<Option<Atrule>, TrimError> {
        if is_print_only(&atrule.prelude) {
            trace!("{}: dropping @media {}", href, atrule.prelude);
            return Ok(None);
        }
        atrule.block = match atrule.block {
            Some(AtruleBlock::Rules(rules)) => {
                let rules = self.prune_nodes(href, rules)?;
                if rules.is_empty() {
                    return Ok(None);
                }
                Some(AtruleBlock::Rules(rules))
            }
            other => other,
        };
        Ok(Some(atrule))
    }
}

/// `@media print`, in any case and spacing.
fn is_print_only(prelude: &str) -> bool {
    let compact: String = prelude.chars().filter(|c| !c.is_whitespace()).collect();
    compact.eq_ignore_ascii_case("print")
}
