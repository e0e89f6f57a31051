use crate::snapshot::DomSnapshot;
use crate::style::selector_utils::SelectorMemo;
use log::{debug, warn};
use regex::Regex;
use std::collections::HashMap;

/// Selectors that are live on every page.
const ALWAYS_LIVE: [&str; 4] = ["*", "html", "body", ""];

/// Counters reported at the end of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReachabilityStats {
    /// Selectors handed to the snapshots.
    pub dom_queries: usize,
    /// Answers served from the decision cache.
    pub cache_hits: usize,
    /// Selectors declared dead because an ancestor prefix was dead.
    pub short_circuits: usize,
}

/// Decides, once per distinct selector, whether it can match any snapshot.
///
/// One instance is shared by every stylesheet of a run and dropped with it.
pub struct Reachability<'a> {
    snapshots: Vec<&'a dyn DomSnapshot>,
    whitelist: &'a [Regex],
    decisions: HashMap<String, bool>,
    memo: SelectorMemo,
    debug: bool,
    stats: ReachabilityStats,
}

impl<'a> Reachability<'a> {
    pub fn new(snapshots: Vec<&'a dyn DomSnapshot>, whitelist: &'a [Regex], debug: bool) -> Self {
        let decisions = ALWAYS_LIVE
            .iter()
            .map(|selector| (selector.to_string(), true))
            .collect();
        Reachability {
            snapshots,
            whitelist,
            decisions,
            memo: SelectorMemo::new(),
            debug,
            stats: ReachabilityStats::default(),
        }
    }

    pub fn stats(&self) -> ReachabilityStats {
        self.stats
    }

    /// Number of distinct selectors decided so far, the seeds included.
    pub fn decided(&self) -> usize {
        self.decisions.len()
    }

    /// Whether `selector` (one member of a selector group) should be kept.
    pub fn is_live(&mut self, selector: &str) -> bool {
        if let Some(&live) = self.decisions.get(selector) {
            self.stats.cache_hits += 1;
            return live;
        }
        let live = self.decide(selector);
        self.decisions.insert(selector.to_string(), live);
        live
    }

    fn decide(&mut self, selector: &str) -> bool {
        let reduced = self.memo.reduce_to_matchable(selector).to_string();
        if self.whitelist.iter().any(|pattern| pattern.is_match(&reduced)) {
            debug!("`{}` is whitelisted", selector);
            return true;
        }
        if reduced != selector {
            // `a:hover` shares its fate with `a`.
            return self.is_live(&reduced);
        }

        let prefixes = self.memo.ancestor_prefixes(&reduced).to_vec();
        for prefix in &prefixes {
            if !self.is_live(prefix) {
                self.stats.short_circuits += 1;
                return false;
            }
        }

        self.stats.dom_queries += 1;
        for snapshot in &self.snapshots {
            match snapshot.matches(&reduced) {
                Ok(true) => return true,
                Ok(false) => {}
                Err(unsupported) => {
                    if self.debug {
                        warn!("keeping {}", unsupported);
                    } else {
                        debug!("keeping {}", unsupported);
                    }
                    return true;
                }
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::UnsupportedSelector;
    use std::cell::{Cell, RefCell};
    use std::collections::HashSet;

    /// Answers from a fixed set of live selectors and records every query.
    struct FakeSnapshot {
        live: HashSet<&'static str>,
        calls: Cell<usize>,
        queried: RefCell<Vec<String>>,
    }

    impl FakeSnapshot {
        fn new(live: &[&'static str]) -> Self {
            FakeSnapshot {
                live: live.iter().copied().collect(),
                calls: Cell::new(0),
                queried: RefCell::new(Vec::new()),
            }
        }
    }

    impl DomSnapshot for FakeSnapshot {
        fn matches(&self, selector: &str) -> Result<bool, UnsupportedSelector> {
            self.calls.set(self.calls.get() + 1);
            self.queried.borrow_mut().push(selector.to_string());
            if selector.contains('@') {
                return Err(UnsupportedSelector::new(selector, "fake cannot do this"));
            }
            Ok(self.live.contains(selector))
        }
    }

    #[test]
    fn seeds_are_live_without_queries() {
        let snapshot = FakeSnapshot::new(&[]);
        let mut reach = Reachability::new(vec![&snapshot], &[], false);
        for selector in ["*", "html", "body", "", "::selection"] {
            assert!(reach.is_live(selector), "{} should be live", selector);
        }
        assert_eq!(snapshot.calls.get(), 0);
    }

    #[test]
    fn dead_prefix_short_circuits() {
        let snapshot = FakeSnapshot::new(&[".bar"]);
        let mut reach = Reachability::new(vec![&snapshot], &[], false);
        assert!(!reach.is_live(".foo"));
        assert_eq!(snapshot.calls.get(), 1);

        assert!(!reach.is_live(".foo .bar"));
        assert!(!reach.is_live(".foo > .bar .baz"));
        // the two compound selectors never reached the snapshot
        assert_eq!(snapshot.calls.get(), 1);
        assert_eq!(reach.stats().short_circuits, 2);
    }

    #[test]
    fn answers_are_cached() {
        let snapshot = FakeSnapshot::new(&["a"]);
        let mut reach = Reachability::new(vec![&snapshot], &[], false);
        assert!(reach.is_live("a:hover"));
        assert!(reach.is_live("a:focus"));
        assert!(reach.is_live("a"));
        assert_eq!(*snapshot.queried.borrow(), vec!["a".to_string()]);
        assert_eq!(reach.stats().dom_queries, 1);
        assert!(reach.stats().cache_hits >= 2);
    }

    #[test]
    fn any_snapshot_can_keep_a_selector() {
        let first = FakeSnapshot::new(&[".only-on-first"]);
        let second = FakeSnapshot::new(&[".only-on-second"]);
        let mut reach = Reachability::new(vec![&first, &second], &[], false);
        assert!(reach.is_live(".only-on-first"));
        assert!(reach.is_live(".only-on-second"));
        assert!(!reach.is_live(".nowhere"));
        // first `true` wins
        assert_eq!(second.calls.get(), 2);
    }

    #[test]
    fn whitelist_overrides_the_dom() {
        let snapshot = FakeSnapshot::new(&[]);
        let whitelist = vec![Regex::new(r"^\.js-modal$").unwrap()];
        let mut reach = Reachability::new(vec![&snapshot], &whitelist, false);
        assert!(reach.is_live(".js-modal"));
        assert!(reach.is_live(".js-modal:focus"));
        // a whitelisted prefix counts as live
        assert!(!reach.is_live(".js-modal .close"));
        assert_eq!(*snapshot.queried.borrow(), vec![".js-modal .close".to_string()]);
    }

    #[test]
    fn unsupported_selectors_are_kept() {
        let snapshot = FakeSnapshot::new(&[]);
        let mut reach = Reachability::new(vec![&snapshot], &[], true);
        assert!(reach.is_live("svg@odd"));
        assert!(reach.is_live("svg@odd"));
        assert_eq!(snapshot.calls.get(), 1);
    }
}
