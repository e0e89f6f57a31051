//! String-level helpers over raw selector text.
//!
//! None of these parse CSS grammar; they only need to know which characters
//! sit at the top level of a selector, i.e. outside quotes, escapes, comments
//! and `[]`, `()` or `{}` nesting.

use std::collections::HashMap;
use std::iter::Peekable;
use std::str::CharIndices;

/// Yields the `(byte offset, char)` pairs of `text` that are at the top level.
///
/// Opening brackets are yielded when they open a nesting level from the top,
/// closing brackets when they return to it. Quote characters, escaped
/// characters and comment bodies are never yielded.
pub(crate) struct TopLevel<'a> {
    chars: Peekable<CharIndices<'a>>,
    depth: usize,
    quote: Option<char>,
    in_comment: bool,
    underflow: bool,
}

impl<'a> TopLevel<'a> {
    pub(crate) fn new(text: &'a str) -> Self {
        TopLevel {
            chars: text.char_indices().peekable(),
            depth: 0,
            quote: None,
            in_comment: false,
            underflow: false,
        }
    }

    /// Only meaningful once the iterator is exhausted.
    pub(crate) fn is_balanced(&self) -> bool {
        self.depth == 0 && self.quote.is_none() && !self.in_comment && !self.underflow
    }
}

impl Iterator for TopLevel<'_> {
    type Item = (usize, char);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((index, c)) = self.chars.next() {
            if self.in_comment {
                if c == '*' && matches!(self.chars.peek(), Some((_, '/'))) {
                    self.chars.next();
                    self.in_comment = false;
                }
                continue;
            }
            if let Some(quote) = self.quote {
                if c == '\\' {
                    self.chars.next();
                } else if c == quote {
                    self.quote = None;
                }
                continue;
            }
            match c {
                '\\' => {
                    self.chars.next();
                }
                '/' if matches!(self.chars.peek(), Some((_, '*'))) => {
                    self.chars.next();
                    self.in_comment = true;
                }
                '"' | '\'' => self.quote = Some(c),
                '(' | '[' | '{' => {
                    self.depth += 1;
                    if self.depth == 1 {
                        return Some((index, c));
                    }
                }
                ')' | ']' | '}' => {
                    if self.depth == 0 {
                        self.underflow = true;
                        return Some((index, c));
                    }
                    self.depth -= 1;
                    if self.depth == 0 {
                        return Some((index, c));
                    }
                }
                _ if self.depth == 0 => return Some((index, c)),
                _ => {}
            }
        }
        None
    }
}

/// Truncates a selector at its first top-level `:`.
///
/// Pseudo-classes and pseudo-elements cannot be evaluated against a static
/// tree, so `a[href^="javascript:"]:after` becomes `a[href^="javascript:"]`.
/// A selector made only of a pseudo part reduces to the empty string.
pub fn reduce_to_matchable(selector: &str) -> String {
    let end = TopLevel::new(selector)
        .find(|&(_, c)| c == ':')
        .map_or(selector.len(), |(index, _)| index);
    selector[..end].trim().to_string()
}

fn is_combinator(c: char) -> bool {
    c.is_whitespace() || matches!(c, '>' | '+' | '~')
}

/// Every proper prefix of `selector` that ends right before a top-level
/// combinator, outermost first.
///
/// `.foo .bar .baz` gives `[".foo", ".foo .bar"]`; `.foo` gives nothing.
pub fn ancestor_prefixes(selector: &str) -> Vec<String> {
    let selector = selector.trim();
    let mut prefixes: Vec<String> = Vec::new();
    let mut run_start: Option<usize> = None;
    for (index, c) in TopLevel::new(selector) {
        if is_combinator(c) {
            run_start.get_or_insert(index);
            continue;
        }
        if let Some(start) = run_start.take() {
            let prefix = selector[..start].trim_end();
            if !prefix.is_empty() && prefixes.last().map(String::as_str) != Some(prefix) {
                prefixes.push(prefix.to_string());
            }
        }
    }
    prefixes
}

/// Strips one matching pair of surrounding `'` or `"`.
pub fn unquote(token: &str) -> &str {
    let bytes = token.as_bytes();
    if bytes.len() >= 2 {
        let first = bytes[0];
        if (first == b'"' || first == b'\'') && bytes[bytes.len() - 1] == first {
            return &token[1..token.len() - 1];
        }
    }
    token
}

/// Splits a selector group on its top-level commas.
///
/// Fails with a reason when quotes, brackets or comments are unbalanced, or
/// when one of the selectors in the group is empty.
pub fn split_selector_group(prelude: &str) -> Result<Vec<String>, String> {
    let mut scanner = TopLevel::new(prelude);
    let mut selectors = Vec::new();
    let mut start = 0;
    for (index, c) in scanner.by_ref() {
        if c == ',' {
            selectors.push(prelude[start..index].trim().to_string());
            start = index + 1;
        }
    }
    if !scanner.is_balanced() {
        return Err("unbalanced quotes, brackets or comments".to_string());
    }
    selectors.push(prelude[start..].trim().to_string());
    if selectors.iter().any(String::is_empty) {
        return Err("empty selector in group".to_string());
    }
    Ok(selectors)
}

/// Splits any comma-separated value list on its top-level commas.
pub(crate) fn split_top_level_commas(value: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    for (index, c) in TopLevel::new(value) {
        if c == ',' {
            parts.push(value[start..index].trim());
            start = index + 1;
        }
    }
    parts.push(value[start..].trim());
    parts
}

/// Per-run memo of the selector helpers; identical selectors recur heavily
/// across stylesheets.
#[derive(Debug, Default)]
pub struct SelectorMemo {
    reduced: HashMap<String, String>,
    prefixes: HashMap<String, Vec<String>>,
}

impl SelectorMemo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reduce_to_matchable(&mut self, selector: &str) -> &str {
        if !self.reduced.contains_key(selector) {
            let reduced = reduce_to_matchable(selector);
            self.reduced.insert(selector.to_string(), reduced);
        }
        &self.reduced[selector]
    }

    pub fn ancestor_prefixes(&mut self, selector: &str) -> &[String] {
        if !self.prefixes.contains_key(selector) {
            let prefixes = ancestor_prefixes(selector);
            self.prefixes.insert(selector.to_string(), prefixes);
        }
        &self.prefixes[selector]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_unquote() {
        assert_eq!(unquote("\"peter\""), "peter");
        assert_eq!(unquote("'peter'"), "peter");
        // unbalanced stays as is
        assert_eq!(unquote("\"peter"), "\"peter");
        assert_eq!(unquote("'peter\""), "'peter\"");
        assert_eq!(unquote(""), "");
        assert_eq!(unquote("\""), "\"");
    }

    #[test]
    fn test_reduce_to_matchable() {
        assert_eq!(reduce_to_matchable("a:hover"), "a");
        assert_eq!(
            reduce_to_matchable("a[href^=\"javascript:\"]:after"),
            "a[href^=\"javascript:\"]"
        );
        assert_eq!(
            reduce_to_matchable("a[href^='javascript:']:after"),
            "a[href^='javascript:']"
        );
        assert_eq!(reduce_to_matchable(".md\\:flex"), ".md\\:flex");
        assert_eq!(reduce_to_matchable("::before"), "");
        assert_eq!(reduce_to_matchable(".list li:not(.x) a"), ".list li");
    }

    #[test]
    fn test_ancestor_prefixes() {
        assert_eq!(ancestor_prefixes(".foo .bar"), vec![".foo"]);
        assert_eq!(ancestor_prefixes(".foo .bar .baz"), vec![".foo", ".foo .bar"]);
        assert!(ancestor_prefixes(".foo").is_empty());
        assert_eq!(
            ancestor_prefixes(".ui.dropdown>.dropdown.icon:before"),
            vec![".ui.dropdown"]
        );
        assert_eq!(
            ancestor_prefixes(".ui.vertical.menu .dropdown.item>.dropdown.icon:before"),
            vec![".ui.vertical.menu", ".ui.vertical.menu .dropdown.item"]
        );
        assert_eq!(
            ancestor_prefixes(
                ".ui.search.selection>.icon.input:not([class*=\"left icon\"])>.icon~.remove.icon"
            ),
            vec![
                ".ui.search.selection",
                ".ui.search.selection>.icon.input:not([class*=\"left icon\"])",
                ".ui.search.selection>.icon.input:not([class*=\"left icon\"])>.icon",
            ]
        );
        assert_eq!(
            ancestor_prefixes(".ui[class*=\"right aligned\"].search>.results"),
            vec![".ui[class*=\"right aligned\"].search"]
        );
        assert_eq!(ancestor_prefixes("ul > li + li"), vec!["ul", "ul > li"]);
    }

    #[test]
    fn test_split_selector_group() {
        assert_eq!(
            split_selector_group("a, b ,c[title=\"x,y\"]").unwrap(),
            vec!["a", "b", "c[title=\"x,y\"]"]
        );
        assert_eq!(
            split_selector_group(":is(a, b) c").unwrap(),
            vec![":is(a, b) c"]
        );
        assert!(split_selector_group("a,,b").is_err());
        assert!(split_selector_group("a[title=\"x").is_err());
        assert!(split_selector_group("a:not(b").is_err());
        assert!(split_selector_group("").is_err());
    }

    #[test]
    fn memo_returns_the_same_answers() {
        let mut memo = SelectorMemo::new();
        assert_eq!(memo.reduce_to_matchable("a:hover"), "a");
        assert_eq!(memo.reduce_to_matchable("a:hover"), "a");
        assert_eq!(memo.ancestor_prefixes("a b").to_vec(), vec!["a".to_string()]);
    }
}
