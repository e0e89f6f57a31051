use crate::dom::dom_tree::{self, ElementNode, Handle, Node};
use crate::error::UnsupportedSelector;
use std::iter::Peekable;
use std::str::Chars;

/// ------------------------------
/// 1. Selector Parsing
/// ------------------------------

/// Supported attribute selector operators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeOperator {
    /// [attr="value"]
    Exact,
    /// [attr~="value"]
    Includes,
    /// [attr|="value"]
    DashMatch,
    /// [attr^="value"]
    Prefix,
    /// [attr$="value"]
    Suffix,
    /// [attr*="value"]
    Substring,
}

/// Represents one attribute condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeSelector {
    pub name: String,
    pub operator: Option<AttributeOperator>, // None means only existence check
    pub value: Option<String>,
    /// The ` i` flag.
    pub case_insensitive: bool,
}

/// A compound selector: an optional tag, ids, classes and attribute conditions.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CompoundSelector {
    pub tag: Option<String>,
    pub ids: Vec<String>,
    pub classes: Vec<String>,
    pub attributes: Vec<AttributeSelector>,
}

/// A complex selector composed of a key compound selector and a list of ancestor parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComplexSelector {
    pub key: CompoundSelector,
    /// Ancestors with their combinators, in right-to-left order.
    pub ancestors: Vec<(Combinator, CompoundSelector)>,
}

/// Supported combinators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    /// Descendant combinator (a space).
    Descendant,
    /// Child combinator (`>`).
    Child,
    /// Adjacent sibling combinator (`+`).
    AdjacentSibling,
    /// General sibling combinator (`~`).
    GeneralSibling,
}

struct SelectorParser<'a> {
    source: &'a str,
    chars: Peekable<Chars<'a>>,
}

impl<'a> SelectorParser<'a> {
    fn unsupported(&self, reason: impl Into<String>) -> UnsupportedSelector {
        UnsupportedSelector::new(self.source, reason)
    }

    fn skip_whitespace(&mut self) -> bool {
        let mut skipped = false;
        while self.chars.peek().is_some_and(|c| c.is_whitespace()) {
            self.chars.next();
            skipped = true;
        }
        skipped
    }

    /// Reads a CSS identifier, resolving `\` escapes.
    fn identifier(&mut self) -> Result<String, UnsupportedSelector> {
        let mut ident = String::new();
        while let Some(&c) = self.chars.peek() {
            if c == '\\' {
                self.chars.next();
                ident.push(self.escape()?);
            } else if c.is_alphanumeric() || c == '-' || c == '_' || !c.is_ascii() {
                ident.push(c);
                self.chars.next();
            } else {
                break;
            }
        }
        if ident.is_empty() {
            return Err(self.unsupported("expected an identifier"));
        }
        Ok(ident)
    }

    /// The character after a backslash: up to six hex digits or a literal.
    fn escape(&mut self) -> Result<char, UnsupportedSelector> {
        let mut hex = String::new();
        while hex.len() < 6 && self.chars.peek().is_some_and(|c| c.is_ascii_hexdigit()) {
            hex.extend(self.chars.next());
        }
        if hex.is_empty() {
            return self
                .chars
                .next()
                .ok_or_else(|| self.unsupported("dangling escape"));
        }
        // A single whitespace terminates a hex escape.
        if self.chars.peek().is_some_and(|c| c.is_whitespace()) {
            self.chars.next();
        }
        let code = u32::from_str_radix(&hex, 16).unwrap_or(0xFFFD);
        Ok(char::from_u32(code)
            .filter(|&c| c != '\0')
            .unwrap_or('\u{FFFD}'))
    }

    fn quoted(&mut self, quote: char) -> Result<String, UnsupportedSelector> {
        let mut value = String::new();
        loop {
            match self.chars.next() {
                Some('\\') => value.push(self.escape()?),
                Some(c) if c == quote => return Ok(value),
                Some(c) => value.push(c),
                None => return Err(self.unsupported("unterminated string")),
            }
        }
    }

    fn attribute(&mut self) -> Result<AttributeSelector, UnsupportedSelector> {
        self.skip_whitespace();
        if self.chars.peek() == Some(&'|') {
            return Err(self.unsupported("namespaced attributes are not supported"));
        }
        let name = self.identifier()?.to_ascii_lowercase();
        self.skip_whitespace();

        let operator = match self.chars.next() {
            Some(']') => {
                return Ok(AttributeSelector {
                    name,
                    operator: None,
                    value: None,
                    case_insensitive: false,
                })
            }
            Some('=') => AttributeOperator::Exact,
            Some(op @ ('~' | '|' | '^' | '$' | '*')) => {
                if self.chars.next() != Some('=') {
                    return Err(self.unsupported(format!("bad attribute operator `{}`", op)));
                }
                match op {
                    '~' => AttributeOperator::Includes,
                    '|' => AttributeOperator::DashMatch,
                    '^' => AttributeOperator::Prefix,
                    '$' => AttributeOperator::Suffix,
                    _ => AttributeOperator::Substring,
                }
            }
            _ => return Err(self.unsupported("malformed attribute selector")),
        };

        self.skip_whitespace();
        let value = match self.chars.peek() {
            Some(&q) if q == '"' || q == '\'' => {
                self.chars.next();
                self.quoted(q)?
            }
            _ => self.identifier()?,
        };
        self.skip_whitespace();

        let mut case_insensitive = false;
        if let Some(&flag) = self.chars.peek() {
            if flag == 'i' || flag == 'I' || flag == 's' || flag == 'S' {
                self.chars.next();
                case_insensitive = flag.eq_ignore_ascii_case(&'i');
                self.skip_whitespace();
            }
        }
        if self.chars.next() != Some(']') {
            return Err(self.unsupported("unterminated attribute selector"));
        }
        Ok(AttributeSelector {
            name,
            operator: Some(operator),
            value: Some(value),
            case_insensitive,
        })
    }

    fn compound(&mut self) -> Result<CompoundSelector, UnsupportedSelector> {
        let mut compound = CompoundSelector::default();
        let mut empty = true;

        match self.chars.peek() {
            Some('*') => {
                self.chars.next();
                empty = false;
            }
            Some(&c) if c.is_alphabetic() || c == '_' || c == '\\' || !c.is_ascii() => {
                compound.tag = Some(self.identifier()?.to_ascii_lowercase());
                empty = false;
            }
            _ => {}
        }
        if self.chars.peek() == Some(&'|') {
            return Err(self.unsupported("namespaces are not supported"));
        }

        while let Some(&c) = self.chars.peek() {
            match c {
                '#' => {
                    self.chars.next();
                    compound.ids.push(self.identifier()?);
                }
                '.' => {
                    self.chars.next();
                    compound.classes.push(self.identifier()?);
                }
                '[' => {
                    self.chars.next();
                    compound.attributes.push(self.attribute()?);
                }
                ':' => return Err(self.unsupported("pseudo-classes cannot be evaluated")),
                '&' => return Err(self.unsupported("nesting selectors cannot be evaluated")),
                _ => break,
            }
            empty = false;
        }

        if empty {
            return Err(self.unsupported("expected a compound selector"));
        }
        Ok(compound)
    }

    fn combinator(&mut self) -> Result<Option<Combinator>, UnsupportedSelector> {
        let had_whitespace = self.skip_whitespace();
        let combinator = match self.chars.peek().copied() {
            None => return Ok(None),
            Some('>') => Combinator::Child,
            Some('+') => Combinator::AdjacentSibling,
            Some('~') => Combinator::GeneralSibling,
            Some(',') => return Err(self.unsupported("selector lists are evaluated one by one")),
            Some(_) if had_whitespace => return Ok(Some(Combinator::Descendant)),
            Some(c) => return Err(self.unsupported(format!("unexpected `{}`", c))),
        };
        self.chars.next();
        self.skip_whitespace();
        Ok(Some(combinator))
    }
}

/// Parse a selector string (e.g. "div.red > p#header + span.foo") into a ComplexSelector.
///
/// Anything the snapshot matcher cannot evaluate is reported as unsupported
/// rather than approximated.
pub fn parse_selector(selector: &str) -> Result<ComplexSelector, UnsupportedSelector> {
    let mut parser = SelectorParser {
        source: selector,
        chars: selector.chars().peekable(),
    };
    parser.skip_whitespace();

    let mut compounds = vec![parser.compound()?];
    let mut combinators = Vec::new();
    while let Some(combinator) = parser.combinator()? {
        combinators.push(combinator);
        compounds.push(parser.compound()?);
    }

    // compounds are left-to-right; the key is the last one.
    let key = compounds.pop().unwrap_or_default();
    let ancestors = combinators
        .into_iter()
        .rev()
        .zip(compounds.into_iter().rev())
        .collect();
    Ok(ComplexSelector { key, ancestors })
}

/// ------------------------------
/// 2. Selector Matching
/// ------------------------------

fn eq_case(a: &str, b: &str, fold_case: bool) -> bool {
    if fold_case {
        a.eq_ignore_ascii_case(b)
    } else {
        a == b
    }
}

fn matches_attribute(elem: &ElementNode, attr_sel: &AttributeSelector) -> bool {
    let Some(actual) = elem.attribute(&attr_sel.name) else {
        return false;
    };
    let (Some(operator), Some(expected)) = (&attr_sel.operator, &attr_sel.value) else {
        return true;
    };
    let (actual, expected) = if attr_sel.case_insensitive {
        (actual.to_lowercase(), expected.to_lowercase())
    } else {
        (actual.to_string(), expected.clone())
    };
    match operator {
        AttributeOperator::Exact => actual == expected,
        AttributeOperator::Includes => actual.split_whitespace().any(|word| word == expected),
        AttributeOperator::DashMatch => {
            actual == expected || actual.starts_with(&format!("{}-", expected))
        }
        // Empty values never match for the substring operators.
        AttributeOperator::Prefix => !expected.is_empty() && actual.starts_with(&expected),
        AttributeOperator::Suffix => !expected.is_empty() && actual.ends_with(&expected),
        AttributeOperator::Substring => !expected.is_empty() && actual.contains(&expected),
    }
}

/// Returns true if the given ElementNode matches the CompoundSelector.
///
/// `fold_case` makes id and class comparisons ASCII case-insensitive, as in quirks mode.
pub fn matches_compound(elem: &ElementNode, compound: &CompoundSelector, fold_case: bool) -> bool {
    if let Some(ref tag) = compound.tag {
        if !elem.tag.eq_ignore_ascii_case(tag) {
            return false;
        }
    }
    for id in &compound.ids {
        match elem.attribute("id") {
            Some(elem_id) if eq_case(elem_id, id, fold_case) => {}
            _ => return false,
        }
    }
    if !compound.classes.is_empty() {
        let class_attr = elem.attribute("class").unwrap_or_default();
        let has_all = compound.classes.iter().all(|class| {
            class_attr
                .split_whitespace()
                .any(|have| eq_case(have, class, fold_case))
        });
        if !has_all {
            return false;
        }
    }
    compound
        .attributes
        .iter()
        .all(|attr_sel| matches_attribute(elem, attr_sel))
}

fn handle_matches(handle: &Handle, compound: &CompoundSelector, fold_case: bool) -> bool {
    match &*handle.borrow() {
        Node::Element(elem) => matches_compound(elem, compound, fold_case),
        _ => false,
    }
}

/// Matches a ComplexSelector against a candidate element.
/// The matching proceeds right-to-left, using parent links and sibling order.
pub fn matches_complex_selector(candidate: &Handle, complex: &ComplexSelector, fold_case: bool) -> bool {
    handle_matches(candidate, &complex.key, fold_case)
        && matches_ancestors(candidate, &complex.ancestors, fold_case)
}

/// Backtracks over every ancestor or sibling that could satisfy each combinator.
fn matches_ancestors(
    node: &Handle,
    rest: &[(Combinator, CompoundSelector)],
    fold_case: bool,
) -> bool {
    let Some(((combinator, compound), tail)) = rest.split_first() else {
        return true;
    };
    let next = |candidate: &Handle| {
        handle_matches(candidate, compound, fold_case)
            && matches_ancestors(candidate, tail, fold_case)
    };
    match combinator {
        Combinator::Child => dom_tree::parent_element(node).is_some_and(|parent| next(&parent)),
        Combinator::Descendant => {
            let mut ancestor = dom_tree::parent_element(node);
            while let Some(current) = ancestor {
                if next(&current) {
                    return true;
                }
                ancestor = dom_tree::parent_element(&current);
            }
            false
        }
        Combinator::AdjacentSibling => dom_tree::preceding_element_siblings(node)
            .first()
            .is_some_and(|sibling| next(sibling)),
        Combinator::GeneralSibling => dom_tree::preceding_element_siblings(node)
            .iter()
            .any(|sibling| next(sibling)),
    }
}
