//! Removes `@keyframes` and `@font-face` blocks nothing refers to.
//!
//! Works on the merged tree, after selector pruning, so only declarations of
//! surviving rules count as references.

use crate::style::owned_css::{strip_vendor_prefix, Atrule, AtruleBlock, Declaration, Node};
use crate::style::selector_utils::{split_top_level_commas, unquote};
use log::debug;
use std::collections::HashSet;

/// Keywords of the `animation` shorthand that can never be an animation name.
const ANIMATION_KEYWORDS: &[&str] = &[
    "ease",
    "ease-in",
    "ease-out",
    "ease-in-out",
    "linear",
    "step-start",
    "step-end",
    "infinite",
    "normal",
    "reverse",
    "alternate",
    "alternate-reverse",
    "forwards",
    "backwards",
    "both",
    "running",
    "paused",
    "initial",
    "inherit",
    "unset",
    "none",
];

/// Names referenced by the surviving declarations.
#[derive(Debug, Default)]
struct References {
    animations: HashSet<String>,
    fonts: HashSet<String>,
    /// A `var()` hides the real name, so that sweep is skipped.
    dynamic_animation: bool,
    dynamic_font: bool,
}

/// Drops unreferenced keyframes and font faces from `nodes`.
pub fn remove_dead_at_rules(nodes: Vec<Node>) -> Vec<Node> {
    let mut refs = References::default();
    collect(&nodes, false, &mut refs);
    debug!(
        "{} animation names and {} font families in use",
        refs.animations.len(),
        refs.fonts.len()
    );
    sweep(nodes, &refs)
}

fn collect(nodes: &[Node], in_font_face: bool, refs: &mut References) {
    for node in nodes {
        match node {
            Node::Rule(rule) => collect_declarations(&rule.block.declarations, in_font_face, refs),
            Node::Atrule(atrule) => {
                let name = atrule.base_name();
                // Keyframe steps are only referenced, never a reference.
                if name == "keyframes" {
                    continue;
                }
                let in_font_face = in_font_face || name == "font-face";
                match &atrule.block {
                    Some(AtruleBlock::Rules(rules)) => collect(rules, in_font_face, refs),
                    Some(AtruleBlock::Declarations(block)) => {
                        collect_declarations(&block.declarations, in_font_face, refs)
                    }
                    Some(AtruleBlock::Raw(_)) | None => {}
                }
            }
            Node::Comment(_) => {}
        }
    }
}

fn collect_declarations(declarations: &[Declaration], in_font_face: bool, refs: &mut References) {
    for decl in declarations {
        let property = strip_vendor_prefix(&decl.property).to_ascii_lowercase();
        match property.as_str() {
            "animation" | "animation-name" => {
                if decl.value.contains("var(") {
                    refs.dynamic_animation = true;
                }
                refs.animations.extend(animation_names(&decl.value));
            }
            // The descriptor inside @font-face declares a family, it does not use one.
            "font-family" if !in_font_face => {
                if decl.value.contains("var(") {
                    refs.dynamic_font = true;
                }
                refs.fonts.extend(font_families(&decl.value));
            }
            "font" if !in_font_face => {
                if decl.value.contains("var(") {
                    refs.dynamic_font = true;
                }
                refs.fonts.extend(shorthand_font_families(&decl.value));
            }
            _ => {}
        }
    }
}

/// Splits a value into whitespace-separated tokens, keeping strings and
/// function calls whole.
fn tokens(value: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut start = None;
    let mut depth = 0usize;
    let mut quote = None;
    for (index, c) in value.char_indices() {
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
        } else if c.is_whitespace() && depth == 0 {
            if let Some(s) = start.take() {
                tokens.push(&value[s..index]);
            }
            continue;
        } else {
            match c {
                '"' | '\'' => quote = Some(c),
                '(' => depth += 1,
                ')' => depth = depth.saturating_sub(1),
                _ => {}
            }
        }
        start.get_or_insert(index);
    }
    if let Some(s) = start {
        tokens.push(&value[s..]);
    }
    tokens
}

fn is_identifier(token: &str) -> bool {
    let is_name_char = |c: char| c.is_alphanumeric() || c == '-' || c == '_' || !c.is_ascii();
    let body = token.trim_start_matches('-');
    body.chars()
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_' || !c.is_ascii())
        && token.chars().all(is_name_char)
}

/// One name per comma-separated animation layer.
fn animation_names(value: &str) -> Vec<String> {
    split_top_level_commas(value)
        .into_iter()
        .filter_map(|layer| {
            tokens(layer).into_iter().find_map(|token| {
                let unquoted = unquote(token);
                if unquoted.len() != token.len() {
                    // `animation-name: "spin"`
                    return Some(unquoted.to_lowercase());
                }
                let lower = token.to_lowercase();
                (is_identifier(token) && !ANIMATION_KEYWORDS.contains(&lower.as_str()))
                    .then_some(lower)
            })
        })
        .collect()
}

fn family_name(family: &str) -> Option<String> {
    let name = unquote(family.trim()).trim();
    (!name.is_empty()).then(|| name.to_lowercase())
}

fn font_families(value: &str) -> Vec<String> {
    split_top_level_commas(value)
        .into_iter()
        .filter_map(family_name)
        .collect()
}

/// The family list of a `font` shorthand: whatever follows the size token
/// (`12px`, `1.2em/1.5`, ...) in the first segment, plus the later segments.
fn shorthand_font_families(value: &str) -> Vec<String> {
    let segments = split_top_level_commas(value);
    let Some((first, rest)) = segments.split_first() else {
        return Vec::new();
    };
    let first_tokens = tokens(first);
    let Some(size_at) = first_tokens.iter().position(|token| is_font_size(token)) else {
        // system fonts such as `font: menu`
        return Vec::new();
    };
    let mut after_size = &first_tokens[size_at + 1..];
    // a line height written apart from the size: `12px / 1.5` or `12px /1.5`
    match after_size.first() {
        Some(&"/") => after_size = after_size.get(2..).unwrap_or_default(),
        Some(token) if token.starts_with('/') => after_size = &after_size[1..],
        _ => {}
    }
    let mut families = Vec::new();
    families.extend(family_name(&after_size.join(" ")));
    families.extend(rest.iter().copied().filter_map(family_name));
    families
}

/// Sizes carry a unit; a bare number in the shorthand is a weight.
fn is_font_size(token: &str) -> bool {
    let size = token.split('/').next().unwrap_or(token);
    let starts_numeric = size
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_digit() || c == '.');
    let has_unit = size.chars().any(|c| c.is_ascii_alphabetic() || c == '%');
    (starts_numeric && (has_unit || size == "0"))
        || matches!(
            size.to_ascii_lowercase().as_str(),
            "xx-small"
                | "x-small"
                | "small"
                | "medium"
                | "large"
                | "x-large"
                | "xx-large"
                | "xxx-large"
                | "smaller"
                | "larger"
        )
        || size.starts_with("calc(")
        || size.starts_with("var(")
}

fn sweep(nodes: Vec<Node>, refs: &References) -> Vec<Node> {
    nodes
        .into_iter()
        .filter_map(|node| match node {
            Node::Atrule(atrule) => sweep_atrule(atrule, refs).map(Node::Atrule),
            other => Some(other),
        })
        .collect()
}

fn sweep_atrule(mut atrule: Atrule, refs: &References) -> Option<Atrule> {
    match atrule.base_name().as_str() {
        "keyframes" if !refs.dynamic_animation => {
            let name = unquote(atrule.prelude.trim()).to_lowercase();
            if !refs.animations.contains(&name) {
                debug!("dropping unused @{} {}", atrule.name, atrule.prelude);
                return None;
            }
            return Some(atrule);
        }
        "font-face" if !refs.dynamic_font => {
            let family = atrule
                .declarations()
                .and_then(|block| block.get("font-family"))
                .and_then(|decl| family_name(&decl.value));
            // a face without a family cannot be matched by name
            if family.is_some_and(|family| !refs.fonts.contains(&family)) {
                debug!("dropping unused @font-face {}", atrule.prelude);
                return None;
            }
            return Some(atrule);
        }
        _ => {}
    }
    match atrule.block {
        Some(AtruleBlock::Rules(rules)) if !rules.is_empty() => {
            let rules = sweep(rules, refs);
            if rules.is_empty() {
                return None;
            }
            atrule.block = Some(AtruleBlock::Rules(rules));
        }
        _ => {}
    }
    Some(atrule)
}
