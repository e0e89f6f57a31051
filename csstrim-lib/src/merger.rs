use crate::style::owned_css::{Node, Stylesheet};
use std::collections::HashSet;

/// Concatenates pruned stylesheets in cascade order.
///
/// `order` comes from the registry; hrefs without a pruned sheet contribute nothing.
pub fn merge(order: &[String], mut pruned: Vec<Stylesheet>) -> Vec<Node> {
    let mut merged = Vec::new();
    for href in order {
        if let Some(position) = pruned.iter().position(|sheet| &sheet.source_url == href) {
            merged.extend(pruned.swap_remove(position).nodes);
        }
    }
    merged
}

/// Moves every top-level `/*! ... */` comment to the front, keeping their
/// relative order. With `dedupe` only the first of identical comments stays.
pub fn lift_important_comments(nodes: Vec<Node>, dedupe: bool) -> Vec<Node> {
    let (mut important, rest): (Vec<Node>, Vec<Node>) = nodes
        .into_iter()
        .partition(|node| matches!(node, Node::Comment(comment) if comment.important));
    if dedupe {
        let mut seen = HashSet::new();
        important.retain(|node| match node {
            Node::Comment(comment) => seen.insert(comment.text.clone()),
            _ => true,
        });
    }
    important.extend(rest);
    important
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::codec::render;
    use crate::style::owned_css::{Comment, Declaration, Rule};
    use pretty_assertions::assert_eq;

    fn sheet(href: &str, prelude: &str) -> Stylesheet {
        Stylesheet::new(
            href,
            vec![Node::Rule(Rule::new(prelude, vec![Declaration::new("color", "red")]))],
        )
    }

    #[test]
    fn follows_registry_order() {
        let merged = merge(
            &["b.css".to_string(), "a.css".to_string(), "missing.css".to_string()],
            vec![sheet("a.css", ".a"), sheet("b.css", ".b")],
        );
        assert_eq!(render(&merged), ".b{color:red}\n.a{color:red}\n");
    }

    #[test]
    fn lifts_important_comments() {
        let nodes = vec![
            Node::Rule(Rule::new(".a", vec![Declaration::new("color", "red")])),
            Node::Comment(Comment::new("! L1 ")),
            Node::Comment(Comment::new(" plain ")),
            Node::Rule(Rule::new(".b", vec![Declaration::new("color", "blue")])),
            Node::Comment(Comment::new("! L2 ")),
        ];
        let lifted = lift_important_comments(nodes, false);
        assert_eq!(
            render(&lifted),
            "/*! L1 */\n/*! L2 */\n.a{color:red}\n/* plain */\n.b{color:blue}\n"
        );
    }

    #[test]
    fn dedupes_only_when_asked() {
        let nodes = vec![
            Node::Comment(Comment::new("! MIT ")),
            Node::Rule(Rule::new(".a", vec![])),
            Node::Comment(Comment::new("! MIT ")),
        ];
        assert_eq!(lift_important_comments(nodes.clone(), false).len(), 3);
        let deduped = lift_important_comments(nodes, true);
        assert_eq!(render(&deduped), "/*! MIT */\n.a{}\n");
    }
}
