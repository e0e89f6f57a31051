//! Conversion between CSS text and the owned stylesheet model.
//!
//! Parsing goes through lightningcss; style and media rules are read off its
//! typed tree, every other rule is printed back by lightningcss and split
//! structurally. The final text is minified by lightningcss as well.

use crate::error::TrimError;
use crate::style::owned_css::{
    write_nodes, Atrule, AtruleBlock, Comment, Declaration, DeclarationBlock, Node, Rule,
    Stylesheet,
};
use crate::style::selector_utils::TopLevel;
use lightningcss::error::{Error as LcssError, ParserError};
use lightningcss::rules::{style::StyleRule, CssRule, CssRuleList};
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};
use lightningcss::traits::ToCss;
use log::{debug, warn};
use std::sync::{Arc, RwLock};

/// At-rules whose block holds rules rather than descriptors.
const CONTAINER_AT_RULES: &[&str] = &[
    "media",
    "supports",
    "document",
    "layer",
    "container",
    "keyframes",
    "scope",
    "starting-style",
];

/// Oldest browsers the printed CSS has to parse in. None of them reads media
/// query ranges, so `(min-width: ..)` features keep their legacy form.
fn output_targets() -> Targets {
    Targets::from(Browsers {
        chrome: Some(95 << 16),
        edge: Some(95 << 16),
        firefox: Some(91 << 16),
        safari: Some(15 << 16),
        ios_saf: Some(15 << 16),
        ..Browsers::default()
    })
}

fn printer_options(minify: bool) -> PrinterOptions<'static> {
    PrinterOptions {
        minify,
        targets: output_targets(),
        ..PrinterOptions::default()
    }
}

/// Parse a raw CSS string (LightningCSS) and convert it to a fully-owned stylesheet.
///
/// With `ignore_css_errors` lightningcss recovers from malformed rules and the
/// recovered errors are logged; a sheet it still rejects becomes empty.
pub fn parse_stylesheet(
    href: &str,
    css_text: &str,
    ignore_css_errors: bool,
) -> Result<Stylesheet, TrimError> {
    let warnings = Arc::new(RwLock::new(Vec::new()));
    let parser_opts = ParserOptions {
        filename: href.to_string(),
        error_recovery: ignore_css_errors,
        warnings: ignore_css_errors.then(|| Arc::clone(&warnings)),
        ..ParserOptions::default()
    };

    let sheet = match StyleSheet::parse(css_text, parser_opts) {
        Ok(sheet) => sheet,
        Err(e) if ignore_css_errors => {
            warn!("ignoring unparsable stylesheet {}: {}", href, e);
            return Ok(Stylesheet::new(href, Vec::new()));
        }
        Err(e) => return Err(invalid_css(href, css_text, &e)),
    };

    if let Ok(recovered) = warnings.read() {
        for e in recovered.iter() {
            warn!("ignoring CSS error in {}: {}", href, e);
        }
    }

    // lightningcss only keeps the comments ahead of the first rule.
    let mut nodes: Vec<Node> = important_comments(css_text)
        .into_iter()
        .map(|text| Node::Comment(Comment::new(text)))
        .collect();
    nodes.extend(convert_rules(href, &sheet.rules)?);

    debug!("parsed {} top-level nodes from {}", nodes.len(), href);
    Ok(Stylesheet::new(href, nodes))
}

/// Bodies of the top-level `/*! ... */` comments of `css_text`, in source order.
fn important_comments(css_text: &str) -> Vec<&str> {
    let mut comments = Vec::new();
    let mut chars = css_text.char_indices().peekable();
    let mut depth = 0usize;
    let mut quote = None;
    while let Some((index, c)) = chars.next() {
        if let Some(q) = quote {
            if c == '\\' {
                chars.next();
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\\' => {
                chars.next();
            }
            '"' | '\'' => quote = Some(c),
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            '/' if matches!(chars.peek(), Some((_, '*'))) => {
                let start = index + 2;
                let Some(len) = css_text[start..].find("*/") else {
                    break;
                };
                let body = &css_text[start..start + len];
                if depth == 0 && body.starts_with('!') {
                    comments.push(body);
                }
                while chars.peek().is_some_and(|&(i, _)| i < start + len + 2) {
                    chars.next();
                }
            }
            _ => {}
        }
    }
    comments
}

fn invalid_css(href: &str, css_text: &str, e: &LcssError<ParserError<'_>>) -> TrimError {
    // loc.line is 0-based
    let prelude = e
        .loc
        .as_ref()
        .and_then(|loc| css_text.lines().nth(loc.line as usize))
        .unwrap_or_default()
        .trim()
        .to_string();
    TrimError::InvalidCss {
        href: href.to_string(),
        prelude,
        reason: e.kind.to_string(),
    }
}

fn codec_error(href: &str, message: impl std::fmt::Display) -> TrimError {
    TrimError::Codec {
        message: format!("{}: {}", href, message),
    }
}

fn convert_rules(href: &str, rules: &CssRuleList<'_>) -> Result<Vec<Node>, TrimError> {
    let mut nodes = Vec::new();
    for rule in &rules.0 {
        match rule {
            CssRule::Style(style_rule) => nodes.push(convert_style_rule(href, style_rule)?),
            CssRule::Media(media_rule) => {
                let query = media_rule
                    .query
                    .to_css_string(printer_options(false))
                    .map_err(|e| codec_error(href, e))?;
                let inner = convert_rules(href, &media_rule.rules)?;
                nodes.push(Node::Atrule(Atrule::with_rules("media", query, inner)));
            }
            CssRule::Ignored => {}
            other => {
                let text = other
                    .to_css_string(printer_options(false))
                    .map_err(|e| codec_error(href, e))?;
                nodes.extend(read_nodes(href, &text)?);
            }
        }
    }
    Ok(nodes)
}

/// Helper to copy a single StyleRule's selectors + declarations into a Rule.
fn convert_style_rule(href: &str, style_rule: &StyleRule<'_>) -> Result<Node, TrimError> {
    let mut selectors_vec = Vec::new();
    for selector in &style_rule.selectors.0 {
        let sel_str = selector
            .to_css_string(printer_options(false))
            .map_err(|e| codec_error(href, e))?;
        selectors_vec.push(sel_str);
    }

    let block = &style_rule.declarations;
    let mut decls_vec = Vec::new();
    // Normal declarations, then the !important ones.
    for (properties, important) in [
        (&block.declarations, false),
        (&block.important_declarations, true),
    ] {
        for property in properties {
            let text = property
                .to_css_string(false, printer_options(false))
                .map_err(|e| codec_error(href, e))?;
            if let Some(mut decl) = read_declaration(&text) {
                decl.important = important;
                decls_vec.push(decl);
            }
        }
    }

    if !style_rule.rules.0.is_empty() {
        warn!(
            "dropping {} nested rules under `{}` in {}",
            style_rule.rules.0.len(),
            selectors_vec.join(", "),
            href
        );
    }

    Ok(Node::Rule(Rule::new(selectors_vec.join(", "), decls_vec)))
}

/// Splits printed CSS into nodes without interpreting preludes.
fn read_nodes(href: &str, css: &str) -> Result<Vec<Node>, TrimError> {
    let mut nodes = Vec::new();
    let mut rest = css.trim_start();
    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix("/*") {
            let end = after
                .find("*/")
                .ok_or_else(|| codec_error(href, "unterminated comment"))?;
            nodes.push(Node::Comment(Comment::new(&after[..end])));
            rest = after[end + 2..].trim_start();
            continue;
        }

        let (head, body, consumed) =
            split_item(rest).ok_or_else(|| codec_error(href, format!("cannot split `{}`", rest)))?;
        if let Some(at) = head.strip_prefix('@') {
            let name_len = at
                .find(|c: char| !(c.is_alphanumeric() || c == '-' || c == '_'))
                .unwrap_or(at.len());
            let (name, prelude) = at.split_at(name_len);
            nodes.push(Node::Atrule(read_atrule(href, name, prelude.trim(), body)?));
        } else {
            let body = body.unwrap_or_default();
            if has_nested_block(body) {
                warn!("dropping nested rules under `{}` in {}", head, href);
            }
            nodes.push(Node::Rule(Rule::new(head, read_declarations(body))));
        }
        rest = rest[consumed..].trim_start();
    }
    Ok(nodes)
}

fn read_atrule(
    href: &str,
    name: &str,
    prelude: &str,
    body: Option<&str>,
) -> Result<Atrule, TrimError> {
    let Some(body) = body else {
        return Ok(Atrule::statement(name, prelude));
    };
    let mut atrule = Atrule::statement(name, prelude);
    atrule.block = Some(if CONTAINER_AT_RULES.contains(&atrule.base_name().as_str()) {
        AtruleBlock::Rules(read_nodes(href, body)?)
    } else if has_nested_block(body) {
        AtruleBlock::Raw(body.trim().to_string())
    } else {
        AtruleBlock::Declarations(DeclarationBlock {
            declarations: read_declarations(body),
        })
    });
    Ok(atrule)
}

/// Splits off the next `head;` or `head{body}` item.
/// Returns the trimmed head, the body if any and the number of bytes consumed.
fn split_item(text: &str) -> Option<(&str, Option<&str>, usize)> {
    let mut scanner = TopLevel::new(text);
    while let Some((index, c)) = scanner.next() {
        match c {
            ';' => return Some((text[..index].trim(), None, index + 1)),
            '{' => {
                let (close, _) = scanner.find(|&(_, c)| c == '}')?;
                return Some((text[..index].trim(), Some(&text[index + 1..close]), close + 1));
            }
            _ => {}
        }
    }
    // A trailing statement without `;`.
    let head = text.trim();
    (!head.is_empty() && scanner.is_balanced()).then_some((head, None, text.len()))
}

fn has_nested_block(body: &str) -> bool {
    TopLevel::new(body).any(|(_, c)| c == '{')
}

/// Reads `prop: value` pairs separated by top-level `;`, skipping nested blocks.
fn read_declarations(body: &str) -> Vec<Declaration> {
    let mut declarations = Vec::new();
    let mut start = 0;
    let mut in_block = false;
    for (index, c) in TopLevel::new(body) {
        match c {
            '{' => in_block = true,
            '}' => {
                in_block = false;
                start = index + 1;
            }
            ';' if !in_block => {
                declarations.extend(read_declaration(&body[start..index]));
                start = index + 1;
            }
            _ => {}
        }
    }
    if !in_block {
        declarations.extend(read_declaration(&body[start..]));
    }
    declarations
}

fn read_declaration(text: &str) -> Option<Declaration> {
    let (property, value) = text.split_once(':')?;
    let property = property.trim();
    if property.is_empty() {
        return None;
    }
    let mut value = value.trim();
    let mut important = false;
    if let Some(bang) = value.rfind('!') {
        if value[bang + 1..].trim().eq_ignore_ascii_case("important") {
            value = value[..bang].trim_end();
            important = true;
        }
    }
    Some(Declaration {
        important,
        ..Declaration::new(property, value)
    })
}

/// Renders a node list back to (unminified) CSS text.
pub fn render(nodes: &[Node]) -> String {
    let mut out = String::new();
    // fmt::Write into a String cannot fail
    let _ = write_nodes(&mut out, nodes);
    out
}

/// Minify a CSS string.
pub fn minify_css(input: &str) -> Result<String, TrimError> {
    let mut style_sheet = StyleSheet::parse(input, ParserOptions::default()).map_err(|source| {
        TrimError::Codec {
            message: source.to_string(),
        }
    })?;

    style_sheet
        .minify(MinifyOptions::default())
        .map_err(|source| TrimError::Codec {
            message: source.to_string(),
        })?;

    let result = style_sheet
        .to_css(printer_options(true))
        .map_err(|source| TrimError::Codec {
            message: source.to_string(),
        })?;

    Ok(result.code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn first_atrule(nodes: &[Node], name: &str) -> Atrule {
        nodes
            .iter()
            .find_map(|node| match node {
                Node::Atrule(atrule) if atrule.base_name() == name => Some(atrule.clone()),
                _ => None,
            })
            .unwrap()
    }

    #[test]
    fn converts_rules_and_media() {
        let sheet = parse_stylesheet(
            "a.css",
            "p, .red > #x { color: red; margin: 0 !important }\n@media (min-width: 100px) { .y { color: blue } }",
            false,
        )
        .unwrap();
        assert_eq!(sheet.source_url, "a.css");
        let Node::Rule(rule) = &sheet.nodes[0] else {
            panic!("expected a rule, got {:?}", sheet.nodes[0]);
        };
        assert_eq!(rule.prelude, "p, .red > #x");
        assert_eq!(rule.block.get("color").unwrap().value, "red");
        assert!(rule.block.get("margin").unwrap().important);

        let media = first_atrule(&sheet.nodes, "media");
        assert_eq!(media.prelude, "(min-width: 100px)");
        assert_eq!(media.rules().unwrap().len(), 1);
    }

    #[test]
    fn reads_other_at_rules_structurally() {
        let sheet = parse_stylesheet(
            "a.css",
            r#"@import "x.css";
@keyframes spin { from { opacity: 0 } to { opacity: 1 } }
@font-face { font-family: "Foo"; src: url(foo.woff2) }
@supports (display: grid) { .g { display: grid } }"#,
            false,
        )
        .unwrap();

        let import = first_atrule(&sheet.nodes, "import");
        assert!(import.block.is_none());

        let keyframes = first_atrule(&sheet.nodes, "keyframes");
        assert_eq!(keyframes.prelude, "spin");
        assert_eq!(keyframes.rules().unwrap().len(), 2);

        let font_face = first_atrule(&sheet.nodes, "font-face");
        let family = font_face.declarations().unwrap().get("font-family").unwrap();
        assert!(family.value.contains("Foo"));

        let supports = first_atrule(&sheet.nodes, "supports");
        assert_eq!(supports.rules().unwrap().len(), 1);
    }

    #[test]
    fn keeps_license_comments_first() {
        let sheet = parse_stylesheet("a.css", "/*! MIT */\n/* plain */\na { color: red }", false)
            .unwrap();
        assert_eq!(sheet.nodes[0], Node::Comment(Comment::new("! MIT ")));
        assert_eq!(sheet.nodes.len(), 2);
    }

    #[test]
    fn keeps_important_comments_after_the_first_rule() {
        let sheet = parse_stylesheet(
            "bundle.css",
            ".x { color: red }\n/*! mid license */\np { margin: 0 }\n\
             .y { content: \"/*! in a string */\" }\n\
             @media screen { /*! inside media */ .z { color: blue } }",
            false,
        )
        .unwrap();
        let comments: Vec<&Node> = sheet
            .nodes
            .iter()
            .filter(|node| matches!(node, Node::Comment(_)))
            .collect();
        assert_eq!(comments, vec![&Node::Comment(Comment::new("! mid license "))]);
    }

    #[test]
    fn finds_important_comments_in_source_order() {
        assert_eq!(
            important_comments("/*! a */ b {} /* c */ /*! d */ e { /*! f */ }"),
            vec!["! a ", "! d "]
        );
        assert!(important_comments("/*! unterminated").is_empty());
    }

    #[test]
    fn minified_media_queries_keep_legacy_features() {
        let css = minify_css("@media (min-width: 100px) { .a { color: red } }").unwrap();
        assert!(css.contains("min-width:100px"), "{}", css);
        assert!(!css.contains(">="), "{}", css);
    }

    #[test]
    fn reports_invalid_css_with_its_line() {
        let err = parse_stylesheet("bad.css", "a { color: red }\n..b { color: blue }", false)
            .unwrap_err();
        match err {
            TrimError::InvalidCss { href, prelude, .. } => {
                assert_eq!(href, "bad.css");
                assert_eq!(prelude, "..b { color: blue }");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn structural_reader_splits_items() {
        let nodes = read_nodes(
            "x.css",
            "@layer a, b;\n@page :first {\n  margin: 1in;\n}\n/* note */\n.a { color: red; }",
        )
        .unwrap();
        assert_eq!(nodes.len(), 4);
        assert_eq!(nodes[0], Node::Atrule(Atrule::statement("layer", "a, b")));
        assert_eq!(
            nodes[1],
            Node::Atrule(Atrule::with_declarations(
                "page",
                ":first",
                vec![Declaration::new("margin", "1in")]
            ))
        );
        assert_eq!(nodes[2], Node::Comment(Comment::new(" note ")));
    }

    #[test]
    fn reads_important_and_nested_bodies() {
        assert_eq!(
            read_declarations("color: red !important; background: url(\"a;b.png\")"),
            vec![
                Declaration {
                    important: true,
                    ..Declaration::new("color", "red")
                },
                Declaration::new("background", "url(\"a;b.png\")"),
            ]
        );
        assert_eq!(
            read_declarations("margin: 0; @top-left { content: 'x' } size: A4"),
            vec![Declaration::new("margin", "0"), Declaration::new("size", "A4")]
        );
    }

    #[test]
    fn minifies_rendered_output() {
        let nodes = vec![Node::Rule(Rule::new(
            ".foo",
            vec![Declaration::new("color", "black")],
        ))];
        let css = render(&nodes);
        assert_eq!(css, ".foo{color:black}\n");
        let minified = minify_css(&css).unwrap();
        assert!(minified.contains(".foo"));
        assert!(minified.contains("color:"));
        assert!(!minified.contains('\n'));
    }
}
