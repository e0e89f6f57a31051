// src/style/owned_css.rs: the fully-owned stylesheet model the pruning passes work on.
use std::fmt;

/// One parsed stylesheet, keyed by the href it was fetched from.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Stylesheet {
    pub source_url: String,
    pub nodes: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Rule(Rule),
    Atrule(Atrule),
    Comment(Comment),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    /// Comma-joined selector group, e.g. "div, .red > #header".
    pub prelude: String,
    pub block: DeclarationBlock,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Atrule {
    /// Name without the `@`, vendor prefix included (e.g. "-webkit-keyframes").
    pub name: String,
    pub prelude: String,
    pub block: Option<AtruleBlock>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AtruleBlock {
    /// Nested rules: `@media`, `@supports`, `@keyframes`, ...
    Rules(Vec<Node>),
    /// Descriptors: `@font-face`, `@page`, ...
    Declarations(DeclarationBlock),
    /// A body the model does not decompose; printed back verbatim.
    Raw(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    /// Text between `/*` and `*/`.
    pub text: String,
    pub important: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DeclarationBlock {
    pub declarations: Vec<Declaration>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub property: String,
    pub value: String,
    pub important: bool,
}

impl Stylesheet {
    pub fn new(source_url: impl Into<String>, nodes: Vec<Node>) -> Self {
        Stylesheet {
            source_url: source_url.into(),
            nodes,
        }
    }
}

impl Rule {
    pub fn new(prelude: impl Into<String>, declarations: Vec<Declaration>) -> Self {
        Rule {
            prelude: prelude.into(),
            block: DeclarationBlock { declarations },
        }
    }
}

impl Atrule {
    pub fn with_rules(name: impl Into<String>, prelude: impl Into<String>, rules: Vec<Node>) -> Self {
        Atrule {
            name: name.into(),
            prelude: prelude.into(),
            block: Some(AtruleBlock::Rules(rules)),
        }
    }

    pub fn with_declarations(
        name: impl Into<String>,
        prelude: impl Into<String>,
        declarations: Vec<Declaration>,
    ) -> Self {
        Atrule {
            name: name.into(),
            prelude: prelude.into(),
            block: Some(AtruleBlock::Declarations(DeclarationBlock { declarations })),
        }
    }

    pub fn statement(name: impl Into<String>, prelude: impl Into<String>) -> Self {
        Atrule {
            name: name.into(),
            prelude: prelude.into(),
            block: None,
        }
    }

    /// Lower-cased name with any vendor prefix removed: `-webkit-keyframes` is `keyframes`.
    pub fn base_name(&self) -> String {
        strip_vendor_prefix(&self.name).to_ascii_lowercase()
    }

    pub fn rules(&self) -> Option<&[Node]> {
        match &self.block {
            Some(AtruleBlock::Rules(rules)) => Some(rules),
            _ => None,
        }
    }

    pub fn declarations(&self) -> Option<&DeclarationBlock> {
        match &self.block {
            Some(AtruleBlock::Declarations(block)) => Some(block),
            _ => None,
        }
    }
}

impl Comment {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let important = text.starts_with('!');
        Comment { text, important }
    }
}

impl DeclarationBlock {
    /// Last declaration of `property` (case-insensitive), the one that wins in the block.
    pub fn get(&self, property: &str) -> Option<&Declaration> {
        self.declarations
            .iter()
            .rev()
            .find(|decl| decl.property.eq_ignore_ascii_case(property))
    }
}

impl Declaration {
    pub fn new(property: impl Into<String>, value: impl Into<String>) -> Self {
        Declaration {
            property: property.into(),
            value: value.into(),
            important: false,
        }
    }
}

/// `-webkit-animation` -> `animation`; names without a prefix are returned as is.
/// Custom properties (`--x`) are never considered prefixed.
pub fn strip_vendor_prefix(name: &str) -> &str {
    if name.starts_with("--") {
        return name;
    }
    match name.strip_prefix('-') {
        Some(rest) => rest.find('-').map_or(name, |dash| &rest[dash + 1..]),
        None => name,
    }
}

impl fmt::Display for Stylesheet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_nodes(f, &self.nodes)
    }
}

/// Renders a node list as CSS text, one top-level node per line.
pub fn write_nodes(f: &mut impl fmt::Write, nodes: &[Node]) -> fmt::Result {
    for node in nodes {
        writeln!(f, "{}", node)?;
    }
    Ok(())
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Rule(rule) => write!(f, "{}{{{}}}", rule.prelude, rule.block),
            Node::Atrule(atrule) => write!(f, "{}", atrule),
            Node::Comment(comment) => write!(f, "/*{}*/", comment.text),
        }
    }
}

impl fmt::Display for Atrule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.name)?;
        if !self.prelude.is_empty() {
            write!(f, " {}", self.prelude)?;
        }
        match &self.block {
            None => write!(f, ";"),
            Some(AtruleBlock::Rules(rules)) => {
                write!(f, "{{")?;
                for rule in rules {
                    write!(f, "{}", rule)?;
                }
                write!(f, "}}")
            }
            Some(AtruleBlock::Declarations(block)) => write!(f, "{{{}}}", block),
            Some(AtruleBlock::Raw(body)) => write!(f, "{{{}}}", body),
        }
    }
}

impl fmt::Display for DeclarationBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, decl) in self.declarations.iter().enumerate() {
            if i > 0 {
                write!(f, ";")?;
            }
            write!(f, "{}:{}", decl.property, decl.value)?;
            if decl.important {
                write!(f, "!important")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn renders_nested_tree() {
        let sheet = Stylesheet::new(
            "a.css",
            vec![
                Node::Comment(Comment::new("! license")),
                Node::Rule(Rule::new("p, a", vec![Declaration::new("color", "red")])),
                Node::Atrule(Atrule::with_rules(
                    "media",
                    "(min-width: 10px)",
                    vec![Node::Rule(Rule::new(
                        ".x",
                        vec![
                            Declaration::new("margin", "0"),
                            Declaration {
                                important: true,
                                ..Declaration::new("color", "blue")
                            },
                        ],
                    ))],
                )),
                Node::Atrule(Atrule::statement("import", "url(x.css)")),
            ],
        );
        assert_eq!(
            sheet.to_string(),
            "/*! license*/\np, a{color:red}\n@media (min-width: 10px){.x{margin:0;color:blue!important}}\n@import url(x.css);\n"
        );
    }

    #[test]
    fn strips_vendor_prefixes() {
        assert_eq!(strip_vendor_prefix("-webkit-keyframes"), "keyframes");
        assert_eq!(strip_vendor_prefix("keyframes"), "keyframes");
        assert_eq!(strip_vendor_prefix("--custom-prop"), "--custom-prop");
        let atrule = Atrule::statement("-MOZ-Document", "");
        assert_eq!(atrule.base_name(), "document");
    }

    #[test]
    fn comments_know_when_they_are_important() {
        assert!(Comment::new("! keep me").important);
        assert!(!Comment::new(" plain ").important);
    }
}
