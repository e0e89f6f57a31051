use html5ever::interface::QuirksMode;
use html5ever::QualName;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

pub mod dom_tree {
    use super::*;

    /// Shared handle to a node of a captured document.
    pub type Handle = Rc<RefCell<Node>>;

    #[derive(Debug, Clone)]
    pub enum Node {
        DocumentRoot(DocumentRootNode),
        Element(ElementNode),
        Text(String),
    }

    #[derive(Debug, Clone)]
    pub struct DocumentRootNode {
        pub children: Vec<Handle>,
    }

    #[derive(Debug, Clone)]
    pub struct ElementNode {
        pub tag: String,
        pub qual_name: QualName,
        pub attributes: HashMap<String, String>,
        pub children: Vec<Handle>,
        /// Weak link to the parent (an element or the document root).
        pub parent: Option<Weak<RefCell<Node>>>,
    }

    #[derive(Debug)]
    pub struct Document {
        pub root: Handle,
        pub doctype: RefCell<Option<Doctype>>,
        pub quirks_mode: RefCell<QuirksMode>,
    }

    #[derive(Debug)]
    pub struct Doctype {
        pub name: String,
        pub public_id: String,
        pub system_id: String,
    }

    impl DocumentRootNode {
        pub fn new() -> Self {
            DocumentRootNode {
                children: Vec::new(),
            }
        }
    }

    impl Default for DocumentRootNode {
        fn default() -> Self {
            Self::new()
        }
    }

    impl ElementNode {
        pub fn new(tag: String, qual_name: QualName) -> Self {
            ElementNode {
                tag,
                qual_name,
                attributes: HashMap::new(),
                children: Vec::new(),
                parent: None,
            }
        }

        /// Attribute lookup, case-insensitive on the attribute name.
        pub fn attribute(&self, name: &str) -> Option<&str> {
            if let Some(value) = self.attributes.get(name) {
                return Some(value.as_str());
            }
            self.attributes
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, value)| value.as_str())
        }
    }

    impl Node {
        pub fn as_element(&self) -> Option<&ElementNode> {
            match self {
                Node::Element(elem) => Some(elem),
                _ => None,
            }
        }

        pub fn children(&self) -> &[Handle] {
            match self {
                Node::DocumentRoot(root) => &root.children,
                Node::Element(elem) => &elem.children,
                Node::Text(_) => &[],
            }
        }

        pub fn children_mut(&mut self) -> Option<&mut Vec<Handle>> {
            match self {
                Node::DocumentRoot(root) => Some(&mut root.children),
                Node::Element(elem) => Some(&mut elem.children),
                Node::Text(_) => None,
            }
        }

        /// Points an element at its new parent. Other node kinds carry no parent link.
        pub fn set_parent(&mut self, parent: Option<Weak<RefCell<Node>>>) {
            if let Node::Element(elem) = self {
                elem.parent = parent;
            }
        }

        pub fn parent(&self) -> Option<Handle> {
            match self {
                Node::Element(elem) => elem.parent.as_ref().and_then(Weak::upgrade),
                _ => None,
            }
        }
    }

    pub fn new_document() -> Document {
        Document {
            root: Rc::new(RefCell::new(Node::DocumentRoot(DocumentRootNode::new()))),
            doctype: RefCell::new(None),
            quirks_mode: RefCell::new(QuirksMode::NoQuirks),
        }
    }

    /// Parent of `node` if that parent is an element.
    pub fn parent_element(node: &Handle) -> Option<Handle> {
        let parent = node.borrow().parent()?;
        let is_element = matches!(*parent.borrow(), Node::Element(_));
        is_element.then_some(parent)
    }

    /// Element siblings that precede `node`, nearest first.
    pub fn preceding_element_siblings(node: &Handle) -> Vec<Handle> {
        let Some(parent) = node.borrow().parent() else {
            return Vec::new();
        };
        let mut preceding = Vec::new();
        for sibling in parent.borrow().children() {
            if Rc::ptr_eq(sibling, node) {
                preceding.reverse();
                return preceding;
            }
            if matches!(*sibling.borrow(), Node::Element(_)) {
                preceding.push(Rc::clone(sibling));
            }
        }
        Vec::new()
    }

    /// Every element of the document in tree order.
    pub fn elements(document: &Document) -> Vec<Handle> {
        let mut out = Vec::new();
        collect_elements(&document.root, &mut out);
        out
    }

    fn collect_elements(node: &Handle, out: &mut Vec<Handle>) {
        let borrowed = node.borrow();
        if let Node::Element(_) = &*borrowed {
            out.push(Rc::clone(node));
        }
        for child in borrowed.children() {
            collect_elements(child, out);
        }
    }
}
