//! HTML snapshot parsing.
//!
//! Uses html5ever as the HTML parser and builds the DOM tree defined in
//! `crate::dom::dom_tree`, with weak parent links so the selector matcher can
//! walk ancestors and siblings.

use crate::dom::dom_tree::{self, Handle};
use html5ever::tendril::{StrTendril, TendrilSink};
use html5ever::{
    interface::{ElemName, NodeOrText, QuirksMode, TreeSink},
    LocalName, Namespace, QualName,
};
use std::borrow::Cow;
use std::cell::RefCell;
use std::rc::Rc;

/// Creates a DOM tree from the provided HTML content.
pub fn create_dom_tree(html_content: &str) -> dom_tree::Document {
    let tree_sink = SnapshotTreeSink::new();
    html5ever::parse_document(tree_sink, Default::default()).one(html_content)
}

/// A custom TreeSink for building the DOM tree used by the parser.
pub struct SnapshotTreeSink {
    document: dom_tree::Document,
}

impl SnapshotTreeSink {
    pub fn new() -> Self {
        Self {
            document: dom_tree::new_document(),
        }
    }
}

impl Default for SnapshotTreeSink {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct SnapshotElemName {
    ns: Namespace,
    local: LocalName,
}

impl ElemName for SnapshotElemName {
    fn local_name(&self) -> &LocalName {
        &self.local
    }

    fn ns(&self) -> &Namespace {
        &self.ns
    }
}

fn into_handle(child: NodeOrText<Handle>) -> Handle {
    match child {
        NodeOrText::AppendNode(node) => node,
        NodeOrText::AppendText(text) => {
            Rc::new(RefCell::new(dom_tree::Node::Text(text.to_string())))
        }
    }
}

/// Pushes `child` as the last child of `parent` and links it back.
fn append_handle(parent: &Handle, child: Handle) {
    child
        .borrow_mut()
        .set_parent(Some(Rc::downgrade(parent)));
    if let Some(children) = parent.borrow_mut().children_mut() {
        children.push(child);
    }
}

impl TreeSink for SnapshotTreeSink {
    type Handle = Handle;
    type Output = dom_tree::Document;
    type ElemName<'a>
        = SnapshotElemName
    where
        Self: 'a;

    fn finish(self) -> Self::Output {
        self.document
    }

    fn parse_error(&self, msg: Cow<'static, str>) {
        log::trace!("html parse error: {}", msg);
    }

    fn get_document(&self) -> Self::Handle {
        self.document.root.clone()
    }

    fn elem_name<'a>(&'a self, target: &'a Self::Handle) -> Self::ElemName<'a> {
        if let dom_tree::Node::Element(ref elem) = *target.borrow() {
            return SnapshotElemName {
                ns: elem.qual_name.ns.clone(),
                local: elem.qual_name.local.clone(),
            };
        }
        panic!("elem_name called on non-element node")
    }

    fn create_element(
        &self,
        name: QualName,
        attrs: Vec<html5ever::Attribute>,
        _flags: html5ever::interface::ElementFlags,
    ) -> Self::Handle {
        let mut element = dom_tree::ElementNode::new(name.local.to_string(), name);
        element.attributes = attrs
            .into_iter()
            .map(|attr| (attr.name.local.to_string(), attr.value.to_string()))
            .collect();
        Rc::new(RefCell::new(dom_tree::Node::Element(element)))
    }

    /// Comments never take part in selector matching; they become empty text.
    fn create_comment(&self, _text: StrTendril) -> Self::Handle {
        Rc::new(RefCell::new(dom_tree::Node::Text(String::new())))
    }

    fn create_pi(&self, target: StrTendril, data: StrTendril) -> Self::Handle {
        let combined = format!("{} {}", target, data);
        Rc::new(RefCell::new(dom_tree::Node::Text(combined)))
    }

    fn append(&self, parent: &Self::Handle, child: NodeOrText<Self::Handle>) {
        // The tokenizer hands text over in chunks; keep one node per run.
        if let NodeOrText::AppendText(text) = &child {
            if let Some(last) = parent.borrow().children().last() {
                if let dom_tree::Node::Text(existing) = &mut *last.borrow_mut() {
                    existing.push_str(text);
                    return;
                }
            }
        }
        append_handle(parent, into_handle(child));
    }

    fn append_based_on_parent_node(
        &self,
        element: &Self::Handle,
        prev_element: &Self::Handle,
        child: NodeOrText<Self::Handle>,
    ) {
        if element.borrow().parent().is_some() {
            self.append_before_sibling(element, child);
        } else {
            self.append(prev_element, child);
        }
    }

    fn append_doctype_to_document(
        &self,
        name: StrTendril,
        public_id: StrTendril,
        system_id: StrTendril,
    ) {
        *self.document.doctype.borrow_mut() = Some(dom_tree::Doctype {
            name: name.to_string(),
            public_id: public_id.to_string(),
            system_id: system_id.to_string(),
        });
    }

    fn get_template_contents(&self, target: &Self::Handle) -> Self::Handle {
        target.clone()
    }

    fn same_node(&self, x: &Self::Handle, y: &Self::Handle) -> bool {
        Rc::ptr_eq(x, y)
    }

    fn set_quirks_mode(&self, mode: QuirksMode) {
        *self.document.quirks_mode.borrow_mut() = mode;
    }

    /// Inserts a node right before `sibling` (used for foster parenting).
    fn append_before_sibling(&self, sibling: &Self::Handle, child: NodeOrText<Self::Handle>) {
        let Some(parent) = sibling.borrow().parent() else {
            return;
        };
        let child = into_handle(child);
        child
            .borrow_mut()
            .set_parent(Some(Rc::downgrade(&parent)));
        let mut parent_borrow = parent.borrow_mut();
        if let Some(children) = parent_borrow.children_mut() {
            let position = children
                .iter()
                .position(|c| Rc::ptr_eq(c, sibling))
                .unwrap_or(children.len());
            children.insert(position, child);
        }
    }

    fn add_attrs_if_missing(&self, target: &Self::Handle, attrs: Vec<html5ever::Attribute>) {
        let mut target_node = target.borrow_mut();
        if let dom_tree::Node::Element(elem_node) = &mut *target_node {
            for attr in attrs {
                elem_node
                    .attributes
                    .entry(attr.name.local.to_string())
                    .or_insert_with(|| attr.value.to_string());
            }
        }
    }

    fn remove_from_parent(&self, target: &Self::Handle) {
        let Some(parent) = target.borrow().parent() else {
            return;
        };
        if let Some(children) = parent.borrow_mut().children_mut() {
            children.retain(|c| !Rc::ptr_eq(c, target));
        }
        target.borrow_mut().set_parent(None);
    }

    fn reparent_children(&self, node: &Self::Handle, new_parent: &Self::Handle) {
        let children = node
            .borrow_mut()
            .children_mut()
            .map(std::mem::take)
            .unwrap_or_default();
        for child in children {
            append_handle(new_parent, child);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(document: &dom_tree::Document) -> Vec<String> {
        dom_tree::elements(document)
            .iter()
            .filter_map(|handle| handle.borrow().as_element().map(|e| e.tag.clone()))
            .collect()
    }

    #[test]
    fn builds_implied_structure() {
        let document = create_dom_tree("<p class=\"x\">Hi</p>");
        assert_eq!(tags(&document), vec!["html", "head", "body", "p"]);
    }

    #[test]
    fn parent_links_point_at_enclosing_element() {
        let document = create_dom_tree("<div id=\"outer\"><span>t</span></div>");
        let span = dom_tree::elements(&document)
            .into_iter()
            .find(|h| h.borrow().as_element().map(|e| e.tag == "span").unwrap_or(false))
            .unwrap();
        let parent = dom_tree::parent_element(&span).unwrap();
        let parent = parent.borrow();
        assert_eq!(parent.as_element().unwrap().attribute("id"), Some("outer"));
    }

    #[test]
    fn records_quirks_mode_without_doctype() {
        let document = create_dom_tree("<p>no doctype</p>");
        assert_eq!(*document.quirks_mode.borrow(), QuirksMode::Quirks);

        let document = create_dom_tree("<!DOCTYPE html><p>standards</p>");
        assert_eq!(*document.quirks_mode.borrow(), QuirksMode::NoQuirks);
        assert_eq!(document.doctype.borrow().as_ref().unwrap().name, "html");
    }

    #[test]
    fn foster_parents_stray_table_content() {
        let document = create_dom_tree("<table><div>stray</div><tr><td>c</td></tr></table>");
        let body_children: Vec<String> = dom_tree::elements(&document)
            .into_iter()
            .filter(|h| h.borrow().as_element().map(|e| e.tag == "body").unwrap_or(false))
            .flat_map(|body| {
                let body = body.borrow();
                let names: Vec<String> = body
                    .children()
                    .iter()
                    .filter_map(|c| c.borrow().as_element().map(|e| e.tag.clone()))
                    .collect();
                names
            })
            .collect();
        assert_eq!(body_children, vec!["div", "table"]);
    }
}
