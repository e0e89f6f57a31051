use std::collections::HashMap;
use std::rc::Rc;

use crate::dom::dom_tree::{Document, Handle, Node};

/// Indexes for fast candidate lookup when matching selectors against a snapshot.
#[derive(Debug, Default)]
pub struct DomIndices {
    /// Maps an element's "id" attribute to the nodes carrying it.
    pub id_map: HashMap<String, Vec<Handle>>,
    /// Maps a class name to all nodes that have that class.
    pub class_map: HashMap<String, Vec<Handle>>,
    /// Maps a lowercase tag name (e.g., "div") to all nodes with that tag.
    pub tag_map: HashMap<String, Vec<Handle>>,
    /// Every element in tree order.
    pub elements: Vec<Handle>,
}

impl DomIndices {
    /// Build the indices for the entire document.
    ///
    /// With `fold_case` set (quirks-mode documents) ids and classes are stored lower-cased.
    pub fn build(document: &Document, fold_case: bool) -> Self {
        let mut indices = DomIndices::default();
        Self::traverse(&document.root, &mut indices, fold_case);
        indices
    }

    fn traverse(node: &Handle, indices: &mut DomIndices, fold_case: bool) {
        let fold = |value: &str| {
            if fold_case {
                value.to_lowercase()
            } else {
                value.to_string()
            }
        };
        match &*node.borrow() {
            Node::DocumentRoot(root) => {
                for child in &root.children {
                    Self::traverse(child, indices, fold_case);
                }
            }
            Node::Element(elem) => {
                indices.elements.push(Rc::clone(node));
                indices
                    .tag_map
                    .entry(elem.tag.to_lowercase())
                    .or_default()
                    .push(Rc::clone(node));

                if let Some(id_value) = elem.attributes.get("id") {
                    indices
                        .id_map
                        .entry(fold(id_value))
                        .or_default()
                        .push(Rc::clone(node));
                }
                if let Some(class_attr) = elem.attributes.get("class") {
                    for class in class_attr.split_whitespace() {
                        let entry = indices.class_map.entry(fold(class)).or_default();
                        // `class="a a"` must not list the node twice.
                        if !entry.last().is_some_and(|last| Rc::ptr_eq(last, node)) {
                            entry.push(Rc::clone(node));
                        }
                    }
                }
                for child in &elem.children {
                    Self::traverse(child, indices, fold_case);
                }
            }
            Node::Text(_) => {}
        }
    }

    /// Elements that can possibly be the subject of a selector with this key.
    ///
    /// Narrowest available index wins: id, then class, then tag, then everything.
    pub fn candidates(
        &self,
        id: Option<&str>,
        class: Option<&str>,
        tag: Option<&str>,
        fold_case: bool,
    ) -> &[Handle] {
        let key = |value: &str| {
            if fold_case {
                value.to_lowercase()
            } else {
                value.to_string()
            }
        };
        if let Some(id) = id {
            return self.id_map.get(&key(id)).map(Vec::as_slice).unwrap_or_default();
        }
        if let Some(class) = class {
            return self
                .class_map
                .get(&key(class))
                .map(Vec::as_slice)
                .unwrap_or_default();
        }
        if let Some(tag) = tag {
            return self
                .tag_map
                .get(&tag.to_lowercase())
                .map(Vec::as_slice)
                .unwrap_or_default();
        }
        &self.elements
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::html::create_dom_tree;

    #[test]
    fn indexes_ids_classes_and_tags() {
        let document =
            create_dom_tree("<!DOCTYPE html><div id=\"a\" class=\"x y x\"><p class=\"y\"></p></div>");
        let indices = DomIndices::build(&document, false);
        assert_eq!(indices.id_map["a"].len(), 1);
        assert_eq!(indices.class_map["x"].len(), 1);
        assert_eq!(indices.class_map["y"].len(), 2);
        assert_eq!(indices.tag_map["p"].len(), 1);
        assert_eq!(indices.candidates(None, Some("y"), Some("p"), false).len(), 2);
        assert!(indices.candidates(Some("missing"), None, None, false).is_empty());
    }

    #[test]
    fn folds_case_in_quirks_documents() {
        let document = create_dom_tree("<div class=\"Foo\"></div>");
        let indices = DomIndices::build(&document, true);
        assert_eq!(indices.candidates(None, Some("FOO"), None, true).len(), 1);
    }
}
