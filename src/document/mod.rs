//! Owned element tree for HTML documents.
//!
//! The annotator only needs two things from a document: a way to visit every
//! element, and a mutable, ordered attribute list on each one. [`Document`]
//! provides both as plain owned data, so callers can build trees in code,
//! parse them from markup with [`html::parse`], or adapt another DOM by
//! copying into it.

pub mod html;

use std::fmt;

/// A parsed document: a forest of top-level nodes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    pub children: Vec<Node>,
}

/// One node of the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    /// Character data with character references decoded.
    Text(String),
    Comment(String),
    /// Contents of `<!DOCTYPE …>`.
    Doctype(String),
}

/// An element with its attributes and children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Lower-cased tag name.
    pub tag_name: String,
    pub attributes: Attributes,
    pub children: Vec<Node>,
}

/// Ordered attribute list with ASCII case-insensitive name lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes(Vec<(String, String)>);

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Overwrite in place when present, append otherwise.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(&name)) {
            Some((_, v)) => *v = value,
            None => self.0.push((name, value)),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        let idx = self.0.iter().position(|(k, _)| k.eq_ignore_ascii_case(name))?;
        Some(self.0.remove(idx).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut attrs = Attributes::new();
        for (k, v) in iter {
            attrs.set(k, v);
        }
        attrs
    }
}

impl Element {
    pub fn new(tag_name: impl Into<String>) -> Self {
        Self {
            tag_name: tag_name.into().to_ascii_lowercase(),
            attributes: Attributes::new(),
            children: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.set(name, value);
        self
    }

    pub fn with_child(mut self, child: impl Into<Node>) -> Self {
        self.children.push(child.into());
        self
    }

    pub fn is(&self, tag_name: &str) -> bool {
        self.tag_name.eq_ignore_ascii_case(tag_name)
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name)
    }
}

impl From<Element> for Node {
    fn from(el: Element) -> Self {
        Node::Element(el)
    }
}

impl From<&str> for Node {
    fn from(text: &str) -> Self {
        Node::Text(text.to_string())
    }
}

impl Document {
    pub fn new(children: Vec<Node>) -> Self {
        Self { children }
    }

    /// Parse HTML markup. See [`html::parse`].
    pub fn parse(markup: &str) -> Self {
        html::parse(markup)
    }

    /// Serialise back to markup. See [`html::serialize`].
    pub fn to_html(&self) -> String {
        html::serialize(self)
    }

    /// Call `f` on every element, in document order.
    pub fn visit_elements<'a>(&'a self, mut f: impl FnMut(&'a Element)) {
        let mut stack: Vec<&Node> = self.children.iter().rev().collect();
        while let Some(node) = stack.pop() {
            if let Node::Element(el) = node {
                f(el);
                stack.extend(el.children.iter().rev());
            }
        }
    }

    /// Call `f` on every element, in document order, with mutable access.
    ///
    /// An element's children are visited after `f` returns for that element.
    pub fn visit_elements_mut(&mut self, mut f: impl FnMut(&mut Element)) {
        let mut stack: Vec<&mut Node> = self.children.iter_mut().rev().collect();
        while let Some(node) = stack.pop() {
            if let Node::Element(el) = node {
                f(&mut *el);
                stack.extend(el.children.iter_mut().rev());
            }
        }
    }

    /// All elements with the given tag name.
    pub fn elements_by_tag<'a>(&'a self, tag_name: &str) -> Vec<&'a Element> {
        let mut found = Vec::new();
        self.visit_elements(|el| {
            if el.is(tag_name) {
                found.push(el);
            }
        });
        found
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_html())
    }
}
