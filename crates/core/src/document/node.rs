//! Lossless XML node tree.
//!
//! Every node keeps the exact markup it was parsed from, so serializing an
//! untouched tree reproduces the input byte for byte. Only [`Element::set_text`]
//! replaces markup, and only inside the element it is called on.

use quick_xml::escape::{partial_escape, unescape};

/// A single node in a parsed document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    /// Character data as written in the file, entities not expanded.
    Text(String),
    /// Contents of a `<![CDATA[...]]>` section.
    CData(String),
    /// Comments, processing instructions, the XML declaration and doctype,
    /// kept verbatim.
    Markup(String),
}

impl Node {
    pub(crate) fn write_to(&self, out: &mut String) {
        match self {
            Node::Element(el) => el.write_to(out),
            Node::Text(raw) | Node::Markup(raw) => out.push_str(raw),
            Node::CData(content) => {
                out.push_str("<![CDATA[");
                out.push_str(content);
                out.push_str("]]>");
            }
        }
    }
}

/// An attribute with its value already unescaped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Attribute {
    pub name: String,
    pub value: String,
}

/// An element together with its original start and end tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    name: String,
    attributes: Vec<Attribute>,
    children: Vec<Node>,
    start_tag: String,
    /// `None` for self-closing elements.
    end_tag: Option<String>,
}

impl Element {
    pub(crate) fn new(name: String, attributes: Vec<Attribute>, start_tag: String) -> Self {
        Self {
            name,
            attributes,
            children: Vec::new(),
            start_tag,
            end_tag: None,
        }
    }

    pub(crate) fn push(&mut self, node: Node) {
        self.children.push(node);
    }

    pub(crate) fn close(&mut self, end_tag: String) {
        self.end_tag = Some(end_tag);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Value of the attribute called `name`, if present.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(el) => Some(el),
            _ => None,
        })
    }

    pub fn child_elements_mut(&mut self) -> impl Iterator<Item = &mut Element> {
        self.children.iter_mut().filter_map(|node| match node {
            Node::Element(el) => Some(el),
            _ => None,
        })
    }

    /// First descendant (document order, excluding `self`) matching `pred`.
    pub fn find(&self, pred: &dyn Fn(&Element) -> bool) -> Option<&Element> {
        for child in self.child_elements() {
            if pred(child) {
                return Some(child);
            }
            if let Some(found) = child.find(pred) {
                return Some(found);
            }
        }
        None
    }

    /// Mutable counterpart of [`find`](Self::find).
    pub fn find_mut(&mut self, pred: &dyn Fn(&Element) -> bool) -> Option<&mut Element> {
        for child in self.child_elements_mut() {
            if pred(&*child) {
                return Some(child);
            }
            if let Some(found) = child.find_mut(pred) {
                return Some(found);
            }
        }
        None
    }

    /// All elements matching `pred`, starting with `self`, in document order.
    ///
    /// The search does not descend into a matched element.
    pub fn select(&self, pred: &dyn Fn(&Element) -> bool) -> Vec<&Element> {
        let mut out = Vec::new();
        collect(self, pred, &mut out);
        out
    }

    /// Mutable counterpart of [`select`](Self::select).
    pub fn select_mut(&mut self, pred: &dyn Fn(&Element) -> bool) -> Vec<&mut Element> {
        let mut out = Vec::new();
        collect_mut(self, pred, &mut out);
        out
    }

    /// Concatenated, unescaped character data of all descendants.
    pub fn text(&self) -> String {
        let mut out = String::new();
        self.append_text(&mut out);
        out
    }

    fn append_text(&self, out: &mut String) {
        for child in &self.children {
            match child {
                // Text was checked when parsed, or escaped by `set_text`.
                Node::Text(raw) => match unescape(raw) {
                    Ok(text) => out.push_str(&text),
                    Err(_) => out.push_str(raw),
                },
                Node::CData(content) => out.push_str(content),
                Node::Element(el) => el.append_text(out),
                Node::Markup(_) => {}
            }
        }
    }

    /// Replace all content of this element with a single text node.
    ///
    /// A self-closing element is expanded into a start/end tag pair; its
    /// attributes keep their original spelling.
    pub fn set_text(&mut self, value: &str) {
        self.children = vec![Node::Text(partial_escape(value).into_owned())];
        if self.end_tag.is_none() {
            if let Some(body) = self.start_tag.strip_suffix("/>") {
                self.start_tag = format!("{}>", body.trim_end());
            }
            self.end_tag = Some(format!("</{}>", self.name));
        }
    }

    pub(crate) fn write_to(&self, out: &mut String) {
        out.push_str(&self.start_tag);
        for child in &self.children {
            child.write_to(out);
        }
        if let Some(end) = &self.end_tag {
            out.push_str(end);
        }
    }
}

fn collect<'a>(el: &'a Element, pred: &dyn Fn(&Element) -> bool, out: &mut Vec<&'a Element>) {
    if pred(el) {
        out.push(el);
        return;
    }
    for child in el.child_elements() {
        collect(child, pred, out);
    }
}

fn collect_mut<'a>(
    el: &'a mut Element,
    pred: &dyn Fn(&Element) -> bool,
    out: &mut Vec<&'a mut Element>,
) {
    if pred(&*el) {
        out.push(el);
        return;
    }
    for child in el.child_elements_mut() {
        collect_mut(child, pred, out);
    }
}
