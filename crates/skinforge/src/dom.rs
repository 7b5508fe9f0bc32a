//! Owned, mutable node tree for mounted template views.
//!
//! `scraper` parses; the resulting read-only tree is copied into plain
//! [`Node`] values so theming can rewrite inline styles in place, and the
//! tree can be serialized back to markup.

use scraper::{ElementRef, Html, Selector};

use crate::scan::is_void;

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attrs.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(name)) {
            Some((_, v)) => *v = value,
            None => self.attrs.push((name.to_string(), value)),
        }
    }

    pub fn remove_attr(&mut self, name: &str) {
        self.attrs.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attr("class").unwrap_or("").split_whitespace()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes().any(|c| c == class)
    }

    /// Inline style declarations as `(property, value)` pairs.
    pub fn style_declarations(&self) -> Vec<(String, String)> {
        parse_declarations(self.attr("style").unwrap_or(""))
    }

    pub fn style_property(&self, property: &str) -> Option<String> {
        self.style_declarations()
            .into_iter()
            .rev()
            .find(|(p, _)| p.eq_ignore_ascii_case(property))
            .map(|(_, v)| v)
    }

    /// Set an inline style property, replacing every earlier value of it.
    pub fn set_style_property(&mut self, property: &str, value: &str) {
        let mut decls = self.style_declarations();
        let mut replaced = false;
        decls.retain_mut(|(p, v)| {
            if !p.eq_ignore_ascii_case(property) {
                return true;
            }
            if replaced {
                return false;
            }
            replaced = true;
            *v = value.to_string();
            true
        });
        if !replaced {
            decls.push((property.to_string(), value.to_string()));
        }
        self.set_attr("style", serialize_declarations(&decls));
    }
}

/// Split a style attribute into declarations, respecting quotes and parens.
pub fn parse_declarations(style: &str) -> Vec<(String, String)> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0u32;
    let mut quote: Option<char> = None;
    for c in style.chars() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.saturating_sub(1),
            (None, ';') if depth == 0 => {
                parts.push(std::mem::take(&mut current));
                continue;
            }
            _ => {}
        }
        current.push(c);
    }
    parts.push(current);

    parts
        .iter()
        .filter_map(|d| {
            let (p, v) = d.split_once(':')?;
            let (p, v) = (p.trim(), v.trim());
            (!p.is_empty()).then(|| (p.to_string(), v.to_string()))
        })
        .collect()
}

pub fn serialize_declarations(decls: &[(String, String)]) -> String {
    decls
        .iter()
        .map(|(p, v)| format!("{p}: {v}"))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Visit every element depth-first, parents before children.
pub fn walk_mut(nodes: &mut [Node], f: &mut impl FnMut(&mut Element)) {
    for node in nodes {
        if let Node::Element(el) = node {
            f(el);
            walk_mut(&mut el.children, f);
        }
    }
}

pub fn walk(nodes: &[Node], f: &mut impl FnMut(&Element)) {
    for node in nodes {
        if let Node::Element(el) = node {
            f(el);
            walk(&el.children, f);
        }
    }
}

fn convert_element(el: ElementRef<'_>) -> Element {
    let value = el.value();
    Element {
        name: value.name().to_string(),
        attrs: value
            .attrs()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        children: convert_children(el),
    }
}

fn convert_children(parent: ElementRef<'_>) -> Vec<Node> {
    parent
        .children()
        .filter_map(|child| match child.value() {
            scraper::Node::Element(_) => {
                ElementRef::wrap(child).map(|el| Node::Element(convert_element(el)))
            }
            scraper::Node::Text(t) => {
                let text: &str = t;
                Some(Node::Text(text.to_string()))
            }
            scraper::Node::Comment(c) => {
                let comment: &str = c;
                Some(Node::Comment(comment.to_string()))
            }
            _ => None,
        })
        .collect()
}

/// Parse a markup fragment into owned nodes.
pub fn parse_fragment(markup: &str) -> Vec<Node> {
    let html = Html::parse_fragment(markup);
    convert_children(html.root_element())
}

/// Parse a complete document into what a browser would mount from it when
/// injected into a container: the head's `<style>` and stylesheet `<link>`
/// elements followed by the body's children.
pub fn parse_document_body(markup: &str) -> Vec<Node> {
    let html = Html::parse_document(markup);
    let mut nodes = Vec::new();

    if let Ok(head_assets) = Selector::parse("head > style, head > link[rel=\"stylesheet\"]") {
        nodes.extend(
            html.select(&head_assets)
                .map(|el| Node::Element(convert_element(el))),
        );
    }
    if let Ok(body) = Selector::parse("body") {
        if let Some(body) = html.select(&body).next() {
            nodes.extend(convert_children(body));
        }
    }
    nodes
}

fn escape_text(s: &str, out: &mut String) {
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            c => out.push(c),
        }
    }
}

fn escape_attr(s: &str, out: &mut String) {
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            c => out.push(c),
        }
    }
}

fn write_node(node: &Node, raw_parent: bool, out: &mut String) {
    match node {
        Node::Text(t) if raw_parent => out.push_str(t),
        Node::Text(t) => escape_text(t, out),
        Node::Comment(c) => {
            out.push_str("<!--");
            out.push_str(c);
            out.push_str("-->");
        }
        Node::Element(el) => {
            out.push('<');
            out.push_str(&el.name);
            for (k, v) in &el.attrs {
                out.push(' ');
                out.push_str(k);
                out.push_str("=\"");
                escape_attr(v, out);
                out.push('"');
            }
            out.push('>');
            if is_void(&el.name) {
                return;
            }
            let raw = matches!(el.name.as_str(), "style" | "script");
            for child in &el.children {
                write_node(child, raw, out);
            }
            out.push_str("</");
            out.push_str(&el.name);
            out.push('>');
        }
    }
}

/// Serialize nodes back to markup.
pub fn serialize(nodes: &[Node]) -> String {
    let mut out = String::new();
    for node in nodes {
        write_node(node, false, &mut out);
    }
    out
}
