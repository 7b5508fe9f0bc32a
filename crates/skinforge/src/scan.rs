//! Depth-balanced boundary scanning over serialized markup.
//!
//! The scanner walks tag tokens without building a tree. Depth is tracked only
//! for the element name being bounded; tags of other names are skipped. It
//! understands enough of HTML's lexical rules to avoid the usual traps:
//!
//! - comments, doctype and processing instructions are skipped whole,
//! - quoted attribute values may contain `>`,
//! - `script`, `style`, `textarea` and `title` bodies are raw text,
//! - self-closing tags (`<x/>`) and HTML void elements never open a level.

use regex::Regex;
use std::sync::OnceLock;

/// HTML elements that never have a closing tag.
pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "textarea", "title"];

pub fn is_void(name: &str) -> bool {
    VOID_ELEMENTS.iter().any(|v| v.eq_ignore_ascii_case(name))
}

fn is_raw_text(name: &str) -> bool {
    RAW_TEXT_ELEMENTS.iter().any(|v| v.eq_ignore_ascii_case(name))
}

/// Kind of a tag token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    Open,
    Close,
    SelfClosing,
}

/// A single tag token: byte span `[start, end)` in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub kind: TagKind,
    pub name: String,
    pub start: usize,
    pub end: usize,
}

/// Iterator over the tag tokens of a markup string.
pub struct TagScanner<'a> {
    src: &'a str,
    pos: usize,
    /// Set after an opening raw-text tag; its body is skipped on the next step.
    raw_text: Option<String>,
}

impl<'a> TagScanner<'a> {
    pub fn new(src: &'a str) -> Self {
        Self::starting_at(src, 0)
    }

    pub fn starting_at(src: &'a str, pos: usize) -> Self {
        Self {
            src,
            pos: pos.min(src.len()),
            raw_text: None,
        }
    }

    fn skip_past(&mut self, needle: &str) {
        match self.src[self.pos..].find(needle) {
            Some(i) => self.pos += i + needle.len(),
            None => self.pos = self.src.len(),
        }
    }

    /// Skip to the `</name` that ends a raw-text element, leaving `pos` on it.
    fn skip_raw_text(&mut self, name: &str) {
        let bytes = self.src.as_bytes();
        let mut i = self.pos;
        while let Some(rel) = self.src[i..].find("</") {
            let at = i + rel;
            let after = at + 2;
            let end = after + name.len();
            if end <= bytes.len() && bytes[after..end].eq_ignore_ascii_case(name.as_bytes()) {
                let boundary = bytes.get(end).copied();
                if boundary.map_or(true, |b| b == b'>' || b == b'/' || b.is_ascii_whitespace()) {
                    self.pos = at;
                    return;
                }
            }
            i = after;
        }
        self.pos = bytes.len();
    }

    /// Read a tag name starting at `from`; returns the name and the index after it.
    fn read_name(&self, from: usize) -> Option<(String, usize)> {
        let bytes = self.src.as_bytes();
        if !bytes.get(from)?.is_ascii_alphabetic() {
            return None;
        }
        let mut end = from;
        while end < bytes.len()
            && (bytes[end].is_ascii_alphanumeric() || bytes[end] == b'-' || bytes[end] == b':')
        {
            end += 1;
        }
        Some((self.src[from..end].to_ascii_lowercase(), end))
    }

    /// Find the `>` closing a tag, honouring quoted attribute values.
    /// Returns the index after `>` and whether the tag was self-closing.
    ///
    /// Only a `/` standing on its own counts: right after the tag name, after
    /// whitespace, or after a quoted value. `<a href=/x/>` is not self-closing.
    fn find_tag_end(&self, from: usize) -> (usize, bool) {
        let bytes = self.src.as_bytes();
        let mut quote: Option<u8> = None;
        let mut slash_alone = false;
        let mut i = from;
        while i < bytes.len() {
            let b = bytes[i];
            match quote {
                Some(q) if b == q => quote = None,
                Some(_) => {}
                None => match b {
                    b'"' | b'\'' => {
                        quote = Some(b);
                        slash_alone = false;
                    }
                    b'>' => return (i + 1, slash_alone),
                    b'/' => {
                        slash_alone = i == from
                            || bytes[i - 1].is_ascii_whitespace()
                            || matches!(bytes[i - 1], b'"' | b'\'');
                    }
                    _ if b.is_ascii_whitespace() => {}
                    _ => slash_alone = false,
                },
            }
            i += 1;
        }
        (bytes.len(), false)
    }
}

impl Iterator for TagScanner<'_> {
    type Item = Tag;

    fn next(&mut self) -> Option<Tag> {
        if let Some(name) = self.raw_text.take() {
            self.skip_raw_text(&name);
        }
        loop {
            let rel = self.src[self.pos..].find('<')?;
            let start = self.pos + rel;
            let rest = &self.src[start..];

            if rest.starts_with("<!--") {
                self.pos = start + 4;
                self.skip_past("-->");
                continue;
            }
            if rest.starts_with("<!") || rest.starts_with("<?") {
                self.pos = start + 2;
                self.skip_past(">");
                continue;
            }
            if rest.starts_with("</") {
                if let Some((name, after)) = self.read_name(start + 2) {
                    let (end, _) = self.find_tag_end(after);
                    self.pos = end;
                    return Some(Tag {
                        kind: TagKind::Close,
                        name,
                        start,
                        end,
                    });
                }
                self.pos = start + 2;
                continue;
            }
            match self.read_name(start + 1) {
                Some((name, after)) => {
                    let (end, self_closing) = self.find_tag_end(after);
                    self.pos = end;
                    let kind = if self_closing || is_void(&name) {
                        TagKind::SelfClosing
                    } else {
                        TagKind::Open
                    };
                    if kind == TagKind::Open && is_raw_text(&name) {
                        self.raw_text = Some(name.clone());
                    }
                    return Some(Tag {
                        kind,
                        name,
                        start,
                        end,
                    });
                }
                None => {
                    // A bare `<` in text.
                    self.pos = start + 1;
                }
            }
        }
    }
}

/// A bounded element located in a markup string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Boundary {
    /// Byte offset of the root's opening `<`.
    pub start: usize,
    /// Byte offset just past the root's closing `>`.
    pub end: usize,
    /// Lower-cased element name of the root.
    pub tag: String,
    /// Number of closing tags of `tag` consumed, the root's own included.
    pub closing_tags: usize,
    /// Deepest nesting of `tag` seen inside the boundary.
    pub max_depth: usize,
}

impl Boundary {
    pub fn slice<'a>(&self, src: &'a str) -> &'a str {
        &src[self.start..self.end]
    }
}

fn class_attr_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?is)\bclass\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("valid class regex")
    })
}

/// Whether the opening tag text carries `class_token` in its class list.
pub fn tag_has_class(tag_text: &str, class_token: &str) -> bool {
    class_attr_regex().captures_iter(tag_text).any(|caps| {
        caps.get(1)
            .or_else(|| caps.get(2))
            .is_some_and(|m| m.as_str().split_whitespace().any(|c| c == class_token))
    })
}

/// Find the first opening tag whose class list contains `class_token`.
pub fn locate_root(src: &str, class_token: &str) -> Option<Tag> {
    TagScanner::new(src).find(|tag| {
        tag.kind != TagKind::Close && tag_has_class(&src[tag.start..tag.end], class_token)
    })
}

/// Scan from the opening tag at `root` until its depth returns to zero.
///
/// Returns `None` when the input ends before the element is closed.
pub fn scan_balanced(src: &str, root: &Tag) -> Option<Boundary> {
    if root.kind == TagKind::SelfClosing {
        return Some(Boundary {
            start: root.start,
            end: root.end,
            tag: root.name.clone(),
            closing_tags: 0,
            max_depth: 0,
        });
    }

    let mut depth = 0usize;
    let mut max_depth = 0usize;
    let mut closing_tags = 0usize;
    for tag in TagScanner::starting_at(src, root.start) {
        if tag.name != root.name {
            continue;
        }
        match tag.kind {
            TagKind::Open => {
                depth += 1;
                max_depth = max_depth.max(depth);
            }
            TagKind::Close => {
                closing_tags += 1;
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(Boundary {
                        start: root.start,
                        end: tag.end,
                        tag: root.name.clone(),
                        closing_tags,
                        max_depth,
                    });
                }
            }
            TagKind::SelfClosing => {}
        }
    }
    None
}

/// Locate and bound the first element carrying `class_token`.
pub fn find_boundary(src: &str, class_token: &str) -> Option<Boundary> {
    let root = locate_root(src, class_token)?;
    scan_balanced(src, &root)
}

/// Locate and bound the first element named `tag`.
pub fn find_element(src: &str, tag: &str) -> Option<Boundary> {
    let root = TagScanner::new(src)
        .find(|t| t.kind != TagKind::Close && t.name.eq_ignore_ascii_case(tag))?;
    scan_balanced(src, &root)
}

/// Byte offsets at which the nesting of `tag` returns to zero, scanning the
/// whole input. A single well-formed element yields exactly one offset, at
/// its end.
pub fn depth_zero_offsets(src: &str, tag: &str) -> Vec<usize> {
    let tag = tag.to_ascii_lowercase();
    let mut depth = 0usize;
    let mut offsets = Vec::new();
    for t in TagScanner::new(src).filter(|t| t.name == tag) {
        match t.kind {
            TagKind::Open => depth += 1,
            TagKind::Close if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    offsets.push(t.end);
                }
            }
            _ => {}
        }
    }
    offsets
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<(TagKind, String)> {
        TagScanner::new(src).map(|t| (t.kind, t.name)).collect()
    }

    #[test]
    fn test_tokens_basic() {
        let toks = kinds(r#"<div class="a"><br><img src="x"/><span>t</span></div>"#);
        assert_eq!(
            toks,
            vec![
                (TagKind::Open, "div".into()),
                (TagKind::SelfClosing, "br".into()),
                (TagKind::SelfClosing, "img".into()),
                (TagKind::Open, "span".into()),
                (TagKind::Close, "span".into()),
                (TagKind::Close, "div".into()),
            ]
        );
    }

    #[test]
    fn test_quoted_gt_and_comments_skipped() {
        let src = r#"<div data-x="a > b"><!-- <div> --><p>x</p></div>"#;
        let b = find_element(src, "div").unwrap();
        assert_eq!(b.end, src.len());
        assert_eq!(b.closing_tags, 1);
    }

    #[test]
    fn test_raw_text_bodies_are_opaque() {
        let src = "<div class=\"document\"><style>.x:after{content:'</div>'}</style><script>if(a<b){document.write('<div>')}</script></div><div>tail</div>";
        let b = find_boundary(src, "document").unwrap();
        assert!(b.slice(src).ends_with("</script></div>"));
        assert_eq!(b.closing_tags, 1);
    }

    #[test]
    fn test_self_closing_same_name_does_not_nest() {
        let src = r#"<div class="document"><div/><div class="x"></div></div>"#;
        let b = find_boundary(src, "document").unwrap();
        assert_eq!(b.end, src.len());
        assert_eq!(b.closing_tags, 2);
        assert_eq!(b.max_depth, 2);
    }

    #[test]
    fn test_slash_inside_unquoted_value_is_not_self_closing() {
        let toks = kinds(r#"<a href=/x/><br /><img src="p.png"/><a href=/y>t</a></a>"#);
        assert_eq!(
            toks,
            vec![
                (TagKind::Open, "a".into()),
                (TagKind::SelfClosing, "br".into()),
                (TagKind::SelfClosing, "img".into()),
                (TagKind::Open, "a".into()),
                (TagKind::Close, "a".into()),
                (TagKind::Close, "a".into()),
            ]
        );

        let src = r#"<div class="document"><div data-next=/page/2/>x</div></div>"#;
        let b = find_boundary(src, "document").unwrap();
        assert_eq!(b.end, src.len());
        assert_eq!(b.max_depth, 2);
    }

    #[test]
    fn test_class_token_must_match_whole_word() {
        let src = r#"<div class="documents"></div><section class="page document big"><div></div></section>"#;
        let b = find_boundary(src, "document").unwrap();
        assert_eq!(b.tag, "section");
        assert!(b.slice(src).starts_with("<section"));
    }

    #[test]
    fn test_unclosed_root_is_none() {
        assert!(find_boundary(r#"<div class="document"><div></div>"#, "document").is_none());
        assert!(find_boundary("<div>nothing here</div>", "document").is_none());
    }

    #[test]
    fn test_uppercase_tags() {
        let src = r#"<DIV class="document"><Div></DIV></div>"#;
        let b = find_boundary(src, "document").unwrap();
        assert_eq!(b.end, src.len());
    }

    #[test]
    fn test_bare_lt_in_text() {
        let src = r#"<div class="document">a < b and 3<4</div>"#;
        assert_eq!(find_boundary(src, "document").unwrap().end, src.len());
    }

    #[test]
    fn test_depth_zero_offsets() {
        let src = "<div><div></div></div><div></div>";
        assert_eq!(depth_zero_offsets(src, "div"), vec![22, src.len()]);
    }

    #[test]
    fn test_void_root() {
        let src = r#"<p><img class="document" src="a.png"><span></span></p>"#;
        let b = find_boundary(src, "document").unwrap();
        assert_eq!(b.slice(src), r#"<img class="document" src="a.png">"#);
    }
}
