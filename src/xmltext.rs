//! Targeted text-region helpers for XML parts.
//!
//! Parts are edited as text, never re-serialized through a tree, so these
//! helpers only locate tags and read attributes. Matching is by local name
//! so any namespace prefix is accepted, and attribute values may use either
//! quote style.

use regex::Regex;
use std::sync::LazyLock;

static ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([A-Za-z_][\w:.\-]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).unwrap()
});

/// A start (or empty-element) tag located in a text buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tag<'a> {
    /// Byte offset of `<`
    pub start: usize,
    /// Byte offset just past `>`
    pub end: usize,
    /// Qualified name, e.g. `p:sldId`
    pub qname: &'a str,
    /// Full tag text
    pub text: &'a str,
}

impl<'a> Tag<'a> {
    /// Whether the tag closes itself (`<x/>`).
    pub fn is_empty_element(&self) -> bool {
        self.text.ends_with("/>")
    }

    /// Namespace prefix including the colon (`"p:"`), or `""`.
    pub fn prefix(&self) -> &'a str {
        match self.qname.find(':') {
            Some(pos) => &self.qname[..=pos],
            None => "",
        }
    }

    /// Attribute value by qualified name.
    pub fn attr(&self, name: &str) -> Option<&'a str> {
        attr(self.text, name)
    }
}

/// An element with its content range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Element<'a> {
    pub open: Tag<'a>,
    /// Offset of the closing tag's `<`; equals `open.end` for empty elements
    pub close_start: usize,
    /// Offset just past the element
    pub end: usize,
}

impl Element<'_> {
    /// Content between the tags.
    pub fn inner<'x>(&self, xml: &'x str) -> &'x str {
        &xml[self.open.end..self.close_start]
    }
}

/// Read an attribute from the text of a single tag.
pub fn attr<'a>(tag_text: &'a str, name: &str) -> Option<&'a str> {
    // Skip the element name so it never matches as an attribute.
    let body_start = tag_text
        .find(|c: char| c.is_whitespace())
        .unwrap_or(tag_text.len());
    ATTR_RE
        .captures_iter(&tag_text[body_start..])
        .find(|caps| caps.get(1).map(|m| m.as_str()) == Some(name))
        .and_then(|caps| caps.get(2).or_else(|| caps.get(3)))
        .map(|m| m.as_str())
}

/// Offset just past the `>` that ends the tag starting at `start`,
/// honouring quoted attribute values.
fn tag_end(xml: &str, start: usize) -> Option<usize> {
    let mut quote: Option<u8> = None;
    for (i, b) in xml.as_bytes()[start..].iter().enumerate() {
        match (quote, *b) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, b'"') | (None, b'\'') => quote = Some(*b),
            (None, b'>') => return Some(start + i + 1),
            _ => {}
        }
    }
    None
}

/// All start tags whose local name is `local`, in document order.
pub fn start_tags<'a>(xml: &'a str, local: &str) -> Vec<Tag<'a>> {
    let mut tags = Vec::new();
    let mut pos = 0;

    while let Some(rel) = xml[pos..].find('<') {
        let start = pos + rel;
        let rest = &xml[start + 1..];
        let name_len = rest
            .find(|c: char| c.is_whitespace() || c == '/' || c == '>')
            .unwrap_or(rest.len());
        let qname = &rest[..name_len];
        let local_part = qname.rsplit(':').next().unwrap_or(qname);

        if name_len > 0 && local_part == local {
            if let Some(end) = tag_end(xml, start) {
                tags.push(Tag {
                    start,
                    end,
                    qname,
                    text: &xml[start..end],
                });
                pos = end;
                continue;
            }
        }
        pos = start + 1;
    }

    tags
}

/// First element with local name `local`.
///
/// The element must not nest inside itself, which holds for the list
/// elements this crate edits.
pub fn find_element<'a>(xml: &'a str, local: &str) -> Option<Element<'a>> {
    find_elements(xml, local).into_iter().next()
}

/// All elements with local name `local`, in document order.
pub fn find_elements<'a>(xml: &'a str, local: &str) -> Vec<Element<'a>> {
    start_tags(xml, local)
        .into_iter()
        .filter_map(|open| {
            if open.is_empty_element() {
                return Some(Element {
                    open,
                    close_start: open.end,
                    end: open.end,
                });
            }
            let closing = format!("</{}>", open.qname);
            let close_start = open.end + xml[open.end..].find(&closing)?;
            Some(Element {
                open,
                close_start,
                end: close_start + closing.len(),
            })
        })
        .collect()
}

/// Replace the byte range `[start, end)` of `xml`.
pub fn splice(xml: &str, start: usize, end: usize, replacement: &str) -> String {
    let mut out = String::with_capacity(xml.len() + replacement.len());
    out.push_str(&xml[..start]);
    out.push_str(replacement);
    out.push_str(&xml[end..]);
    out
}

/// Insert `content` as the last child of `element`, expanding an empty
/// element tag when needed.
pub fn append_child(xml: &str, element: &Element<'_>, content: &str) -> String {
    if element.open.is_empty_element() {
        let open = element.open.text.trim_end_matches("/>").trim_end();
        let expanded = format!("{}>{}</{}>", open, content, element.open.qname);
        splice(xml, element.open.start, element.open.end, &expanded)
    } else {
        splice(xml, element.close_start, element.close_start, content)
    }
}

/// Insert `content` as the first child of `element`.
pub fn prepend_child(xml: &str, element: &Element<'_>, content: &str) -> String {
    if element.open.is_empty_element() {
        append_child(xml, element, content)
    } else {
        splice(xml, element.open.end, element.open.end, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attr_quote_styles_and_order() {
        assert_eq!(attr(r#"<p:sldId id="256" r:id="rId2"/>"#, "id"), Some("256"));
        assert_eq!(attr(r#"<p:sldId r:id='rId2' id='300'/>"#, "id"), Some("300"));
        assert_eq!(attr(r#"<p:sldId r:id = "rId2" id = "301" />"#, "r:id"), Some("rId2"));
        assert_eq!(attr(r#"<p:sldId r:id="rId2"/>"#, "id"), None);
    }

    #[test]
    fn test_start_tags_by_local_name() {
        let xml = r#"<p:sldIdLst><p:sldId id="256" r:id="rId2"/><sldId id='257' r:id='rId3'/></p:sldIdLst>"#;
        let tags = start_tags(xml, "sldId");
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[0].prefix(), "p:");
        assert_eq!(tags[1].prefix(), "");
        assert_eq!(tags[1].attr("id"), Some("257"));
        // sldIdLst must not be mistaken for sldId
        assert_eq!(start_tags(xml, "sldIdLst").len(), 1);
    }

    #[test]
    fn test_tag_end_honours_quotes() {
        let xml = r#"<a:t x="a>b">text</a:t>"#;
        let tags = start_tags(xml, "t");
        assert_eq!(tags[0].text, r#"<a:t x="a>b">"#);
    }

    #[test]
    fn test_find_element_and_inner() {
        let xml = "<root><p:list><p:item/></p:list></root>";
        let el = find_element(xml, "list").unwrap();
        assert_eq!(el.inner(xml), "<p:item/>");
        assert_eq!(&xml[el.open.start..el.end], "<p:list><p:item/></p:list>");
    }

    #[test]
    fn test_append_child_expands_empty() {
        let xml = "<root><p:list/></root>";
        let el = find_element(xml, "list").unwrap();
        assert_eq!(append_child(xml, &el, "<p:item/>"), "<root><p:list><p:item/></p:list></root>");

        let xml = "<root><p:list><p:a/></p:list></root>";
        let el = find_element(xml, "list").unwrap();
        assert_eq!(append_child(xml, &el, "<p:b/>"), "<root><p:list><p:a/><p:b/></p:list></root>");
        assert_eq!(prepend_child(xml, &el, "<p:b/>"), "<root><p:list><p:b/><p:a/></p:list></root>");
    }
}
