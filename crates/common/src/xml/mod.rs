//! Article XML document model
//!
//! Parses JATS-like article XML into a small owned element tree and
//! exposes:
//! - path-expression lookups (`value`, `values`)
//! - the derived identity of an article (`domain_key`, `is_aop`)
//! - schema validation of the identifying elements
//! - HTML renderings of the article front matter

mod html;
pub mod paths;
mod schema;

pub use html::{render_htmls, HtmlVariant};
pub use paths::{PathExpr, XPaths};
pub use schema::{Rule, RuleViolation, Schema, ValidationError};

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// A node of the parsed tree
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
}

/// An element with its attributes and children, in document order
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    fn from_start(start: &BytesStart<'_>) -> Result<Self, String> {
        let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| format!("malformed attribute in <{}>: {}", name, e))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map_err(|e| format!("malformed attribute value in <{}>: {}", name, e))?
                .into_owned();
            attributes.push((key, value));
        }
        Ok(Self {
            name,
            attributes,
            children: Vec::new(),
        })
    }

    /// Value of an attribute, if present
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Child elements in document order
    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(element) => Some(element),
            Node::Text(_) => None,
        })
    }

    /// Concatenated descendant text with whitespace collapsed
    pub fn text(&self) -> String {
        let mut raw = String::new();
        self.collect_text(&mut raw);
        raw.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    fn collect_text(&self, out: &mut String) {
        for node in &self.children {
            match node {
                Node::Text(text) => out.push_str(text),
                Node::Element(element) => element.collect_text(out),
            }
        }
    }
}

/// A parsed, well-formed article document
#[derive(Debug, Clone, PartialEq)]
pub struct ArticleXml {
    root: Element,
}

impl ArticleXml {
    /// Parse well-formed XML text.
    ///
    /// Errors carry the parser detail and the byte offset at which it
    /// gave up.
    pub fn parse(text: &str) -> Result<Self, ValidationError> {
        let mut reader = Reader::from_str(text);
        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            let event = reader
                .read_event()
                .map_err(|e| syntax(&reader, e.to_string()))?;

            match event {
                Event::Start(start) => {
                    if root.is_some() {
                        return Err(syntax(&reader, "content after the root element".into()));
                    }
                    let element = Element::from_start(&start).map_err(|m| syntax(&reader, m))?;
                    stack.push(element);
                }
                Event::Empty(start) => {
                    if root.is_some() {
                        return Err(syntax(&reader, "content after the root element".into()));
                    }
                    let element = Element::from_start(&start).map_err(|m| syntax(&reader, m))?;
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(Node::Element(element)),
                        None => root = Some(element),
                    }
                }
                Event::End(_) => {
                    // quick-xml has already checked that the end name matches
                    let element = stack
                        .pop()
                        .ok_or_else(|| syntax(&reader, "unexpected closing tag".into()))?;
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(Node::Element(element)),
                        None => root = Some(element),
                    }
                }
                Event::Text(text) => {
                    let text = text
                        .unescape()
                        .map_err(|e| syntax(&reader, e.to_string()))?;
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(Node::Text(text.into_owned())),
                        None if text.trim().is_empty() => {}
                        None => {
                            return Err(syntax(&reader, "text outside the root element".into()))
                        }
                    }
                }
                Event::CData(data) => {
                    let text = String::from_utf8_lossy(&data.into_inner()).into_owned();
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(Node::Text(text)),
                        None => {
                            return Err(syntax(&reader, "CDATA outside the root element".into()))
                        }
                    }
                }
                Event::Eof => break,
                // declarations, comments, processing instructions, doctype
                _ => {}
            }
        }

        if let Some(open) = stack.last() {
            return Err(syntax(&reader, format!("unclosed element <{}>", open.name)));
        }

        root.map(|root| Self { root })
            .ok_or_else(|| ValidationError::Syntax("document has no root element".into()))
    }

    /// The document element
    pub fn root(&self) -> &Element {
        &self.root
    }

    /// Text of the first node matching `path`, `None` when absent or blank
    pub fn value(&self, path: &str) -> Option<String> {
        PathExpr::parse(path)
            .and_then(|expr| expr.first(&self.root))
            .filter(|value| !value.is_empty())
    }

    /// Text of every node matching `path`, blanks skipped
    pub fn values(&self, path: &str) -> Vec<String> {
        PathExpr::parse(path)
            .map(|expr| expr.all(&self.root))
            .unwrap_or_default()
            .into_iter()
            .filter(|value| !value.is_empty())
            .collect()
    }

    /// Elements matching `path`
    pub fn elements(&self, path: &str) -> Vec<&Element> {
        PathExpr::parse(path)
            .map(|expr| expr.elements(&self.root))
            .unwrap_or_default()
    }

    pub fn issn_ppub(&self) -> Option<String> {
        self.value(XPaths::ISSN_PPUB)
    }

    pub fn issn_epub(&self) -> Option<String> {
        self.value(XPaths::ISSN_EPUB)
    }

    /// Ahead-of-print articles carry neither volume nor issue
    pub fn is_aop(&self) -> bool {
        self.value(XPaths::VOLUME).is_none() && self.value(XPaths::ISSUE).is_none()
    }

    /// Version of the tag set the document declares
    pub fn xml_version(&self) -> Option<String> {
        self.value(XPaths::DTD_VERSION)
    }

    /// Content-derived identity separating logically distinct articles.
    ///
    /// Components are slugified and joined with `_`; absent components
    /// stay as empty slots so positions never shift.
    pub fn domain_key(&self) -> String {
        let issn = self.issn_ppub().or_else(|| self.issn_epub());
        let components = [
            self.value(XPaths::ABBREV_JOURNAL_TITLE),
            issn,
            self.value(XPaths::YEAR),
            self.value(XPaths::VOLUME),
            self.value(XPaths::ISSUE),
            self.value(XPaths::FPAGE),
            self.value(XPaths::LPAGE),
            self.value(XPaths::ELOCATION_ID),
            self.value(XPaths::ARTICLE_TITLE),
            self.value(XPaths::DOI),
            self.value(XPaths::PID),
        ];

        components
            .iter()
            .map(|component| component.as_deref().map(slugify).unwrap_or_default())
            .collect::<Vec<_>>()
            .join("_")
    }
}

fn syntax(reader: &Reader<&[u8]>, message: String) -> ValidationError {
    ValidationError::Syntax(format!(
        "{} (at byte {})",
        message,
        reader.buffer_position()
    ))
}

/// Lowercase slug: runs of anything but letters and digits become `-`.
/// Letters of every script are kept.
pub fn slugify(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    let mut pending_separator = false;
    for c in value.chars() {
        if c.is_alphanumeric() {
            if pending_separator && !slug.is_empty() {
                slug.push('-');
            }
            pending_separator = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_separator = true;
        }
    }
    slug
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_lookup() {
        let doc = ArticleXml::parse(&fixtures::article("0066-782X", "114", "3", "2020")).unwrap();

        assert_eq!(doc.root().name, "article");
        assert_eq!(doc.issn_ppub().as_deref(), Some("0066-782X"));
        assert_eq!(doc.issn_epub().as_deref(), Some("1678-4170"));
        assert_eq!(doc.value(XPaths::VOLUME).as_deref(), Some("114"));
        assert_eq!(
            doc.value(XPaths::ARTICLE_TITLE).as_deref(),
            Some("Heart & lung outcomes")
        );
        assert_eq!(doc.value(XPaths::ARTICLE_TYPE).as_deref(), Some("research-article"));
        assert_eq!(doc.xml_version().as_deref(), Some("1.0"));
        assert!(!doc.is_aop());
    }

    #[test]
    fn test_aop_detection() {
        let doc = ArticleXml::parse(&fixtures::aop_article("1519-6984")).unwrap();
        assert!(doc.is_aop());
        assert_eq!(doc.issn_ppub(), None);
    }

    #[test]
    fn test_domain_key_is_stable_and_content_derived() {
        let a = ArticleXml::parse(&fixtures::article("0066-782X", "114", "3", "2020")).unwrap();
        let b = ArticleXml::parse(&fixtures::article("0066-782X", "114", "3", "2020")).unwrap();
        let c = ArticleXml::parse(&fixtures::article("0066-782X", "114", "4", "2020")).unwrap();

        assert_eq!(a.domain_key(), b.domain_key());
        assert_ne!(a.domain_key(), c.domain_key());
        assert_eq!(
            a.domain_key(),
            "arq-bras-cardiol_0066-782x_2020_114_3_201_209__heart-lung-outcomes\
             _10-5935-abc-2020001_s0066-782x2020000300001"
        );
    }

    #[test]
    fn test_syntax_errors_carry_detail() {
        let err = ArticleXml::parse("<article><front></article>").unwrap_err();
        assert!(matches!(err, ValidationError::Syntax(ref m) if m.contains("at byte")));

        let err = ArticleXml::parse("<article><front>").unwrap_err();
        assert!(matches!(err, ValidationError::Syntax(ref m) if m.contains("front")));

        let err = ArticleXml::parse("<a/><b/>").unwrap_err();
        assert!(matches!(err, ValidationError::Syntax(ref m) if m.contains("after the root")));

        let err = ArticleXml::parse("   ").unwrap_err();
        assert!(matches!(err, ValidationError::Syntax(_)));
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Arq. Bras. Cardiol."), "arq-bras-cardiol");
        assert_eq!(slugify("  --X--  "), "x");
        assert_eq!(slugify("1678-4170"), "1678-4170");
        assert_eq!(slugify("Avaliação clínica"), "avaliação-clínica");
        assert_eq!(slugify("Сердце и сосуды"), "сердце-и-сосуды");
        assert_ne!(slugify("Сердце и сосуды"), slugify("Лёгкие и бронхи"));
    }
}
