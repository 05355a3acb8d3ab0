//! Path expressions over the article tree
//!
//! Supports the subset of XPath the article fields need: absolute
//! element steps, `[@attr="value"]` predicates and a terminal `@attr`
//! step selecting an attribute value.

use super::Element;

/// Paths of the scalar fields read from article XML
pub struct XPaths;

impl XPaths {
    pub const ABBREV_JOURNAL_TITLE: &'static str = "/article/front/journal-meta/abbrev-journal-title";
    pub const ISSN_EPUB: &'static str = r#"/article/front/journal-meta/issn[@pub-type="epub"]"#;
    pub const ISSN_PPUB: &'static str = r#"/article/front/journal-meta/issn[@pub-type="ppub"]"#;
    pub const VOLUME: &'static str = "/article/front/article-meta/volume";
    pub const ISSUE: &'static str = "/article/front/article-meta/issue";
    pub const YEAR: &'static str = "/article/front/article-meta/pub-date/year";
    pub const DOI: &'static str = r#"/article/front/article-meta/article-id[@pub-id-type="doi"]"#;
    pub const PID: &'static str =
        r#"/article/front/article-meta/article-id[@pub-id-type="publisher-id"]"#;
    pub const HEAD_SUBJECT: &'static str = r#"/article/front/article-meta/article-categories/subj-group[@subj-group-type="heading"]/subject"#;
    pub const ARTICLE_TYPE: &'static str = "/article/@article-type";
    pub const ARTICLE_TITLE: &'static str = "/article/front/article-meta/title-group/article-title";
    pub const TRANS_TITLE_GROUP: &'static str =
        "/article/front/article-meta/title-group/trans-title-group";
    pub const ABSTRACT: &'static str = "/article/front/article-meta/abstract";
    pub const TRANS_ABSTRACT: &'static str = "/article/front/article-meta/trans-abstract";
    pub const FPAGE: &'static str = "/article/front/article-meta/fpage";
    pub const LPAGE: &'static str = "/article/front/article-meta/lpage";
    pub const ELOCATION_ID: &'static str = "/article/front/article-meta/elocation-id";
    pub const DTD_VERSION: &'static str = "/article/@dtd-version";
    pub const LANGUAGE: &'static str = "/article/@xml:lang";
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Step {
    name: String,
    predicate: Option<(String, String)>,
}

impl Step {
    fn matches(&self, element: &Element) -> bool {
        element.name == self.name
            && self
                .predicate
                .as_ref()
                .map_or(true, |(key, value)| element.attribute(key) == Some(value.as_str()))
    }
}

/// A compiled path expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathExpr {
    steps: Vec<Step>,
    attribute: Option<String>,
}

impl PathExpr {
    /// Compile an absolute path; `None` when the expression is malformed
    pub fn parse(expr: &str) -> Option<Self> {
        let rest = expr.strip_prefix('/')?;
        let mut steps = Vec::new();
        let mut attribute = None;

        let segments: Vec<&str> = rest.split('/').collect();
        for (i, segment) in segments.iter().enumerate() {
            if let Some(name) = segment.strip_prefix('@') {
                // attribute selection is only valid as the last step
                if i + 1 != segments.len() || name.is_empty() {
                    return None;
                }
                attribute = Some(name.to_string());
                continue;
            }
            steps.push(parse_step(segment)?);
        }

        if steps.is_empty() {
            return None;
        }
        Some(Self { steps, attribute })
    }

    /// Elements selected by the element steps, in document order
    pub fn elements<'a>(&self, root: &'a Element) -> Vec<&'a Element> {
        let (first, rest) = match self.steps.split_first() {
            Some(split) => split,
            None => return Vec::new(),
        };
        if !first.matches(root) {
            return Vec::new();
        }

        let mut current = vec![root];
        for step in rest {
            current = current
                .into_iter()
                .flat_map(|element| element.child_elements().filter(|child| step.matches(child)))
                .collect();
        }
        current
    }

    /// Text of every match
    pub fn all(&self, root: &Element) -> Vec<String> {
        self.elements(root)
            .into_iter()
            .filter_map(|element| self.select(element))
            .collect()
    }

    /// Text of the first match
    pub fn first(&self, root: &Element) -> Option<String> {
        self.elements(root)
            .into_iter()
            .find_map(|element| self.select(element))
    }

    fn select(&self, element: &Element) -> Option<String> {
        match &self.attribute {
            Some(name) => element.attribute(name).map(|v| v.trim().to_string()),
            None => Some(element.text()),
        }
    }
}

fn parse_step(segment: &str) -> Option<Step> {
    let Some(open) = segment.find('[') else {
        return (!segment.is_empty()).then(|| Step {
            name: segment.to_string(),
            predicate: None,
        });
    };

    let name = &segment[..open];
    let inner = segment[open + 1..].strip_suffix(']')?;
    let (key, value) = inner.strip_prefix('@')?.split_once('=')?;
    let value = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))?;

    if name.is_empty() || key.is_empty() {
        return None;
    }
    Some(Step {
        name: name.to_string(),
        predicate: Some((key.to_string(), value.to_string())),
    })
}
