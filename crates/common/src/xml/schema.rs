//! Business-rule schema for incoming articles
//!
//! A schema is a fixed list of rules, each checking that an identifying
//! element is present. The schema itself holds no mutable state: every
//! call to [`Schema::validate`] collects violations locally, so one
//! instance can be shared across concurrent validations.

use super::{ArticleXml, XPaths};
use std::fmt;

/// Validation failure
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("XML syntax error: {0}")]
    Syntax(String),

    #[error("Missing identification elements: {}", rule_ids(.0))]
    MissingIdentification(Vec<RuleViolation>),
}

fn rule_ids(violations: &[RuleViolation]) -> String {
    violations
        .iter()
        .map(|v| v.rule)
        .collect::<Vec<_>>()
        .join(", ")
}

/// A failed rule and what was missing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleViolation {
    pub rule: &'static str,
    pub message: String,
}

impl fmt::Display for RuleViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.rule, self.message)
    }
}

/// One schema rule. `check` returns the violation message on failure.
#[derive(Clone, Copy)]
pub struct Rule {
    pub id: &'static str,
    pub description: &'static str,
    check: fn(&ArticleXml) -> Result<(), String>,
}

impl Rule {
    pub const fn new(
        id: &'static str,
        description: &'static str,
        check: fn(&ArticleXml) -> Result<(), String>,
    ) -> Self {
        Self {
            id,
            description,
            check,
        }
    }

    pub fn check(&self, doc: &ArticleXml) -> Option<RuleViolation> {
        (self.check)(doc).err().map(|message| RuleViolation {
            rule: self.id,
            message,
        })
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("id", &self.id)
            .field("description", &self.description)
            .finish()
    }
}

/// A named, immutable rule-set
#[derive(Debug, Clone)]
pub struct Schema {
    name: &'static str,
    rules: Vec<Rule>,
}

impl Schema {
    pub fn new(name: &'static str, rules: Vec<Rule>) -> Self {
        Self { name, rules }
    }

    /// Minimal identification every accepted article must carry
    pub fn basic_article_meta() -> Self {
        Self::new(
            "basic_article_meta",
            vec![
                Rule::new(
                    "journal-issn",
                    "the journal is identified by a print or electronic ISSN",
                    journal_issn,
                ),
                Rule::new(
                    "journal-title",
                    "the journal's abbreviated title is present",
                    journal_title,
                ),
                Rule::new("article-title", "the article has a title", article_title),
                Rule::new(
                    "pub-year",
                    "the publication date carries a four-digit year",
                    pub_year,
                ),
                Rule::new(
                    "article-locator",
                    "the article has a DOI, a publisher id, a first page or an elocation-id",
                    article_locator,
                ),
            ],
        )
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Parse and check `text`.
    ///
    /// Malformed input fails with [`ValidationError::Syntax`]; a
    /// well-formed document failing any rule lists every violated rule.
    pub fn validate(&self, text: &str) -> Result<ArticleXml, ValidationError> {
        let doc = ArticleXml::parse(text)?;

        let violations: Vec<RuleViolation> =
            self.rules.iter().filter_map(|rule| rule.check(&doc)).collect();

        if violations.is_empty() {
            Ok(doc)
        } else {
            Err(ValidationError::MissingIdentification(violations))
        }
    }
}

impl Default for Schema {
    fn default() -> Self {
        Self::basic_article_meta()
    }
}

fn journal_issn(doc: &ArticleXml) -> Result<(), String> {
    match doc.issn_ppub().or_else(|| doc.issn_epub()) {
        Some(_) => Ok(()),
        None => Err("no print or electronic ISSN in journal-meta".into()),
    }
}

fn journal_title(doc: &ArticleXml) -> Result<(), String> {
    doc.value(XPaths::ABBREV_JOURNAL_TITLE)
        .map(|_| ())
        .ok_or_else(|| "no abbrev-journal-title in journal-meta".into())
}

fn article_title(doc: &ArticleXml) -> Result<(), String> {
    doc.value(XPaths::ARTICLE_TITLE)
        .map(|_| ())
        .ok_or_else(|| "no article-title in title-group".into())
}

fn pub_year(doc: &ArticleXml) -> Result<(), String> {
    match doc.value(XPaths::YEAR) {
        Some(year) if year.len() == 4 && year.bytes().all(|b| b.is_ascii_digit()) => Ok(()),
        Some(year) => Err(format!("publication year '{}' is not a four-digit year", year)),
        None => Err("no year in pub-date".into()),
    }
}

fn article_locator(doc: &ArticleXml) -> Result<(), String> {
    let found = [XPaths::DOI, XPaths::PID, XPaths::FPAGE, XPaths::ELOCATION_ID]
        .iter()
        .any(|path| doc.value(path).is_some());

    if found {
        Ok(())
    } else {
        Err("no doi, publisher-id, fpage or elocation-id in article-meta".into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::fixtures;
    use std::sync::Arc;

    fn rule_ids_of(err: ValidationError) -> Vec<&'static str> {
        match err {
            ValidationError::MissingIdentification(violations) => {
                violations.into_iter().map(|v| v.rule).collect()
            }
            other => panic!("expected missing identification, got {:?}", other),
        }
    }

    #[test]
    fn test_complete_articles_pass() {
        let schema = Schema::basic_article_meta();
        assert!(schema
            .validate(&fixtures::article("0066-782X", "114", "3", "2020"))
            .is_ok());
        assert!(schema.validate(&fixtures::aop_article("1519-6984")).is_ok());
    }

    #[test]
    fn test_malformed_input_is_a_syntax_error() {
        let schema = Schema::basic_article_meta();
        let err = schema.validate("<article><front>").unwrap_err();
        assert!(matches!(err, ValidationError::Syntax(_)));
    }

    #[test]
    fn test_every_violated_rule_is_listed() {
        let schema = Schema::basic_article_meta();
        let err = schema
            .validate("<article><front><article-meta/></front></article>")
            .unwrap_err();

        assert_eq!(
            rule_ids_of(err),
            vec![
                "journal-issn",
                "journal-title",
                "article-title",
                "pub-year",
                "article-locator"
            ]
        );
    }

    #[test]
    fn test_single_missing_element() {
        let schema = Schema::basic_article_meta();
        let xml = fixtures::article("0066-782X", "114", "3", "2020")
            .replace(r#"<issn pub-type="ppub">0066-782X</issn>"#, "")
            .replace(r#"<issn pub-type="epub">1678-4170</issn>"#, "");

        assert_eq!(rule_ids_of(schema.validate(&xml).unwrap_err()), vec!["journal-issn"]);
    }

    #[test]
    fn test_year_must_have_four_digits() {
        let schema = Schema::basic_article_meta();
        let xml = fixtures::article("0066-782X", "114", "3", "20");

        let err = schema.validate(&xml).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Missing identification elements: pub-year"
        );
    }

    #[tokio::test]
    async fn test_shared_schema_validates_concurrently() {
        let schema = Arc::new(Schema::basic_article_meta());

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let schema = schema.clone();
                tokio::spawn(async move {
                    let xml = if i % 2 == 0 {
                        fixtures::article("0066-782X", &i.to_string(), "1", "2020")
                    } else {
                        "<article/>".to_string()
                    };
                    schema.validate(&xml).is_ok()
                })
            })
            .collect();

        for (i, handle) in handles.into_iter().enumerate() {
            assert_eq!(handle.await.unwrap(), i % 2 == 0);
        }
    }
}
