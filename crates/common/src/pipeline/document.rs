//! Search document: the denormalized projection of an article

use crate::db::models::{Article, Issue, Journal};
use crate::xml::{render_htmls, ArticleXml, HtmlVariant, ValidationError, XPaths};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JournalContext {
    pub jid: String,
    pub title: String,
    pub abbrev_title: Option<String>,
    pub print_issn: Option<String>,
    pub electronic_issn: Option<String>,
    pub study_areas: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IssueContext {
    pub iid: String,
    pub label: String,
    pub volume: String,
    pub number: String,
    pub year: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchDocument {
    pub aid: String,
    pub domain_key: String,
    pub abbrev_journal_title: Option<String>,
    pub epub: Option<String>,
    pub ppub: Option<String>,
    pub volume: Option<String>,
    pub issue: Option<String>,
    pub year: Option<String>,
    pub doi: Option<String>,
    pub pid: Option<String>,
    pub head_subject: Option<String>,
    pub article_type: Option<String>,
    pub title: Option<String>,
    /// Tag-set version declared by the XML
    pub version: Option<String>,
    pub is_aop: bool,
    pub b64_source: String,
    pub source: String,
    pub section: Option<String>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub journal: Option<JournalContext>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issue_context: Option<IssueContext>,
    pub htmls: Vec<HtmlVariant>,
}

impl SearchDocument {
    /// Project `article` and whatever context it is linked to.
    ///
    /// Scalar fields are read from the stored XML, which was validated
    /// on intake; a parse failure here means the row was tampered with.
    pub fn build(
        article: &Article,
        journal: Option<&Journal>,
        issue: Option<&Issue>,
    ) -> Result<Self, ValidationError> {
        let doc = ArticleXml::parse(&article.xml)?;
        let head_subject = doc.value(XPaths::HEAD_SUBJECT);

        Ok(Self {
            aid: article.aid.clone(),
            domain_key: article.domain_key.clone(),
            abbrev_journal_title: doc.value(XPaths::ABBREV_JOURNAL_TITLE),
            epub: doc.issn_epub(),
            ppub: doc.issn_ppub(),
            volume: doc.value(XPaths::VOLUME),
            issue: doc.value(XPaths::ISSUE),
            year: doc.value(XPaths::YEAR),
            doi: doc.value(XPaths::DOI),
            pid: doc.value(XPaths::PID),
            section: head_subject.clone(),
            head_subject,
            article_type: doc.value(XPaths::ARTICLE_TYPE),
            title: doc.value(XPaths::ARTICLE_TITLE),
            version: doc.xml_version(),
            is_aop: article.is_aop,
            b64_source: BASE64.encode(article.xml.as_bytes()),
            source: article.xml.clone(),
            created: article.created_at.with_timezone(&Utc),
            updated: article.updated_at.with_timezone(&Utc),
            journal: journal.map(|journal| JournalContext {
                jid: journal.jid.clone(),
                title: journal.title.clone(),
                abbrev_title: journal.abbrev_title.clone(),
                print_issn: journal.print_issn.clone(),
                electronic_issn: journal.electronic_issn.clone(),
                study_areas: journal.study_area_names(),
            }),
            issue_context: issue.map(|issue| IssueContext {
                iid: issue.iid.clone(),
                label: issue.label.clone(),
                volume: issue.volume.clone(),
                number: issue.number.clone(),
                year: issue.publication_year,
            }),
            htmls: render_htmls(&doc),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing;
    use crate::xml::fixtures;

    #[test]
    fn test_unlinked_document() {
        let mut article = testing::article("k");
        article.xml = fixtures::article("0066-782X", "114", "3", "2020");

        let document = SearchDocument::build(&article, None, None).unwrap();
        assert_eq!(document.ppub.as_deref(), Some("0066-782X"));
        assert_eq!(document.epub.as_deref(), Some("1678-4170"));
        assert_eq!(document.doi.as_deref(), Some("10.5935/abc.2020001"));
        assert_eq!(document.pid.as_deref(), Some("S0066-782X2020000300001"));
        assert_eq!(document.head_subject.as_deref(), Some("Original Article"));
        assert_eq!(document.section, document.head_subject);
        assert_eq!(document.version.as_deref(), Some("1.0"));
        assert_eq!(BASE64.decode(&document.b64_source).unwrap(), article.xml.as_bytes());
        assert_eq!(document.htmls.len(), 2);

        let json = serde_json::to_value(&document).unwrap();
        assert!(json.get("journal").is_none());
        assert!(json.get("issue_context").is_none());
    }

    #[test]
    fn test_linked_document_carries_context() {
        let journal = testing::journal(Some("0066-782X"), None);
        let issue = testing::issue(journal.id, "114", "3", 2020);
        let mut article = testing::article("k");
        article.xml = fixtures::article("0066-782X", "114", "3", "2020");

        let document = SearchDocument::build(&article, Some(&journal), Some(&issue)).unwrap();
        let journal_context = document.journal.unwrap();
        assert_eq!(journal_context.jid, journal.jid);
        assert_eq!(journal_context.study_areas, vec!["Health Sciences".to_string()]);
        assert_eq!(document.issue_context.unwrap().iid, issue.iid);
    }

    #[test]
    fn test_corrupt_source_is_an_error() {
        let mut article = testing::article("k");
        article.xml = "<article>".to_string();
        assert!(SearchDocument::build(&article, None, None).is_err());
    }
}
