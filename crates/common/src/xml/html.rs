//! HTML renderings of article front matter, one per article language

use super::{ArticleXml, Element, XPaths};
use quick_xml::escape::escape;
use serde::{Deserialize, Serialize};

/// An HTML rendering of the article in one language
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HtmlVariant {
    pub language: String,
    pub source: String,
}

const XML_LANG: &str = "xml:lang";

#[derive(Default)]
struct Front {
    title: Option<String>,
    abstract_: Option<String>,
}

/// Render title and abstract in the main language and every translation.
///
/// The main language comes first; translations follow in document order.
pub fn render_htmls(doc: &ArticleXml) -> Vec<HtmlVariant> {
    let main_language = doc
        .value(XPaths::LANGUAGE)
        .unwrap_or_else(|| "en".to_string());

    let mut languages: Vec<(String, Front)> = vec![(
        main_language,
        Front {
            title: doc.value(XPaths::ARTICLE_TITLE),
            abstract_: doc.value(XPaths::ABSTRACT),
        },
    )];

    for group in doc.elements(XPaths::TRANS_TITLE_GROUP) {
        let Some(lang) = group.attribute(XML_LANG) else {
            continue;
        };
        let title = group
            .child_elements()
            .find(|child| child.name == "trans-title")
            .map(Element::text)
            .filter(|t| !t.is_empty());
        entry(&mut languages, lang).title = title;
    }

    for trans in doc.elements(XPaths::TRANS_ABSTRACT) {
        let Some(lang) = trans.attribute(XML_LANG) else {
            continue;
        };
        let text = trans.text();
        if !text.is_empty() {
            entry(&mut languages, lang).abstract_ = Some(text);
        }
    }

    languages
        .into_iter()
        .filter(|(_, front)| front.title.is_some() || front.abstract_.is_some())
        .map(|(language, front)| HtmlVariant {
            source: render(&language, &front),
            language,
        })
        .collect()
}

fn entry<'a>(languages: &'a mut Vec<(String, Front)>, lang: &str) -> &'a mut Front {
    let index = match languages.iter().position(|(l, _)| l == lang) {
        Some(index) => index,
        None => {
            languages.push((lang.to_string(), Front::default()));
            languages.len() - 1
        }
    };
    &mut languages[index].1
}

fn render(language: &str, front: &Front) -> String {
    let mut html = format!(r#"<article lang="{}">"#, escape(language));
    if let Some(title) = &front.title {
        html.push_str(&format!("<h1>{}</h1>", escape(title)));
    }
    if let Some(abstract_) = &front.abstract_ {
        html.push_str(&format!(
            r#"<section class="abstract"><p>{}</p></section>"#,
            escape(abstract_)
        ));
    }
    html.push_str("</article>");
    html
}
