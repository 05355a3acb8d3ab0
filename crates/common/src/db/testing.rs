//! Record builders shared by tests

use crate::db::models::{Article, Issue, Journal};
use chrono::Utc;
use uuid::Uuid;

pub fn article(domain_key: &str) -> Article {
    let now = Utc::now().into();
    Article {
        id: Uuid::new_v4(),
        aid: Uuid::new_v4().simple().to_string(),
        domain_key: domain_key.to_string(),
        xml: "<article/>".to_string(),
        xml_version: None,
        issn_ppub: None,
        issn_epub: None,
        article_type: None,
        is_aop: false,
        journal_id: None,
        issue_id: None,
        es_is_dirty: true,
        es_updated_at: None,
        created_at: now,
        updated_at: now,
    }
}

pub fn journal(print_issn: Option<&str>, electronic_issn: Option<&str>) -> Journal {
    let now = Utc::now().into();
    let id = Uuid::new_v4();
    Journal {
        id,
        jid: id.simple().to_string(),
        title: "Arquivos Brasileiros de Cardiologia".to_string(),
        abbrev_title: Some("Arq. Bras. Cardiol.".to_string()),
        print_issn: print_issn.map(str::to_string),
        electronic_issn: electronic_issn.map(str::to_string),
        study_areas: serde_json::json!(["Health Sciences"]),
        pub_status: "current".to_string(),
        created_at: now,
        updated_at: now,
    }
}

pub fn issue(journal_id: Uuid, volume: &str, number: &str, year: i32) -> Issue {
    let now = Utc::now().into();
    let id = Uuid::new_v4();
    Issue {
        id,
        iid: id.simple().to_string(),
        journal_id,
        volume: volume.to_string(),
        number: number.to_string(),
        publication_year: year,
        label: format!("v{}n{}", volume, number),
        created_at: now,
        updated_at: now,
    }
}
