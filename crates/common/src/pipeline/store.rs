//! Article Store: validate-and-persist intake plus the save path

use super::events::{ArticleEvents, ArticleSaved};
use super::Interlock;
use crate::db::models::{Article, ArticleUpdate};
use crate::db::CatalogStore;
use crate::errors::{AppError, Result};
use crate::metrics;
use crate::xml::{ArticleXml, Schema, ValidationError, XPaths};
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

pub struct ArticleStore {
    store: Arc<dyn CatalogStore>,
    schema: Arc<Schema>,
    interlock: Arc<Interlock>,
    events: Arc<ArticleEvents>,
}

impl ArticleStore {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        schema: Arc<Schema>,
        interlock: Arc<Interlock>,
        events: Arc<ArticleEvents>,
    ) -> Self {
        Self {
            store,
            schema,
            interlock,
            events,
        }
    }

    /// `create_article` for raw bytes; anything but UTF-8 text is refused
    pub async fn create_article_from_bytes(&self, payload: &[u8]) -> Result<String> {
        let text = std::str::from_utf8(payload).map_err(|e| {
            metrics::record_article_rejected("encoding");
            AppError::InvalidEncoding {
                message: e.to_string(),
            }
        })?;
        self.create_article(text).await
    }

    /// Validate, persist and announce a new article. Returns its `aid`.
    ///
    /// Validation failures leave no row behind. A second article with
    /// the same `domain_key` fails with `AppError::Duplicate`.
    #[instrument(skip_all, fields(bytes = xml.len()))]
    pub async fn create_article(&self, xml: &str) -> Result<String> {
        let doc = self.schema.validate(xml).map_err(|e| {
            metrics::record_article_rejected(match e {
                ValidationError::Syntax(_) => "syntax",
                ValidationError::MissingIdentification(_) => "missing_identification",
            });
            AppError::from(e)
        })?;

        let article = new_article(xml, &doc);

        // the insert and the notification decision happen under the lock,
        // so a concurrent suspended section cannot swallow this save
        let (store, events) = (&self.store, &self.events);
        let (saved, notify) = self
            .interlock
            .exclusive(move || async move {
                let saved = store.insert_article(article).await?;
                Ok::<_, AppError>((saved, events.enabled()))
            })
            .await
            .map_err(|e| {
                if e.is_integrity_violation() {
                    metrics::record_article_rejected("duplicate");
                }
                e
            })?;

        info!(aid = %saved.aid, domain_key = %saved.domain_key, "Article created");
        metrics::record_article_created();

        let aid = saved.aid.clone();
        if notify {
            self.events
                .dispatch(ArticleSaved {
                    article: saved,
                    created: true,
                })
                .await;
        } else {
            warn!(aid = %aid, "Notifications disabled at creation, left for sweeps");
        }

        Ok(aid)
    }

    /// Apply `update` and publish the save.
    ///
    /// Returns `None` when the article is gone or the update's
    /// precondition failed; nothing is published then.
    pub async fn save_article(&self, id: Uuid, update: &ArticleUpdate) -> Result<Option<Article>> {
        let Some(saved) = self.store.update_article(id, update).await? else {
            return Ok(None);
        };

        self.events
            .publish(ArticleSaved {
                article: saved.clone(),
                created: false,
            })
            .await;

        Ok(Some(saved))
    }

    pub async fn find_by_aid(&self, aid: &str) -> Result<Article> {
        self.store
            .find_article_by_aid(aid)
            .await?
            .ok_or_else(|| AppError::ArticleNotFound { id: aid.to_string() })
    }
}

/// A fresh, unlinked, dirty article row
fn new_article(xml: &str, doc: &ArticleXml) -> Article {
    let now = Utc::now().into();
    Article {
        id: Uuid::new_v4(),
        aid: Uuid::new_v4().simple().to_string(),
        domain_key: doc.domain_key(),
        xml: xml.to_string(),
        xml_version: doc.xml_version(),
        issn_ppub: doc.issn_ppub(),
        issn_epub: doc.issn_epub(),
        article_type: doc.value(XPaths::ARTICLE_TYPE),
        is_aop: doc.is_aop(),
        journal_id: None,
        issue_id: None,
        es_is_dirty: true,
        es_updated_at: None,
        created_at: now,
        updated_at: now,
    }
}
