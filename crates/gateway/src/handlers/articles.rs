//! Article intake handlers

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::AppState;
use catman_common::{db::models::Article, errors::Result};

/// Response after accepting an article
#[derive(Serialize)]
pub struct CreateArticleResponse {
    pub aid: String,
}

/// Linkage and indexing state of an article
#[derive(Serialize)]
pub struct ArticleStatusResponse {
    pub aid: String,
    pub domain_key: String,
    pub journal_id: Option<Uuid>,
    pub issue_id: Option<Uuid>,
    pub is_aop: bool,
    pub es_is_dirty: bool,
    pub es_updated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Article> for ArticleStatusResponse {
    fn from(article: Article) -> Self {
        Self {
            aid: article.aid,
            domain_key: article.domain_key,
            journal_id: article.journal_id,
            issue_id: article.issue_id,
            is_aop: article.is_aop,
            es_is_dirty: article.es_is_dirty,
            es_updated_at: article.es_updated_at.map(|at| at.with_timezone(&Utc)),
            created_at: article.created_at.with_timezone(&Utc),
            updated_at: article.updated_at.with_timezone(&Utc),
        }
    }
}

/// Accept a raw article XML document
pub async fn create_article(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<CreateArticleResponse>)> {
    let aid = state.articles.create_article_from_bytes(&body).await?;

    Ok((StatusCode::CREATED, Json(CreateArticleResponse { aid })))
}

/// Get an article's state by its public id
pub async fn get_article(
    State(state): State<AppState>,
    Path(aid): Path<String>,
) -> Result<Json<ArticleStatusResponse>> {
    let article = state.articles.find_by_aid(&aid).await?;

    Ok(Json(article.into()))
}
