use async_trait::async_trait;
use shared::chatbot::KnowledgeEntry;
use sqlx::PgPool;

use super::PgStore;
use crate::error::BoxError;
use crate::services::chatbot::KnowledgeStore;

#[derive(sqlx::FromRow)]
struct EntryRow {
    id: i64,
    question: String,
    answer: String,
    keywords: Vec<String>,
    priority: i32,
    is_active: bool,
}

pub async fn active_entries(pool: &PgPool) -> Result<Vec<KnowledgeEntry>, sqlx::Error> {
    let rows: Vec<EntryRow> = sqlx::query_as(
        "SELECT id, question, answer, keywords, priority, is_active
         FROM knowledge_entries WHERE is_active ORDER BY id",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .map(|r| KnowledgeEntry {
            id: r.id,
            question: r.question,
            answer: r.answer,
            keywords: r.keywords,
            priority: r.priority,
            is_active: r.is_active,
        })
        .collect())
}

#[async_trait]
impl KnowledgeStore for PgStore {
    async fn active_entries(&self) -> Result<Vec<KnowledgeEntry>, BoxError> {
        Ok(active_entries(&self.pool).await?)
    }
}
