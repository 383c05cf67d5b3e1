use crate::domain::audio::model::Page;
use crate::error::AppResult;
use crate::infrastructure::db::DbPool;
use async_trait::async_trait;
use sqlx::FromRow;
use std::sync::Arc;
use uuid::Uuid;

/// Read-only view of the document conversion subsystem's pages.
#[async_trait]
pub trait PageStore: Send + Sync {
    async fn find_by_id(&self, page_id: Uuid) -> AppResult<Option<Page>>;
}

#[derive(Debug, FromRow)]
struct PageRow {
    id: Uuid,
    document_id: Uuid,
    page_number: i32,
    owner_id: Uuid,
    markdown_content: String,
}

pub struct PgPageRepository {
    pool: Arc<DbPool>,
}

impl PgPageRepository {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PageStore for PgPageRepository {
    async fn find_by_id(&self, page_id: Uuid) -> AppResult<Option<Page>> {
        let row = sqlx::query_as::<_, PageRow>(
            "SELECT p.id, p.document_id, p.page_number, p.markdown_content, \
                    d.user_id AS owner_id \
             FROM pages p \
             JOIN documents d ON d.id = p.document_id \
             WHERE p.id = $1",
        )
        .bind(page_id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(row.map(|r| Page {
            id: r.id,
            document_id: r.document_id,
            page_number: r.page_number,
            owner_id: r.owner_id,
            markdown_content: r.markdown_content,
        }))
    }
}
