use crate::db::concurrency::{conditioned_write, NEXT_VERSION};
use crate::db::context::StoreContext;
use crate::db::filters::{collect_page, Filters, Metadata};
use crate::error::{AppError, Result};
use crate::models::{NewTag, Tag};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

const STORE: &str = "tags";
const TAG_COLUMNS: &str = "tags.id, tags.name, tags.created_at, tags.updated_at";

/// Persistence for global, unowned tags. Names are unique.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TagStore: Send + Sync {
    async fn insert(&self, ctx: &StoreContext, tag: NewTag) -> Result<Tag>;

    async fn get(&self, ctx: &StoreContext, id: i64) -> Result<Tag>;

    async fn update(&self, ctx: &StoreContext, tag: &Tag) -> Result<DateTime<Utc>>;

    async fn delete(&self, ctx: &StoreContext, id: i64) -> Result<()>;

    /// `post_id` restricts to tags linked to that post; `name` is a
    /// free-text search. Both apply together.
    async fn list(
        &self,
        ctx: &StoreContext,
        post_id: Option<i64>,
        name: &str,
        filters: &Filters,
    ) -> Result<(Vec<Tag>, Metadata)>;
}

#[derive(Clone)]
pub struct PgTagRepository {
    pool: PgPool,
}

impl PgTagRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TagStore for PgTagRepository {
    async fn insert(&self, ctx: &StoreContext, tag: NewTag) -> Result<Tag> {
        let query = format!("INSERT INTO tags (name) VALUES ($1) RETURNING {TAG_COLUMNS}");

        ctx.run(
            STORE,
            "insert",
            sqlx::query_as::<_, Tag>(&query)
                .bind(&tag.name)
                .fetch_one(&self.pool),
        )
        .await
    }

    async fn get(&self, ctx: &StoreContext, id: i64) -> Result<Tag> {
        if id < 1 {
            return Err(AppError::NotFound);
        }

        let query = format!("SELECT {TAG_COLUMNS} FROM tags WHERE tags.id = $1");
        ctx.run(
            STORE,
            "get",
            sqlx::query_as::<_, Tag>(&query)
                .bind(id)
                .fetch_one(&self.pool),
        )
        .await
    }

    async fn update(&self, ctx: &StoreContext, tag: &Tag) -> Result<DateTime<Utc>> {
        let query = format!(
            r#"
            UPDATE tags
            SET name = $1, updated_at = {NEXT_VERSION}
            WHERE id = $2 AND updated_at = $3
            RETURNING updated_at
            "#
        );

        let written = ctx
            .run(
                STORE,
                "update",
                sqlx::query_scalar::<_, DateTime<Utc>>(&query)
                    .bind(&tag.name)
                    .bind(tag.id)
                    .bind(tag.updated_at)
                    .fetch_optional(&self.pool),
            )
            .await?;

        conditioned_write(written)
    }

    async fn delete(&self, ctx: &StoreContext, id: i64) -> Result<()> {
        if id < 1 {
            return Err(AppError::NotFound);
        }

        let result = ctx
            .run(
                STORE,
                "delete",
                sqlx::query("DELETE FROM tags WHERE id = $1")
                    .bind(id)
                    .execute(&self.pool),
            )
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }

    async fn list(
        &self,
        ctx: &StoreContext,
        post_id: Option<i64>,
        name: &str,
        filters: &Filters,
    ) -> Result<(Vec<Tag>, Metadata)> {
        let query = format!(
            r#"
            SELECT count(*) OVER() AS total_records, {TAG_COLUMNS}
            FROM tags
            WHERE ($1::bigint IS NULL OR EXISTS (
                    SELECT 1 FROM post_tags
                    WHERE post_tags.tag_id = tags.id AND post_tags.post_id = $1
                  ))
              AND (to_tsvector('simple', tags.name) @@ plainto_tsquery('simple', $2) OR $2 = '')
            {order_by}
            LIMIT $3 OFFSET $4
            "#,
            order_by = filters.sort.order_by("tags"),
        );

        ctx.run(STORE, "list", async {
            let rows = sqlx::query(&query)
                .bind(post_id)
                .bind(name)
                .bind(filters.limit())
                .bind(filters.offset())
                .fetch_all(&self.pool)
                .await?;
            collect_page::<Tag>(rows, filters)
        })
        .await
    }
}
