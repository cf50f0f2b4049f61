//! Post/tag association
//!
//! Insert checks for an existing link before writing. The check and the
//! insert are separate round trips and not atomic, so a concurrent inserter
//! can still race past the check; the `post_tags_post_id_tag_id_key`
//! constraint then rejects the second row and the violation is reported as
//! the same `DuplicateEntry`.

use crate::db::context::StoreContext;
use crate::error::{AppError, Result};
use crate::models::PostTag;
use async_trait::async_trait;
use sqlx::PgPool;

const STORE: &str = "post_tags";

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PostTagStore: Send + Sync {
    /// `DuplicateEntry` if linked already, `NotFound` if either side is missing.
    async fn insert(&self, ctx: &StoreContext, link: PostTag) -> Result<()>;

    async fn delete(&self, ctx: &StoreContext, link: PostTag) -> Result<()>;
}

#[derive(Clone)]
pub struct PgPostTagRepository {
    pool: PgPool,
}

impl PgPostTagRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PostTagStore for PgPostTagRepository {
    async fn insert(&self, ctx: &StoreContext, link: PostTag) -> Result<()> {
        if !link.is_addressable() {
            return Err(AppError::NotFound);
        }

        let existing = ctx
            .run(
                STORE,
                "insert_check",
                sqlx::query_scalar::<_, i64>(
                    "SELECT COUNT(*) FROM post_tags WHERE post_id = $1 AND tag_id = $2",
                )
                .bind(link.post_id)
                .bind(link.tag_id)
                .fetch_one(&self.pool),
            )
            .await?;

        if existing > 0 {
            return Err(AppError::DuplicateEntry);
        }

        ctx.run(
            STORE,
            "insert",
            sqlx::query("INSERT INTO post_tags (post_id, tag_id) VALUES ($1, $2)")
                .bind(link.post_id)
                .bind(link.tag_id)
                .execute(&self.pool),
        )
        .await?;

        Ok(())
    }

    async fn delete(&self, ctx: &StoreContext, link: PostTag) -> Result<()> {
        if !link.is_addressable() {
            return Err(AppError::NotFound);
        }

        let result = ctx
            .run(
                STORE,
                "delete",
                sqlx::query("DELETE FROM post_tags WHERE post_id = $1 AND tag_id = $2")
                    .bind(link.post_id)
                    .bind(link.tag_id)
                    .execute(&self.pool),
            )
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }
}
