use crate::db::concurrency::NEXT_VERSION;
use crate::db::context::StoreContext;
use crate::db::filters::{collect_page, Filters, Metadata};
use crate::db::ownership::{resolve_owned_write, OwnedWriteKind};
use crate::error::{AppError, Result};
use crate::models::{NewPost, Post};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

const STORE: &str = "posts";
const POST_COLUMNS: &str = "posts.id, posts.user_id, posts.title, posts.content, posts.created_at, posts.updated_at";

/// Persistence for user-owned posts.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PostStore: Send + Sync {
    async fn insert(&self, ctx: &StoreContext, post: NewPost) -> Result<Post>;

    async fn get(&self, ctx: &StoreContext, id: i64) -> Result<Post>;

    /// Write `post`'s title and content if `actor_id` owns it and
    /// `post.updated_at` is still current. Returns the new version.
    async fn update(&self, ctx: &StoreContext, post: &Post, actor_id: i64) -> Result<DateTime<Utc>>;

    async fn delete(&self, ctx: &StoreContext, id: i64, actor_id: i64) -> Result<()>;

    /// Search by title and content; empty terms match everything.
    /// `user_id` of `None` leaves the listing unscoped.
    async fn list(
        &self,
        ctx: &StoreContext,
        user_id: Option<i64>,
        title: &str,
        content: &str,
        filters: &Filters,
    ) -> Result<(Vec<Post>, Metadata)>;

    async fn list_for_user(
        &self,
        ctx: &StoreContext,
        user_id: i64,
        filters: &Filters,
    ) -> Result<(Vec<Post>, Metadata)> {
        self.list(ctx, Some(user_id), "", "", filters).await
    }
}

#[derive(Clone)]
pub struct PgPostRepository {
    pool: PgPool,
}

impl PgPostRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Owner of post `id`, if it still exists.
    async fn owner_of(
        &self,
        ctx: &StoreContext,
        operation: &'static str,
        id: i64,
    ) -> Result<Option<i64>> {
        ctx.run(
            STORE,
            operation,
            sqlx::query_scalar::<_, i64>("SELECT user_id FROM posts WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool),
        )
        .await
    }
}

#[async_trait]
impl PostStore for PgPostRepository {
    async fn insert(&self, ctx: &StoreContext, post: NewPost) -> Result<Post> {
        let query = format!(
            r#"
            INSERT INTO posts (user_id, title, content)
            VALUES ($1, $2, $3)
            RETURNING {POST_COLUMNS}
            "#
        );

        ctx.run(
            STORE,
            "insert",
            sqlx::query_as::<_, Post>(&query)
                .bind(post.user_id)
                .bind(&post.title)
                .bind(&post.content)
                .fetch_one(&self.pool),
        )
        .await
    }

    async fn get(&self, ctx: &StoreContext, id: i64) -> Result<Post> {
        if id < 1 {
            return Err(AppError::NotFound);
        }

        let query = format!("SELECT {POST_COLUMNS} FROM posts WHERE posts.id = $1");
        ctx.run(
            STORE,
            "get",
            sqlx::query_as::<_, Post>(&query)
                .bind(id)
                .fetch_one(&self.pool),
        )
        .await
    }

    async fn update(
        &self,
        ctx: &StoreContext,
        post: &Post,
        actor_id: i64,
    ) -> Result<DateTime<Utc>> {
        let query = format!(
            r#"
            UPDATE posts
            SET title = $1, content = $2, updated_at = {NEXT_VERSION}
            WHERE id = $3 AND user_id = $4 AND updated_at = $5
            RETURNING updated_at
            "#
        );

        let written = ctx
            .run(
                STORE,
                "update",
                sqlx::query_scalar::<_, DateTime<Utc>>(&query)
                    .bind(&post.title)
                    .bind(&post.content)
                    .bind(post.id)
                    .bind(actor_id)
                    .bind(post.updated_at)
                    .fetch_optional(&self.pool),
            )
            .await?;

        resolve_owned_write(OwnedWriteKind::Update, actor_id, written, || {
            self.owner_of(ctx, "update_probe", post.id)
        })
        .await
    }

    async fn delete(&self, ctx: &StoreContext, id: i64, actor_id: i64) -> Result<()> {
        if id < 1 {
            return Err(AppError::NotFound);
        }

        let result = ctx
            .run(
                STORE,
                "delete",
                sqlx::query("DELETE FROM posts WHERE id = $1 AND user_id = $2")
                    .bind(id)
                    .bind(actor_id)
                    .execute(&self.pool),
            )
            .await?;

        let written = (result.rows_affected() > 0).then_some(());
        resolve_owned_write(OwnedWriteKind::Delete, actor_id, written, || {
            self.owner_of(ctx, "delete_probe", id)
        })
        .await
    }

    async fn list(
        &self,
        ctx: &StoreContext,
        user_id: Option<i64>,
        title: &str,
        content: &str,
        filters: &Filters,
    ) -> Result<(Vec<Post>, Metadata)> {
        let query = format!(
            r#"
            SELECT count(*) OVER() AS total_records, {POST_COLUMNS}
            FROM posts
            WHERE ($1::bigint IS NULL OR posts.user_id = $1)
              AND (to_tsvector('simple', posts.title) @@ plainto_tsquery('simple', $2) OR $2 = '')
              AND (to_tsvector('simple', posts.content) @@ plainto_tsquery('simple', $3) OR $3 = '')
            {order_by}
            LIMIT $4 OFFSET $5
            "#,
            order_by = filters.sort.order_by("posts"),
        );

        ctx.run(STORE, "list", async {
            let rows = sqlx::query(&query)
                .bind(user_id)
                .bind(title)
                .bind(content)
                .bind(filters.limit())
                .bind(filters.offset())
                .fetch_all(&self.pool)
                .await?;
            collect_page::<Post>(rows, filters)
        })
        .await
    }
}
