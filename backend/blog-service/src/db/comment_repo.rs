use crate::db::concurrency::NEXT_VERSION;
use crate::db::context::StoreContext;
use crate::db::filters::{collect_page, Filters, Metadata};
use crate::db::ownership::{resolve_owned_write, OwnedWriteKind};
use crate::error::{AppError, Result};
use crate::models::{Comment, NewComment};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

const STORE: &str = "comments";
const COMMENT_COLUMNS: &str = "comments.id, comments.post_id, comments.user_id, comments.content, comments.created_at, comments.updated_at";

/// Persistence for comments. Every comment is scoped to its parent post.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommentStore: Send + Sync {
    /// Fails with `NotFound` when the parent post does not exist.
    async fn insert(&self, ctx: &StoreContext, comment: NewComment) -> Result<Comment>;

    async fn get(&self, ctx: &StoreContext, post_id: i64, id: i64) -> Result<Comment>;

    async fn update(
        &self,
        ctx: &StoreContext,
        comment: &Comment,
        actor_id: i64,
    ) -> Result<DateTime<Utc>>;

    async fn delete(&self, ctx: &StoreContext, id: i64, actor_id: i64, post_id: i64) -> Result<()>;

    async fn list_for_post(
        &self,
        ctx: &StoreContext,
        post_id: i64,
        content: &str,
        filters: &Filters,
    ) -> Result<(Vec<Comment>, Metadata)>;

    async fn list_for_user(
        &self,
        ctx: &StoreContext,
        user_id: i64,
        content: &str,
        filters: &Filters,
    ) -> Result<(Vec<Comment>, Metadata)>;
}

#[derive(Clone)]
pub struct PgCommentRepository {
    pool: PgPool,
}

impl PgCommentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn owner_of(
        &self,
        ctx: &StoreContext,
        operation: &'static str,
        id: i64,
        post_id: i64,
    ) -> Result<Option<i64>> {
        ctx.run(
            STORE,
            operation,
            sqlx::query_scalar::<_, i64>(
                "SELECT user_id FROM comments WHERE id = $1 AND post_id = $2",
            )
            .bind(id)
            .bind(post_id)
            .fetch_optional(&self.pool),
        )
        .await
    }

    /// Shared page query; `scope` is a trusted column name.
    async fn list_scoped(
        &self,
        ctx: &StoreContext,
        operation: &'static str,
        scope: &'static str,
        scope_id: i64,
        content: &str,
        filters: &Filters,
    ) -> Result<(Vec<Comment>, Metadata)> {
        let query = format!(
            r#"
            SELECT count(*) OVER() AS total_records, {COMMENT_COLUMNS}
            FROM comments
            WHERE comments.{scope} = $1
              AND (to_tsvector('simple', comments.content) @@ plainto_tsquery('simple', $2) OR $2 = '')
            {order_by}
            LIMIT $3 OFFSET $4
            "#,
            order_by = filters.sort.order_by("comments"),
        );

        ctx.run(STORE, operation, async {
            let rows = sqlx::query(&query)
                .bind(scope_id)
                .bind(content)
                .bind(filters.limit())
                .bind(filters.offset())
                .fetch_all(&self.pool)
                .await?;
            collect_page::<Comment>(rows, filters)
        })
        .await
    }
}

#[async_trait]
impl CommentStore for PgCommentRepository {
    async fn insert(&self, ctx: &StoreContext, comment: NewComment) -> Result<Comment> {
        let query = format!(
            r#"
            INSERT INTO comments (post_id, user_id, content)
            VALUES ($1, $2, $3)
            RETURNING {COMMENT_COLUMNS}
            "#
        );

        ctx.run(
            STORE,
            "insert",
            sqlx::query_as::<_, Comment>(&query)
                .bind(comment.post_id)
                .bind(comment.user_id)
                .bind(&comment.content)
                .fetch_one(&self.pool),
        )
        .await
    }

    async fn get(&self, ctx: &StoreContext, post_id: i64, id: i64) -> Result<Comment> {
        if id < 1 || post_id < 1 {
            return Err(AppError::NotFound);
        }

        let query = format!(
            "SELECT {COMMENT_COLUMNS} FROM comments WHERE comments.post_id = $1 AND comments.id = $2"
        );
        ctx.run(
            STORE,
            "get",
            sqlx::query_as::<_, Comment>(&query)
                .bind(post_id)
                .bind(id)
                .fetch_one(&self.pool),
        )
        .await
    }

    async fn update(
        &self,
        ctx: &StoreContext,
        comment: &Comment,
        actor_id: i64,
    ) -> Result<DateTime<Utc>> {
        let query = format!(
            r#"
            UPDATE comments
            SET content = $1, updated_at = {NEXT_VERSION}
            WHERE id = $2 AND post_id = $3 AND user_id = $4 AND updated_at = $5
            RETURNING updated_at
            "#
        );

        let written = ctx
            .run(
                STORE,
                "update",
                sqlx::query_scalar::<_, DateTime<Utc>>(&query)
                    .bind(&comment.content)
                    .bind(comment.id)
                    .bind(comment.post_id)
                    .bind(actor_id)
                    .bind(comment.updated_at)
                    .fetch_optional(&self.pool),
            )
            .await?;

        resolve_owned_write(OwnedWriteKind::Update, actor_id, written, || {
            self.owner_of(ctx, "update_probe", comment.id, comment.post_id)
        })
        .await
    }

    async fn delete(&self, ctx: &StoreContext, id: i64, actor_id: i64, post_id: i64) -> Result<()> {
        if id < 1 || post_id < 1 {
            return Err(AppError::NotFound);
        }

        let result = ctx
            .run(
                STORE,
                "delete",
                sqlx::query("DELETE FROM comments WHERE id = $1 AND user_id = $2 AND post_id = $3")
                    .bind(id)
                    .bind(actor_id)
                    .bind(post_id)
                    .execute(&self.pool),
            )
            .await?;

        let written = (result.rows_affected() > 0).then_some(());
        resolve_owned_write(OwnedWriteKind::Delete, actor_id, written, || {
            self.owner_of(ctx, "delete_probe", id, post_id)
        })
        .await
    }

    async fn list_for_post(
        &self,
        ctx: &StoreContext,
        post_id: i64,
        content: &str,
        filters: &Filters,
    ) -> Result<(Vec<Comment>, Metadata)> {
        self.list_scoped(ctx, "list_for_post", "post_id", post_id, content, filters)
            .await
    }

    async fn list_for_user(
        &self,
        ctx: &StoreContext,
        user_id: i64,
        content: &str,
        filters: &Filters,
    ) -> Result<(Vec<Comment>, Metadata)> {
        self.list_scoped(ctx, "list_for_user", "user_id", user_id, content, filters)
            .await
    }
}
