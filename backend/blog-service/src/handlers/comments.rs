/// Comment handlers - HTTP endpoints for comment operations
use super::{message, read_filters, read_string, AppState, QueryParams};
use crate::db::concurrency::Versioned;
use crate::db::filters::{POST_COMMENT_SORTS, USER_COMMENT_SORTS};
use crate::error::{AppError, Result};
use crate::middleware::AuthenticatedUser;
use crate::models::NewComment;
use crate::validation::validate;
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;

/// Request body for creating a comment
#[derive(Debug, Deserialize)]
pub struct CreateCommentRequest {
    #[serde(default)]
    pub content: String,
}

/// Request body for updating a comment
#[derive(Debug, Deserialize)]
pub struct UpdateCommentRequest {
    pub content: Option<String>,
}

/// Get comments for a post
pub async fn list_post_comments(
    state: web::Data<AppState>,
    post_id: web::Path<i64>,
    query: QueryParams,
) -> Result<HttpResponse> {
    let filters = read_filters(&query, POST_COMMENT_SORTS)?;
    let content = read_string(&query, "content", "");

    let (comments, metadata) = state
        .comments
        .list_for_post(&state.store_context(), *post_id, &content, &filters)
        .await?;

    Ok(HttpResponse::Ok().json(json!({ "comments": comments, "metadata": metadata })))
}

/// Get comments written by a user, across posts
pub async fn list_user_comments(
    state: web::Data<AppState>,
    user_id: web::Path<i64>,
    query: QueryParams,
) -> Result<HttpResponse> {
    let filters = read_filters(&query, USER_COMMENT_SORTS)?;
    let content = read_string(&query, "content", "");

    let (comments, metadata) = state
        .comments
        .list_for_user(&state.store_context(), *user_id, &content, &filters)
        .await?;

    Ok(HttpResponse::Ok().json(json!({ "comments": comments, "metadata": metadata })))
}

/// Get a single comment
pub async fn show_comment(
    state: web::Data<AppState>,
    path: web::Path<(i64, i64)>,
) -> Result<HttpResponse> {
    let (post_id, comment_id) = path.into_inner();
    let comment = state
        .comments
        .get(&state.store_context(), post_id, comment_id)
        .await?;

    Ok(HttpResponse::Ok().json(json!({ "comment": comment })))
}

/// Create a new comment on a post
pub async fn create_comment(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    post_id: web::Path<i64>,
    req: web::Json<CreateCommentRequest>,
) -> Result<HttpResponse> {
    let new_comment = NewComment {
        post_id: *post_id,
        user_id: user.0,
        content: req.into_inner().content,
    };
    validate(&new_comment)?;

    let comment = state
        .comments
        .insert(&state.store_context(), new_comment)
        .await?;

    Ok(HttpResponse::Created()
        .insert_header((
            "Location",
            format!("/v1/posts/{}/comments/{}", comment.post_id, comment.id),
        ))
        .json(json!({ "comment": comment })))
}

/// Update a comment
pub async fn update_comment(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    path: web::Path<(i64, i64)>,
    req: web::Json<UpdateCommentRequest>,
) -> Result<HttpResponse> {
    let (post_id, comment_id) = path.into_inner();
    let ctx = state.store_context();
    let mut comment = state.comments.get(&ctx, post_id, comment_id).await?;
    if comment.user_id != user.0 {
        return Err(AppError::Unauthorized);
    }

    if let Some(content) = req.into_inner().content {
        comment.content = content;
    }
    validate(&comment)?;

    let version = state.comments.update(&ctx, &comment, user.0).await?;
    comment.set_version(version);

    Ok(HttpResponse::Ok().json(json!({ "comment": comment })))
}

/// Delete a comment
pub async fn delete_comment(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    path: web::Path<(i64, i64)>,
) -> Result<HttpResponse> {
    let (post_id, comment_id) = path.into_inner();
    state
        .comments
        .delete(&state.store_context(), comment_id, user.0, post_id)
        .await?;

    Ok(message("comment successfully deleted"))
}
