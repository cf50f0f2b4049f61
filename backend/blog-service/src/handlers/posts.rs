/// Post handlers - HTTP endpoints for post operations
use super::{
    message, read_filters, read_filters_with, read_int, read_string, AppState, QueryParams,
};
use crate::db::concurrency::Versioned;
use crate::db::filters::POST_SORTS;
use crate::error::{AppError, Result};
use crate::middleware::AuthenticatedUser;
use crate::models::NewPost;
use crate::validation::{validate, FieldErrors};
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
pub struct CreatePostRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
}

/// Absent fields keep their stored values.
#[derive(Debug, Default, Deserialize)]
pub struct UpdatePostRequest {
    pub title: Option<String>,
    pub content: Option<String>,
}

/// List posts, searching by `title` and `content`. `user_id=0` (the
/// default) lists every author.
pub async fn list_posts(state: web::Data<AppState>, query: QueryParams) -> Result<HttpResponse> {
    let mut errors = FieldErrors::new();
    let user_id = read_int(&query, "user_id", 0, &mut errors);
    let filters = read_filters_with(&query, POST_SORTS, errors)?;
    let title = read_string(&query, "title", "");
    let content = read_string(&query, "content", "");

    let scope = (user_id != 0).then_some(user_id);
    let (posts, metadata) = state
        .posts
        .list(&state.store_context(), scope, &title, &content, &filters)
        .await?;

    Ok(HttpResponse::Ok().json(json!({ "posts": posts, "metadata": metadata })))
}

/// List posts written by one user
pub async fn list_user_posts(
    state: web::Data<AppState>,
    user_id: web::Path<i64>,
    query: QueryParams,
) -> Result<HttpResponse> {
    let filters = read_filters(&query, POST_SORTS)?;

    let (posts, metadata) = state
        .posts
        .list_for_user(&state.store_context(), *user_id, &filters)
        .await?;

    Ok(HttpResponse::Ok().json(json!({ "posts": posts, "metadata": metadata })))
}

pub async fn show_post(
    state: web::Data<AppState>,
    post_id: web::Path<i64>,
) -> Result<HttpResponse> {
    let post = state.posts.get(&state.store_context(), *post_id).await?;
    Ok(HttpResponse::Ok().json(json!({ "post": post })))
}

pub async fn create_post(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    req: web::Json<CreatePostRequest>,
) -> Result<HttpResponse> {
    let req = req.into_inner();
    let new_post = NewPost {
        user_id: user.0,
        title: req.title,
        content: req.content,
    };
    validate(&new_post)?;

    let post = state.posts.insert(&state.store_context(), new_post).await?;
    tracing::info!(post_id = post.id, user_id = post.user_id, "post created");

    Ok(HttpResponse::Created()
        .insert_header(("Location", format!("/v1/posts/{}", post.id)))
        .json(json!({ "post": post })))
}

/// Read-modify-write: the version read here guards the write
pub async fn update_post(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    post_id: web::Path<i64>,
    req: web::Json<UpdatePostRequest>,
) -> Result<HttpResponse> {
    let ctx = state.store_context();
    let mut post = state.posts.get(&ctx, *post_id).await?;
    if post.user_id != user.0 {
        return Err(AppError::Unauthorized);
    }

    let req = req.into_inner();
    if let Some(title) = req.title {
        post.title = title;
    }
    if let Some(content) = req.content {
        post.content = content;
    }
    validate(&post)?;

    let version = state.posts.update(&ctx, &post, user.0).await?;
    post.set_version(version);

    Ok(HttpResponse::Ok().json(json!({ "post": post })))
}

pub async fn delete_post(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    post_id: web::Path<i64>,
) -> Result<HttpResponse> {
    state
        .posts
        .delete(&state.store_context(), *post_id, user.0)
        .await?;
    tracing::info!(post_id = *post_id, user_id = user.0, "post deleted");

    Ok(message("post successfully deleted"))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{bearer, Mocks};
    use crate::db::filters::Metadata;
    use crate::error::AppError;
    use crate::models::Post;
    use actix_web::http::StatusCode;
    use actix_web::test;
    use chrono::{Duration, Utc};
    use serde_json::Value;

    fn sample_post(id: i64, user_id: i64) -> Post {
        let now = Utc::now();
        Post {
            id,
            user_id,
            title: "Hello".into(),
            content: "World".into(),
            created_at: now,
            updated_at: now,
        }
    }

    #[actix_web::test]
    async fn list_wraps_posts_and_metadata() {
        let mut mocks = Mocks::new();
        mocks
            .posts
            .expect_list()
            .withf(|_, user_id, title, _, filters| {
                user_id.is_none() && title == "rust" && filters.sort.column == "title"
            })
            .returning(|_, _, _, _, _| {
                Ok((
                    vec![sample_post(1, 1)],
                    crate::db::filters::calculate_metadata(1, 1, 20),
                ))
            });
        let app = mocks.app().await;

        let req = test::TestRequest::get()
            .uri("/v1/posts?title=rust&sort=-title")
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["posts"][0]["id"], 1);
        assert_eq!(body["metadata"]["total_records"], 1);
    }

    #[actix_web::test]
    async fn user_id_parameter_scopes_the_listing() {
        let mut mocks = Mocks::new();
        mocks
            .posts
            .expect_list()
            .withf(|_, user_id, _, _, _| *user_id == Some(3))
            .times(1)
            .returning(|_, _, _, _, _| Ok((vec![sample_post(1, 3)], Metadata::default())));
        let app = mocks.app().await;

        let req = test::TestRequest::get().uri("/v1/posts?user_id=3").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn non_integer_user_id_is_reported_with_filter_errors() {
        let app = Mocks::new().app().await;
        let req = test::TestRequest::get()
            .uri("/v1/posts?user_id=me&page_size=0")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"]["user_id"], "must be an integer value");
        assert_eq!(body["error"]["page_size"], "must be greater than zero");
    }

    #[actix_web::test]
    async fn invalid_listing_parameters_are_unprocessable() {
        let app = Mocks::new().app().await;
        let req = test::TestRequest::get()
            .uri("/v1/posts?page=0&sort=password")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"]["page"], "must be greater than zero");
        assert_eq!(body["error"]["sort"], "invalid sort value");
    }

    #[actix_web::test]
    async fn create_requires_a_token() {
        let app = Mocks::new().app().await;
        let req = test::TestRequest::post()
            .uri("/v1/posts")
            .set_json(serde_json::json!({ "title": "t", "content": "c" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn create_reports_every_invalid_field() {
        let app = Mocks::new().app().await;
        let req = test::TestRequest::post()
            .uri("/v1/posts")
            .insert_header(bearer(3))
            .set_json(serde_json::json!({ "content": "c".repeat(3001) }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"]["title"], "must be provided");
        assert_eq!(body["error"]["content"], "must not be more than 3000 bytes long");
    }

    #[actix_web::test]
    async fn create_assigns_the_caller_as_owner() {
        let mut mocks = Mocks::new();
        mocks
            .posts
            .expect_insert()
            .withf(|_, new_post| new_post.user_id == 3)
            .returning(|_, new_post| {
                let mut post = sample_post(10, new_post.user_id);
                post.title = new_post.title;
                Ok(post)
            });
        let app = mocks.app().await;

        let req = test::TestRequest::post()
            .uri("/v1/posts")
            .insert_header(bearer(3))
            .set_json(serde_json::json!({ "title": "Mine", "content": "c" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        assert_eq!(resp.headers().get("Location").unwrap(), "/v1/posts/10");
    }

    #[actix_web::test]
    async fn update_applies_fields_and_returns_new_version() {
        let stored = sample_post(5, 2);
        let old_version = stored.updated_at;
        let new_version = old_version + Duration::microseconds(1);

        let mut mocks = Mocks::new();
        mocks
            .posts
            .expect_get()
            .returning(move |_, _| Ok(stored.clone()));
        mocks
            .posts
            .expect_update()
            .withf(move |_, post, actor| {
                post.title == "Edited"
                    && post.content == "World"
                    && post.updated_at == old_version
                    && *actor == 2
            })
            .returning(move |_, _, _| Ok(new_version));
        let app = mocks.app().await;

        let req = test::TestRequest::patch()
            .uri("/v1/posts/5")
            .insert_header(bearer(2))
            .set_json(serde_json::json!({ "title": "Edited" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["post"]["title"], "Edited");
        assert_eq!(
            body["post"]["updated_at"],
            serde_json::to_value(new_version).unwrap()
        );
    }

    #[actix_web::test]
    async fn non_owner_edit_is_forbidden_before_validation() {
        let mut mocks = Mocks::new();
        mocks
            .posts
            .expect_get()
            .returning(|_, _| Ok(sample_post(5, 1)));
        mocks.posts.expect_update().never();
        let app = mocks.app().await;

        let req = test::TestRequest::patch()
            .uri("/v1/posts/5")
            .insert_header(bearer(2))
            .set_json(serde_json::json!({ "title": "" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[actix_web::test]
    async fn update_conflict_is_409() {
        let mut mocks = Mocks::new();
        mocks
            .posts
            .expect_get()
            .returning(|_, _| Ok(sample_post(5, 2)));
        mocks
            .posts
            .expect_update()
            .returning(|_, _, _| Err(AppError::EditConflict));
        let app = mocks.app().await;

        let req = test::TestRequest::patch()
            .uri("/v1/posts/5")
            .insert_header(bearer(2))
            .set_json(serde_json::json!({ "content": "new" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }

    #[actix_web::test]
    async fn deleting_someone_elses_post_is_forbidden() {
        let mut mocks = Mocks::new();
        mocks
            .posts
            .expect_delete()
            .withf(|_, id, actor| *id == 8 && *actor == 4)
            .returning(|_, _, _| Err(AppError::Unauthorized));
        let app = mocks.app().await;

        let req = test::TestRequest::delete()
            .uri("/v1/posts/8")
            .insert_header(bearer(4))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[actix_web::test]
    async fn missing_post_is_404() {
        let mut mocks = Mocks::new();
        mocks
            .posts
            .expect_get()
            .returning(|_, _| Err(AppError::NotFound));
        let app = mocks.app().await;

        let req = test::TestRequest::get().uri("/v1/posts/99").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn user_listing_is_scoped() {
        let mut mocks = Mocks::new();
        mocks
            .posts
            .expect_list_for_user()
            .withf(|_, user_id, _| *user_id == 6)
            .returning(|_, _, _| Ok((Vec::new(), Metadata::default())));
        let app = mocks.app().await;

        let req = test::TestRequest::get().uri("/v1/users/6/posts").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["posts"], serde_json::json!([]));
        assert_eq!(body["metadata"]["total_records"], 0);
    }
}
