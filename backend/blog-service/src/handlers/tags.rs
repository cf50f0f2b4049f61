/// Tag handlers. Tags are global and need no authentication.
use super::{message, read_filters, read_string, AppState, QueryParams};
use crate::db::concurrency::Versioned;
use crate::db::filters::TAG_SORTS;
use crate::error::Result;
use crate::models::NewTag;
use crate::validation::validate;
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
pub struct CreateTagRequest {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTagRequest {
    pub name: Option<String>,
}

pub async fn list_tags(state: web::Data<AppState>, query: QueryParams) -> Result<HttpResponse> {
    let filters = read_filters(&query, TAG_SORTS)?;
    let name = read_string(&query, "name", "");

    let (tags, metadata) = state
        .tags
        .list(&state.store_context(), None, &name, &filters)
        .await?;

    Ok(HttpResponse::Ok().json(json!({ "tags": tags, "metadata": metadata })))
}

/// Tags linked to one post, optionally narrowed by `name`
pub async fn list_post_tags(
    state: web::Data<AppState>,
    post_id: web::Path<i64>,
    query: QueryParams,
) -> Result<HttpResponse> {
    let filters = read_filters(&query, TAG_SORTS)?;
    let name = read_string(&query, "name", "");

    let (tags, metadata) = state
        .tags
        .list(&state.store_context(), Some(*post_id), &name, &filters)
        .await?;

    Ok(HttpResponse::Ok().json(json!({ "tags": tags, "metadata": metadata })))
}

pub async fn show_tag(state: web::Data<AppState>, tag_id: web::Path<i64>) -> Result<HttpResponse> {
    let tag = state.tags.get(&state.store_context(), *tag_id).await?;
    Ok(HttpResponse::Ok().json(json!({ "tag": tag })))
}

pub async fn create_tag(
    state: web::Data<AppState>,
    req: web::Json<CreateTagRequest>,
) -> Result<HttpResponse> {
    let new_tag = NewTag {
        name: req.into_inner().name,
    };
    validate(&new_tag)?;

    let tag = state.tags.insert(&state.store_context(), new_tag).await?;

    Ok(HttpResponse::Created()
        .insert_header(("Location", format!("/v1/tags/{}", tag.id)))
        .json(json!({ "tag": tag })))
}

pub async fn update_tag(
    state: web::Data<AppState>,
    tag_id: web::Path<i64>,
    req: web::Json<UpdateTagRequest>,
) -> Result<HttpResponse> {
    let ctx = state.store_context();
    let mut tag = state.tags.get(&ctx, *tag_id).await?;

    if let Some(name) = req.into_inner().name {
        tag.name = name;
    }
    validate(&tag)?;

    let version = state.tags.update(&ctx, &tag).await?;
    tag.set_version(version);

    Ok(HttpResponse::Ok().json(json!({ "tag": tag })))
}

pub async fn delete_tag(
    state: web::Data<AppState>,
    tag_id: web::Path<i64>,
) -> Result<HttpResponse> {
    state.tags.delete(&state.store_context(), *tag_id).await?;
    Ok(message("tag successfully deleted"))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::Mocks;
    use crate::db::filters::Metadata;
    use crate::error::AppError;
    use actix_web::http::StatusCode;
    use actix_web::test;
    use serde_json::Value;

    #[actix_web::test]
    async fn duplicate_name_is_conflict() {
        let mut mocks = Mocks::new();
        mocks
            .tags
            .expect_insert()
            .returning(|_, _| Err(AppError::DuplicateEntry));
        let app = mocks.app().await;

        let req = test::TestRequest::post()
            .uri("/v1/tags")
            .set_json(serde_json::json!({ "name": "rust" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }

    #[actix_web::test]
    async fn post_scope_and_name_search_are_combined() {
        let mut mocks = Mocks::new();
        mocks
            .tags
            .expect_list()
            .withf(|_, post_id, name, _| *post_id == Some(4) && name == "go")
            .returning(|_, _, _, _| Ok((Vec::new(), Metadata::default())));
        let app = mocks.app().await;

        let req = test::TestRequest::get()
            .uri("/v1/posts/4/tags?name=go")
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["tags"], serde_json::json!([]));
    }

    #[actix_web::test]
    async fn malformed_body_is_bad_request() {
        let app = Mocks::new().app().await;
        let req = test::TestRequest::post()
            .uri("/v1/tags")
            .insert_header(("Content-Type", "application/json"))
            .set_payload("{not json")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
