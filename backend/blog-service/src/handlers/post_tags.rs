/// Post/tag association handlers
use super::{message, AppState};
use crate::error::Result;
use crate::models::PostTag;
use actix_web::{web, HttpResponse};

pub async fn add_post_tag(
    state: web::Data<AppState>,
    path: web::Path<(i64, i64)>,
) -> Result<HttpResponse> {
    let (post_id, tag_id) = path.into_inner();
    state
        .post_tags
        .insert(&state.store_context(), PostTag { post_id, tag_id })
        .await?;

    Ok(message("tag successfully added to post"))
}

pub async fn remove_post_tag(
    state: web::Data<AppState>,
    path: web::Path<(i64, i64)>,
) -> Result<HttpResponse> {
    let (post_id, tag_id) = path.into_inner();
    state
        .post_tags
        .delete(&state.store_context(), PostTag { post_id, tag_id })
        .await?;

    Ok(message("tag successfully removed from post"))
}
