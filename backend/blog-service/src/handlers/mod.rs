/// HTTP handlers for blog-service
///
/// Handlers stay thin: parse and validate input, call one or two store
/// operations, wrap the result in a JSON envelope. Every error is an
/// `AppError` and renders through its `ResponseError` impl.
pub mod comments;
pub mod post_tags;
pub mod posts;
pub mod tags;

use crate::db::filters::{Filters, SortSafelist, DEFAULT_PAGE, DEFAULT_PAGE_SIZE};
use crate::db::{CommentStore, PostStore, PostTagStore, StoreContext, TagStore};
use crate::error::{AppError, Result};
use crate::metrics::serve_metrics;
use crate::validation::FieldErrors;
use actix_web::{web, HttpResponse};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

pub type QueryParams = web::Query<HashMap<String, String>>;

/// Stores shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub posts: Arc<dyn PostStore>,
    pub comments: Arc<dyn CommentStore>,
    pub tags: Arc<dyn TagStore>,
    pub post_tags: Arc<dyn PostTagStore>,
    pub store_timeout: Duration,
    pub request_timeout: Duration,
    /// Flips to `true` when the server starts shutting down.
    pub shutdown: watch::Receiver<bool>,
}

impl AppState {
    /// Context for one request's store calls, bounded by the request
    /// deadline and abandoned on shutdown.
    pub fn store_context(&self) -> StoreContext {
        StoreContext::new(self.store_timeout)
            .with_deadline(Instant::now() + self.request_timeout)
            .with_cancellation(self.shutdown.clone())
    }
}

pub fn read_string(qs: &HashMap<String, String>, key: &str, default: &str) -> String {
    qs.get(key)
        .filter(|v| !v.is_empty())
        .cloned()
        .unwrap_or_else(|| default.to_string())
}

/// Integer query parameter; a malformed value is recorded and the default
/// returned so the remaining checks still run.
pub fn read_int(
    qs: &HashMap<String, String>,
    key: &str,
    default: i64,
    errors: &mut FieldErrors,
) -> i64 {
    match qs.get(key).filter(|v| !v.is_empty()) {
        None => default,
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            errors.add(key, "must be an integer value");
            default
        }),
    }
}

/// `page`, `page_size` and `sort` for a listing, all problems reported together.
pub fn read_filters(qs: &HashMap<String, String>, safelist: SortSafelist) -> Result<Filters> {
    read_filters_with(qs, safelist, FieldErrors::new())
}

/// As `read_filters`, reporting `errors` already collected from other
/// parameters alongside any filter problems.
pub fn read_filters_with(
    qs: &HashMap<String, String>,
    safelist: SortSafelist,
    mut errors: FieldErrors,
) -> Result<Filters> {
    let page = read_int(qs, "page", DEFAULT_PAGE, &mut errors);
    let page_size = read_int(qs, "page_size", DEFAULT_PAGE_SIZE, &mut errors);
    let sort = read_string(qs, "sort", safelist.default_sort);

    match Filters::parse(page, page_size, &sort, safelist) {
        Ok(filters) if errors.is_empty() => Ok(filters),
        Ok(_) => Err(AppError::Validation(errors)),
        Err(parse_errors) => {
            errors.merge(parse_errors);
            Err(AppError::Validation(errors))
        }
    }
}

/// `{"message": ...}` envelope.
pub fn message(text: &str) -> HttpResponse {
    HttpResponse::Ok().json(json!({ "message": text }))
}

pub async fn healthcheck(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "available",
        "store_timeout_ms": state.store_timeout.as_millis() as u64,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Register every route. Expects `web::Data<AppState>` and
/// `web::Data<TokenVerifier>` as app data.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .error_handler(|err, _| AppError::BadRequest(err.to_string()).into()),
    )
    .app_data(web::PathConfig::default().error_handler(|_, _| AppError::NotFound.into()))
    .app_data(
        web::QueryConfig::default()
            .error_handler(|err, _| AppError::BadRequest(err.to_string()).into()),
    )
    .route("/metrics", web::get().to(serve_metrics))
    .service(
        web::scope("/v1")
            .route("/healthcheck", web::get().to(healthcheck))
            .route("/posts", web::get().to(posts::list_posts))
            .route("/posts", web::post().to(posts::create_post))
            .route("/posts/{post_id}", web::get().to(posts::show_post))
            .route("/posts/{post_id}", web::patch().to(posts::update_post))
            .route("/posts/{post_id}", web::delete().to(posts::delete_post))
            .route("/users/{user_id}/posts", web::get().to(posts::list_user_posts))
            .route("/posts/{post_id}/comments", web::get().to(comments::list_post_comments))
            .route("/posts/{post_id}/comments", web::post().to(comments::create_comment))
            .route(
                "/posts/{post_id}/comments/{comment_id}",
                web::get().to(comments::show_comment),
            )
            .route(
                "/posts/{post_id}/comments/{comment_id}",
                web::patch().to(comments::update_comment),
            )
            .route(
                "/posts/{post_id}/comments/{comment_id}",
                web::delete().to(comments::delete_comment),
            )
            .route("/users/{user_id}/comments", web::get().to(comments::list_user_comments))
            .route("/tags", web::get().to(tags::list_tags))
            .route("/tags", web::post().to(tags::create_tag))
            .route("/tags/{tag_id}", web::get().to(tags::show_tag))
            .route("/tags/{tag_id}", web::patch().to(tags::update_tag))
            .route("/tags/{tag_id}", web::delete().to(tags::delete_tag))
            .route("/posts/{post_id}/tags", web::get().to(tags::list_post_tags))
            .route("/posts/{post_id}/tags/{tag_id}", web::post().to(post_tags::add_post_tag))
            .route(
                "/posts/{post_id}/tags/{tag_id}",
                web::delete().to(post_tags::remove_post_tag),
            ),
    );
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::db::comment_repo::MockCommentStore;
    use crate::db::post_repo::MockPostStore;
    use crate::db::post_tag_repo::MockPostTagStore;
    use crate::db::tag_repo::MockTagStore;
    use crate::middleware::{Claims, TokenVerifier};
    use actix_web::dev::{Service, ServiceResponse};
    use actix_web::{test, App};
    use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};

    pub const SECRET: &str = "handler-test-secret";

    pub struct Mocks {
        pub posts: MockPostStore,
        pub comments: MockCommentStore,
        pub tags: MockTagStore,
        pub post_tags: MockPostTagStore,
    }

    impl Mocks {
        pub fn new() -> Self {
            Self {
                posts: MockPostStore::new(),
                comments: MockCommentStore::new(),
                tags: MockTagStore::new(),
                post_tags: MockPostTagStore::new(),
            }
        }

        pub fn state(self, shutdown: watch::Receiver<bool>) -> AppState {
            AppState {
                posts: Arc::new(self.posts),
                comments: Arc::new(self.comments),
                tags: Arc::new(self.tags),
                post_tags: Arc::new(self.post_tags),
                store_timeout: Duration::from_secs(1),
                request_timeout: Duration::from_secs(2),
                shutdown,
            }
        }

        pub async fn app(
            self,
        ) -> impl Service<actix_http::Request, Response = ServiceResponse, Error = actix_web::Error>
        {
            let (_, shutdown) = watch::channel(false);
            let state = self.state(shutdown);
            test::init_service(
                App::new()
                    .app_data(web::Data::new(state))
                    .app_data(web::Data::new(TokenVerifier::new(SECRET)))
                    .configure(configure),
            )
            .await
        }
    }

    pub fn bearer(user_id: i64) -> (&'static str, String) {
        let claims = Claims {
            sub: user_id.to_string(),
            exp: (chrono::Utc::now().timestamp() + 600) as usize,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();
        ("Authorization", format!("Bearer {token}"))
    }
}
