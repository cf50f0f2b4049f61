/// Database access layer
///
/// - `filters`: listing validation, ordering and page metadata
/// - `context`: per-call timeout and cancellation
/// - `concurrency`, `ownership`: outcome handling for guarded writes
/// - one repository per table
pub mod comment_repo;
pub mod concurrency;
pub mod context;
pub mod filters;
pub mod ownership;
pub mod pool;
pub mod post_repo;
pub mod post_tag_repo;
pub mod tag_repo;

pub use comment_repo::{CommentStore, PgCommentRepository};
pub use context::StoreContext;
pub use filters::{Filters, Metadata};
pub use pool::create_pool;
pub use post_repo::{PgPostRepository, PostStore};
pub use post_tag_repo::{PgPostTagRepository, PostTagStore};
pub use tag_repo::{PgTagRepository, TagStore};
