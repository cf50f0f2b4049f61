/// Data models for blog-service
///
/// - Post: owned by the user that created it
/// - Comment: belongs to one post, owned by its author
/// - Tag: global, unowned, unique by name
/// - PostTag: many-to-many link between posts and tags
///
/// `updated_at` is the optimistic concurrency version of every mutable row.
use crate::validation::{long_text, short_text};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use validator::Validate;

#[derive(Debug, Clone, PartialEq, Serialize, FromRow, Validate)]
pub struct Post {
    pub id: i64,
    pub user_id: i64,
    #[validate(custom(function = "short_text"))]
    pub title: String,
    #[validate(custom(function = "long_text"))]
    pub content: String,
    #[serde(skip_serializing)]
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Validate)]
pub struct NewPost {
    #[validate(range(min = 1, message = "must be greater than zero"))]
    pub user_id: i64,
    #[validate(custom(function = "short_text"))]
    pub title: String,
    #[validate(custom(function = "long_text"))]
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow, Validate)]
pub struct Comment {
    pub id: i64,
    #[validate(range(min = 1, message = "must be greater than zero"))]
    pub post_id: i64,
    #[validate(range(min = 1, message = "must be greater than zero"))]
    pub user_id: i64,
    #[validate(custom(function = "long_text"))]
    pub content: String,
    #[serde(skip_serializing)]
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Validate)]
pub struct NewComment {
    #[validate(range(min = 1, message = "must be greater than zero"))]
    pub post_id: i64,
    #[validate(range(min = 1, message = "must be greater than zero"))]
    pub user_id: i64,
    #[validate(custom(function = "long_text"))]
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow, Validate)]
pub struct Tag {
    pub id: i64,
    #[validate(custom(function = "short_text"))]
    pub name: String,
    #[serde(skip_serializing)]
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Validate)]
pub struct NewTag {
    #[validate(custom(function = "short_text"))]
    pub name: String,
}

/// Link between a post and a tag; unique per (post_id, tag_id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, FromRow)]
pub struct PostTag {
    pub post_id: i64,
    pub tag_id: i64,
}

impl PostTag {
    /// Both sides must be positive ids to name an existing row.
    pub fn is_addressable(&self) -> bool {
        self.post_id > 0 && self.tag_id > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::validate;

    #[test]
    fn new_post_reports_every_failing_field() {
        let post = NewPost {
            user_id: 0,
            title: String::new(),
            content: "c".repeat(3001),
        };

        let errors = validate(&post).unwrap_err();
        assert_eq!(errors.get("user_id"), Some("must be greater than zero"));
        assert_eq!(errors.get("title"), Some("must be provided"));
        assert_eq!(
            errors.get("content"),
            Some("must not be more than 3000 bytes long")
        );
    }

    #[test]
    fn valid_comment_passes() {
        let comment = NewComment {
            post_id: 1,
            user_id: 2,
            content: "nice post".into(),
        };
        assert!(validate(&comment).is_ok());
    }

    #[test]
    fn tag_name_limit() {
        let tag = NewTag {
            name: "t".repeat(501),
        };
        let errors = validate(&tag).unwrap_err();
        assert_eq!(errors.get("name"), Some("must not be more than 500 bytes long"));
    }

    #[test]
    fn post_tag_needs_positive_ids() {
        assert!(PostTag { post_id: 1, tag_id: 2 }.is_addressable());
        assert!(!PostTag { post_id: 0, tag_id: 2 }.is_addressable());
        assert!(!PostTag { post_id: 1, tag_id: -1 }.is_addressable());
    }

    #[test]
    fn post_serialisation_hides_created_at() {
        let now = Utc::now();
        let post = Post {
            id: 1,
            user_id: 2,
            title: "A".into(),
            content: "B".into(),
            created_at: now,
            updated_at: now,
        };
        let json = serde_json::to_value(&post).unwrap();
        assert!(json.get("created_at").is_none());
        assert_eq!(json["title"], "A");
    }
}
