//! Filtering, sorting and pagination shared by every listing
//!
//! Untrusted `page`/`page_size`/`sort` inputs are validated against a
//! per-endpoint allow-list. Only `&'static str` column names taken from the
//! allow-list are ever rendered into SQL.

use crate::validation::FieldErrors;
use serde::Serialize;
use sqlx::postgres::PgRow;
use sqlx::{FromRow, Row};

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE: i64 = 10_000_000;
pub const MAX_PAGE_SIZE: i64 = 100;

/// Column alias carrying the window-function total on every page row.
pub const TOTAL_RECORDS_COLUMN: &str = "total_records";

/// Permitted sort columns for one listing, plus its default sort key.
#[derive(Debug, Clone, Copy)]
pub struct SortSafelist {
    pub columns: &'static [&'static str],
    pub default_sort: &'static str,
}

pub const POST_SORTS: SortSafelist = SortSafelist {
    columns: &["id", "user_id", "title", "content", "updated_at"],
    default_sort: "id",
};

pub const POST_COMMENT_SORTS: SortSafelist = SortSafelist {
    columns: &["id", "created_at", "user_id"],
    default_sort: "id",
};

pub const USER_COMMENT_SORTS: SortSafelist = SortSafelist {
    columns: &["created_at", "updated_at"],
    default_sort: "created_at",
};

pub const TAG_SORTS: SortSafelist = SortSafelist {
    columns: &["id", "name", "updated_at"],
    default_sort: "id",
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    pub fn as_sql(self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

/// Validated ordering, always followed by an ascending primary-key tie-break.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSpec {
    pub column: &'static str,
    pub direction: Direction,
}

impl SortSpec {
    /// Render `ORDER BY` for `table`'s columns, tie-broken on `table.id`.
    pub fn order_by(&self, table: &str) -> String {
        if self.column == "id" {
            format!("ORDER BY {table}.id {}", self.direction.as_sql())
        } else {
            format!(
                "ORDER BY {table}.{} {}, {table}.id ASC",
                self.column,
                self.direction.as_sql()
            )
        }
    }
}

/// A listing request that passed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Filters {
    pub page: i64,
    pub page_size: i64,
    pub sort: SortSpec,
}

impl Filters {
    /// Validate raw inputs, collecting every offending field.
    pub fn parse(
        page: i64,
        page_size: i64,
        sort: &str,
        safelist: SortSafelist,
    ) -> Result<Self, FieldErrors> {
        let mut errors = FieldErrors::new();

        errors.check(page > 0, "page", "must be greater than zero");
        errors.check(page <= MAX_PAGE, "page", "must be a maximum of 10 million");
        errors.check(page_size > 0, "page_size", "must be greater than zero");
        errors.check(page_size <= MAX_PAGE_SIZE, "page_size", "must be a maximum of 100");

        let (direction, key) = match sort.strip_prefix('-') {
            Some(rest) => (Direction::Desc, rest),
            None => (Direction::Asc, sort),
        };
        let column = safelist.columns.iter().copied().find(|c| *c == key);
        if column.is_none() {
            errors.add("sort", "invalid sort value");
        }

        errors.into_result()?;

        Ok(Self {
            page,
            page_size,
            sort: SortSpec {
                column: column.unwrap_or(safelist.default_sort),
                direction,
            },
        })
    }

    /// Filters for the first page with the listing's default sort.
    pub fn first_page(safelist: SortSafelist) -> Self {
        Self {
            page: DEFAULT_PAGE,
            page_size: DEFAULT_PAGE_SIZE,
            sort: SortSpec {
                column: safelist.default_sort,
                direction: Direction::Asc,
            },
        }
    }

    pub fn limit(&self) -> i64 {
        self.page_size
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.page_size
    }
}

/// Pagination summary returned alongside every page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Metadata {
    pub current_page: i64,
    pub page_size: i64,
    pub first_page: i64,
    pub last_page: i64,
    pub total_records: i64,
}

/// Zero matching records yield an all-zero summary rather than an error.
pub fn calculate_metadata(total_records: i64, page: i64, page_size: i64) -> Metadata {
    if total_records <= 0 || page_size <= 0 {
        return Metadata::default();
    }

    Metadata {
        current_page: page,
        page_size,
        first_page: 1,
        last_page: (total_records + page_size - 1) / page_size,
        total_records,
    }
}

/// Decode page rows that carry a `total_records` window column.
pub fn collect_page<T>(
    rows: Vec<PgRow>,
    filters: &Filters,
) -> Result<(Vec<T>, Metadata), sqlx::Error>
where
    T: for<'r> FromRow<'r, PgRow>,
{
    let mut total_records = 0_i64;
    let mut items = Vec::with_capacity(rows.len());

    for row in &rows {
        total_records = row.try_get(TOTAL_RECORDS_COLUMN)?;
        items.push(T::from_row(row)?);
    }

    Ok((
        items,
        calculate_metadata(total_records, filters.page, filters.page_size),
    ))
}
