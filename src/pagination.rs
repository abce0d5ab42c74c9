//! List query parameters and page arithmetic for `GET /news`.

use serde::{Deserialize, de::DeserializeOwned, de::IntoDeserializer};

use crate::{
    errors::{AppError, AppResult},
    models::{Assessment, Category, ValidationError},
    repository::NewsFilter,
};

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: u64 = 100;

/// ListParams
///
/// Raw query string of `GET /news`. Values stay as strings here so empty
/// parameters (`?category=`) can be treated as absent.
#[derive(Debug, Clone, Default, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListParams {
    /// 1-based page number (default 1).
    pub page: Option<i64>,
    /// Page size (default 10, capped at 100).
    pub limit: Option<i64>,
    /// One of politics, technology, health, other.
    pub category: Option<String>,
    /// Assessment filter: likely-true, unsure, likely-false.
    pub status: Option<String>,
    /// Case-insensitive substring matched against title or content.
    pub search: Option<String>,
}

/// Pagination
///
/// Validated 1-based page position.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pagination {
    pub page: u64,
    pub page_size: u64,
}

impl Pagination {
    /// Rejects non-positive values and clamps the page size to [`MAX_PAGE_SIZE`].
    pub fn new(page: i64, page_size: i64) -> Result<Self, ValidationError> {
        if page < 1 {
            return Err(ValidationError("page must be a positive integer".to_string()));
        }
        if page_size < 1 {
            return Err(ValidationError("limit must be a positive integer".to_string()));
        }
        Ok(Self {
            page: page as u64,
            page_size: (page_size as u64).min(MAX_PAGE_SIZE),
        })
    }

    pub fn offset(&self) -> u64 {
        (self.page - 1).saturating_mul(self.page_size)
    }

    /// `ceil(total / page_size)`; page_size is never zero.
    pub fn total_pages(&self, total: u64) -> u64 {
        total.div_ceil(self.page_size)
    }

    pub fn has_more(&self, total: u64) -> bool {
        self.page.saturating_mul(self.page_size) < total
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE as u64,
            page_size: DEFAULT_PAGE_SIZE as u64,
        }
    }
}

/// ListQuery
///
/// Fully validated listing request handed to the service.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListQuery {
    pub pagination: Pagination,
    pub filter: NewsFilter,
}

impl TryFrom<ListParams> for ListQuery {
    type Error = AppError;

    fn try_from(params: ListParams) -> AppResult<Self> {
        let pagination = Pagination::new(
            params.page.unwrap_or(DEFAULT_PAGE),
            params.limit.unwrap_or(DEFAULT_PAGE_SIZE),
        )?;

        let filter = NewsFilter {
            category: parse_enum::<Category>("category", non_empty(params.category))?,
            assessment: parse_enum::<Assessment>("status", non_empty(params.status))?,
            search: non_empty(params.search),
        };

        Ok(Self { pagination, filter })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Parses a string through the enum's serde representation, so query values
/// and JSON values share one spelling.
fn parse_enum<T: DeserializeOwned>(
    field: &str,
    value: Option<String>,
) -> Result<Option<T>, ValidationError> {
    value
        .map(|raw| {
            let de: serde::de::value::StrDeserializer<'_, serde::de::value::Error> =
                raw.as_str().into_deserializer();
            T::deserialize(de).map_err(|_| ValidationError(format!("invalid {field}: '{raw}'")))
        })
        .transpose()
}
