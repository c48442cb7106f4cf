use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

/// Query string of `GET /api/products`.
#[derive(Debug, Default, Deserialize, ToSchema, IntoParams)]
pub struct SearchQuery {
    /// Case-insensitive substring of the product name.
    pub search: Option<String>,
    /// 1-based page number.
    pub page: Option<u64>,
}
