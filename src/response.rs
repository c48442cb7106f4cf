use serde::Serialize;
use utoipa::ToSchema;

use crate::models::Product;

/// Search result envelope returned by `GET /api/products`.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProductPage {
    pub products: Vec<Product>,
    pub page: u64,
    pub pages: u64,
    pub has_more: bool,
}

impl ProductPage {
    pub fn new(products: Vec<Product>, page: u64, per_page: u64, total: u64) -> Self {
        let pages = total.div_ceil(per_page);
        Self {
            products,
            page,
            pages,
            has_more: page < pages,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
}
