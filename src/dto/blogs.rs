use serde::Deserialize;
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateBlogRequest {
    pub title: String,
    pub content: String,
    pub image: Option<String>,
}
