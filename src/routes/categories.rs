use axum::{Json, Router, extract::State, routing::get};
use uuid::Uuid;

use crate::{
    error::AppResult,
    extract::AppPath,
    models::Category,
    response::ErrorBody,
    services::category_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/categories", get(list_categories))
        .route("/{id}", get(get_category))
}

#[utoipa::path(
    get,
    path = "/api/category/categories",
    responses((status = 200, description = "All categories by name", body = Vec<Category>)),
    tag = "Categories"
)]
pub async fn list_categories(State(state): State<AppState>) -> AppResult<Json<Vec<Category>>> {
    Ok(Json(category_service::list_categories(&state).await?))
}

#[utoipa::path(
    get,
    path = "/api/category/{id}",
    params(("id" = Uuid, Path, description = "Category ID")),
    responses(
        (status = 200, description = "Category", body = Category),
        (status = 404, description = "Category not found", body = ErrorBody)
    ),
    tag = "Categories"
)]
pub async fn get_category(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<Category>> {
    Ok(Json(category_service::get_category(&state, id).await?))
}
