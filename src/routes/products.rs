use axum::{
    Json, Router,
    extract::{Multipart, State, multipart::MultipartRejection},
    http::StatusCode,
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dto::{
        products::{FilterRequest, ProductForm},
        reviews::CreateReviewRequest,
    },
    error::AppResult,
    extract::{AppJson, AppPath, AppQuery},
    middleware::auth::AuthUser,
    models::{Product, ProductSummary, ReviewWithAuthor},
    response::{ErrorBody, MessageResponse, ProductPage},
    routes::params::SearchQuery,
    services::{catalog_service, product_service, review_service},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(search_products).post(create_product))
        .route("/all", get(list_all_products))
        .route("/top", get(top_products))
        .route("/new", get(new_products))
        .route("/filter", post(filter_products))
        .route("/distributor", get(distributor_products))
        .route(
            "/{id}",
            get(get_product).put(update_product).delete(delete_product),
        )
        .route("/{id}/reviews", get(list_reviews).post(add_review))
        .route("/{id}/similar", get(similar_products))
}

#[utoipa::path(
    get,
    path = "/api/products",
    params(SearchQuery),
    responses(
        (status = 200, description = "Search products by name, 6 per page", body = ProductPage)
    ),
    tag = "Products"
)]
pub async fn search_products(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<SearchQuery>,
) -> AppResult<Json<ProductPage>> {
    Ok(Json(catalog_service::search(&state, query).await?))
}

#[utoipa::path(
    post,
    path = "/api/products",
    request_body(content = ProductForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Product created", body = Product),
        (status = 400, description = "Missing field or upload failure", body = ErrorBody),
        (status = 403, description = "Caller is not a distributor", body = ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "Products"
)]
pub async fn create_product(
    State(state): State<AppState>,
    user: AuthUser,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<(StatusCode, Json<Product>)> {
    let form = ProductForm::from_multipart(multipart?).await?;
    let product = product_service::create_product(&state, &user, form).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

#[utoipa::path(
    get,
    path = "/api/products/{id}",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product with category and reviews", body = Product),
        (status = 404, description = "Product not found", body = ErrorBody)
    ),
    tag = "Products"
)]
pub async fn get_product(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<Product>> {
    Ok(Json(product_service::get_product(&state, id).await?))
}

#[utoipa::path(
    put,
    path = "/api/products/{id}",
    params(("id" = Uuid, Path, description = "Product ID")),
    request_body(content = ProductForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Updated product", body = Product),
        (status = 400, description = "Missing field or upload failure", body = ErrorBody),
        (status = 404, description = "Product not found", body = ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "Products"
)]
pub async fn update_product(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<Json<Product>> {
    let form = ProductForm::from_multipart(multipart?).await?;
    Ok(Json(
        product_service::update_product(&state, &user, id, form).await?,
    ))
}

#[utoipa::path(
    delete,
    path = "/api/products/{id}",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Deleted product, or null when nothing matched", body = Option<Product>)
    ),
    security(("bearer_auth" = [])),
    tag = "Products"
)]
pub async fn delete_product(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<Option<Product>>> {
    Ok(Json(
        product_service::delete_product(&state, &user, id).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/api/products/all",
    responses((status = 200, description = "Latest 12 products", body = Vec<Product>)),
    tag = "Products"
)]
pub async fn list_all_products(State(state): State<AppState>) -> AppResult<Json<Vec<Product>>> {
    Ok(Json(catalog_service::list_all(&state).await?))
}

#[utoipa::path(
    get,
    path = "/api/products/top",
    responses((status = 200, description = "Top 4 products by rating", body = Vec<Product>)),
    tag = "Products"
)]
pub async fn top_products(State(state): State<AppState>) -> AppResult<Json<Vec<Product>>> {
    Ok(Json(catalog_service::top_rated(&state).await?))
}

#[utoipa::path(
    get,
    path = "/api/products/new",
    responses((status = 200, description = "Newest 5 products", body = Vec<Product>)),
    tag = "Products"
)]
pub async fn new_products(State(state): State<AppState>) -> AppResult<Json<Vec<Product>>> {
    Ok(Json(catalog_service::newest(&state).await?))
}

#[utoipa::path(
    post,
    path = "/api/products/filter",
    request_body = FilterRequest,
    responses(
        (status = 200, description = "Products matching categories and price range", body = Vec<Product>),
        (status = 400, description = "Malformed price range", body = ErrorBody)
    ),
    tag = "Products"
)]
pub async fn filter_products(
    State(state): State<AppState>,
    AppJson(payload): AppJson<FilterRequest>,
) -> AppResult<Json<Vec<Product>>> {
    Ok(Json(catalog_service::filter(&state, payload).await?))
}

#[utoipa::path(
    get,
    path = "/api/products/distributor",
    responses((status = 200, description = "Products listed by the caller", body = Vec<Product>)),
    security(("bearer_auth" = [])),
    tag = "Products"
)]
pub async fn distributor_products(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<Vec<Product>>> {
    Ok(Json(catalog_service::by_distributor(&state, &user).await?))
}

#[utoipa::path(
    get,
    path = "/api/products/{id}/similar",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Up to 4 products from the same category", body = Vec<ProductSummary>),
        (status = 404, description = "Product not found", body = ErrorBody)
    ),
    tag = "Products"
)]
pub async fn similar_products(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<Vec<ProductSummary>>> {
    Ok(Json(catalog_service::similar(&state, id).await?))
}

#[utoipa::path(
    post,
    path = "/api/products/{id}/reviews",
    params(("id" = Uuid, Path, description = "Product ID")),
    request_body = CreateReviewRequest,
    responses(
        (status = 201, description = "Review added", body = MessageResponse),
        (status = 400, description = "Invalid or duplicate review", body = ErrorBody),
        (status = 404, description = "Product not found", body = ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "Reviews"
)]
pub async fn add_review(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(payload): AppJson<CreateReviewRequest>,
) -> AppResult<(StatusCode, Json<MessageResponse>)> {
    let message = review_service::add_review(&state, &user, id, payload).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

#[utoipa::path(
    get,
    path = "/api/products/{id}/reviews",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Reviews with reviewer names", body = Vec<ReviewWithAuthor>),
        (status = 404, description = "Product not found", body = ErrorBody)
    ),
    tag = "Reviews"
)]
pub async fn list_reviews(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<Vec<ReviewWithAuthor>>> {
    Ok(Json(review_service::get_reviews(&state, id).await?))
}
