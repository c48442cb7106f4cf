use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dto::blogs::CreateBlogRequest,
    error::AppResult,
    extract::{AppJson, AppPath},
    middleware::auth::AuthUser,
    models::BlogPost,
    response::ErrorBody,
    services::blog_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/create", post(create_blog))
        .route("/get-blogs", get(list_blogs))
        .route("/{id}", get(get_blog))
}

#[utoipa::path(
    post,
    path = "/api/blogs/create",
    request_body = CreateBlogRequest,
    responses(
        (status = 201, description = "Blog post created", body = BlogPost),
        (status = 400, description = "Missing title or content", body = ErrorBody)
    ),
    security(("bearer_auth" = [])),
    tag = "Blog"
)]
pub async fn create_blog(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(payload): AppJson<CreateBlogRequest>,
) -> AppResult<(StatusCode, Json<BlogPost>)> {
    let blog = blog_service::create_blog(&state, &user, payload).await?;
    Ok((StatusCode::CREATED, Json(blog)))
}

#[utoipa::path(
    get,
    path = "/api/blogs/get-blogs",
    responses((status = 200, description = "Blog posts, newest first", body = Vec<BlogPost>)),
    tag = "Blog"
)]
pub async fn list_blogs(State(state): State<AppState>) -> AppResult<Json<Vec<BlogPost>>> {
    Ok(Json(blog_service::list_blogs(&state).await?))
}

#[utoipa::path(
    get,
    path = "/api/blogs/{id}",
    params(("id" = Uuid, Path, description = "Blog post ID")),
    responses(
        (status = 200, description = "Blog post", body = BlogPost),
        (status = 404, description = "Blog post not found", body = ErrorBody)
    ),
    tag = "Blog"
)]
pub async fn get_blog(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<BlogPost>> {
    Ok(Json(blog_service::get_blog(&state, id).await?))
}
