use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, EntityTrait, QueryOrder, Set};
use uuid::Uuid;

use crate::{
    audit,
    dto::blogs::CreateBlogRequest,
    entity::blogs::{ActiveModel, Column, Entity as Blogs, Model as BlogModel},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::BlogPost,
    state::AppState,
};

pub async fn create_blog(
    state: &AppState,
    user: &AuthUser,
    payload: CreateBlogRequest,
) -> AppResult<BlogPost> {
    let title = payload.title.trim().to_string();
    let content = payload.content.trim().to_string();
    if title.is_empty() || content.is_empty() {
        return Err(AppError::validation("Title and content are required"));
    }
    let image = payload
        .image
        .map(|i| i.trim().to_string())
        .filter(|i| !i.is_empty());

    let blog = ActiveModel {
        id: Set(Uuid::now_v7()),
        title: Set(title),
        content: Set(content),
        image: Set(image),
        author_id: Set(user.user_id),
        created_at: NotSet,
    }
    .insert(state.orm.as_ref())
    .await?;

    audit::record(
        &state.pool,
        user.user_id,
        "blog_create",
        "blogs",
        serde_json::json!({ "blog_id": blog.id }),
    )
    .await;

    Ok(blog_from_entity(blog))
}

pub async fn list_blogs(state: &AppState) -> AppResult<Vec<BlogPost>> {
    let blogs = Blogs::find()
        .order_by_desc(Column::CreatedAt)
        .all(state.orm.as_ref())
        .await?
        .into_iter()
        .map(blog_from_entity)
        .collect();
    Ok(blogs)
}

pub async fn get_blog(state: &AppState, id: Uuid) -> AppResult<BlogPost> {
    Blogs::find_by_id(id)
        .one(state.orm.as_ref())
        .await?
        .map(blog_from_entity)
        .ok_or(AppError::NotFound("Blog"))
}

fn blog_from_entity(model: BlogModel) -> BlogPost {
    BlogPost {
        id: model.id,
        title: model.title,
        content: model.content,
        image: model.image,
        author: model.author_id,
        created_at: model.created_at.with_timezone(&Utc),
    }
}
