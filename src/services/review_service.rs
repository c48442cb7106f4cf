use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DbErr, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set,
    SqlErr, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::reviews::CreateReviewRequest,
    entity::{
        products::{ActiveModel as ProductActive, Entity as Products},
        reviews::{ActiveModel as ReviewActive, Column as ReviewCol, Entity as Reviews},
        users::Entity as Users,
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{ReviewAuthor, ReviewWithAuthor},
    response::MessageResponse,
    state::AppState,
};

/// Derived review fields kept on the product row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReviewStats {
    pub count: i32,
    pub average: f64,
}

impl ReviewStats {
    pub fn from_ratings(ratings: &[i32]) -> Self {
        if ratings.is_empty() {
            return Self {
                count: 0,
                average: 0.0,
            };
        }
        let sum: i64 = ratings.iter().map(|r| i64::from(*r)).sum();
        Self {
            count: ratings.len() as i32,
            average: sum as f64 / ratings.len() as f64,
        }
    }
}

pub async fn add_review(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
    payload: CreateReviewRequest,
) -> AppResult<MessageResponse> {
    let product = Products::find_by_id(product_id)
        .one(state.orm.as_ref())
        .await?
        .ok_or(AppError::NotFound("Product"))?;

    let comment = payload
        .comment
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AppError::validation("Comment cannot be empty"))?
        .to_string();
    let rating = payload
        .rating
        .filter(|r| (1..=5).contains(r))
        .ok_or_else(|| AppError::validation("Rating must be between 1 and 5"))?;

    let already_reviewed = Reviews::find()
        .filter(ReviewCol::ProductId.eq(product.id))
        .filter(ReviewCol::UserId.eq(user.user_id))
        .one(state.orm.as_ref())
        .await?;
    if already_reviewed.is_some() {
        return Err(already_reviewed_error());
    }

    // Not locked: two concurrent reviews can each recompute from a snapshot
    // missing the other's row, leaving the aggregate stale until the next review.
    let txn = state.orm.begin().await?;

    ReviewActive {
        id: Set(Uuid::now_v7()),
        product_id: Set(product.id),
        user_id: Set(user.user_id),
        rating: Set(rating),
        comment: Set(comment),
        created_at: NotSet,
    }
    .insert(&txn)
    .await
    .map_err(map_duplicate)?;

    let ratings: Vec<i32> = Reviews::find()
        .select_only()
        .column(ReviewCol::Rating)
        .filter(ReviewCol::ProductId.eq(product.id))
        .into_tuple()
        .all(&txn)
        .await?;
    let stats = ReviewStats::from_ratings(&ratings);

    let mut active: ProductActive = product.into();
    active.num_reviews = Set(stats.count);
    active.rating = Set(stats.average);
    active.updated_at = Set(Utc::now().into());
    let product = active.update(&txn).await?;

    txn.commit().await?;

    tracing::info!(
        product_id = %product.id,
        num_reviews = stats.count,
        rating = stats.average,
        "review added"
    );
    audit::record(
        &state.pool,
        user.user_id,
        "review_add",
        "reviews",
        serde_json::json!({ "product_id": product.id, "rating": rating }),
    )
    .await;

    Ok(MessageResponse::new("Review added"))
}

pub async fn get_reviews(state: &AppState, product_id: Uuid) -> AppResult<Vec<ReviewWithAuthor>> {
    Products::find_by_id(product_id)
        .one(state.orm.as_ref())
        .await?
        .ok_or(AppError::NotFound("Product"))?;

    let rows = Reviews::find()
        .filter(ReviewCol::ProductId.eq(product_id))
        .order_by_asc(ReviewCol::CreatedAt)
        .order_by_asc(ReviewCol::Id)
        .find_also_related(Users)
        .all(state.orm.as_ref())
        .await?;

    let reviews = rows
        .into_iter()
        .map(|(review, author)| ReviewWithAuthor {
            id: review.id,
            user: ReviewAuthor {
                id: review.user_id,
                username: author.map(|a| a.username).unwrap_or_default(),
            },
            rating: review.rating,
            comment: review.comment,
            created_at: review.created_at.with_timezone(&Utc),
        })
        .collect();
    Ok(reviews)
}

fn already_reviewed_error() -> AppError {
    AppError::Duplicate("Product already reviewed".into())
}

fn map_duplicate(err: DbErr) -> AppError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => already_reviewed_error(),
        _ => err.into(),
    }
}
