use std::collections::HashMap;

use anyhow::anyhow;
use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::products::{NewProduct, ProductForm, ProductUpdate},
    entity::{
        categories::{Entity as Categories, Model as CategoryModel},
        products::{ActiveModel, Entity as Products, Model as ProductModel},
        reviews::{Column as ReviewCol, Entity as Reviews, Model as ReviewModel},
    },
    error::{AppError, AppResult},
    images::upload_all,
    middleware::auth::{AuthUser, ensure_distributor},
    models::{Category, Product, Review},
    services::category_service::{category_from_entity, resolve_category},
    state::AppState,
};

pub async fn create_product(
    state: &AppState,
    user: &AuthUser,
    form: ProductForm,
) -> AppResult<Product> {
    ensure_distributor(user)?;
    let NewProduct {
        fields,
        image,
        additional_images,
    } = form.into_new_product()?;

    let category = resolve_category(state.orm.as_ref(), &fields.category).await?;

    let image = state.images.upload(image).await.map_err(|err| {
        tracing::warn!(error = %err, "main image upload failed");
        AppError::Upload("Failed to upload main image".into())
    })?;
    let additional_images = upload_all(state.images.as_ref(), additional_images).await;

    let product = ActiveModel {
        id: Set(Uuid::now_v7()),
        name: Set(fields.name),
        brand: Set(fields.brand),
        description: Set(fields.description),
        price: Set(fields.price),
        quantity: Set(fields.quantity),
        category_id: Set(category.id),
        distributor_id: Set(user.user_id),
        image: Set(image),
        additional_images: Set(additional_images),
        num_reviews: Set(0),
        rating: Set(0.0),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(state.orm.as_ref())
    .await?;

    tracing::info!(product_id = %product.id, distributor = %user.user_id, "product created");
    audit::record(
        &state.pool,
        user.user_id,
        "product_create",
        "products",
        serde_json::json!({ "product_id": product.id }),
    )
    .await;

    Ok(product_from_entity(
        product,
        category_from_entity(category),
        Vec::new(),
    ))
}

pub async fn update_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    form: ProductForm,
) -> AppResult<Product> {
    ensure_distributor(user)?;
    let ProductUpdate { fields, image } = form.into_update()?;

    let existing = Products::find_by_id(id)
        .one(state.orm.as_ref())
        .await?
        .ok_or(AppError::NotFound("Product"))?;

    let category = resolve_category(state.orm.as_ref(), &fields.category).await?;

    let mut active: ActiveModel = existing.into();
    if let Some(image) = image {
        let url = state.images.upload(image).await.map_err(|err| {
            tracing::warn!(product_id = %id, error = %err, "replacement image upload failed");
            AppError::Upload("Failed to upload image".into())
        })?;
        active.image = Set(url);
    }
    active.name = Set(fields.name);
    active.brand = Set(fields.brand);
    active.description = Set(fields.description);
    active.price = Set(fields.price);
    active.quantity = Set(fields.quantity);
    active.category_id = Set(category.id);
    active.updated_at = Set(Utc::now().into());
    // The row can vanish between the lookup and the write.
    let product = active
        .update(state.orm.as_ref())
        .await
        .map_err(|err| match err {
            DbErr::RecordNotUpdated => AppError::NotFound("Product"),
            other => other.into(),
        })?;

    audit::record(
        &state.pool,
        user.user_id,
        "product_update",
        "products",
        serde_json::json!({ "product_id": product.id }),
    )
    .await;

    let reviews = load_reviews(state.orm.as_ref(), &[product.id])
        .await?
        .remove(&product.id)
        .unwrap_or_default();
    Ok(product_from_entity(
        product,
        category_from_entity(category),
        reviews,
    ))
}

/// Delete a product with its reviews. `None` when nothing matched.
pub async fn delete_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<Option<Product>> {
    ensure_distributor(user)?;
    let Some(product) = find_product(state.orm.as_ref(), id).await? else {
        return Ok(None);
    };

    let result = Products::delete_by_id(id).exec(state.orm.as_ref()).await?;
    if result.rows_affected == 0 {
        return Ok(None);
    }

    audit::record(
        &state.pool,
        user.user_id,
        "product_delete",
        "products",
        serde_json::json!({ "product_id": id }),
    )
    .await;

    Ok(Some(product))
}

pub async fn get_product(state: &AppState, id: Uuid) -> AppResult<Product> {
    find_product(state.orm.as_ref(), id)
        .await?
        .ok_or(AppError::NotFound("Product"))
}

async fn find_product<C: ConnectionTrait>(db: &C, id: Uuid) -> AppResult<Option<Product>> {
    let row = Products::find_by_id(id)
        .find_also_related(Categories)
        .one(db)
        .await?;
    match row {
        Some(row) => Ok(hydrate(db, vec![row]).await?.pop()),
        None => Ok(None),
    }
}

/// Attach categories and embedded reviews to product rows, preserving row order.
pub(crate) async fn hydrate<C: ConnectionTrait>(
    db: &C,
    rows: Vec<(ProductModel, Option<CategoryModel>)>,
) -> AppResult<Vec<Product>> {
    let ids: Vec<Uuid> = rows.iter().map(|(product, _)| product.id).collect();
    let mut reviews = load_reviews(db, &ids).await?;

    rows.into_iter()
        .map(|(product, category)| {
            let category = category.ok_or_else(|| {
                AppError::Internal(anyhow!(
                    "product {} references missing category {}",
                    product.id,
                    product.category_id
                ))
            })?;
            let product_reviews = reviews.remove(&product.id).unwrap_or_default();
            Ok(product_from_entity(
                product,
                category_from_entity(category),
                product_reviews,
            ))
        })
        .collect()
}

async fn load_reviews<C: ConnectionTrait>(
    db: &C,
    product_ids: &[Uuid],
) -> AppResult<HashMap<Uuid, Vec<Review>>> {
    let mut grouped: HashMap<Uuid, Vec<Review>> = HashMap::new();
    if product_ids.is_empty() {
        return Ok(grouped);
    }

    let rows = Reviews::find()
        .filter(ReviewCol::ProductId.is_in(product_ids.to_vec()))
        .order_by_asc(ReviewCol::CreatedAt)
        .order_by_asc(ReviewCol::Id)
        .all(db)
        .await?;
    for row in rows {
        grouped
            .entry(row.product_id)
            .or_default()
            .push(review_from_entity(row));
    }
    Ok(grouped)
}

pub(crate) fn review_from_entity(model: ReviewModel) -> Review {
    Review {
        id: model.id,
        user: model.user_id,
        rating: model.rating,
        comment: model.comment,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

fn product_from_entity(
    model: ProductModel,
    category: Category,
    reviews: Vec<Review>,
) -> Product {
    Product {
        id: model.id,
        name: model.name,
        brand: model.brand,
        description: model.description,
        price: model.price,
        quantity: model.quantity,
        category,
        distributor: model.distributor_id,
        image: model.image,
        additional_images: model.additional_images,
        reviews,
        num_reviews: model.num_reviews,
        rating: model.rating,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use sea_orm::{DatabaseBackend, MockDatabase};

    use super::*;
    use crate::{
        dto::products::ProductForm,
        images::tests::FakeHost,
        models::Role,
        test_support::{category_model, mock_state, product_model, transaction_log, user},
    };

    fn form(image: Vec<u8>) -> ProductForm {
        ProductForm {
            name: Some("Trail Runner".into()),
            brand: Some("Stride".into()),
            description: Some("Light trail shoe".into()),
            price: Some("45".into()),
            category: Some("Shoes".into()),
            quantity: Some("3".into()),
            image: Some(image),
            additional_images: Vec::new(),
        }
    }

    #[tokio::test]
    async fn customers_cannot_create_products() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let state = mock_state(db, Arc::new(FakeHost::default()));

        let err = create_product(&state, &user(Role::Customer), form(vec![1]))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden));
    }

    #[tokio::test]
    async fn invalid_form_touches_nothing() {
        let host = Arc::new(FakeHost::default());
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let state = mock_state(db, host.clone());

        let incomplete = ProductForm {
            quantity: None,
            ..form(vec![1])
        };
        let err = create_product(&state, &user(Role::Distributor), incomplete)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(host.uploads.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn main_image_failure_is_an_upload_error() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![category_model("Shoes")]])
            .into_connection();
        let state = mock_state(db, Arc::new(FakeHost::default()));

        let err = create_product(&state, &user(Role::Distributor), form(vec![0]))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Upload(_)));
    }

    #[tokio::test]
    async fn update_of_unknown_product_is_not_found() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<ProductModel>::new()])
            .into_connection();
        let host = Arc::new(FakeHost::default());
        let state = mock_state(db, host.clone());

        let err = update_product(&state, &user(Role::Admin), Uuid::now_v7(), form(vec![5]))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound("Product")));
        assert!(host.uploads.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_with_failing_image_is_an_upload_error() {
        let category = category_model("Shoes");
        let existing = product_model(&category, 10.0);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![existing]])
            .append_query_results([vec![category]])
            .into_connection();
        let state = mock_state(db, Arc::new(FakeHost::default()));

        let err = update_product(&state, &user(Role::Distributor), Uuid::now_v7(), form(vec![0]))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Upload(_)));

        let log = format!("{:?}", transaction_log(state));
        assert!(!log.contains("UPDATE"));
    }

    #[tokio::test]
    async fn create_keeps_only_successful_gallery_uploads() {
        let category = category_model("Shoes");
        let stored = product_model(&category, 45.0);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![category.clone()]])
            .append_query_results([vec![stored]])
            .into_connection();
        let host = Arc::new(FakeHost::default());
        let state = mock_state(db, host.clone());

        let with_gallery = ProductForm {
            additional_images: vec![vec![7], vec![0]],
            ..form(vec![1])
        };
        let product = create_product(&state, &user(Role::Distributor), with_gallery)
            .await
            .unwrap();
        assert_eq!(product.category.id, category.id);
        assert_eq!(product.num_reviews, 0);
        assert_eq!(host.uploads.lock().unwrap().len(), 2);

        let log = format!("{:?}", transaction_log(state));
        let insert = &log[log.find("INSERT INTO").expect("product insert")..];
        assert!(insert.contains("https://img.test/1"));
        assert!(insert.contains("https://img.test/7"));
        assert_eq!(insert.matches("https://img.test/").count(), 2);
    }

    #[tokio::test]
    async fn update_resolves_category_then_replaces_image() {
        let category = category_model("Shoes");
        let existing = product_model(&category, 10.0);
        let id = existing.id;
        let updated = ProductModel {
            image: "https://img.test/5".into(),
            ..existing.clone()
        };
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![existing]])
            .append_query_results([vec![category]])
            .append_query_results([vec![updated]])
            .append_query_results([Vec::<ReviewModel>::new()])
            .into_connection();
        let state = mock_state(db, Arc::new(FakeHost::default()));

        let product = update_product(&state, &user(Role::Distributor), id, form(vec![5]))
            .await
            .unwrap();
        assert_eq!(product.image, "https://img.test/5");

        let log = format!("{:?}", transaction_log(state));
        let lookup = log.find("categories").expect("category lookup");
        let update = log.find("UPDATE").expect("product update");
        assert!(lookup < update);
        assert!(log[update..].contains("https://img.test/5"));
    }

    #[tokio::test]
    async fn product_removed_mid_update_is_not_found() {
        let category = category_model("Shoes");
        let existing = product_model(&category, 10.0);
        let id = existing.id;
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![existing]])
            .append_query_results([vec![category]])
            .append_query_results([Vec::<ProductModel>::new()])
            .into_connection();
        let state = mock_state(db, Arc::new(FakeHost::default()));

        let mut update = form(vec![1]);
        update.image = None;
        let err = update_product(&state, &user(Role::Distributor), id, update)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound("Product")));
    }

    #[tokio::test]
    async fn deleting_a_missing_product_yields_none() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<ProductModel>::new()])
            .into_connection();
        let state = mock_state(db, Arc::new(FakeHost::default()));

        let deleted = delete_product(&state, &user(Role::Distributor), Uuid::now_v7())
            .await
            .unwrap();
        assert!(deleted.is_none());
    }

    #[tokio::test]
    async fn missing_product_is_not_found() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<ProductModel>::new()])
            .into_connection();
        let state = mock_state(db, Arc::new(FakeHost::default()));

        let err = get_product(&state, Uuid::now_v7()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound("Product")));
    }
}
