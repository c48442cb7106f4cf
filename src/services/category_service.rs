use anyhow::anyhow;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
    SqlErr, ActiveValue::NotSet,
};
use uuid::Uuid;

use crate::{
    entity::categories::{ActiveModel, Column, Entity as Categories, Model as CategoryModel},
    error::{AppError, AppResult},
    models::Category,
    state::AppState,
};

/// Look a category up by exact name, creating it on first reference.
pub async fn resolve_category<C: ConnectionTrait>(db: &C, name: &str) -> AppResult<CategoryModel> {
    if let Some(existing) = find_by_name(db, name).await? {
        return Ok(existing);
    }

    let inserted = ActiveModel {
        id: Set(Uuid::now_v7()),
        name: Set(name.to_string()),
        created_at: NotSet,
    }
    .insert(db)
    .await;

    match inserted {
        Ok(category) => {
            tracing::info!(category = %category.name, id = %category.id, "category created");
            Ok(category)
        }
        // Lost a creation race on the unique name; the winner's row is the answer.
        Err(err) if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
            find_by_name(db, name)
                .await?
                .ok_or_else(|| AppError::Internal(anyhow!("category {name} missing after conflict")))
        }
        Err(err) => Err(err.into()),
    }
}

async fn find_by_name<C: ConnectionTrait>(db: &C, name: &str) -> AppResult<Option<CategoryModel>> {
    Ok(Categories::find()
        .filter(Column::Name.eq(name))
        .one(db)
        .await?)
}

pub async fn list_categories(state: &AppState) -> AppResult<Vec<Category>> {
    let categories = Categories::find()
        .order_by_asc(Column::Name)
        .all(state.orm.as_ref())
        .await?
        .into_iter()
        .map(category_from_entity)
        .collect();
    Ok(categories)
}

pub async fn get_category(state: &AppState, id: Uuid) -> AppResult<Category> {
    Categories::find_by_id(id)
        .one(state.orm.as_ref())
        .await?
        .map(category_from_entity)
        .ok_or(AppError::NotFound("Category"))
}

pub fn category_from_entity(model: CategoryModel) -> Category {
    Category {
        id: model.id,
        name: model.name,
    }
}

#[cfg(test)]
mod tests {
    use sea_orm::{DatabaseBackend, MockDatabase};

    use super::*;
    use crate::test_support::category_model;

    #[tokio::test]
    async fn existing_category_is_reused() {
        let shoes = category_model("Shoes");
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![shoes.clone()]])
            .into_connection();

        let resolved = resolve_category(&db, "Shoes").await.unwrap();
        assert_eq!(resolved.id, shoes.id);
    }

    #[tokio::test]
    async fn unseen_category_is_created() {
        let created = category_model("Hats");
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<CategoryModel>::new()])
            .append_query_results([vec![created.clone()]])
            .into_connection();

        let resolved = resolve_category(&db, "Hats").await.unwrap();
        assert_eq!(resolved.name, "Hats");
    }
}
