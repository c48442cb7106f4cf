//! Read-only product listings: search, top/new, filter, distributor and similar.

use anyhow::anyhow;
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::sea_query::{Expr, LikeExpr, Query};
use sea_orm::{
    ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
    Select, SelectTwo,
};
use uuid::Uuid;

use crate::{
    dto::products::{CategoryKeys, FilterRequest},
    entity::{
        categories::{Column as CategoryCol, Entity as Categories},
        products::{Column, Entity as Products, Model as ProductModel},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Product, ProductSummary},
    response::ProductPage,
    routes::params::SearchQuery,
    services::{category_service::category_from_entity, product_service::hydrate},
    state::AppState,
};

pub const SEARCH_PAGE_SIZE: u64 = 6;
pub const ALL_LIMIT: u64 = 12;
pub const TOP_LIMIT: u64 = 4;
pub const NEW_LIMIT: u64 = 5;
pub const SIMILAR_LIMIT: u64 = 4;

pub async fn search(state: &AppState, query: SearchQuery) -> AppResult<ProductPage> {
    let page = query.page.unwrap_or(1).max(1);
    let offset = page_offset(page, SEARCH_PAGE_SIZE)?;
    let condition = search_condition(query.search.as_deref());

    let total = Products::find()
        .filter(condition.clone())
        .count(state.orm.as_ref())
        .await?;

    let rows = Products::find()
        .filter(condition)
        .order_by_asc(Column::Id)
        .find_also_related(Categories)
        .offset(offset)
        .limit(SEARCH_PAGE_SIZE)
        .all(state.orm.as_ref())
        .await?;
    let products = hydrate(state.orm.as_ref(), rows).await?;

    Ok(ProductPage::new(products, page, SEARCH_PAGE_SIZE, total))
}

pub async fn list_all(state: &AppState) -> AppResult<Vec<Product>> {
    let rows = Products::find()
        .order_by_desc(Column::CreatedAt)
        .find_also_related(Categories)
        .limit(ALL_LIMIT)
        .all(state.orm.as_ref())
        .await?;
    hydrate(state.orm.as_ref(), rows).await
}

pub async fn top_rated(state: &AppState) -> AppResult<Vec<Product>> {
    let rows = Products::find()
        .order_by_desc(Column::Rating)
        .find_also_related(Categories)
        .limit(TOP_LIMIT)
        .all(state.orm.as_ref())
        .await?;
    hydrate(state.orm.as_ref(), rows).await
}

/// Ids are UUIDv7, so id order is creation order.
pub async fn newest(state: &AppState) -> AppResult<Vec<Product>> {
    let rows = Products::find()
        .order_by_desc(Column::Id)
        .find_also_related(Categories)
        .limit(NEW_LIMIT)
        .all(state.orm.as_ref())
        .await?;
    hydrate(state.orm.as_ref(), rows).await
}

pub async fn filter(state: &AppState, request: FilterRequest) -> AppResult<Vec<Product>> {
    let bounds = request.price_bounds()?;
    let condition = filter_condition(&request.category_keys(), bounds);

    let rows = Products::find()
        .filter(condition)
        .order_by_asc(Column::Id)
        .find_also_related(Categories)
        .all(state.orm.as_ref())
        .await?;
    hydrate(state.orm.as_ref(), rows).await
}

pub async fn by_distributor(state: &AppState, user: &AuthUser) -> AppResult<Vec<Product>> {
    let rows = Products::find()
        .filter(Column::DistributorId.eq(user.user_id))
        .order_by_desc(Column::CreatedAt)
        .find_also_related(Categories)
        .all(state.orm.as_ref())
        .await?;
    hydrate(state.orm.as_ref(), rows).await
}

pub async fn similar(state: &AppState, id: Uuid) -> AppResult<Vec<ProductSummary>> {
    let product = Products::find_by_id(id)
        .one(state.orm.as_ref())
        .await?
        .ok_or(AppError::NotFound("Product"))?;

    similar_query(&product, SIMILAR_LIMIT)
        .all(state.orm.as_ref())
        .await?
        .into_iter()
        .map(|(model, category)| {
            let category = category
                .ok_or_else(|| AppError::Internal(anyhow!("product {} has no category", model.id)))?;
            Ok(ProductSummary {
                id: model.id,
                name: model.name,
                price: model.price,
                image: model.image,
                rating: model.rating,
                num_reviews: model.num_reviews,
                category: category_from_entity(category),
            })
        })
        .collect()
}

/// Row offset of a 1-based page; Postgres offsets are signed 64-bit.
fn page_offset(page: u64, per_page: u64) -> AppResult<u64> {
    (page - 1)
        .checked_mul(per_page)
        .filter(|offset| i64::try_from(*offset).is_ok())
        .ok_or_else(|| AppError::validation("page is out of range"))
}

/// Case-insensitive substring match on the product name.
pub(crate) fn search_condition(keyword: Option<&str>) -> Condition {
    let mut condition = Condition::all();
    if let Some(keyword) = keyword.map(str::trim).filter(|k| !k.is_empty()) {
        let pattern = format!("%{}%", escape_like(keyword));
        condition = condition.add(
            Expr::col((Products, Column::Name)).ilike(LikeExpr::new(pattern).escape('\\')),
        );
    }
    condition
}

pub(crate) fn filter_condition(keys: &CategoryKeys, bounds: Option<(f64, f64)>) -> Condition {
    let mut condition = Condition::all();

    if !keys.ids.is_empty() || !keys.names.is_empty() {
        let mut by_category = Condition::any();
        if !keys.ids.is_empty() {
            by_category = by_category.add(Column::CategoryId.is_in(keys.ids.clone()));
        }
        if !keys.names.is_empty() {
            by_category = by_category.add(
                Column::CategoryId.in_subquery(
                    Query::select()
                        .column(CategoryCol::Id)
                        .from(Categories)
                        .and_where(CategoryCol::Name.is_in(keys.names.clone()))
                        .to_owned(),
                ),
            );
        }
        condition = condition.add(by_category);
    }

    if let Some((min, max)) = bounds {
        condition = condition.add(Column::Price.between(min, max));
    }

    condition
}

pub(crate) fn similar_query(
    product: &ProductModel,
    limit: u64,
) -> SelectTwo<Products, Categories> {
    same_category(product)
        .find_also_related(Categories)
        .limit(limit)
}

fn same_category(product: &ProductModel) -> Select<Products> {
    Products::find()
        .filter(Column::CategoryId.eq(product.category_id))
        .filter(Column::Id.ne(product.id))
}

fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use sea_orm::{DatabaseBackend, MockDatabase, QueryTrait};

    use super::*;
    use crate::{
        images::tests::FakeHost,
        test_support::{category_model, mock_state, product_model, transaction_log},
    };

    fn sql(condition: Condition) -> String {
        Products::find()
            .filter(condition)
            .build(DatabaseBackend::Postgres)
            .to_string()
    }

    #[test]
    fn page_offsets_stay_within_postgres_range() {
        assert_eq!(page_offset(1, SEARCH_PAGE_SIZE).unwrap(), 0);
        assert_eq!(page_offset(3, SEARCH_PAGE_SIZE).unwrap(), 12);
        assert!(page_offset(u64::MAX, SEARCH_PAGE_SIZE).is_err());
        assert!(page_offset(i64::MAX as u64, SEARCH_PAGE_SIZE).is_err());
    }

    #[tokio::test]
    async fn huge_page_is_rejected_before_querying() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let state = mock_state(db, Arc::new(FakeHost::default()));

        let err = search(
            &state,
            SearchQuery {
                search: None,
                page: Some(u64::MAX),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(transaction_log(state).is_empty());
    }

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("boots"), "boots");
    }

    #[test]
    fn blank_search_is_unrestricted() {
        assert!(!sql(search_condition(Some("   "))).contains("ILIKE"));
        assert!(!sql(search_condition(None)).contains("ILIKE"));
    }

    #[test]
    fn search_is_case_insensitive_on_name() {
        let statement = sql(search_condition(Some("Boot")));
        assert!(statement.contains("ILIKE"));
        assert!(statement.contains("%Boot%"));
        assert!(statement.contains("\"products\".\"name\""));
    }

    #[test]
    fn filter_combines_category_and_price() {
        let keys = CategoryKeys {
            ids: Vec::new(),
            names: vec!["Shoes".into()],
        };
        let statement = sql(filter_condition(&keys, Some((10.0, 50.0))));
        assert!(statement.contains("BETWEEN 10 AND 50"));
        assert!(statement.contains("\"categories\""));
        assert!(statement.contains("'Shoes'"));
        assert!(statement.contains(" AND "));
    }

    #[test]
    fn empty_filter_is_unrestricted() {
        let statement = sql(filter_condition(&CategoryKeys::default(), None));
        assert!(!statement.contains("BETWEEN"));
        assert!(!statement.contains("\"category_id\" IN"));
    }

    #[test]
    fn category_ids_and_names_are_alternatives() {
        let id = Uuid::now_v7();
        let keys = CategoryKeys {
            ids: vec![id],
            names: vec!["Hats".into()],
        };
        let statement = sql(filter_condition(&keys, None));
        assert!(statement.contains(&id.to_string()));
        assert!(statement.contains(" OR "));
    }

    #[test]
    fn similar_excludes_the_product_itself() {
        let category = category_model("Shoes");
        let product = product_model(&category, 20.0);
        let statement = similar_query(&product, SIMILAR_LIMIT)
            .build(DatabaseBackend::Postgres)
            .to_string();

        assert!(statement.contains("\"products\".\"id\" <>"));
        assert!(statement.contains(&product.id.to_string()));
        assert!(statement.contains(&category.id.to_string()));
        assert!(statement.contains("LIMIT 4"));
    }
}
