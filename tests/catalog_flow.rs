use std::sync::Arc;

use async_trait::async_trait;
use shop_sphere_api::{
    db::{create_pool, orm_from_pool, run_migrations},
    dto::{
        products::{FilterRequest, ProductForm},
        reviews::CreateReviewRequest,
    },
    error::AppError,
    images::ImageHost,
    middleware::auth::AuthUser,
    models::Role,
    routes::params::SearchQuery,
    services::{catalog_service, product_service, review_service},
    state::AppState,
};
use uuid::Uuid;

/// Accepts everything except images that start with a zero byte.
struct StubHost;

#[async_trait]
impl ImageHost for StubHost {
    async fn upload(&self, image: Vec<u8>) -> anyhow::Result<String> {
        match image.first() {
            Some(0) | None => anyhow::bail!("rejected"),
            Some(tag) => Ok(format!("https://img.test/{tag}")),
        }
    }
}

// Integration flow: distributor lists products, customers review, storefront queries.
#[tokio::test]
async fn create_review_and_query_flow() -> anyhow::Result<()> {
    // Allow skipping when no DB is configured in the environment.
    let database_url = match std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
    {
        Ok(url) => url,
        Err(_) => {
            eprintln!(
                "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests."
            );
            return Ok(());
        }
    };

    let state = setup_state(&database_url).await?;

    let distributor = AuthUser {
        user_id: create_user(&state, "acme", "distributor").await?,
        role: Role::Distributor,
    };
    let alice = AuthUser {
        user_id: create_user(&state, "alice", "customer").await?,
        role: Role::Customer,
    };
    let bob = AuthUser {
        user_id: create_user(&state, "bob", "customer").await?,
        role: Role::Customer,
    };

    // One additional image fails; the product is still created with the rest in order.
    let runner = product_service::create_product(
        &state,
        &distributor,
        form("Trail Runner", "30", "Shoes", vec![vec![2], vec![0], vec![3]]),
    )
    .await?;
    assert_eq!(runner.image, "https://img.test/1");
    assert_eq!(
        runner.additional_images,
        vec!["https://img.test/2", "https://img.test/3"]
    );
    assert_eq!(runner.category.name, "Shoes");
    assert_eq!(runner.num_reviews, 0);
    assert_eq!(runner.rating, 0.0);

    let boot = product_service::create_product(
        &state,
        &distributor,
        form("Winter Boot", "70", "Shoes", Vec::new()),
    )
    .await?;
    // Same category name resolves to the same category.
    assert_eq!(boot.category.id, runner.category.id);

    let hat = product_service::create_product(
        &state,
        &distributor,
        form("Wool Beanie", "20", "Hats", Vec::new()),
    )
    .await?;

    // Customers cannot list products.
    let denied = product_service::create_product(
        &state,
        &alice,
        form("Nope", "1", "Shoes", Vec::new()),
    )
    .await;
    assert!(matches!(denied, Err(AppError::Forbidden)));

    // Reviews keep the aggregate equal to count and mean of all ratings.
    review_service::add_review(&state, &alice, runner.id, review(4, "comfy")).await?;
    review_service::add_review(&state, &bob, runner.id, review(5, "great grip")).await?;
    let reviewed = product_service::get_product(&state, runner.id).await?;
    assert_eq!(reviewed.num_reviews, 2);
    assert!((reviewed.rating - 4.5).abs() < 1e-9);
    assert_eq!(reviewed.reviews.len(), 2);

    let duplicate = review_service::add_review(&state, &alice, runner.id, review(3, "again")).await;
    assert!(matches!(duplicate, Err(AppError::Duplicate(_))));
    for rating in [0, 6] {
        let invalid =
            review_service::add_review(&state, &alice, boot.id, review(rating, "x")).await;
        assert!(matches!(invalid, Err(AppError::Validation(_))));
    }
    let unchanged = product_service::get_product(&state, runner.id).await?;
    assert_eq!(unchanged.num_reviews, 2);

    let listed = review_service::get_reviews(&state, runner.id).await?;
    let names: Vec<_> = listed.iter().map(|r| r.user.username.as_str()).collect();
    assert_eq!(names, vec!["alice", "bob"]);

    // Filter: category by name and inclusive price range.
    let filtered = catalog_service::filter(
        &state,
        FilterRequest {
            categories: vec!["Shoes".into()],
            price_range: vec![10.0, 50.0],
        },
    )
    .await?;
    let ids: Vec<_> = filtered.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![runner.id]);

    let everything = catalog_service::filter(&state, FilterRequest::default()).await?;
    assert_eq!(everything.len(), 3);

    // Similar never contains the product itself.
    let similar = catalog_service::similar(&state, runner.id).await?;
    assert_eq!(similar.len(), 1);
    assert_eq!(similar[0].id, boot.id);

    // Top and newest.
    let top = catalog_service::top_rated(&state).await?;
    assert_eq!(top[0].id, runner.id);
    let newest = catalog_service::newest(&state).await?;
    assert_eq!(newest[0].id, hat.id);

    // Search envelope.
    let page = catalog_service::search(
        &state,
        SearchQuery {
            search: Some("BOOT".into()),
            page: Some(1),
        },
    )
    .await?;
    assert_eq!(page.products.len(), 1);
    assert_eq!(page.page, 1);
    assert_eq!(page.pages, 1);
    assert!(!page.has_more);

    // Update keeps the stored image when none is sent.
    let mut update = form("Trail Runner 2", "32", "Shoes", Vec::new());
    update.image = None;
    let updated = product_service::update_product(&state, &distributor, runner.id, update).await?;
    assert_eq!(updated.name, "Trail Runner 2");
    assert_eq!(updated.image, runner.image);

    // Delete cascades reviews; a second delete finds nothing.
    let deleted = product_service::delete_product(&state, &distributor, runner.id).await?;
    assert_eq!(deleted.map(|p| p.id), Some(runner.id));
    assert!(
        product_service::delete_product(&state, &distributor, runner.id)
            .await?
            .is_none()
    );
    assert!(matches!(
        review_service::get_reviews(&state, runner.id).await,
        Err(AppError::NotFound(_))
    ));

    Ok(())
}

fn form(name: &str, price: &str, category: &str, additional: Vec<Vec<u8>>) -> ProductForm {
    ProductForm {
        name: Some(name.into()),
        brand: Some("Stride".into()),
        description: Some(format!("{name} description")),
        price: Some(price.into()),
        category: Some(category.into()),
        quantity: Some("5".into()),
        image: Some(vec![1]),
        additional_images: additional,
    }
}

fn review(rating: i32, comment: &str) -> CreateReviewRequest {
    CreateReviewRequest {
        rating: Some(rating),
        comment: Some(comment.into()),
    }
}

async fn setup_state(database_url: &str) -> anyhow::Result<AppState> {
    let pool = create_pool(database_url).await?;
    run_migrations(&pool).await?;

    // Clean tables between runs
    sqlx::query(
        "TRUNCATE TABLE reviews, products, categories, blogs, audit_logs, users RESTART IDENTITY CASCADE",
    )
    .execute(&pool)
    .await?;

    Ok(AppState {
        orm: Arc::new(orm_from_pool(&pool)),
        pool,
        images: Arc::new(StubHost),
        jwt_secret: Arc::from("integration-secret"),
    })
}

async fn create_user(state: &AppState, username: &str, role: &str) -> anyhow::Result<Uuid> {
    let (id,): (Uuid,) = sqlx::query_as(
        "INSERT INTO users (id, username, email, password_hash, role) VALUES ($1, $2, $3, 'dummy', $4) RETURNING id",
    )
    .bind(Uuid::now_v7())
    .bind(username)
    .bind(format!("{username}@example.com"))
    .bind(role)
    .fetch_one(&state.pool)
    .await?;
    Ok(id)
}
