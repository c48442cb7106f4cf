use shop_sphere_api::{
    config::AppConfig,
    db::{create_pool, run_migrations},
    services::auth_service::hash_password,
};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url).await?;
    run_migrations(&pool).await?;

    let admin_id = ensure_user(&pool, "admin", "admin@example.com", "admin123", "admin").await?;
    let distributor_id =
        ensure_user(&pool, "acme", "distributor@example.com", "dist123", "distributor").await?;
    let customer_id =
        ensure_user(&pool, "jane", "customer@example.com", "customer123", "customer").await?;
    seed_products(&pool, distributor_id).await?;

    println!(
        "Seed completed. Admin ID: {admin_id}, Distributor ID: {distributor_id}, Customer ID: {customer_id}"
    );
    Ok(())
}

async fn ensure_user(
    pool: &sqlx::PgPool,
    username: &str,
    email: &str,
    password: &str,
    role: &str,
) -> anyhow::Result<Uuid> {
    let password_hash = hash_password(password).map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let (user_id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO users (id, username, email, password_hash, role)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (email) DO UPDATE SET role = EXCLUDED.role
        RETURNING id
        "#,
    )
    .bind(Uuid::now_v7())
    .bind(username)
    .bind(email)
    .bind(password_hash)
    .bind(role)
    .fetch_one(pool)
    .await?;

    println!("Ensured user {email} (role={role})");
    Ok(user_id)
}

async fn ensure_category(pool: &sqlx::PgPool, name: &str) -> anyhow::Result<Uuid> {
    let (id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO categories (id, name)
        VALUES ($1, $2)
        ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
        RETURNING id
        "#,
    )
    .bind(Uuid::now_v7())
    .bind(name)
    .fetch_one(pool)
    .await?;
    Ok(id)
}

async fn seed_products(pool: &sqlx::PgPool, distributor_id: Uuid) -> anyhow::Result<()> {
    let products = [
        ("Trail Runner", "Stride", "Light trail running shoe", 49.0, 30, "Shoes"),
        ("City Sneaker", "Stride", "Everyday canvas sneaker", 35.5, 40, "Shoes"),
        ("Rain Shell", "Northline", "Packable waterproof jacket", 89.0, 15, "Jackets"),
        ("Wool Beanie", "Northline", "Merino wool beanie", 19.99, 60, "Hats"),
    ];

    let existing: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM products")
        .fetch_one(pool)
        .await?;
    if existing.0 > 0 {
        println!("Products already present, skipping");
        return Ok(());
    }

    for (name, brand, description, price, quantity, category) in products {
        let category_id = ensure_category(pool, category).await?;
        sqlx::query(
            r#"
            INSERT INTO products
                (id, name, brand, description, price, quantity, category_id, distributor_id, image)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(name)
        .bind(brand)
        .bind(description)
        .bind(price)
        .bind(quantity)
        .bind(category_id)
        .bind(distributor_id)
        .bind(format!("https://placehold.co/600x600?text={}", name.replace(' ', "+")))
        .execute(pool)
        .await?;
    }

    println!("Seeded products");
    Ok(())
}
