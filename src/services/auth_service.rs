use argon2::{
    Argon2, PasswordHasher,
    password_hash::{PasswordHash, PasswordVerifier, SaltString},
};
use chrono::{Duration, Utc};
use password_hash::rand_core::OsRng;
use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

use crate::{
    audit,
    dto::auth::{Claims, LoginRequest, LoginResponse, RegisterRequest},
    entity::users::{ActiveModel, Column, Entity as Users, Model as UserModel},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, issue_token},
    models::{Role, User},
    state::AppState,
};

const TOKEN_TTL_HOURS: i64 = 24;

pub async fn register_user(state: &AppState, payload: RegisterRequest) -> AppResult<User> {
    let RegisterRequest {
        username,
        email,
        password,
        role,
    } = payload;
    let username = username.trim().to_string();
    let email = email.trim().to_lowercase();
    if username.is_empty() || email.is_empty() || password.is_empty() {
        return Err(AppError::validation(
            "username, email and password are required",
        ));
    }

    let role = role.unwrap_or(Role::Customer);
    if role == Role::Admin {
        return Err(AppError::Forbidden);
    }

    let exist = Users::find()
        .filter(Column::Email.eq(email.as_str()))
        .one(state.orm.as_ref())
        .await?;
    if exist.is_some() {
        return Err(AppError::validation("Email is already taken"));
    }

    let password_hash = hash_password(&password)?;

    let user = ActiveModel {
        id: Set(Uuid::now_v7()),
        username: Set(username),
        email: Set(email),
        password_hash: Set(password_hash),
        role: Set(role.as_str().to_string()),
        created_at: NotSet,
    }
    .insert(state.orm.as_ref())
    .await?;

    audit::record(
        &state.pool,
        user.id,
        "user_register",
        "users",
        serde_json::json!({ "user_id": user.id }),
    )
    .await;

    user_from_entity(user)
}

pub async fn login_user(state: &AppState, payload: LoginRequest) -> AppResult<LoginResponse> {
    let LoginRequest { email, password } = payload;
    let user = Users::find()
        .filter(Column::Email.eq(email.trim().to_lowercase()))
        .one(state.orm.as_ref())
        .await?
        .ok_or_else(invalid_credentials)?;

    let parsed_hash = PasswordHash::new(&user.password_hash)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("Invalid password hash")))?;
    if Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_err()
    {
        return Err(invalid_credentials());
    }

    let expiration = Utc::now()
        .checked_add_signed(Duration::hours(TOKEN_TTL_HOURS))
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to set expiration")))?;

    let claims = Claims {
        sub: user.id.to_string(),
        role: user.role.clone(),
        exp: expiration.timestamp() as usize,
    };
    let token = issue_token(&state.jwt_secret, &claims)?;

    audit::record(
        &state.pool,
        user.id,
        "user_login",
        "users",
        serde_json::json!({ "user_id": user.id }),
    )
    .await;

    Ok(LoginResponse { token })
}

pub async fn profile(state: &AppState, user: &AuthUser) -> AppResult<User> {
    let model = Users::find_by_id(user.user_id)
        .one(state.orm.as_ref())
        .await?
        .ok_or(AppError::NotFound("User"))?;
    user_from_entity(model)
}

pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))
}

fn invalid_credentials() -> AppError {
    AppError::validation("Invalid email or password")
}

fn user_from_entity(model: UserModel) -> AppResult<User> {
    let role = Role::parse(&model.role)
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("unknown role {}", model.role)))?;
    Ok(User {
        id: model.id,
        username: model.username,
        email: model.email,
        role,
        created_at: model.created_at.with_timezone(&Utc),
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use sea_orm::{DatabaseBackend, MockDatabase};

    use super::*;
    use crate::{images::tests::FakeHost, test_support::mock_state};

    #[test]
    fn hashed_password_verifies() {
        let hash = hash_password("hunter2").unwrap();
        let parsed = PasswordHash::new(&hash).unwrap();
        assert!(Argon2::default().verify_password(b"hunter2", &parsed).is_ok());
        assert!(Argon2::default().verify_password(b"hunter3", &parsed).is_err());
    }

    #[tokio::test]
    async fn admin_self_registration_is_forbidden() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let state = mock_state(db, Arc::new(FakeHost::default()));

        let err = register_user(
            &state,
            RegisterRequest {
                username: "mallory".into(),
                email: "mallory@example.com".into(),
                password: "pw".into(),
                role: Some(Role::Admin),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Forbidden));
    }

    #[tokio::test]
    async fn unknown_email_is_invalid_credentials() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<UserModel>::new()])
            .into_connection();
        let state = mock_state(db, Arc::new(FakeHost::default()));

        let err = login_user(
            &state,
            LoginRequest {
                email: "nobody@example.com".into(),
                password: "pw".into(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(msg) if msg == "Invalid email or password"));
    }
}
