use medley_authz::Role;
use medley_http::error::AppError;
use sqlx::SqlitePool;

use super::models::{AdminUpdateUser, CreateUser, UpdateProfile, User};

/// Validate username/email shape and global uniqueness. Runs before any
/// mutation so a failed request writes nothing.
pub async fn validate_new_account(
    pool: &SqlitePool,
    username: &str,
    email: &str,
) -> Result<(), AppError> {
    if username.is_empty() {
        return Err(AppError::invalid_field("username", "must not be empty"));
    }
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::invalid_field("email", "must be a valid address"));
    }
    if username_exists(pool, username).await? {
        return Err(AppError::invalid_field("username", "already in use"));
    }
    if email_exists(pool, email).await? {
        return Err(AppError::invalid_field("email", "already in use"));
    }
    Ok(())
}

pub async fn username_exists(pool: &SqlitePool, username: &str) -> Result<bool, AppError> {
    let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM users WHERE username = ?1")
        .bind(username)
        .fetch_optional(pool)
        .await?;
    Ok(row.is_some())
}

pub async fn email_exists(pool: &SqlitePool, email: &str) -> Result<bool, AppError> {
    let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM users WHERE email = ?1")
        .bind(email)
        .fetch_optional(pool)
        .await?;
    Ok(row.is_some())
}

/// Insert an account. The UNIQUE constraints on username/email are the final
/// arbiter under concurrent signups; violations surface as ConflictError.
pub async fn create(
    pool: &SqlitePool,
    input: &CreateUser,
    confirmation_code: &str,
) -> Result<User, AppError> {
    let user = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (username, email, role, confirmation_code, first_name, last_name, bio)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        RETURNING *
        "#,
    )
    .bind(&input.username)
    .bind(&input.email)
    .bind(input.role.unwrap_or(Role::User).as_str())
    .bind(confirmation_code)
    .bind(input.first_name.as_deref().unwrap_or(""))
    .bind(input.last_name.as_deref().unwrap_or(""))
    .bind(input.bio.as_deref().unwrap_or(""))
    .fetch_one(pool)
    .await?;

    Ok(user)
}

pub async fn list(pool: &SqlitePool) -> Result<Vec<User>, AppError> {
    let users = sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY id ASC")
        .fetch_all(pool)
        .await?;
    Ok(users)
}

pub async fn get_by_id(pool: &SqlitePool, id: i64) -> Result<Option<User>, AppError> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?1")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(user)
}

pub async fn get_by_username(pool: &SqlitePool, username: &str) -> Result<Option<User>, AppError> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = ?1")
        .bind(username)
        .fetch_optional(pool)
        .await?;
    Ok(user)
}

/// Admin partial update keyed by username.
pub async fn admin_update(
    pool: &SqlitePool,
    username: &str,
    patch: &AdminUpdateUser,
) -> Result<User, AppError> {
    let user = sqlx::query_as::<_, User>(
        r#"
        UPDATE users SET
            username   = COALESCE(?1, username),
            email      = COALESCE(?2, email),
            role       = COALESCE(?3, role),
            first_name = COALESCE(?4, first_name),
            last_name  = COALESCE(?5, last_name),
            bio        = COALESCE(?6, bio)
        WHERE username = ?7
        RETURNING *
        "#,
    )
    .bind(patch.username.as_deref())
    .bind(patch.email.as_deref())
    .bind(patch.role.map(|role| role.as_str()))
    .bind(patch.first_name.as_deref())
    .bind(patch.last_name.as_deref())
    .bind(patch.bio.as_deref())
    .bind(username)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("user not found"))?;

    Ok(user)
}

/// Self-service profile update; only name and bio fields are touched.
pub async fn update_profile(
    pool: &SqlitePool,
    user_id: i64,
    patch: &UpdateProfile,
) -> Result<User, AppError> {
    let user = sqlx::query_as::<_, User>(
        r#"
        UPDATE users SET
            first_name = COALESCE(?1, first_name),
            last_name  = COALESCE(?2, last_name),
            bio        = COALESCE(?3, bio)
        WHERE id = ?4
        RETURNING *
        "#,
    )
    .bind(patch.first_name.as_deref())
    .bind(patch.last_name.as_deref())
    .bind(patch.bio.as_deref())
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("user not found"))?;

    Ok(user)
}

pub async fn delete_by_username(pool: &SqlitePool, username: &str) -> Result<(), AppError> {
    let result = sqlx::query("DELETE FROM users WHERE username = ?1")
        .bind(username)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found("user not found"));
    }
    Ok(())
}
