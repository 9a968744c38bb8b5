pub mod models;
pub mod store;

use async_trait::async_trait;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

use medley_authz::resolve_accounts;
use medley_http::error::AppError;
use medley_kernel::{AppCtx, Migration, Module};

use crate::extract::{ensure, CurrentUser};
use models::{AdminUpdateUser, CreateUser, UpdateProfile, UserOut};

/// Account administration and self-service profile module.
pub struct UsersModule;

impl UsersModule {
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Module for UsersModule {
    fn name(&self) -> &'static str {
        "users"
    }

    async fn init(&self, ctx: &AppCtx) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            "users module initialized"
        );
        Ok(())
    }

    fn routes(&self, ctx: &AppCtx) -> Router {
        Router::new()
            .route("/", get(list_users).post(create_user))
            .route("/me", get(me).patch(update_me))
            .route(
                "/{username}",
                get(get_user).patch(update_user).delete(delete_user),
            )
            .with_state(ctx.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        Some(json!({
            "paths": {
                "/": {
                    "get": {"summary": "List accounts (admin)", "tags": ["Users"]},
                    "post": {"summary": "Create an account (admin)", "tags": ["Users"]}
                },
                "/me": {
                    "get": {"summary": "Current user's profile", "tags": ["Users"]},
                    "patch": {"summary": "Update own profile (role immutable)", "tags": ["Users"]}
                },
                "/{username}": {
                    "get": {"summary": "Fetch an account (admin)", "tags": ["Users"]},
                    "patch": {"summary": "Update an account (admin)", "tags": ["Users"]},
                    "delete": {"summary": "Delete an account (admin)", "tags": ["Users"]}
                }
            },
            "components": {
                "schemas": {
                    "User": {
                        "type": "object",
                        "properties": {
                            "username": {"type": "string"},
                            "email": {"type": "string"},
                            "role": {"type": "string", "enum": ["user", "moderator", "admin"]},
                            "first_name": {"type": "string"},
                            "last_name": {"type": "string"},
                            "bio": {"type": "string"}
                        },
                        "required": ["username", "email", "role"]
                    }
                }
            }
        }))
    }

    fn migrations(&self) -> Vec<Migration> {
        vec![Migration {
            id: "001_users",
            up: r#"
                CREATE TABLE users (
                    id                INTEGER PRIMARY KEY AUTOINCREMENT,
                    username          TEXT NOT NULL UNIQUE,
                    email             TEXT NOT NULL UNIQUE,
                    role              TEXT NOT NULL DEFAULT 'user',
                    confirmation_code TEXT NOT NULL DEFAULT '',
                    first_name        TEXT NOT NULL DEFAULT '',
                    last_name         TEXT NOT NULL DEFAULT '',
                    bio               TEXT NOT NULL DEFAULT '',
                    is_superuser      INTEGER NOT NULL DEFAULT 0
                );
                "#,
        }]
    }
}

async fn list_users(
    State(ctx): State<AppCtx>,
    current: CurrentUser,
) -> Result<Json<Vec<UserOut>>, AppError> {
    ensure(resolve_accounts(Some(&current.actor())))?;

    let users = store::list(&ctx.db).await?;
    Ok(Json(users.into_iter().map(UserOut::from).collect()))
}

async fn create_user(
    State(ctx): State<AppCtx>,
    current: CurrentUser,
    Json(input): Json<CreateUser>,
) -> Result<(StatusCode, Json<UserOut>), AppError> {
    ensure(resolve_accounts(Some(&current.actor())))?;

    store::validate_new_account(&ctx.db, &input.username, &input.email).await?;
    let user = store::create(&ctx.db, &input, "").await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

async fn me(current: CurrentUser) -> Json<UserOut> {
    Json(current.0.into())
}

async fn update_me(
    State(ctx): State<AppCtx>,
    current: CurrentUser,
    Json(patch): Json<UpdateProfile>,
) -> Result<Json<UserOut>, AppError> {
    let user = store::update_profile(&ctx.db, current.0.id, &patch).await?;
    Ok(Json(user.into()))
}

async fn get_user(
    State(ctx): State<AppCtx>,
    current: CurrentUser,
    Path(username): Path<String>,
) -> Result<Json<UserOut>, AppError> {
    ensure(resolve_accounts(Some(&current.actor())))?;

    let user = store::get_by_username(&ctx.db, &username)
        .await?
        .ok_or_else(|| AppError::not_found("user not found"))?;
    Ok(Json(user.into()))
}

async fn update_user(
    State(ctx): State<AppCtx>,
    current: CurrentUser,
    Path(username): Path<String>,
    Json(patch): Json<AdminUpdateUser>,
) -> Result<Json<UserOut>, AppError> {
    ensure(resolve_accounts(Some(&current.actor())))?;

    let user = store::admin_update(&ctx.db, &username, &patch).await?;
    Ok(Json(user.into()))
}

async fn delete_user(
    State(ctx): State<AppCtx>,
    current: CurrentUser,
    Path(username): Path<String>,
) -> Result<StatusCode, AppError> {
    ensure(resolve_accounts(Some(&current.actor())))?;

    store::delete_by_username(&ctx.db, &username).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Create a new instance of the users module
pub fn create_module() -> std::sync::Arc<dyn Module> {
    std::sync::Arc::new(UsersModule::new())
}

#[cfg(test)]
mod tests {
    use super::models::{CreateUser, UpdateProfile};
    use super::store;
    use crate::test_support::test_ctx;
    use medley_authz::Role;

    fn new_user(username: &str, email: &str, role: Option<Role>) -> CreateUser {
        CreateUser {
            username: username.to_string(),
            email: email.to_string(),
            role,
            first_name: None,
            last_name: None,
            bio: None,
        }
    }

    #[tokio::test]
    async fn create_and_fetch_roundtrip() {
        let ctx = test_ctx().await;

        let created = store::create(&ctx.db, &new_user("alice", "a@x.com", None), "code")
            .await
            .unwrap();
        assert_eq!(created.role(), Role::User);
        assert_eq!(created.confirmation_code, "code");

        let fetched = store::get_by_username(&ctx.db, "alice").await.unwrap();
        assert_eq!(fetched.unwrap().id, created.id);
    }

    #[tokio::test]
    async fn duplicate_username_rejected_before_insert() {
        let ctx = test_ctx().await;
        store::create(&ctx.db, &new_user("alice", "a@x.com", None), "")
            .await
            .unwrap();

        let err = store::validate_new_account(&ctx.db, "alice", "other@x.com")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            medley_http::error::AppError::Validation { .. }
        ));

        let err = store::validate_new_account(&ctx.db, "bob", "a@x.com")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            medley_http::error::AppError::Validation { .. }
        ));
    }

    #[tokio::test]
    async fn unique_constraint_backstops_races() {
        let ctx = test_ctx().await;
        store::create(&ctx.db, &new_user("alice", "a@x.com", None), "")
            .await
            .unwrap();

        // Insert bypassing the pre-check, as a concurrent request would.
        let err = store::create(&ctx.db, &new_user("alice", "b@x.com", None), "")
            .await
            .unwrap_err();
        assert!(matches!(err, medley_http::error::AppError::Conflict { .. }));
    }

    #[tokio::test]
    async fn profile_update_cannot_touch_role() {
        let ctx = test_ctx().await;
        let user = store::create(&ctx.db, &new_user("alice", "a@x.com", None), "")
            .await
            .unwrap();

        let patch = UpdateProfile {
            bio: Some("hello".to_string()),
            ..Default::default()
        };
        let updated = store::update_profile(&ctx.db, user.id, &patch).await.unwrap();
        assert_eq!(updated.bio, "hello");
        assert_eq!(updated.role(), Role::User);
    }

    #[tokio::test]
    async fn admin_update_changes_role() {
        let ctx = test_ctx().await;
        store::create(&ctx.db, &new_user("alice", "a@x.com", None), "")
            .await
            .unwrap();

        let patch = super::models::AdminUpdateUser {
            role: Some(Role::Moderator),
            ..Default::default()
        };
        let updated = store::admin_update(&ctx.db, "alice", &patch).await.unwrap();
        assert_eq!(updated.role(), Role::Moderator);
    }

    #[tokio::test]
    async fn delete_missing_user_is_not_found() {
        let ctx = test_ctx().await;
        let err = store::delete_by_username(&ctx.db, "ghost").await.unwrap_err();
        assert!(matches!(err, medley_http::error::AppError::NotFound { .. }));
    }
}
