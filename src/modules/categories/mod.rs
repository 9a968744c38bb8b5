use async_trait::async_trait;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{FromRow, SqlitePool};

use medley_authz::{resolve_catalog, Action};
use medley_http::error::AppError;
use medley_kernel::{AppCtx, Migration, Module};

use crate::extract::{ensure, CurrentUser};

/// Category taxonomy: flat list, unique slug, admin-only mutation.
/// Titles referencing a deleted category fall back to no category (SET NULL).
pub struct CategoriesModule;

impl CategoriesModule {
    pub const fn new() -> Self {
        Self
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Category {
    #[serde(skip_serializing)]
    pub id: i64,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateCategory {
    pub name: String,
    pub slug: String,
}

#[async_trait]
impl Module for CategoriesModule {
    fn name(&self) -> &'static str {
        "categories"
    }

    fn routes(&self, ctx: &AppCtx) -> Router {
        Router::new()
            .route("/", get(list_categories).post(create_category))
            .route("/{slug}", delete(delete_category))
            .with_state(ctx.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        Some(json!({
            "paths": {
                "/": {
                    "get": {"summary": "List categories", "tags": ["Categories"]},
                    "post": {"summary": "Create a category (admin)", "tags": ["Categories"]}
                },
                "/{slug}": {
                    "delete": {"summary": "Delete a category (admin)", "tags": ["Categories"]}
                }
            },
            "components": {
                "schemas": {
                    "Category": {
                        "type": "object",
                        "properties": {
                            "name": {"type": "string"},
                            "slug": {"type": "string"}
                        },
                        "required": ["name", "slug"]
                    }
                }
            }
        }))
    }

    fn migrations(&self) -> Vec<Migration> {
        vec![Migration {
            id: "001_categories",
            up: r#"
                CREATE TABLE categories (
                    id   INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL,
                    slug TEXT NOT NULL UNIQUE
                );
                "#,
        }]
    }
}

pub async fn list(pool: &SqlitePool) -> Result<Vec<Category>, AppError> {
    let categories = sqlx::query_as::<_, Category>("SELECT * FROM categories ORDER BY id ASC")
        .fetch_all(pool)
        .await?;
    Ok(categories)
}

pub async fn get_by_id(pool: &SqlitePool, id: i64) -> Result<Option<Category>, AppError> {
    let category = sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE id = ?1")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(category)
}

pub async fn get_by_slug(pool: &SqlitePool, slug: &str) -> Result<Option<Category>, AppError> {
    let category = sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE slug = ?1")
        .bind(slug)
        .fetch_optional(pool)
        .await?;
    Ok(category)
}

pub async fn create(pool: &SqlitePool, input: &CreateCategory) -> Result<Category, AppError> {
    if input.name.is_empty() {
        return Err(AppError::invalid_field("name", "must not be empty"));
    }
    if input.slug.is_empty() {
        return Err(AppError::invalid_field("slug", "must not be empty"));
    }
    if get_by_slug(pool, &input.slug).await?.is_some() {
        return Err(AppError::conflict("category slug already exists"));
    }

    let category = sqlx::query_as::<_, Category>(
        "INSERT INTO categories (name, slug) VALUES (?1, ?2) RETURNING *",
    )
    .bind(&input.name)
    .bind(&input.slug)
    .fetch_one(pool)
    .await?;
    Ok(category)
}

pub async fn delete_by_slug(pool: &SqlitePool, slug: &str) -> Result<(), AppError> {
    let result = sqlx::query("DELETE FROM categories WHERE slug = ?1")
        .bind(slug)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found("category not found"));
    }
    Ok(())
}

async fn list_categories(State(ctx): State<AppCtx>) -> Result<Json<Vec<Category>>, AppError> {
    Ok(Json(list(&ctx.db).await?))
}

async fn create_category(
    State(ctx): State<AppCtx>,
    current: CurrentUser,
    Json(input): Json<CreateCategory>,
) -> Result<(StatusCode, Json<Category>), AppError> {
    ensure(resolve_catalog(Some(&current.actor()), Action::Create))?;

    let category = create(&ctx.db, &input).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

async fn delete_category(
    State(ctx): State<AppCtx>,
    current: CurrentUser,
    Path(slug): Path<String>,
) -> Result<StatusCode, AppError> {
    ensure(resolve_catalog(Some(&current.actor()), Action::Delete))?;

    delete_by_slug(&ctx.db, &slug).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Create a new instance of the categories module
pub fn create_module() -> std::sync::Arc<dyn Module> {
    std::sync::Arc::new(CategoriesModule::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_ctx;

    #[tokio::test]
    async fn create_list_delete_roundtrip() {
        let ctx = test_ctx().await;

        let input = CreateCategory {
            name: "Books".to_string(),
            slug: "books".to_string(),
        };
        let created = create(&ctx.db, &input).await.unwrap();
        assert_eq!(created.slug, "books");

        let all = list(&ctx.db).await.unwrap();
        assert_eq!(all.len(), 1);

        delete_by_slug(&ctx.db, "books").await.unwrap();
        assert!(list(&ctx.db).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_slug_is_conflict() {
        let ctx = test_ctx().await;
        let input = CreateCategory {
            name: "Books".to_string(),
            slug: "books".to_string(),
        };
        create(&ctx.db, &input).await.unwrap();

        let err = create(&ctx.db, &input).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict { .. }));
    }

    #[tokio::test]
    async fn delete_missing_slug_is_not_found() {
        let ctx = test_ctx().await;
        let err = delete_by_slug(&ctx.db, "nope").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound { .. }));
    }
}
