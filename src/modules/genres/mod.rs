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

/// Genre taxonomy. Titles attach to genres many-to-many; deleting a genre
/// detaches it from titles through the join-table cascade.
pub struct GenresModule;

impl GenresModule {
    pub const fn new() -> Self {
        Self
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Genre {
    #[serde(skip_serializing)]
    pub id: i64,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateGenre {
    pub name: String,
    pub slug: String,
}

#[async_trait]
impl Module for GenresModule {
    fn name(&self) -> &'static str {
        "genres"
    }

    fn routes(&self, ctx: &AppCtx) -> Router {
        Router::new()
            .route("/", get(list_genres).post(create_genre))
            .route("/{slug}", delete(delete_genre))
            .with_state(ctx.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        Some(json!({
            "paths": {
                "/": {
                    "get": {"summary": "List genres", "tags": ["Genres"]},
                    "post": {"summary": "Create a genre (admin)", "tags": ["Genres"]}
                },
                "/{slug}": {
                    "delete": {"summary": "Delete a genre (admin)", "tags": ["Genres"]}
                }
            },
            "components": {
                "schemas": {
                    "Genre": {
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
            id: "001_genres",
            up: r#"
                CREATE TABLE genres (
                    id   INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL,
                    slug TEXT NOT NULL UNIQUE
                );
                "#,
        }]
    }
}

pub async fn list(pool: &SqlitePool) -> Result<Vec<Genre>, AppError> {
    let genres = sqlx::query_as::<_, Genre>("SELECT * FROM genres ORDER BY id ASC")
        .fetch_all(pool)
        .await?;
    Ok(genres)
}

pub async fn get_by_slug(pool: &SqlitePool, slug: &str) -> Result<Option<Genre>, AppError> {
    let genre = sqlx::query_as::<_, Genre>("SELECT * FROM genres WHERE slug = ?1")
        .bind(slug)
        .fetch_optional(pool)
        .await?;
    Ok(genre)
}

pub async fn for_title(pool: &SqlitePool, title_id: i64) -> Result<Vec<Genre>, AppError> {
    let genres = sqlx::query_as::<_, Genre>(
        r#"
        SELECT g.id, g.name, g.slug
        FROM genres g
        JOIN title_genres tg ON tg.genre_id = g.id
        WHERE tg.title_id = ?1
        ORDER BY g.id ASC
        "#,
    )
    .bind(title_id)
    .fetch_all(pool)
    .await?;
    Ok(genres)
}

pub async fn create(pool: &SqlitePool, input: &CreateGenre) -> Result<Genre, AppError> {
    if input.name.is_empty() {
        return Err(AppError::invalid_field("name", "must not be empty"));
    }
    if input.slug.is_empty() {
        return Err(AppError::invalid_field("slug", "must not be empty"));
    }
    if get_by_slug(pool, &input.slug).await?.is_some() {
        return Err(AppError::conflict("genre slug already exists"));
    }

    let genre =
        sqlx::query_as::<_, Genre>("INSERT INTO genres (name, slug) VALUES (?1, ?2) RETURNING *")
            .bind(&input.name)
            .bind(&input.slug)
            .fetch_one(pool)
            .await?;
    Ok(genre)
}

pub async fn delete_by_slug(pool: &SqlitePool, slug: &str) -> Result<(), AppError> {
    let result = sqlx::query("DELETE FROM genres WHERE slug = ?1")
        .bind(slug)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found("genre not found"));
    }
    Ok(())
}

async fn list_genres(State(ctx): State<AppCtx>) -> Result<Json<Vec<Genre>>, AppError> {
    Ok(Json(list(&ctx.db).await?))
}

async fn create_genre(
    State(ctx): State<AppCtx>,
    current: CurrentUser,
    Json(input): Json<CreateGenre>,
) -> Result<(StatusCode, Json<Genre>), AppError> {
    ensure(resolve_catalog(Some(&current.actor()), Action::Create))?;

    let genre = create(&ctx.db, &input).await?;
    Ok((StatusCode::CREATED, Json(genre)))
}

async fn delete_genre(
    State(ctx): State<AppCtx>,
    current: CurrentUser,
    Path(slug): Path<String>,
) -> Result<StatusCode, AppError> {
    ensure(resolve_catalog(Some(&current.actor()), Action::Delete))?;

    delete_by_slug(&ctx.db, &slug).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Create a new instance of the genres module
pub fn create_module() -> std::sync::Arc<dyn Module> {
    std::sync::Arc::new(GenresModule::new())
}
