pub mod comments;
pub mod models;
pub mod rating;
pub mod reviews;
pub mod store;

use async_trait::async_trait;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

use medley_authz::{resolve_catalog, Action};
use medley_http::error::AppError;
use medley_kernel::{AppCtx, Migration, Module};

use crate::extract::{ensure, CurrentUser};
use models::{CreateTitle, TitleOut, UpdateTitle};

/// Catalog of titles with nested review and comment resources.
pub struct TitlesModule;

impl TitlesModule {
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Module for TitlesModule {
    fn name(&self) -> &'static str {
        "titles"
    }

    async fn init(&self, ctx: &AppCtx) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            "titles module initialized"
        );
        Ok(())
    }

    fn routes(&self, ctx: &AppCtx) -> Router {
        Router::new()
            .route("/", get(list_titles).post(create_title))
            .route(
                "/{id}",
                get(get_title).patch(update_title).delete(delete_title),
            )
            .route(
                "/{title_id}/reviews",
                get(reviews::list_reviews).post(reviews::create_review),
            )
            .route(
                "/{title_id}/reviews/{review_id}",
                get(reviews::get_review)
                    .patch(reviews::update_review)
                    .delete(reviews::delete_review),
            )
            .route(
                "/{title_id}/reviews/{review_id}/comments",
                get(comments::list_comments).post(comments::create_comment),
            )
            .route(
                "/{title_id}/reviews/{review_id}/comments/{comment_id}",
                get(comments::get_comment)
                    .patch(comments::update_comment)
                    .delete(comments::delete_comment),
            )
            .with_state(ctx.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        Some(json!({
            "paths": {
                "/": {
                    "get": {"summary": "List titles with derived rating, newest year first", "tags": ["Titles"]},
                    "post": {"summary": "Create a title (admin)", "tags": ["Titles"]}
                },
                "/{id}": {
                    "get": {"summary": "Fetch a title with derived rating", "tags": ["Titles"]},
                    "patch": {"summary": "Update a title (admin)", "tags": ["Titles"]},
                    "delete": {"summary": "Delete a title and cascade its reviews (admin)", "tags": ["Titles"]}
                },
                "/{title_id}/reviews": {
                    "get": {"summary": "List reviews for a title", "tags": ["Reviews"]},
                    "post": {"summary": "Create the caller's review, one per title", "tags": ["Reviews"]}
                },
                "/{title_id}/reviews/{review_id}": {
                    "get": {"summary": "Fetch a review", "tags": ["Reviews"]},
                    "patch": {"summary": "Update a review (author or staff)", "tags": ["Reviews"]},
                    "delete": {"summary": "Delete a review (author or staff)", "tags": ["Reviews"]}
                },
                "/{title_id}/reviews/{review_id}/comments": {
                    "get": {"summary": "List comments on a review", "tags": ["Comments"]},
                    "post": {"summary": "Comment on a review", "tags": ["Comments"]}
                },
                "/{title_id}/reviews/{review_id}/comments/{comment_id}": {
                    "get": {"summary": "Fetch a comment", "tags": ["Comments"]},
                    "patch": {"summary": "Update a comment (author or staff)", "tags": ["Comments"]},
                    "delete": {"summary": "Delete a comment (author or staff)", "tags": ["Comments"]}
                }
            },
            "components": {
                "schemas": {
                    "Title": {
                        "type": "object",
                        "properties": {
                            "id": {"type": "integer"},
                            "name": {"type": "string"},
                            "year": {"type": "integer"},
                            "rating": {"type": "number"},
                            "description": {"type": "string"},
                            "genre": {"type": "array", "items": {"$ref": "#/components/schemas/Genre"}},
                            "category": {"$ref": "#/components/schemas/Category"}
                        },
                        "required": ["id", "name", "year", "rating", "genre"]
                    },
                    "Review": {
                        "type": "object",
                        "properties": {
                            "id": {"type": "integer"},
                            "author": {"type": "string"},
                            "text": {"type": "string"},
                            "score": {"type": "integer", "minimum": 0, "maximum": 10},
                            "pub_date": {"type": "string", "format": "date-time"}
                        },
                        "required": ["id", "author", "text", "score", "pub_date"]
                    },
                    "Comment": {
                        "type": "object",
                        "properties": {
                            "id": {"type": "integer"},
                            "author": {"type": "string"},
                            "text": {"type": "string"},
                            "pub_date": {"type": "string", "format": "date-time"}
                        },
                        "required": ["id", "author", "text", "pub_date"]
                    }
                }
            }
        }))
    }

    fn migrations(&self) -> Vec<Migration> {
        vec![
            Migration {
                id: "001_titles",
                up: r#"
                    CREATE TABLE titles (
                        id          INTEGER PRIMARY KEY AUTOINCREMENT,
                        name        TEXT NOT NULL,
                        year        INTEGER NOT NULL,
                        description TEXT NOT NULL DEFAULT '',
                        category_id INTEGER REFERENCES categories (id) ON DELETE SET NULL,
                        UNIQUE (name, year)
                    );
                    CREATE INDEX titles_year ON titles (year);

                    CREATE TABLE title_genres (
                        title_id INTEGER NOT NULL REFERENCES titles (id) ON DELETE CASCADE,
                        genre_id INTEGER NOT NULL REFERENCES genres (id) ON DELETE CASCADE,
                        PRIMARY KEY (title_id, genre_id)
                    );
                    "#,
            },
            Migration {
                id: "002_reviews",
                up: r#"
                    CREATE TABLE reviews (
                        id        INTEGER PRIMARY KEY AUTOINCREMENT,
                        title_id  INTEGER NOT NULL REFERENCES titles (id) ON DELETE CASCADE,
                        author_id INTEGER NOT NULL REFERENCES users (id) ON DELETE CASCADE,
                        text      TEXT NOT NULL,
                        score     INTEGER NOT NULL CHECK (score BETWEEN 0 AND 10),
                        pub_date  TEXT NOT NULL,
                        UNIQUE (title_id, author_id)
                    );

                    CREATE TABLE comments (
                        id        INTEGER PRIMARY KEY AUTOINCREMENT,
                        review_id INTEGER NOT NULL REFERENCES reviews (id) ON DELETE CASCADE,
                        author_id INTEGER NOT NULL REFERENCES users (id) ON DELETE CASCADE,
                        text      TEXT NOT NULL,
                        pub_date  TEXT NOT NULL
                    );
                    CREATE INDEX comments_review ON comments (review_id);
                    "#,
            },
        ]
    }
}

async fn list_titles(State(ctx): State<AppCtx>) -> Result<Json<Vec<TitleOut>>, AppError> {
    let records = store::list(&ctx.db).await?;
    let mut titles = Vec::with_capacity(records.len());
    for record in records {
        titles.push(store::to_out(&ctx.db, record).await?);
    }
    Ok(Json(titles))
}

async fn create_title(
    State(ctx): State<AppCtx>,
    current: CurrentUser,
    Json(input): Json<CreateTitle>,
) -> Result<(StatusCode, Json<TitleOut>), AppError> {
    ensure(resolve_catalog(Some(&current.actor()), Action::Create))?;

    let title = store::create(&ctx.db, &input).await?;
    Ok((StatusCode::CREATED, Json(title)))
}

async fn get_title(
    State(ctx): State<AppCtx>,
    Path(id): Path<i64>,
) -> Result<Json<TitleOut>, AppError> {
    Ok(Json(store::detail(&ctx.db, id).await?))
}

async fn update_title(
    State(ctx): State<AppCtx>,
    current: CurrentUser,
    Path(id): Path<i64>,
    Json(patch): Json<UpdateTitle>,
) -> Result<Json<TitleOut>, AppError> {
    ensure(resolve_catalog(Some(&current.actor()), Action::Update))?;

    let title = store::update(&ctx.db, id, &patch).await?;
    Ok(Json(title))
}

async fn delete_title(
    State(ctx): State<AppCtx>,
    current: CurrentUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    ensure(resolve_catalog(Some(&current.actor()), Action::Delete))?;

    store::delete(&ctx.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Create a new instance of the titles module
pub fn create_module() -> std::sync::Arc<dyn Module> {
    std::sync::Arc::new(TitlesModule::new())
}
