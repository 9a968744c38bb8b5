use chrono::{Datelike, Utc};
use medley_http::error::AppError;
use sqlx::SqlitePool;

use super::models::{CreateTitle, TitleOut, TitleRecord, UpdateTitle};
use super::rating;
use crate::modules::{categories, genres};

/// Release year must be positive and not in the future.
pub fn validate_year(year: i64) -> Result<(), AppError> {
    let current = Utc::now().year() as i64;
    if year <= 0 || year > current {
        return Err(AppError::invalid_field(
            "year",
            format!("must be between 1 and {current}"),
        ));
    }
    Ok(())
}

async fn resolve_category(pool: &SqlitePool, slug: &str) -> Result<i64, AppError> {
    categories::get_by_slug(pool, slug)
        .await?
        .map(|category| category.id)
        .ok_or_else(|| AppError::invalid_field("category", format!("unknown category slug '{slug}'")))
}

async fn resolve_genres(pool: &SqlitePool, slugs: &[String]) -> Result<Vec<i64>, AppError> {
    if slugs.is_empty() {
        return Err(AppError::invalid_field(
            "genre",
            "at least one genre is required",
        ));
    }

    let mut ids = Vec::with_capacity(slugs.len());
    for slug in slugs {
        let genre = genres::get_by_slug(pool, slug).await?.ok_or_else(|| {
            AppError::invalid_field("genre", format!("unknown genre slug '{slug}'"))
        })?;
        ids.push(genre.id);
    }
    Ok(ids)
}

async fn name_year_taken(
    pool: &SqlitePool,
    name: &str,
    year: i64,
    exclude_id: Option<i64>,
) -> Result<bool, AppError> {
    let row: Option<(i64,)> = sqlx::query_as(
        "SELECT 1 FROM titles WHERE name = ?1 AND year = ?2 AND (?3 IS NULL OR id != ?3)",
    )
    .bind(name)
    .bind(year)
    .bind(exclude_id)
    .fetch_optional(pool)
    .await?;
    Ok(row.is_some())
}

/// Listing order is release year descending; the rating column is derived in
/// SQL and never stored.
pub async fn list(pool: &SqlitePool) -> Result<Vec<TitleRecord>, AppError> {
    let titles = sqlx::query_as::<_, TitleRecord>(
        r#"
        SELECT t.id, t.name, t.year, t.description, t.category_id,
               COALESCE(AVG(r.score), 0.0) AS rating
        FROM titles t
        LEFT JOIN reviews r ON r.title_id = t.id
        GROUP BY t.id
        ORDER BY t.year DESC, t.id ASC
        "#,
    )
    .fetch_all(pool)
    .await?;
    Ok(titles)
}

pub async fn get(pool: &SqlitePool, id: i64) -> Result<Option<TitleRecord>, AppError> {
    let title = sqlx::query_as::<_, TitleRecord>(
        "SELECT id, name, year, description, category_id FROM titles WHERE id = ?1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(title)
}

pub async fn scores(pool: &SqlitePool, title_id: i64) -> Result<Vec<i64>, AppError> {
    let rows: Vec<(i64,)> = sqlx::query_as("SELECT score FROM reviews WHERE title_id = ?1")
        .bind(title_id)
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().map(|(score,)| score).collect())
}

/// Assemble the outward representation: embedded genres and category plus the
/// derived rating carried on the record.
pub async fn to_out(pool: &SqlitePool, record: TitleRecord) -> Result<TitleOut, AppError> {
    let genre = genres::for_title(pool, record.id).await?;
    let category = match record.category_id {
        Some(category_id) => categories::get_by_id(pool, category_id).await?,
        None => None,
    };

    Ok(TitleOut {
        id: record.id,
        name: record.name,
        year: record.year,
        rating: record.rating,
        description: record.description,
        genre,
        category,
    })
}

/// Single-title fetch; the rating comes from the pure aggregator over the
/// title's current review scores.
pub async fn detail(pool: &SqlitePool, id: i64) -> Result<TitleOut, AppError> {
    let mut record = get(pool, id)
        .await?
        .ok_or_else(|| AppError::not_found("title not found"))?;
    record.rating = rating::mean_score(&scores(pool, id).await?);
    to_out(pool, record).await
}

pub async fn create(pool: &SqlitePool, input: &CreateTitle) -> Result<TitleOut, AppError> {
    if input.name.is_empty() {
        return Err(AppError::invalid_field("name", "must not be empty"));
    }
    validate_year(input.year)?;
    let genre_ids = resolve_genres(pool, &input.genre).await?;
    let category_id = match &input.category {
        Some(slug) => Some(resolve_category(pool, slug).await?),
        None => None,
    };

    if name_year_taken(pool, &input.name, input.year, None).await? {
        return Err(AppError::conflict(
            "title with this name and year already exists",
        ));
    }

    let mut tx = pool.begin().await?;
    let (title_id,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO titles (name, year, description, category_id)
        VALUES (?1, ?2, ?3, ?4)
        RETURNING id
        "#,
    )
    .bind(&input.name)
    .bind(input.year)
    .bind(input.description.as_deref().unwrap_or(""))
    .bind(category_id)
    .fetch_one(&mut *tx)
    .await?;

    for genre_id in genre_ids {
        sqlx::query("INSERT INTO title_genres (title_id, genre_id) VALUES (?1, ?2)")
            .bind(title_id)
            .bind(genre_id)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;

    detail(pool, title_id).await
}

pub async fn update(pool: &SqlitePool, id: i64, patch: &UpdateTitle) -> Result<TitleOut, AppError> {
    let existing = get(pool, id)
        .await?
        .ok_or_else(|| AppError::not_found("title not found"))?;

    if let Some(year) = patch.year {
        validate_year(year)?;
    }
    let genre_ids = match &patch.genre {
        Some(slugs) => Some(resolve_genres(pool, slugs).await?),
        None => None,
    };
    let category_id = match &patch.category {
        Some(slug) => Some(resolve_category(pool, slug).await?),
        None => None,
    };

    let name = patch.name.as_deref().unwrap_or(&existing.name);
    let year = patch.year.unwrap_or(existing.year);
    if name_year_taken(pool, name, year, Some(id)).await? {
        return Err(AppError::conflict(
            "title with this name and year already exists",
        ));
    }

    let mut tx = pool.begin().await?;
    sqlx::query(
        r#"
        UPDATE titles SET
            name        = COALESCE(?1, name),
            year        = COALESCE(?2, year),
            description = COALESCE(?3, description),
            category_id = COALESCE(?4, category_id)
        WHERE id = ?5
        "#,
    )
    .bind(patch.name.as_deref())
    .bind(patch.year)
    .bind(patch.description.as_deref())
    .bind(category_id)
    .bind(id)
    .execute(&mut *tx)
    .await?;

    if let Some(genre_ids) = genre_ids {
        sqlx::query("DELETE FROM title_genres WHERE title_id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        for genre_id in genre_ids {
            sqlx::query("INSERT INTO title_genres (title_id, genre_id) VALUES (?1, ?2)")
                .bind(id)
                .bind(genre_id)
                .execute(&mut *tx)
                .await?;
        }
    }
    tx.commit().await?;

    detail(pool, id).await
}

/// Deleting a title cascades to its reviews and their comments through the
/// schema's foreign-key rules.
pub async fn delete(pool: &SqlitePool, id: i64) -> Result<(), AppError> {
    let result = sqlx::query("DELETE FROM titles WHERE id = ?1")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found("title not found"));
    }
    Ok(())
}
