use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::modules::categories::Category;
use crate::modules::genres::Genre;

/// Title row as stored, plus the rating column the listing query derives.
#[derive(Debug, Clone, FromRow)]
pub struct TitleRecord {
    pub id: i64,
    pub name: String,
    pub year: i64,
    pub description: String,
    pub category_id: Option<i64>,
    #[sqlx(default)]
    pub rating: f64,
}

/// Title representation with embedded taxonomy objects and derived rating.
#[derive(Debug, Clone, Serialize)]
pub struct TitleOut {
    pub id: i64,
    pub name: String,
    pub year: i64,
    pub rating: f64,
    pub description: String,
    pub genre: Vec<Genre>,
    pub category: Option<Category>,
}

/// Request model for title creation. Genres are referenced by slug and at
/// least one is required; the category slug is optional.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTitle {
    pub name: String,
    pub year: i64,
    pub description: Option<String>,
    pub genre: Vec<String>,
    pub category: Option<String>,
}

/// Request model for title update; absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateTitle {
    pub name: Option<String>,
    pub year: Option<i64>,
    pub description: Option<String>,
    pub genre: Option<Vec<String>>,
    pub category: Option<String>,
}

/// Review row as stored. The author relation drives permissions; the title
/// relation drives cascade deletion.
#[derive(Debug, Clone, FromRow)]
pub struct Review {
    pub id: i64,
    pub title_id: i64,
    pub author_id: i64,
    pub text: String,
    pub score: i64,
    pub pub_date: DateTime<Utc>,
}

/// Review representation: author by username, title implied by the route.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ReviewOut {
    pub id: i64,
    pub author: String,
    pub text: String,
    pub score: i64,
    pub pub_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateReview {
    pub text: String,
    pub score: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateReview {
    pub text: Option<String>,
    pub score: Option<i64>,
}

/// Comment row as stored.
#[derive(Debug, Clone, FromRow)]
pub struct Comment {
    pub id: i64,
    pub review_id: i64,
    pub author_id: i64,
    pub text: String,
    pub pub_date: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CommentOut {
    pub id: i64,
    pub author: String,
    pub text: String,
    pub pub_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateComment {
    pub text: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateComment {
    pub text: Option<String>,
}
