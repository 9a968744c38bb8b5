//! Review ledger: one scored review per (title, author), nested under titles.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use sqlx::SqlitePool;

use medley_authz::{resolve_content, Action, Actor};
use medley_http::error::AppError;
use medley_kernel::AppCtx;

use super::models::{CreateReview, Review, ReviewOut, UpdateReview};
use crate::extract::{ensure, CurrentUser};
use crate::modules::users::models::User;

pub fn validate_score(score: i64) -> Result<(), AppError> {
    if !(0..=10).contains(&score) {
        return Err(AppError::invalid_field("score", "must be between 0 and 10"));
    }
    Ok(())
}

async fn ensure_title(pool: &SqlitePool, title_id: i64) -> Result<(), AppError> {
    let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM titles WHERE id = ?1")
        .bind(title_id)
        .fetch_optional(pool)
        .await?;
    if row.is_none() {
        return Err(AppError::not_found("title not found"));
    }
    Ok(())
}

pub async fn list_for_title(pool: &SqlitePool, title_id: i64) -> Result<Vec<ReviewOut>, AppError> {
    ensure_title(pool, title_id).await?;

    let reviews = sqlx::query_as::<_, ReviewOut>(
        r#"
        SELECT r.id, u.username AS author, r.text, r.score, r.pub_date
        FROM reviews r
        JOIN users u ON u.id = r.author_id
        WHERE r.title_id = ?1
        ORDER BY r.id ASC
        "#,
    )
    .bind(title_id)
    .fetch_all(pool)
    .await?;
    Ok(reviews)
}

/// Create a review. The (title, author) pre-check yields a friendly conflict;
/// the UNIQUE constraint is the arbiter under concurrent submissions.
pub async fn create(
    pool: &SqlitePool,
    title_id: i64,
    author: &User,
    input: &CreateReview,
) -> Result<ReviewOut, AppError> {
    ensure_title(pool, title_id).await?;
    if input.text.is_empty() {
        return Err(AppError::invalid_field("text", "must not be empty"));
    }
    validate_score(input.score)?;

    let existing: Option<(i64,)> =
        sqlx::query_as("SELECT 1 FROM reviews WHERE title_id = ?1 AND author_id = ?2")
            .bind(title_id)
            .bind(author.id)
            .fetch_optional(pool)
            .await?;
    if existing.is_some() {
        return Err(AppError::conflict(
            "author already has a review for this title",
        ));
    }

    let pub_date = Utc::now();
    let (id,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO reviews (title_id, author_id, text, score, pub_date)
        VALUES (?1, ?2, ?3, ?4, ?5)
        RETURNING id
        "#,
    )
    .bind(title_id)
    .bind(author.id)
    .bind(&input.text)
    .bind(input.score)
    .bind(pub_date)
    .fetch_one(pool)
    .await?;

    Ok(ReviewOut {
        id,
        author: author.username.clone(),
        text: input.text.clone(),
        score: input.score,
        pub_date,
    })
}

/// Load a review scoped to its title; a review reached through the wrong
/// title path is treated as absent.
pub async fn get_record(
    pool: &SqlitePool,
    title_id: i64,
    review_id: i64,
) -> Result<Review, AppError> {
    sqlx::query_as::<_, Review>("SELECT * FROM reviews WHERE id = ?1 AND title_id = ?2")
        .bind(review_id)
        .bind(title_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("review not found"))
}

pub async fn get_out(
    pool: &SqlitePool,
    title_id: i64,
    review_id: i64,
) -> Result<ReviewOut, AppError> {
    sqlx::query_as::<_, ReviewOut>(
        r#"
        SELECT r.id, u.username AS author, r.text, r.score, r.pub_date
        FROM reviews r
        JOIN users u ON u.id = r.author_id
        WHERE r.id = ?1 AND r.title_id = ?2
        "#,
    )
    .bind(review_id)
    .bind(title_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("review not found"))
}

pub async fn update(
    pool: &SqlitePool,
    title_id: i64,
    review_id: i64,
    actor: &Actor,
    patch: &UpdateReview,
) -> Result<ReviewOut, AppError> {
    let review = get_record(pool, title_id, review_id).await?;
    ensure(resolve_content(Some(actor), Action::Update, review.author_id))?;

    if patch.text.as_deref() == Some("") {
        return Err(AppError::invalid_field("text", "must not be empty"));
    }
    if let Some(score) = patch.score {
        validate_score(score)?;
    }

    sqlx::query(
        r#"
        UPDATE reviews SET
            text  = COALESCE(?1, text),
            score = COALESCE(?2, score)
        WHERE id = ?3
        "#,
    )
    .bind(patch.text.as_deref())
    .bind(patch.score)
    .bind(review_id)
    .execute(pool)
    .await?;

    get_out(pool, title_id, review_id).await
}

pub async fn delete(
    pool: &SqlitePool,
    title_id: i64,
    review_id: i64,
    actor: &Actor,
) -> Result<(), AppError> {
    let review = get_record(pool, title_id, review_id).await?;
    ensure(resolve_content(Some(actor), Action::Delete, review.author_id))?;

    sqlx::query("DELETE FROM reviews WHERE id = ?1")
        .bind(review_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub(super) async fn list_reviews(
    State(ctx): State<AppCtx>,
    Path(title_id): Path<i64>,
) -> Result<Json<Vec<ReviewOut>>, AppError> {
    Ok(Json(list_for_title(&ctx.db, title_id).await?))
}

pub(super) async fn create_review(
    State(ctx): State<AppCtx>,
    current: CurrentUser,
    Path(title_id): Path<i64>,
    Json(input): Json<CreateReview>,
) -> Result<(StatusCode, Json<ReviewOut>), AppError> {
    ensure(resolve_content(
        Some(&current.actor()),
        Action::Create,
        current.0.id,
    ))?;

    let review = create(&ctx.db, title_id, &current.0, &input).await?;
    Ok((StatusCode::CREATED, Json(review)))
}

pub(super) async fn get_review(
    State(ctx): State<AppCtx>,
    Path((title_id, review_id)): Path<(i64, i64)>,
) -> Result<Json<ReviewOut>, AppError> {
    Ok(Json(get_out(&ctx.db, title_id, review_id).await?))
}

pub(super) async fn update_review(
    State(ctx): State<AppCtx>,
    current: CurrentUser,
    Path((title_id, review_id)): Path<(i64, i64)>,
    Json(patch): Json<UpdateReview>,
) -> Result<Json<ReviewOut>, AppError> {
    let review = update(&ctx.db, title_id, review_id, &current.actor(), &patch).await?;
    Ok(Json(review))
}

pub(super) async fn delete_review(
    State(ctx): State<AppCtx>,
    current: CurrentUser,
    Path((title_id, review_id)): Path<(i64, i64)>,
) -> Result<StatusCode, AppError> {
    delete(&ctx.db, title_id, review_id, &current.actor()).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{seed_title, seed_user, test_ctx};
    use medley_authz::Role;

    fn review_input(score: i64) -> CreateReview {
        CreateReview {
            text: "solid".to_string(),
            score,
        }
    }

    #[tokio::test]
    async fn boundary_scores_accepted_out_of_range_rejected() {
        let ctx = test_ctx().await;
        let low = seed_user(&ctx, "low", Role::User).await;
        let high = seed_user(&ctx, "high", Role::User).await;
        let title_id = seed_title(&ctx, "Dune", 1965).await;

        create(&ctx.db, title_id, &low, &review_input(0)).await.unwrap();
        create(&ctx.db, title_id, &high, &review_input(10)).await.unwrap();

        let other = seed_user(&ctx, "other", Role::User).await;
        for score in [-1, 11] {
            let err = create(&ctx.db, title_id, &other, &review_input(score))
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::Validation { .. }), "score {score}");
        }
    }

    #[tokio::test]
    async fn empty_text_is_validation_error() {
        let ctx = test_ctx().await;
        let alice = seed_user(&ctx, "alice", Role::User).await;
        let title_id = seed_title(&ctx, "Dune", 1965).await;

        let input = CreateReview {
            text: String::new(),
            score: 8,
        };
        let err = create(&ctx.db, title_id, &alice, &input).await.unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));

        // Same rule when clearing the text on update.
        let review = create(&ctx.db, title_id, &alice, &review_input(8))
            .await
            .unwrap();
        let patch = UpdateReview {
            text: Some(String::new()),
            ..Default::default()
        };
        let err = update(&ctx.db, title_id, review.id, &alice.actor(), &patch)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[tokio::test]
    async fn second_review_for_same_pair_is_conflict() {
        let ctx = test_ctx().await;
        let alice = seed_user(&ctx, "alice", Role::User).await;
        let title_id = seed_title(&ctx, "Dune", 1965).await;

        create(&ctx.db, title_id, &alice, &review_input(8)).await.unwrap();
        let err = create(&ctx.db, title_id, &alice, &review_input(9))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict { .. }));

        // A different title is fine.
        let other_title = seed_title(&ctx, "Dune Messiah", 1969).await;
        create(&ctx.db, other_title, &alice, &review_input(7))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn review_against_missing_title_is_not_found() {
        let ctx = test_ctx().await;
        let alice = seed_user(&ctx, "alice", Role::User).await;

        let err = create(&ctx.db, 4242, &alice, &review_input(5))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound { .. }));
    }

    #[tokio::test]
    async fn listing_is_ordered_by_id() {
        let ctx = test_ctx().await;
        let alice = seed_user(&ctx, "alice", Role::User).await;
        let bob = seed_user(&ctx, "bob", Role::User).await;
        let title_id = seed_title(&ctx, "Dune", 1965).await;

        create(&ctx.db, title_id, &alice, &review_input(8)).await.unwrap();
        create(&ctx.db, title_id, &bob, &review_input(6)).await.unwrap();

        let reviews = list_for_title(&ctx.db, title_id).await.unwrap();
        assert_eq!(reviews.len(), 2);
        assert!(reviews[0].id < reviews[1].id);
        assert_eq!(reviews[0].author, "alice");
    }

    #[tokio::test]
    async fn update_permission_matrix() {
        let ctx = test_ctx().await;
        let author = seed_user(&ctx, "author", Role::User).await;
        let stranger = seed_user(&ctx, "stranger", Role::User).await;
        let moderator = seed_user(&ctx, "mod", Role::Moderator).await;
        let title_id = seed_title(&ctx, "Dune", 1965).await;

        let review = create(&ctx.db, title_id, &author, &review_input(8))
            .await
            .unwrap();

        let patch = UpdateReview {
            score: Some(9),
            ..Default::default()
        };

        let err = update(&ctx.db, title_id, review.id, &stranger.actor(), &patch)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden { .. }));

        let updated = update(&ctx.db, title_id, review.id, &author.actor(), &patch)
            .await
            .unwrap();
        assert_eq!(updated.score, 9);

        let patch = UpdateReview {
            text: Some("moderated".to_string()),
            ..Default::default()
        };
        let updated = update(&ctx.db, title_id, review.id, &moderator.actor(), &patch)
            .await
            .unwrap();
        assert_eq!(updated.text, "moderated");
    }

    #[tokio::test]
    async fn update_revalidates_score() {
        let ctx = test_ctx().await;
        let author = seed_user(&ctx, "author", Role::User).await;
        let title_id = seed_title(&ctx, "Dune", 1965).await;
        let review = create(&ctx.db, title_id, &author, &review_input(8))
            .await
            .unwrap();

        let patch = UpdateReview {
            score: Some(11),
            ..Default::default()
        };
        let err = update(&ctx.db, title_id, review.id, &author.actor(), &patch)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[tokio::test]
    async fn stranger_cannot_delete_but_admin_can() {
        let ctx = test_ctx().await;
        let author = seed_user(&ctx, "author", Role::User).await;
        let stranger = seed_user(&ctx, "stranger", Role::User).await;
        let admin = seed_user(&ctx, "admin", Role::Admin).await;
        let title_id = seed_title(&ctx, "Dune", 1965).await;
        let review = create(&ctx.db, title_id, &author, &review_input(8))
            .await
            .unwrap();

        let err = delete(&ctx.db, title_id, review.id, &stranger.actor())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden { .. }));

        delete(&ctx.db, title_id, review.id, &admin.actor())
            .await
            .unwrap();
        assert!(list_for_title(&ctx.db, title_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn review_not_reachable_through_wrong_title() {
        let ctx = test_ctx().await;
        let author = seed_user(&ctx, "author", Role::User).await;
        let title_a = seed_title(&ctx, "Dune", 1965).await;
        let title_b = seed_title(&ctx, "Dune Messiah", 1969).await;
        let review = create(&ctx.db, title_a, &author, &review_input(8))
            .await
            .unwrap();

        let err = get_out(&ctx.db, title_b, review.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound { .. }));
    }
}
