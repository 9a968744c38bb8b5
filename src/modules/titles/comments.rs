//! Comment log: free-form replies attached to a review. No authorship
//! uniqueness; update/delete follow the same owner-or-staff rule as reviews.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use sqlx::SqlitePool;

use medley_authz::{resolve_content, Action, Actor};
use medley_http::error::AppError;
use medley_kernel::AppCtx;

use super::models::{Comment, CommentOut, CreateComment, UpdateComment};
use crate::extract::{ensure, CurrentUser};
use crate::modules::users::models::User;

/// The parent review must exist and belong to the title in the path.
async fn ensure_review(pool: &SqlitePool, title_id: i64, review_id: i64) -> Result<(), AppError> {
    let row: Option<(i64,)> =
        sqlx::query_as("SELECT 1 FROM reviews WHERE id = ?1 AND title_id = ?2")
            .bind(review_id)
            .bind(title_id)
            .fetch_optional(pool)
            .await?;
    if row.is_none() {
        return Err(AppError::not_found("review not found"));
    }
    Ok(())
}

pub async fn list_for_review(
    pool: &SqlitePool,
    title_id: i64,
    review_id: i64,
) -> Result<Vec<CommentOut>, AppError> {
    ensure_review(pool, title_id, review_id).await?;

    let comments = sqlx::query_as::<_, CommentOut>(
        r#"
        SELECT c.id, u.username AS author, c.text, c.pub_date
        FROM comments c
        JOIN users u ON u.id = c.author_id
        WHERE c.review_id = ?1
        ORDER BY c.id ASC
        "#,
    )
    .bind(review_id)
    .fetch_all(pool)
    .await?;
    Ok(comments)
}

pub async fn create(
    pool: &SqlitePool,
    title_id: i64,
    review_id: i64,
    author: &User,
    input: &CreateComment,
) -> Result<CommentOut, AppError> {
    ensure_review(pool, title_id, review_id).await?;
    if input.text.is_empty() {
        return Err(AppError::invalid_field("text", "must not be empty"));
    }

    let pub_date = Utc::now();
    let (id,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO comments (review_id, author_id, text, pub_date)
        VALUES (?1, ?2, ?3, ?4)
        RETURNING id
        "#,
    )
    .bind(review_id)
    .bind(author.id)
    .bind(&input.text)
    .bind(pub_date)
    .fetch_one(pool)
    .await?;

    Ok(CommentOut {
        id,
        author: author.username.clone(),
        text: input.text.clone(),
        pub_date,
    })
}

async fn get_record(
    pool: &SqlitePool,
    title_id: i64,
    review_id: i64,
    comment_id: i64,
) -> Result<Comment, AppError> {
    ensure_review(pool, title_id, review_id).await?;

    sqlx::query_as::<_, Comment>("SELECT * FROM comments WHERE id = ?1 AND review_id = ?2")
        .bind(comment_id)
        .bind(review_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("comment not found"))
}

pub async fn get_out(
    pool: &SqlitePool,
    title_id: i64,
    review_id: i64,
    comment_id: i64,
) -> Result<CommentOut, AppError> {
    ensure_review(pool, title_id, review_id).await?;

    sqlx::query_as::<_, CommentOut>(
        r#"
        SELECT c.id, u.username AS author, c.text, c.pub_date
        FROM comments c
        JOIN users u ON u.id = c.author_id
        WHERE c.id = ?1 AND c.review_id = ?2
        "#,
    )
    .bind(comment_id)
    .bind(review_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("comment not found"))
}

pub async fn update(
    pool: &SqlitePool,
    title_id: i64,
    review_id: i64,
    comment_id: i64,
    actor: &Actor,
    patch: &UpdateComment,
) -> Result<CommentOut, AppError> {
    let comment = get_record(pool, title_id, review_id, comment_id).await?;
    ensure(resolve_content(Some(actor), Action::Update, comment.author_id))?;

    sqlx::query("UPDATE comments SET text = COALESCE(?1, text) WHERE id = ?2")
        .bind(patch.text.as_deref())
        .bind(comment_id)
        .execute(pool)
        .await?;

    get_out(pool, title_id, review_id, comment_id).await
}

pub async fn delete(
    pool: &SqlitePool,
    title_id: i64,
    review_id: i64,
    comment_id: i64,
    actor: &Actor,
) -> Result<(), AppError> {
    let comment = get_record(pool, title_id, review_id, comment_id).await?;
    ensure(resolve_content(Some(actor), Action::Delete, comment.author_id))?;

    sqlx::query("DELETE FROM comments WHERE id = ?1")
        .bind(comment_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub(super) async fn list_comments(
    State(ctx): State<AppCtx>,
    Path((title_id, review_id)): Path<(i64, i64)>,
) -> Result<Json<Vec<CommentOut>>, AppError> {
    Ok(Json(list_for_review(&ctx.db, title_id, review_id).await?))
}

pub(super) async fn create_comment(
    State(ctx): State<AppCtx>,
    current: CurrentUser,
    Path((title_id, review_id)): Path<(i64, i64)>,
    Json(input): Json<CreateComment>,
) -> Result<(StatusCode, Json<CommentOut>), AppError> {
    ensure(resolve_content(
        Some(&current.actor()),
        Action::Create,
        current.0.id,
    ))?;

    let comment = create(&ctx.db, title_id, review_id, &current.0, &input).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

pub(super) async fn get_comment(
    State(ctx): State<AppCtx>,
    Path((title_id, review_id, comment_id)): Path<(i64, i64, i64)>,
) -> Result<Json<CommentOut>, AppError> {
    Ok(Json(get_out(&ctx.db, title_id, review_id, comment_id).await?))
}

pub(super) async fn update_comment(
    State(ctx): State<AppCtx>,
    current: CurrentUser,
    Path((title_id, review_id, comment_id)): Path<(i64, i64, i64)>,
    Json(patch): Json<UpdateComment>,
) -> Result<Json<CommentOut>, AppError> {
    let comment = update(
        &ctx.db,
        title_id,
        review_id,
        comment_id,
        &current.actor(),
        &patch,
    )
    .await?;
    Ok(Json(comment))
}

pub(super) async fn delete_comment(
    State(ctx): State<AppCtx>,
    current: CurrentUser,
    Path((title_id, review_id, comment_id)): Path<(i64, i64, i64)>,
) -> Result<StatusCode, AppError> {
    delete(&ctx.db, title_id, review_id, comment_id, &current.actor()).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::super::models::CreateReview;
    use super::super::reviews;
    use super::*;
    use crate::test_support::{seed_title, seed_user, test_ctx};
    use medley_authz::Role;

    async fn seed_review(ctx: &AppCtx, title_id: i64, author: &User) -> i64 {
        reviews::create(
            &ctx.db,
            title_id,
            author,
            &CreateReview {
                text: "review".to_string(),
                score: 7,
            },
        )
        .await
        .unwrap()
        .id
    }

    #[tokio::test]
    async fn same_author_may_comment_repeatedly() {
        let ctx = test_ctx().await;
        let alice = seed_user(&ctx, "alice", Role::User).await;
        let title_id = seed_title(&ctx, "Dune", 1965).await;
        let review_id = seed_review(&ctx, title_id, &alice).await;

        let input = CreateComment {
            text: "again".to_string(),
        };
        create(&ctx.db, title_id, review_id, &alice, &input).await.unwrap();
        create(&ctx.db, title_id, review_id, &alice, &input).await.unwrap();

        let comments = list_for_review(&ctx.db, title_id, review_id).await.unwrap();
        assert_eq!(comments.len(), 2);
        assert!(comments[0].id < comments[1].id);
    }

    #[tokio::test]
    async fn comment_on_missing_review_is_not_found() {
        let ctx = test_ctx().await;
        let alice = seed_user(&ctx, "alice", Role::User).await;
        let title_id = seed_title(&ctx, "Dune", 1965).await;

        let err = create(
            &ctx.db,
            title_id,
            999,
            &alice,
            &CreateComment {
                text: "hello".to_string(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::NotFound { .. }));
    }

    #[tokio::test]
    async fn owner_or_staff_rule_applies_to_comments() {
        let ctx = test_ctx().await;
        let alice = seed_user(&ctx, "alice", Role::User).await;
        let stranger = seed_user(&ctx, "stranger", Role::User).await;
        let moderator = seed_user(&ctx, "mod", Role::Moderator).await;
        let title_id = seed_title(&ctx, "Dune", 1965).await;
        let review_id = seed_review(&ctx, title_id, &alice).await;

        let comment = create(
            &ctx.db,
            title_id,
            review_id,
            &alice,
            &CreateComment {
                text: "first".to_string(),
            },
        )
        .await
        .unwrap();

        let patch = UpdateComment {
            text: Some("edited".to_string()),
        };
        let err = update(
            &ctx.db,
            title_id,
            review_id,
            comment.id,
            &stranger.actor(),
            &patch,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Forbidden { .. }));

        let updated = update(
            &ctx.db,
            title_id,
            review_id,
            comment.id,
            &alice.actor(),
            &patch,
        )
        .await
        .unwrap();
        assert_eq!(updated.text, "edited");

        delete(
            &ctx.db,
            title_id,
            review_id,
            comment.id,
            &moderator.actor(),
        )
        .await
        .unwrap();
    }
}
