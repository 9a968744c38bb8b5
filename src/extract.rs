//! Request-level identity: bearer-token extraction and permission gating.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use medley_authz::{Actor, Decision};
use medley_http::error::AppError;
use medley_kernel::AppCtx;

use crate::modules::auth::token::TokenSigner;
use crate::modules::users::models::User;
use crate::modules::users::store;

/// Turn a permission decision into a handler-level error.
pub fn ensure(decision: Decision) -> Result<(), AppError> {
    if decision.is_allowed() {
        Ok(())
    } else {
        Err(AppError::forbidden("not permitted"))
    }
}

/// Authenticated account resolved from the `Authorization: Bearer` header.
/// Token claims are never trusted for role data; the account row is reloaded
/// so revocations and role changes take effect immediately.
#[derive(Debug)]
pub struct CurrentUser(pub User);

impl CurrentUser {
    pub fn actor(&self) -> Actor {
        self.0.actor()
    }
}

impl FromRequestParts<AppCtx> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, ctx: &AppCtx) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::unauthorized("missing authorization header"))?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::unauthorized("expected a bearer token"))?;

        let signer = TokenSigner::from_settings(&ctx.settings.auth);
        let claims = signer.verify(token)?;

        let user = store::get_by_id(&ctx.db, claims.sub)
            .await?
            .ok_or_else(|| AppError::unauthorized("account no longer exists"))?;

        Ok(CurrentUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{seed_user, test_ctx};
    use axum::extract::FromRequestParts;
    use axum::http::Request;
    use medley_authz::{Decision, Role};

    #[test]
    fn deny_maps_to_forbidden() {
        assert!(ensure(Decision::Allow).is_ok());
        let err = ensure(Decision::Deny).unwrap_err();
        assert!(matches!(err, AppError::Forbidden { .. }));
    }

    async fn extract_with_header(
        ctx: &AppCtx,
        header: Option<&str>,
    ) -> Result<CurrentUser, AppError> {
        let mut builder = Request::builder().uri("/");
        if let Some(value) = header {
            builder = builder.header(axum::http::header::AUTHORIZATION, value);
        }
        let request = builder.body(()).unwrap();
        let (mut parts, _) = request.into_parts();
        CurrentUser::from_request_parts(&mut parts, ctx).await
    }

    #[tokio::test]
    async fn valid_token_resolves_the_account() {
        let ctx = test_ctx().await;
        let alice = seed_user(&ctx, "alice", Role::User).await;

        let signer = TokenSigner::from_settings(&ctx.settings.auth);
        let token = signer.issue(&alice).unwrap();

        let current = extract_with_header(&ctx, Some(&format!("Bearer {token}")))
            .await
            .unwrap();
        assert_eq!(current.0.id, alice.id);
        assert_eq!(current.0.username, "alice");
    }

    #[tokio::test]
    async fn missing_or_malformed_header_is_unauthorized() {
        let ctx = test_ctx().await;

        let err = extract_with_header(&ctx, None).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized { .. }));

        let err = extract_with_header(&ctx, Some("Token abc")).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized { .. }));

        let err = extract_with_header(&ctx, Some("Bearer garbage"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized { .. }));
    }

    #[tokio::test]
    async fn token_for_deleted_account_is_unauthorized() {
        let ctx = test_ctx().await;
        let alice = seed_user(&ctx, "alice", Role::User).await;

        let signer = TokenSigner::from_settings(&ctx.settings.auth);
        let token = signer.issue(&alice).unwrap();

        crate::modules::users::store::delete_by_username(&ctx.db, "alice")
            .await
            .unwrap();

        let err = extract_with_header(&ctx, Some(&format!("Bearer {token}")))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized { .. }));
    }
}
