//! Account signup and token exchange.
//!
//! Signup registers an account and mails it a confirmation code; `/token`
//! trades a valid (username, code) pair for a signed access token. The code is
//! derived deterministically from the email, so repeating a lost signup mail
//! is a matter of re-sending, not regenerating.

pub mod token;

use async_trait::async_trait;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use medley_http::error::AppError;
use medley_kernel::{AppCtx, Module};

use crate::modules::users::models::CreateUser;
use crate::modules::users::store;
use token::TokenSigner;

pub struct AuthModule;

impl AuthModule {
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Module for AuthModule {
    fn name(&self) -> &'static str {
        "auth"
    }

    async fn init(&self, ctx: &AppCtx) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            sender = %ctx.settings.mail.sender,
            "auth module initialized"
        );
        Ok(())
    }

    fn routes(&self, ctx: &AppCtx) -> Router {
        Router::new()
            .route("/signup", post(signup))
            .route("/token", post(issue_token))
            .with_state(ctx.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        Some(json!({
            "paths": {
                "/signup": {
                    "post": {
                        "summary": "Register an account and mail its confirmation code",
                        "tags": ["Auth"]
                    }
                },
                "/token": {
                    "post": {
                        "summary": "Exchange username and confirmation code for an access token",
                        "tags": ["Auth"]
                    }
                }
            },
            "components": {
                "schemas": {
                    "SignupRequest": {
                        "type": "object",
                        "properties": {
                            "username": {"type": "string"},
                            "email": {"type": "string", "format": "email"}
                        },
                        "required": ["username", "email"]
                    },
                    "TokenRequest": {
                        "type": "object",
                        "properties": {
                            "username": {"type": "string"},
                            "confirmation_code": {"type": "string"}
                        },
                        "required": ["username", "confirmation_code"]
                    },
                    "TokenResponse": {
                        "type": "object",
                        "properties": {"token": {"type": "string"}},
                        "required": ["token"]
                    }
                }
            }
        }))
    }
}

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub username: String,
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct SignupResponse {
    pub username: String,
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub username: String,
    pub confirmation_code: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

/// Name-based UUID over the email, so the same address always yields the same
/// code.
pub fn confirmation_code_for(email: &str) -> String {
    Uuid::new_v3(&Uuid::NAMESPACE_DNS, email.as_bytes()).to_string()
}

async fn signup(
    State(ctx): State<AppCtx>,
    Json(input): Json<SignupRequest>,
) -> Result<Json<SignupResponse>, AppError> {
    // `/users/me` is routable, so the name itself is off limits.
    if input.username == "me" {
        return Err(AppError::invalid_field("username", "'me' is reserved"));
    }
    store::validate_new_account(&ctx.db, &input.username, &input.email).await?;

    let code = confirmation_code_for(&input.email);
    let user = store::create(
        &ctx.db,
        &CreateUser {
            username: input.username,
            email: input.email,
            role: None,
            first_name: None,
            last_name: None,
            bio: None,
        },
        &code,
    )
    .await?;

    ctx.mailer
        .send(
            &user.email,
            "Your confirmation code",
            &format!("confirmation_code: {code}"),
        )
        .await?;

    tracing::info!(username = %user.username, "account registered");
    Ok(Json(SignupResponse {
        username: user.username,
        email: user.email,
    }))
}

async fn issue_token(
    State(ctx): State<AppCtx>,
    Json(input): Json<TokenRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let user = store::get_by_username(&ctx.db, &input.username)
        .await?
        .ok_or_else(|| AppError::not_found("user not found"))?;

    // Admin-created accounts have a blank code until they go through signup;
    // a blank submission must not match it.
    if user.confirmation_code.is_empty() || user.confirmation_code != input.confirmation_code {
        return Err(AppError::unauthorized("confirmation code does not match"));
    }

    let signer = TokenSigner::from_settings(&ctx.settings.auth);
    let token = signer.issue(&user)?;
    Ok(Json(TokenResponse { token }))
}

/// Create a new instance of the auth module
pub fn create_module() -> std::sync::Arc<dyn Module> {
    std::sync::Arc::new(AuthModule::new())
}
