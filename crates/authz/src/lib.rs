//! Pure permission core.
//!
//! Every mutating operation in the service funnels through one of the
//! `resolve_*` functions below with the caller's resolved [`Actor`] (or `None`
//! for anonymous requests). The functions are side-effect free and know nothing
//! about HTTP or storage; callers translate [`Decision::Deny`] into an
//! authorization error.

use serde::{Deserialize, Serialize};

/// Account role. Ordering of variants is not meaningful; precedence is handled
/// explicitly in [`Actor::effective_role`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Moderator,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Moderator => "moderator",
            Role::Admin => "admin",
        }
    }

    /// Parse a stored role string, defaulting unknown values to `User`.
    pub fn parse(value: &str) -> Role {
        match value {
            "admin" => Role::Admin,
            "moderator" => Role::Moderator,
            _ => Role::User,
        }
    }
}

/// Operation class requested against a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Read,
    Create,
    Update,
    Delete,
}

/// Resolved caller identity as the permission core sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: i64,
    pub role: Role,
    pub is_superuser: bool,
}

impl Actor {
    /// Role used for permission checks. A superuser always resolves to admin,
    /// regardless of the stored role field.
    pub fn effective_role(&self) -> Role {
        if self.is_superuser {
            Role::Admin
        } else {
            self.role
        }
    }

    pub fn is_admin(&self) -> bool {
        self.effective_role() == Role::Admin
    }

    /// Moderators and admins may edit other users' reviews and comments.
    pub fn is_staff(&self) -> bool {
        matches!(self.effective_role(), Role::Moderator | Role::Admin)
    }
}

/// Outcome of a permission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

fn decision(allowed: bool) -> Decision {
    if allowed {
        Decision::Allow
    } else {
        Decision::Deny
    }
}

/// Catalog resources (categories, genres, titles): anyone may read, only
/// admins may mutate.
pub fn resolve_catalog(actor: Option<&Actor>, action: Action) -> Decision {
    match action {
        Action::Read => Decision::Allow,
        _ => decision(actor.is_some_and(Actor::is_admin)),
    }
}

/// Authored content (reviews, comments): anyone may read, any authenticated
/// caller may create, and update/delete require the author or staff.
pub fn resolve_content(actor: Option<&Actor>, action: Action, owner_id: i64) -> Decision {
    match action {
        Action::Read => Decision::Allow,
        Action::Create => decision(actor.is_some()),
        Action::Update | Action::Delete => decision(
            actor.is_some_and(|actor| actor.user_id == owner_id || actor.is_staff()),
        ),
    }
}

/// Account administration (list/create/update/delete arbitrary users): admin
/// only, for every action including read.
pub fn resolve_accounts(actor: Option<&Actor>) -> Decision {
    decision(actor.is_some_and(Actor::is_admin))
}
