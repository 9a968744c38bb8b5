use medley_authz::{Actor, Role};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Account row as stored. The confirmation code and superuser flag never leave
/// the service; responses go through [`UserOut`].
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: String,
    pub confirmation_code: String,
    pub first_name: String,
    pub last_name: String,
    pub bio: String,
    pub is_superuser: bool,
}

impl User {
    pub fn role(&self) -> Role {
        Role::parse(&self.role)
    }

    /// Identity handed to the permission core.
    pub fn actor(&self) -> Actor {
        Actor {
            user_id: self.id,
            role: self.role(),
            is_superuser: self.is_superuser,
        }
    }
}

/// Public account representation.
#[derive(Debug, Clone, Serialize)]
pub struct UserOut {
    pub username: String,
    pub email: String,
    pub role: Role,
    pub first_name: String,
    pub last_name: String,
    pub bio: String,
}

impl From<User> for UserOut {
    fn from(user: User) -> Self {
        Self {
            role: user.role(),
            username: user.username,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            bio: user.bio,
        }
    }
}

/// Request model for admin account creation.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateUser {
    pub username: String,
    pub email: String,
    pub role: Option<Role>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
}

/// Request model for admin account update; absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdminUpdateUser {
    pub username: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
}

/// Request model for the self-service `/me` update. Username, email, and role
/// are not reachable through this path.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateProfile {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
}
