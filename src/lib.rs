//! Catalog-and-review service: titles grouped by category and genre, one
//! review per account per title, comments on reviews, and a derived mean
//! rating. Functionality is packaged as modules registered with the kernel;
//! each module contributes routes, migrations, and an OpenAPI fragment.

pub mod extract;
pub mod modules;

use std::sync::Arc;

use medley_kernel::mail::LogMailer;
use medley_kernel::{AppCtx, ModuleRegistry, Settings};

pub fn build_registry() -> ModuleRegistry {
    let mut registry = ModuleRegistry::new();
    modules::register_all(&mut registry);
    registry
}

pub async fn build_ctx(settings: Settings) -> anyhow::Result<AppCtx> {
    let db = medley_db::connect(&settings.database).await?;
    Ok(AppCtx {
        settings: Arc::new(settings),
        db,
        mailer: Arc::new(LogMailer),
    })
}

/// Apply pending module migrations.
pub async fn migrate(registry: &ModuleRegistry, ctx: &AppCtx) -> anyhow::Result<()> {
    medley_db::run_migrations(&ctx.db, &registry.collect_migrations()).await?;
    tracing::info!("migrations applied");
    Ok(())
}

/// Full lifecycle: migrate, init, serve until shutdown, then stop modules.
pub async fn run(settings: Settings) -> anyhow::Result<()> {
    let registry = build_registry();
    let ctx = build_ctx(settings).await?;

    migrate(&registry, &ctx).await?;
    registry.init_modules(&ctx).await?;
    registry.start_modules(&ctx).await?;

    medley_http::start_server(&registry, &ctx).await?;

    registry.stop_modules().await?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use medley_authz::Role;
    use medley_kernel::mail::LogMailer;
    use medley_kernel::{AppCtx, Settings};

    use crate::modules::genres::{self, CreateGenre};
    use crate::modules::titles::models::CreateTitle;
    use crate::modules::titles::store as titles_store;
    use crate::modules::users::models::{CreateUser, User};
    use crate::modules::users::store as users_store;

    /// Fresh in-memory context with every module's migrations applied.
    pub async fn test_ctx() -> AppCtx {
        let registry = crate::build_registry();
        let db = medley_db::memory_pool().await.unwrap();
        medley_db::run_migrations(&db, &registry.collect_migrations())
            .await
            .unwrap();

        AppCtx {
            settings: Arc::new(Settings::default()),
            db,
            mailer: Arc::new(LogMailer),
        }
    }

    pub async fn seed_user(ctx: &AppCtx, username: &str, role: Role) -> User {
        users_store::create(
            &ctx.db,
            &CreateUser {
                username: username.to_string(),
                email: format!("{username}@example.com"),
                role: Some(role),
                first_name: None,
                last_name: None,
                bio: None,
            },
            "seed-code",
        )
        .await
        .unwrap()
    }

    /// Create a title under the shared "fiction" genre, creating the genre on
    /// first use.
    pub async fn seed_title(ctx: &AppCtx, name: &str, year: i64) -> i64 {
        if genres::get_by_slug(&ctx.db, "fiction").await.unwrap().is_none() {
            genres::create(
                &ctx.db,
                &CreateGenre {
                    name: "Fiction".to_string(),
                    slug: "fiction".to_string(),
                },
            )
            .await
            .unwrap();
        }

        titles_store::create(
            &ctx.db,
            &CreateTitle {
                name: name.to_string(),
                year,
                description: None,
                genre: vec!["fiction".to_string()],
                category: None,
            },
        )
        .await
        .unwrap()
        .id
    }
}
