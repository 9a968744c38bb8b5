use anyhow::Context;
use clap::{Parser, Subcommand};

use medley_kernel::settings::Settings;

#[derive(Parser)]
#[command(name = "medley", about = "Medley catalog-and-review service")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run pending database migrations and exit
    Migrate,
    /// Run migrations and start the HTTP server
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load().with_context(|| "failed to load Medley settings")?;
    medley_telemetry::init(&settings.telemetry);

    match cli.command {
        Command::Migrate => {
            let registry = medley_app::build_registry();
            let ctx = medley_app::build_ctx(settings).await?;
            medley_app::migrate(&registry, &ctx).await?;
            tracing::info!("migrations complete");
        }
        Command::Serve => {
            medley_app::run(settings).await?;
        }
    }

    Ok(())
}
