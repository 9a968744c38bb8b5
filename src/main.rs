use medley_kernel::Settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load()?;
    medley_telemetry::init(&settings.telemetry);

    tracing::info!(
        environment = ?settings.environment,
        host = %settings.server.host,
        port = settings.server.port,
        "starting medley"
    );

    medley_app::run(settings).await
}
