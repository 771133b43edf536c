use bookshelf_sync::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = match std::env::args().nth(1) {
        Some(path) => AppConfig::load_from(std::path::Path::new(&path))?,
        None => AppConfig::load()?,
    };

    // stdoutはMCPトランスポートなのでログはstderrへ
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("bookshelf_sync={}", config.logging.level).into());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    tracing::info!("Starting bookshelf-sync v{}", env!("CARGO_PKG_VERSION"));

    bookshelf_sync::interface::mcp::run(config).await
}
