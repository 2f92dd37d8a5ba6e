use taskflow_server::{build_router, AppConfig, AppState, AssistantClient, Mailer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "taskflow_server=info,tower_http=info".into()),
        )
        .init();

    let config = AppConfig::from_env()?;
    tracing::info!("data directory: {}", config.data_dir.display());

    let mailer = Mailer::from_config(&config.email)?;
    let assistant = AssistantClient::from_config(&config.assistant)?;
    if assistant.is_none() {
        tracing::info!("ANTHROPIC_API_KEY not set, assistant answers from local summaries only");
    }

    let port = config.port;
    let base_url = config.base_url.clone();
    let state = AppState::new(config, mailer, assistant)?;
    tracing::info!("database initialized");

    let app = build_router(state);

    tracing::info!("starting server at {base_url}");

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
