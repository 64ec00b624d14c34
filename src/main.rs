use tokio::net::TcpListener;

use chathub::config::Config;
use chathub::state::AppState;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chathub=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env();
    print_banner(&config);

    let db = chathub::db::create_pool(&config.database_url)
        .await
        .expect("failed to create database pool");

    let state = AppState::new(db, config.hub_capacity, config.session_settings());
    let app = chathub::routes::router(state);

    let listener = TcpListener::bind(("0.0.0.0", config.port))
        .await
        .expect("failed to bind");

    let actual_port = listener
        .local_addr()
        .expect("failed to get local address")
        .port();
    eprintln!("  \x1b[32m→ listening on 0.0.0.0:{actual_port}\x1b[0m");
    eprintln!();

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");
}

fn print_banner(config: &Config) {
    let version = env!("CARGO_PKG_VERSION");
    let liveness = match config.liveness.ping_interval {
        Some(interval) => format!(
            "ping every {}s, idle after {}s",
            interval.as_secs(),
            config.liveness.idle_timeout.as_secs()
        ),
        None => "off".to_string(),
    };

    eprintln!();
    eprintln!("  \x1b[1;36mchathub\x1b[0m \x1b[2mv{version}\x1b[0m");
    eprintln!();
    eprintln!("  \x1b[2mport\x1b[0m         {}", config.port);
    eprintln!("  \x1b[2mdatabase\x1b[0m     {}", config.database_url);
    eprintln!("  \x1b[2mqueue\x1b[0m        {} per session", config.outbound_capacity);
    eprintln!("  \x1b[2mliveness\x1b[0m     {liveness}");
    eprintln!();
    // Identity comes straight from the connection path.
    eprintln!("  \x1b[33m! websocket connections are not authenticated\x1b[0m");
    eprintln!();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
