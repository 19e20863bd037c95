use std::env;
use std::net::SocketAddr;

use anistream_core::{ResolutionService, ResolverConfig};
use anistream_server::{AppState, create_router};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match env::var("RESOLVER_CONFIG") {
        Ok(path) if !path.trim().is_empty() => {
            tracing::info!("Loading resolver config from {}", path);
            ResolverConfig::from_file(path.trim())?
        }
        _ => ResolverConfig::default(),
    };

    let port: u16 = env::var("PORT")
        .unwrap_or_else(|_| "3000".to_string())
        .parse()?;
    let addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;

    let service = ResolutionService::from_config(&config)?;
    let app = create_router(AppState::new(service));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("Shutting down");
        })
        .await?;

    Ok(())
}
