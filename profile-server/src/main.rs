use profile_server::ServerConfig;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = ServerConfig::from_env();
    let listener = TcpListener::bind(config.addr()).await?;
    tracing::info!(addr = %config.addr(), "listening");
    profile_server::run(listener).await
}
