use search_cluster::config::NodeConfig;
use search_cluster::node::Node;

use std::net::SocketAddr;
use std::path::PathBuf;

fn usage(program: &str) {
    eprintln!("Usage: {} [--bind <addr:port>] [--config <file.json>]", program);
    eprintln!("Example: {} --bind 127.0.0.1:40020", program);
    eprintln!(
        "Example: {} --bind 127.0.0.1:40021 --config cluster.json",
        program
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        // .with_max_level(tracing::Level::DEBUG)
        .with_max_level(tracing::Level::INFO)
        .init();

    let args: Vec<String> = std::env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("search-node");

    let mut bind_addr: Option<SocketAddr> = None;
    let mut config_path: Option<PathBuf> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--bind" => {
                let Some(value) = args.get(i + 1) else {
                    usage(program);
                    anyhow::bail!("--bind requires a value");
                };
                bind_addr = Some(value.parse()?);
                i += 2;
            }
            "--config" => {
                let Some(value) = args.get(i + 1) else {
                    usage(program);
                    anyhow::bail!("--config requires a value");
                };
                config_path = Some(PathBuf::from(value));
                i += 2;
            }
            "--help" | "-h" => {
                usage(program);
                return Ok(());
            }
            _ => {
                i += 1;
            }
        }
    }

    let mut config = NodeConfig::load(config_path.as_deref())?;
    if let Some(bind) = bind_addr {
        config.bind = bind;
    }

    tracing::info!("Starting node on {}", config.bind);
    if config.layout.is_empty() {
        tracing::warn!("No shard layout configured, every command will resolve to no servers");
    }

    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    let node = Node::start(config);
    let app = node.router();

    tracing::info!("HTTP server listening on {}", listener.local_addr()?);
    tracing::info!("Press Ctrl+C to shutdown");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
        })
        .await?;

    node.shutdown().await;
    Ok(())
}
