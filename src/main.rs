use anyhow::Result;
use tushare_mcp::{
    config::{Config, TransportKind},
    dispatcher::Dispatcher,
    server::Server,
    transport::ServerStdioTransport,
    upstream::TushareClient,
};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load();

    // stdout carries the stdio protocol, so logs go to stderr.
    tracing_subscriber::fmt()
        .with_max_level(if config.debug {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .with_writer(std::io::stderr)
        .init();

    if !config.has_token() {
        eprintln!("Error: TUSHARE_TOKEN environment variable is required");
        std::process::exit(1);
    }
    tracing::debug!(?config, "Loaded configuration");

    let dispatcher = Dispatcher::new(TushareClient::new(&config)?);
    let builder = Server::builder(dispatcher);

    match config.transport {
        TransportKind::Stdio => {
            let transport = ServerStdioTransport::new(builder.build());
            Server::start(transport).await
        }
        #[cfg(feature = "sse")]
        TransportKind::Sse => {
            // Each SSE session handshakes against its own protocol.
            let transport = tushare_mcp::transport::ServerSseTransport::new(
                config.host.clone(),
                config.port,
                move || builder.build(),
            )
            .with_ping_interval(std::time::Duration::from_secs(config.sse_ping_interval));
            Server::start(transport).await
        }
        #[cfg(not(feature = "sse"))]
        TransportKind::Sse => Err(anyhow::anyhow!(
            "SSE transport requires the `sse` feature"
        )),
    }
}
