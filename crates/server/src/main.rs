//! ocrd server binary
//!
//! Listens on 0.0.0.0:3000 by default; see `ServerConfig` for overrides.

use server::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = ServerConfig::load()?;

    // Start server; a bind failure returns Err and exits non-zero
    server::start_server(config).await?;

    Ok(())
}
