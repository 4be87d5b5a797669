use anyhow::Result;
use event_collector::{config::Config, server};

/// Execute the serve command
///
/// Runs in the foreground until SIGTERM or SIGINT, then drains and exits.
pub async fn execute(cfg: Config) -> Result<()> {
    server::start_server(cfg).await
}
