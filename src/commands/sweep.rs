use std::sync::Arc;

use anyhow::Result;
use calshare_core::lifecycle::Stores;
use calshare_core::{CalShareConfig, ExpirationSweeper};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::render::Render;
use crate::utils::tui::create_spinner;

/// One sweep pass. Ctrl-C stops it between files.
pub async fn run(config: &CalShareConfig) -> Result<()> {
    let sweeper = Arc::new(ExpirationSweeper::new(
        &Stores::from_config(config),
        config.retention()?,
    ));

    let token = CancellationToken::new();
    let cancel = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("interrupted, cancelling sweep");
            cancel.cancel();
        }
    });

    let spinner = create_spinner("Sweeping expired files".to_string());
    let result = sweeper.spawn(token).await;
    spinner.finish_and_clear();

    let report = result??;
    println!("{}", report.render());

    if !report.is_success() && !report.cancelled {
        anyhow::bail!("{} files could not be swept", report.failures.len());
    }
    Ok(())
}
