use anyhow::{Result, bail};
use calshare_core::CalShareConfig;
use calshare_core::ics::parse_document;
use calshare_core::lifecycle::Stores;
use calshare_core::storage::{LocalStore, ObjectStore};
use owo_colors::OwoColorize;

use super::{find_artifact, open_session};
use crate::render::Render;

/// Print a past artifact, reading its events back from the file itself.
pub async fn run(config: &CalShareConfig, id: &str) -> Result<()> {
    let session = open_session(config)?;
    let artifact = find_artifact(session.history().await?, id)?;
    let stores = Stores::from_config(config);

    println!("{}", artifact.render());

    // Prefer the local copy, fall back to downloading the shared one
    let local = match &artifact.local_path {
        Some(path) if stores.local.exists(path).await => Some(path.clone()),
        _ => None,
    };
    let bytes = match (&local, &artifact.remote) {
        (Some(path), _) => {
            println!("{} {}", "Local copy:".dimmed(), path.display());
            tokio::fs::read(path).await?
        }
        (None, Some(remote)) => {
            println!("{} {}", "Share link:".dimmed(), remote.to_string().blue());
            stores.objects.fetch(remote).await?
        }
        (None, None) => bail!("Neither a local copy nor an uploaded file is left for this artifact"),
    };

    let events = parse_document(&String::from_utf8_lossy(&bytes))?;
    println!();
    for event in &events {
        println!("{}", event.render());
    }

    Ok(())
}
