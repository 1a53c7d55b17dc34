use anyhow::Result;
use calshare_core::lifecycle::{DeleteOutcome, DeletePolicy};
use calshare_core::{CalShareConfig, CalShareError};
use owo_colors::OwoColorize;

use super::{find_artifact, open_session};
use crate::render::short_id;

pub async fn run(config: &CalShareConfig, id: &str, abandon_remote: bool) -> Result<()> {
    let mut session = open_session(config)?;
    let artifact = find_artifact(session.history().await?, id)?;

    let policy = if abandon_remote {
        DeletePolicy::AbandonRemote
    } else {
        DeletePolicy::RetainRecord
    };

    match session.delete_artifact(&artifact, policy).await {
        Ok(DeleteOutcome::Deleted) => {
            println!("Deleted {} {}", short_id(&artifact.id).yellow(), artifact.file_name);
            Ok(())
        }
        Ok(DeleteOutcome::RemoteOrphaned(reference)) => {
            println!("Deleted {} {}", short_id(&artifact.id).yellow(), artifact.file_name);
            println!(
                "   {} {} is left behind until it expires",
                "!".yellow(),
                reference.to_string().dimmed()
            );
            Ok(())
        }
        Err(e @ CalShareError::RemoteDelete { .. }) => {
            println!("   {}", e.to_string().red());
            println!(
                "   The record was kept. Retry, or use {} to drop it anyway.",
                "--abandon-remote".bold()
            );
            Err(e.into())
        }
        Err(e) => Err(e.into()),
    }
}
