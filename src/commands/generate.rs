use std::path::Path;

use anyhow::Result;
use calshare_core::{CalShareConfig, EventDraftSet};
use owo_colors::OwoColorize;

use super::open_session;
use crate::render::Render;
use crate::utils::tui::create_spinner;

pub async fn run(config: &CalShareConfig, path: &Path) -> Result<()> {
    let drafts = EventDraftSet::load(path)?;

    for draft in drafts.drafts().iter().filter(|d| !d.has_valid_range()) {
        println!("{} {}", "warning:".yellow(), draft.render());
    }

    let mut session = open_session(config)?;
    session.replace_drafts(drafts).await?;

    let local_path = session.generate().await?;

    let spinner = create_spinner(format!("Uploading {}", session.drafts().resolved_file_name()));
    let result = session.wait_for_upload().await;
    spinner.finish_and_clear();

    println!("{} {}", "Local copy:".dimmed(), local_path.display());

    match result {
        Some(Ok(artifact)) => {
            println!("{}", artifact.render());
            if let Some(link) = session.share_link() {
                println!("{} {}", "Share link:".dimmed(), link.to_string().blue());
            }
            Ok(())
        }
        Some(Err(e)) => {
            println!("   {}", e.to_string().red());
            println!("   The local copy can still be shared directly.");
            Err(e.into())
        }
        None => Ok(()),
    }
}
