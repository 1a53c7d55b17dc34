use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use calshare_core::CalShareConfig;
use owo_colors::OwoColorize;

use super::{find_artifact, open_session};
use crate::render::pluralize;

/// Write a draft file holding a copy of a past artifact's events.
pub async fn run(config: &CalShareConfig, id: &str, output: Option<PathBuf>) -> Result<()> {
    let mut session = open_session(config)?;
    let artifact = find_artifact(session.history().await?, id)?;

    session.import_artifact(&artifact).await?;

    let output = output.unwrap_or_else(|| default_output(&session.drafts().resolved_file_name()));
    if output.exists() {
        bail!("{} already exists", output.display());
    }
    session.drafts().save(&output)?;

    let count = session.drafts().len();
    println!(
        "Wrote {} {} to {}",
        count,
        pluralize("event", count),
        output.display().to_string().bold()
    );
    Ok(())
}

/// `Team Offsite.ics` → `Team Offsite.toml`
fn default_output(file_name: &str) -> PathBuf {
    Path::new(file_name).with_extension("toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_output() {
        assert_eq!(default_output("Team Offsite.ics"), PathBuf::from("Team Offsite.toml"));
        assert_eq!(default_output("generated_events.ics"), PathBuf::from("generated_events.toml"));
    }
}
