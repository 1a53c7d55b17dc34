use anyhow::Result;
use calshare_core::CalShareConfig;
use owo_colors::OwoColorize;

use super::open_session;
use crate::render::Render;

pub async fn run(config: &CalShareConfig) -> Result<()> {
    let session = open_session(config)?;
    let history = session.history().await?;

    if history.is_empty() {
        println!("{}", "No generated files yet".dimmed());
        return Ok(());
    }

    for artifact in &history {
        println!("{}", artifact.render());
        if let Some(remote) = &artifact.remote {
            println!("   {}", remote.to_string().dimmed());
        }
    }

    println!(
        "\n{}/{} generated files kept",
        history.len(),
        session.settings().max_artifacts
    );
    Ok(())
}
