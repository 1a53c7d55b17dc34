use std::path::Path;

use anyhow::{Result, bail};
use calshare_core::{EventDraft, EventDraftSet};
use chrono::{DurationRound, TimeDelta, Utc};
use owo_colors::OwoColorize;

use crate::render::{Render, pluralize};

/// Write a draft file with `count` placeholder events, one per day starting
/// at the next full hour.
pub fn run(path: &Path, count: usize, file_name: Option<String>, max_drafts: usize) -> Result<()> {
    if path.exists() {
        bail!("{} already exists", path.display());
    }
    if count > max_drafts {
        bail!("At most {} events fit in one calendar file", max_drafts);
    }

    let first_start = Utc::now().duration_trunc(TimeDelta::hours(1))? + TimeDelta::hours(1);

    let mut drafts = EventDraftSet::new(file_name.unwrap_or_default());
    for i in 0..count {
        let mut draft = EventDraft::starting_at(first_start + TimeDelta::days(i as i64));
        draft.title = format!("Event {}", i + 1);
        drafts.push(draft, max_drafts)?;
    }

    drafts.save(path)?;

    println!(
        "Created {} with {} {}",
        path.display().to_string().bold(),
        count,
        pluralize("event", count)
    );
    for draft in drafts.drafts() {
        println!("   {}", draft.render());
    }
    println!(
        "\nEdit it, then run {}",
        format!("calshare generate {}", path.display()).dimmed()
    );

    Ok(())
}
