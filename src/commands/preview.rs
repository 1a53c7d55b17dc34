use std::path::Path;

use anyhow::Result;
use calshare_core::EventDraftSet;
use calshare_core::ics::generate_ics;
use owo_colors::OwoColorize;

use crate::render::Render;

/// Print the calendar file a draft file would produce, or with `occurrences`
/// the upcoming starts of each recurring event.
pub fn run(path: &Path, occurrences: Option<u16>) -> Result<()> {
    let drafts = EventDraftSet::load(path)?;

    let Some(count) = occurrences else {
        print!("{}", generate_ics(&drafts));
        return Ok(());
    };

    for draft in drafts.drafts() {
        println!("{}", draft.render());
        if !draft.recurrence.is_recurring() {
            continue;
        }
        for start in draft.recurrence.occurrences(draft.start, count)? {
            println!("   {}", start.format("%Y-%m-%d %H:%M UTC").dimmed());
        }
    }

    Ok(())
}
