//! TUI rendering traits for calshare types.
//!
//! Extension traits that add colored terminal rendering to calshare-core
//! types using owo_colors.

use calshare_core::ics::ParsedEvent;
use calshare_core::{EventDraft, GeneratedArtifact, RecurrenceRule, SweepReport};
use chrono::{DateTime, Utc};
use owo_colors::OwoColorize;
use uuid::Uuid;

/// Extension trait for TUI rendering with colors.
pub trait Render {
    fn render(&self) -> String;
}

/// Leading block of an id, enough to pick an artifact out of the history.
pub fn short_id(id: &Uuid) -> String {
    id.to_string().chars().take(8).collect()
}

/// Simple pluralization helper
pub fn pluralize(word: &str, count: usize) -> String {
    if count == 1 {
        word.to_string()
    } else {
        format!("{}s", word)
    }
}

pub fn render_time_range(start: DateTime<Utc>, end: DateTime<Utc>) -> String {
    if start.date_naive() == end.date_naive() {
        format!(
            "{} {} → {} UTC",
            start.format("%Y-%m-%d"),
            start.format("%H:%M"),
            end.format("%H:%M")
        )
    } else {
        format!(
            "{} → {} UTC",
            start.format("%Y-%m-%d %H:%M"),
            end.format("%Y-%m-%d %H:%M")
        )
    }
}

fn render_recurrence(rule: RecurrenceRule) -> String {
    if rule.is_recurring() {
        format!(" ↻ {}", rule.token().to_lowercase())
    } else {
        String::new()
    }
}

/// "expires in 6days 23h 59m", or "expired" in red.
pub fn render_remaining(artifact: &GeneratedArtifact, now: DateTime<Utc>) -> String {
    if artifact.is_expired(now) {
        return "expired".red().to_string();
    }

    // Minute precision is plenty for a retention window
    let secs = artifact.remaining(now).num_seconds().max(0) as u64;
    let remaining = std::time::Duration::from_secs(secs / 60 * 60);
    format!("expires in {}", humantime::format_duration(remaining))
}

impl Render for GeneratedArtifact {
    fn render(&self) -> String {
        let count = self.drafts.len();
        let events = format!("{} {}", count, pluralize("event", count));

        format!(
            "{}  {}  {}  {}  {}",
            short_id(&self.id).yellow(),
            self.file_name.bold(),
            events.dimmed(),
            self.created.format("%Y-%m-%d %H:%M").dimmed(),
            render_remaining(self, Utc::now())
        )
    }
}

impl Render for EventDraft {
    fn render(&self) -> String {
        let mut line = format!(
            "• {} {}{}",
            self,
            render_time_range(self.start, self.end).dimmed(),
            render_recurrence(self.recurrence).dimmed()
        );
        if !self.has_valid_range() {
            line.push_str(&format!(" {}", "(ends before it starts)".yellow()));
        }
        line
    }
}

impl Render for ParsedEvent {
    fn render(&self) -> String {
        let summary = if self.summary.is_empty() {
            "(No title)"
        } else {
            &self.summary
        };

        let mut lines = vec![format!(
            "• {} {}{}",
            summary,
            render_time_range(self.start, self.end).dimmed(),
            render_recurrence(self.recurrence).dimmed()
        )];
        if !self.description.is_empty() {
            lines.push(format!("    {}", self.description.dimmed()));
        }
        if !self.url.is_empty() {
            lines.push(format!("    {}", self.url.blue()));
        }
        lines.join("\n")
    }
}

impl Render for SweepReport {
    fn render(&self) -> String {
        let mut lines = vec![format!(
            "Examined {} uploaded {}: {} deleted, {} kept",
            self.examined,
            pluralize("file", self.examined),
            self.deleted.to_string().green(),
            self.retained
        )];

        if self.records_removed > 0 {
            lines.push(format!(
                "Removed {} expired history {}",
                self.records_removed,
                pluralize("record", self.records_removed)
            ));
        }

        for failure in &self.failures {
            lines.push(format!(
                "   {} {} {}",
                "!".red(),
                failure.reference,
                failure.reason.red()
            ));
        }

        if self.cancelled {
            lines.push("Sweep cancelled before finishing".yellow().to_string());
        }

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_render_time_range_same_day() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
        assert_eq!(
            render_time_range(start, start + Duration::hours(1)),
            "2024-01-01 10:00 → 11:00 UTC"
        );
    }

    #[test]
    fn test_render_time_range_across_days() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 22, 0, 0).unwrap();
        assert_eq!(
            render_time_range(start, start + Duration::hours(3)),
            "2024-01-01 22:00 → 2024-01-02 01:00 UTC"
        );
    }

    #[test]
    fn test_short_id() {
        let id = Uuid::parse_str("67e55044-10b1-426f-9247-bb680e5fe0c8").unwrap();
        assert_eq!(short_id(&id), "67e55044");
    }

    #[test]
    fn test_pluralize() {
        assert_eq!(pluralize("event", 1), "event");
        assert_eq!(pluralize("event", 0), "events");
    }
}
