//! Event drafts being edited before a calendar file is generated.

use std::fmt;
use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::{DEFAULT_FILE_NAME, ICS_EXTENSION};
use crate::error::{CalShareError, CalShareResult, ValidationError};
use crate::recurrence::RecurrenceRule;

/// One event as the user is editing it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDraft {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Stored as typed; not validated or escaped.
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub recurrence: RecurrenceRule,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl EventDraft {
    /// A fresh draft starting now and lasting one hour.
    pub fn new() -> Self {
        Self::starting_at(Utc::now())
    }

    pub fn starting_at(start: DateTime<Utc>) -> Self {
        EventDraft {
            id: Uuid::new_v4(),
            title: String::new(),
            description: String::new(),
            url: String::new(),
            recurrence: RecurrenceRule::None,
            start,
            end: start + Duration::hours(1),
        }
    }

    /// Copy of this draft under a new identity.
    pub fn duplicate(&self) -> Self {
        EventDraft {
            id: Uuid::new_v4(),
            ..self.clone()
        }
    }

    /// False when the end lies before the start. Such drafts are still
    /// generated as given.
    pub fn has_valid_range(&self) -> bool {
        self.end >= self.start
    }
}

impl Default for EventDraft {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventDraft {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.title.is_empty() {
            write!(f, "(No title)")
        } else {
            write!(f, "{}", self.title)
        }
    }
}

/// The ordered drafts that make up one calendar file, plus its file name.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EventDraftSet {
    #[serde(default)]
    pub file_name: String,
    #[serde(default)]
    events: Vec<EventDraft>,
}

impl EventDraftSet {
    pub fn new(file_name: impl Into<String>) -> Self {
        EventDraftSet {
            file_name: file_name.into(),
            events: Vec::new(),
        }
    }

    pub fn from_drafts(file_name: impl Into<String>, events: Vec<EventDraft>) -> Self {
        EventDraftSet {
            file_name: file_name.into(),
            events,
        }
    }

    pub fn drafts(&self) -> &[EventDraft] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn get(&self, id: Uuid) -> Option<&EventDraft> {
        self.events.iter().find(|d| d.id == id)
    }

    pub fn get_mut(&mut self, id: Uuid) -> Option<&mut EventDraft> {
        self.events.iter_mut().find(|d| d.id == id)
    }

    /// Append a draft, refusing once `max` drafts are present.
    pub fn push(&mut self, draft: EventDraft, max: usize) -> Result<(), ValidationError> {
        if self.events.len() >= max {
            return Err(ValidationError::DraftLimitReached { max });
        }
        self.events.push(draft);
        Ok(())
    }

    pub fn remove(&mut self, id: Uuid) -> Option<EventDraft> {
        let pos = self.events.iter().position(|d| d.id == id)?;
        Some(self.events.remove(pos))
    }

    /// File name with the `.ics` extension, falling back to the default name
    /// when the user left it empty.
    pub fn resolved_file_name(&self) -> String {
        let name = self.file_name.trim();
        let name = if name.is_empty() { DEFAULT_FILE_NAME } else { name };

        let suffix = format!(".{}", ICS_EXTENSION);
        if name.to_lowercase().ends_with(&suffix) {
            name.to_string()
        } else {
            format!("{}{}", name, suffix)
        }
    }

    /// Parse a draft file: `file_name` plus one `[[events]]` table per draft.
    pub fn from_toml(contents: &str) -> CalShareResult<Self> {
        toml::from_str(contents).map_err(|e| CalShareError::Serialization(e.to_string()))
    }

    pub fn to_toml(&self) -> CalShareResult<String> {
        toml::to_string_pretty(self).map_err(|e| CalShareError::Serialization(e.to_string()))
    }

    pub fn load(path: &Path) -> CalShareResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents).map_err(|e| {
            CalShareError::Serialization(format!("{}: {}", path.display(), e))
        })
    }

    pub fn save(&self, path: &Path) -> CalShareResult<()> {
        std::fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    /// Deep copy with every draft under a new identity, used when a past
    /// artifact is brought back for editing.
    pub fn duplicate(&self) -> Self {
        EventDraftSet {
            file_name: self.file_name.clone(),
            events: self.events.iter().map(EventDraft::duplicate).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn make_test_draft(title: &str) -> EventDraft {
        let mut draft = EventDraft::starting_at(Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap());
        draft.title = title.to_string();
        draft
    }

    #[test]
    fn test_new_draft_defaults() {
        let draft = EventDraft::new();
        assert_eq!(draft.end - draft.start, Duration::hours(1));
        assert_eq!(draft.recurrence, RecurrenceRule::None);
        assert!(draft.title.is_empty());
    }

    #[test]
    fn test_push_rejects_over_limit_without_mutation() {
        let mut set = EventDraftSet::new("trip");
        set.push(make_test_draft("a"), 2).unwrap();
        set.push(make_test_draft("b"), 2).unwrap();

        let before = set.clone();
        let err = set.push(make_test_draft("c"), 2).unwrap_err();

        assert_eq!(err, ValidationError::DraftLimitReached { max: 2 });
        assert_eq!(set, before);
    }

    #[test]
    fn test_remove_keeps_order() {
        let a = make_test_draft("a");
        let b = make_test_draft("b");
        let c = make_test_draft("c");
        let mut set = EventDraftSet::from_drafts("", vec![a.clone(), b.clone(), c.clone()]);

        assert_eq!(set.remove(b.id), Some(b));
        let titles: Vec<_> = set.drafts().iter().map(|d| d.title.as_str()).collect();
        assert_eq!(titles, vec!["a", "c"]);
    }

    #[test]
    fn test_resolved_file_name() {
        assert_eq!(EventDraftSet::new("").resolved_file_name(), "generated_events.ics");
        assert_eq!(EventDraftSet::new("   ").resolved_file_name(), "generated_events.ics");
        assert_eq!(EventDraftSet::new("Holidays").resolved_file_name(), "Holidays.ics");
        assert_eq!(EventDraftSet::new("plan.ICS").resolved_file_name(), "plan.ICS");
    }

    #[test]
    fn test_duplicate_assigns_fresh_ids() {
        let set = EventDraftSet::from_drafts("x", vec![make_test_draft("a"), make_test_draft("b")]);
        let copy = set.duplicate();

        assert_eq!(copy.file_name, "x");
        for (orig, dup) in set.drafts().iter().zip(copy.drafts()) {
            assert_ne!(orig.id, dup.id);
            assert_eq!(orig.title, dup.title);
            assert_eq!(orig.start, dup.start);
        }
    }

    #[test]
    fn test_draft_file_toml() {
        let toml_str = r#"
file_name = "Conference"

[[events]]
title = "Keynote"
start = "2024-05-01T09:00:00Z"
end = "2024-05-01T10:00:00Z"
recurrence = "Yearly"

[[events]]
title = "Lunch"
start = "2024-05-01T12:00:00Z"
end = "2024-05-01T13:00:00Z"
"#;
        let set = EventDraftSet::from_toml(toml_str).unwrap();

        assert_eq!(set.file_name, "Conference");
        assert_eq!(set.len(), 2);
        assert_eq!(set.drafts()[0].recurrence, RecurrenceRule::Yearly);
        assert_eq!(set.drafts()[1].recurrence, RecurrenceRule::None);
        assert_ne!(set.drafts()[0].id, set.drafts()[1].id);
    }

    #[test]
    fn test_draft_file_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("drafts.toml");
        let mut set = EventDraftSet::new("Trip");
        set.push(make_test_draft("Flight"), 20).unwrap();
        set.push(make_test_draft("Hotel; check-in, late"), 20).unwrap();

        set.save(&path).unwrap();
        let loaded = EventDraftSet::load(&path).unwrap();

        assert_eq!(loaded, set);
    }

    #[test]
    fn test_draft_file_missing_times_is_error() {
        let err = EventDraftSet::from_toml("[[events]]\ntitle = \"No times\"\n").unwrap_err();
        assert!(matches!(err, CalShareError::Serialization(_)));
    }
}
