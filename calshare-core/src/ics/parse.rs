//! Reading generated documents back using the icalendar crate's parser.

use chrono::{DateTime, Utc};
use icalendar::{
    CalendarDateTime, DatePerhapsTime,
    parser::{Component, read_calendar, unfold},
};

use super::text::unescape_text;
use crate::error::{CalShareError, CalShareResult};
use crate::recurrence::RecurrenceRule;

/// An event as found in an .ics document.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedEvent {
    pub uid: String,
    pub summary: String,
    pub description: String,
    pub url: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub recurrence: RecurrenceRule,
}

/// Parse every VEVENT of an .ics document, in document order.
pub fn parse_document(content: &str) -> CalShareResult<Vec<ParsedEvent>> {
    let unfolded = unfold(content);
    let calendar = read_calendar(&unfolded).map_err(CalShareError::IcsParse)?;

    calendar
        .components
        .iter()
        .filter(|c| c.name == "VEVENT")
        .map(parse_event)
        .collect()
}

fn parse_event(vevent: &Component) -> CalShareResult<ParsedEvent> {
    let uid = vevent
        .find_prop("UID")
        .map(|p| p.val.to_string())
        .ok_or_else(|| CalShareError::IcsParse("VEVENT without UID".into()))?;

    let text = |name: &str| {
        vevent
            .find_prop(name)
            .map(|p| unescape_text(p.val.as_ref()))
            .unwrap_or_default()
    };

    let start = utc_property(vevent, "DTSTART", &uid)?;
    let end = utc_property(vevent, "DTEND", &uid)?;

    let url = vevent
        .find_prop("URL")
        .map(|p| p.val.to_string())
        .unwrap_or_default();

    let recurrence = vevent
        .find_prop("RRULE")
        .map(|p| RecurrenceRule::from_token(p.val.as_ref()))
        .unwrap_or_default();

    Ok(ParsedEvent {
        summary: text("SUMMARY"),
        description: text("DESCRIPTION"),
        uid,
        url,
        start,
        end,
        recurrence,
    })
}

fn utc_property(vevent: &Component, name: &str, uid: &str) -> CalShareResult<DateTime<Utc>> {
    let prop = vevent
        .find_prop(name)
        .ok_or_else(|| CalShareError::IcsParse(format!("Event '{}' has no {}", uid, name)))?;

    let value = DatePerhapsTime::try_from(prop)
        .map_err(|_| CalShareError::IcsParse(format!("Event '{}' has an invalid {}", uid, name)))?;

    match value {
        DatePerhapsTime::DateTime(CalendarDateTime::Utc(dt)) => Ok(dt),
        DatePerhapsTime::DateTime(CalendarDateTime::Floating(naive)) => Ok(naive.and_utc()),
        DatePerhapsTime::Date(d) => d
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc())
            .ok_or_else(|| CalShareError::IcsParse(format!("Event '{}' has an invalid {}", uid, name))),
        DatePerhapsTime::DateTime(CalendarDateTime::WithTimezone { .. }) => Err(CalShareError::IcsParse(
            format!("Event '{}' uses a TZID {}; only UTC times are supported", uid, name),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draft::{EventDraft, EventDraftSet};
    use crate::ics::generate_ics;
    use chrono::TimeZone;

    fn make_test_draft(title: &str, hour: u32) -> EventDraft {
        let mut draft = EventDraft::starting_at(Utc.with_ymd_and_hms(2024, 3, 20, hour, 0, 0).unwrap());
        draft.title = title.to_string();
        draft.description = format!("About {}", title);
        draft.url = "https://example.com/event".to_string();
        draft
    }

    #[test]
    fn test_roundtrip_preserves_events() {
        let mut standup = make_test_draft("Standup", 9);
        standup.recurrence = RecurrenceRule::Weekly;
        let drafts = vec![standup, make_test_draft("Retro", 15)];
        let set = EventDraftSet::from_drafts("team", drafts.clone());

        let parsed = parse_document(&generate_ics(&set)).unwrap();

        assert_eq!(parsed.len(), drafts.len());
        for (draft, event) in drafts.iter().zip(&parsed) {
            assert_eq!(event.summary, draft.title);
            assert_eq!(event.description, draft.description);
            assert_eq!(event.url, draft.url);
            assert_eq!(event.start, draft.start);
            assert_eq!(event.end, draft.end);
            assert_eq!(event.recurrence, draft.recurrence);
        }
    }

    #[test]
    fn test_roundtrip_with_reserved_characters_and_folding() {
        let mut draft = make_test_draft("Dinner, drinks; \\ more", 19);
        draft.description = format!("Line one\nLine two, {}", "long ".repeat(40).trim_end());
        let set = EventDraftSet::from_drafts("", vec![draft.clone()]);

        let parsed = parse_document(&generate_ics(&set)).unwrap();

        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].summary, draft.title);
        assert_eq!(parsed[0].description, draft.description);
    }

    #[test]
    fn test_parse_empty_calendar() {
        let parsed = parse_document(&generate_ics(&EventDraftSet::default())).unwrap();
        assert!(parsed.is_empty());
    }
}
