//! ICS document generation.

use chrono::{DateTime, Utc};
use icalendar::{Calendar, Component, Property};
use uuid::Uuid;

use super::text::{normalize_newlines, sanitize_uri};
use crate::constants::PRODID;
use crate::draft::{EventDraft, EventDraftSet};

const UTC_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// Generate the .ics text for every draft in the set, in order.
///
/// UID and DTSTAMP are the only values that differ between two calls on the
/// same drafts: each call stamps all events with the same generation time and
/// gives every event a fresh UID.
pub fn generate_ics(drafts: &EventDraftSet) -> String {
    generate_ics_at(drafts, Utc::now())
}

/// UTF-8 bytes of [`generate_ics`], ready to be written or uploaded.
pub fn build_document(drafts: &EventDraftSet) -> Vec<u8> {
    generate_ics(drafts).into_bytes()
}

pub(crate) fn generate_ics_at(drafts: &EventDraftSet, dtstamp: DateTime<Utc>) -> String {
    let mut cal = Calendar::new();
    cal.append_property(Property::new("METHOD", "PUBLISH"));

    let dtstamp = dtstamp.format(UTC_FORMAT).to_string();
    for draft in drafts.drafts() {
        cal.push(build_event(draft, &dtstamp));
    }

    fix_up_ics(&cal.done().to_string())
}

fn build_event(draft: &EventDraft, dtstamp: &str) -> icalendar::Event {
    let mut event = icalendar::Event::new();

    // TEXT escaping and folding are done by icalendar on output
    event
        .uid(&format!("{}@calshare", Uuid::new_v4()))
        .add_property("DTSTAMP", dtstamp)
        .summary(&normalize_newlines(&draft.title))
        .add_property("DTSTART", draft.start.format(UTC_FORMAT).to_string())
        .add_property("DTEND", draft.end.format(UTC_FORMAT).to_string())
        .description(&normalize_newlines(&draft.description))
        .add_property("URL", sanitize_uri(&draft.url));

    if draft.recurrence.is_recurring() {
        event.add_property("RRULE", draft.recurrence.encode());
    }

    event.done()
}

/// Clean up ICS output from the icalendar crate
/// - Replace the crate's PRODID with ours
/// - Terminate every line with CRLF
fn fix_up_ics(ics: &str) -> String {
    let mut result = String::with_capacity(ics.len());

    for line in ics.lines() {
        if line.starts_with("PRODID:") {
            result.push_str("PRODID:");
            result.push_str(PRODID);
            result.push_str("\r\n");
            continue;
        }

        result.push_str(line);
        result.push_str("\r\n");
    }

    result
}
