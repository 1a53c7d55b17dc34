//! Recurrence options for drafts and their RRULE encoding.

use std::fmt;

use chrono::{DateTime, Utc};
use rrule::RRuleSet;
use serde::{Deserialize, Serialize};

use crate::error::{CalShareError, CalShareResult};

/// How often an event repeats.
///
/// Persisted as its token (`"None"`, `"Daily"`, ...). Unknown tokens decode to
/// `None` so old or hand-edited history never fails to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RecurrenceRule {
    #[default]
    None,
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl RecurrenceRule {
    pub const ALL: [RecurrenceRule; 5] = [
        RecurrenceRule::None,
        RecurrenceRule::Daily,
        RecurrenceRule::Weekly,
        RecurrenceRule::Monthly,
        RecurrenceRule::Yearly,
    ];

    /// RRULE value for this rule. Empty for `None`, which means no RRULE line.
    pub fn encode(&self) -> &'static str {
        match self {
            RecurrenceRule::None => "",
            RecurrenceRule::Daily => "FREQ=DAILY",
            RecurrenceRule::Weekly => "FREQ=WEEKLY",
            RecurrenceRule::Monthly => "FREQ=MONTHLY",
            RecurrenceRule::Yearly => "FREQ=YEARLY",
        }
    }

    pub fn token(&self) -> &'static str {
        match self {
            RecurrenceRule::None => "None",
            RecurrenceRule::Daily => "Daily",
            RecurrenceRule::Weekly => "Weekly",
            RecurrenceRule::Monthly => "Monthly",
            RecurrenceRule::Yearly => "Yearly",
        }
    }

    /// Decode a stored token. Accepts the display tokens in any case and the
    /// `FREQ=...` form; anything else is `None`.
    pub fn from_token(token: &str) -> Self {
        let token = token.trim();
        Self::ALL
            .into_iter()
            .find(|rule| {
                rule.token().eq_ignore_ascii_case(token)
                    || (!rule.encode().is_empty() && rule.encode().eq_ignore_ascii_case(token))
            })
            .unwrap_or_default()
    }

    pub fn is_recurring(&self) -> bool {
        *self != RecurrenceRule::None
    }

    /// Start instants of the first `count` occurrences beginning at `start`.
    pub fn occurrences(&self, start: DateTime<Utc>, count: u16) -> CalShareResult<Vec<DateTime<Utc>>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        if !self.is_recurring() {
            return Ok(vec![start]);
        }

        let rrule_str = format!(
            "DTSTART:{}\nRRULE:{}",
            start.format("%Y%m%dT%H%M%SZ"),
            self.encode()
        );

        let rrule_set: RRuleSet = rrule_str.parse().map_err(|e| {
            CalShareError::IcsParse(format!("Failed to parse RRULE '{}': {}", self.encode(), e))
        })?;

        let result = rrule_set.all(count);

        Ok(result
            .dates
            .iter()
            .map(|dt| dt.with_timezone(&Utc))
            .collect())
    }
}

impl From<String> for RecurrenceRule {
    fn from(token: String) -> Self {
        RecurrenceRule::from_token(&token)
    }
}

impl From<RecurrenceRule> for String {
    fn from(rule: RecurrenceRule) -> Self {
        rule.token().to_string()
    }
}

impl fmt::Display for RecurrenceRule {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.token())
    }
}
