//! Core of calshare: turns event drafts into an iCalendar file and manages
//! the shareable copies of it.
//!
//! - `draft` / `recurrence` for the events being edited
//! - `ics` for building (and reading back) the calendar document
//! - `lifecycle` for the generate → local copy → upload → history flow
//! - `sweeper` for expiring uploaded files and history records

pub mod artifact;
pub mod config;
pub mod constants;
pub mod draft;
pub mod error;
pub mod ics;
pub mod lifecycle;
pub mod recurrence;
pub mod storage;
pub mod sweeper;

pub use artifact::GeneratedArtifact;
pub use config::CalShareConfig;
pub use draft::{EventDraft, EventDraftSet};
pub use error::{CalShareError, CalShareResult, ValidationError};
pub use lifecycle::{
    ArtifactLifecycleManager, DeleteOutcome, DeletePolicy, LifecycleSettings, SessionState, Stores,
};
pub use recurrence::RecurrenceRule;
pub use sweeper::{ExpirationSweeper, SweepFailure, SweepReport};
