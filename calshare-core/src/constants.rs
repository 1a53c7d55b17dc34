/// Days a generated file stays on the object store before it is swept.
///
/// An earlier release kept files for 30 days; both are valid `retention`
/// settings in the config file.
pub const DEFAULT_RETENTION_DAYS: i64 = 7;

/// Maximum number of events in a single generated file.
pub const DEFAULT_MAX_DRAFTS: usize = 20;

/// Maximum number of generated files kept in history at the same time.
pub const DEFAULT_MAX_ARTIFACTS: usize = 20;

/// File name used when the user leaves the name empty.
pub const DEFAULT_FILE_NAME: &str = "generated_events";

pub const ICS_EXTENSION: &str = "ics";

pub const PRODID: &str = "-//calshare//EN";

/// Prefix for uploaded objects on the object store.
pub const OBJECT_PREFIX: &str = "events";
