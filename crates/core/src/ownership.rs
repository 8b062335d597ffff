//! The ownership record: who, if anyone, holds the shared ComfyUI instance.
//!
//! The record keeps `owner` set if and only if `running` is true. Fields
//! are private so the only ways to build one are [`OwnershipRecord::stopped`]
//! and [`OwnershipRecord::held`]; records read back from disk go through
//! [`OwnershipRecord::normalized`].

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::CoreError;

/// Wire spelling of the sentinel owner. Reserved: no user may take this name.
pub const UNKNOWN_OWNER: &str = "unknown";

/// Maximum length of a user name.
const MAX_USER_NAME_LEN: usize = 64;

// ---------------------------------------------------------------------------
// Owner
// ---------------------------------------------------------------------------

/// Holder of a running instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Owner {
    /// A named user started or claimed the instance.
    User(String),
    /// The instance is alive but was started outside this service.
    Unknown,
}

impl Owner {
    pub fn as_str(&self) -> &str {
        match self {
            Owner::User(name) => name,
            Owner::Unknown => UNKNOWN_OWNER,
        }
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Owner {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Owner {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        if raw.eq_ignore_ascii_case(UNKNOWN_OWNER) {
            Ok(Owner::Unknown)
        } else {
            Ok(Owner::User(raw))
        }
    }
}

/// Validate a user name taken from a request path.
///
/// Rules:
/// - Must not be empty or longer than `MAX_USER_NAME_LEN`.
/// - ASCII alphanumerics, hyphen, underscore and dot only (the name is
///   handed to the start script as an argument).
/// - Must not spell the sentinel owner.
pub fn validate_user_name(name: &str) -> Result<(), CoreError> {
    if name.is_empty() {
        return Err(CoreError::Validation(
            "User name must not be empty".to_string(),
        ));
    }
    if name.len() > MAX_USER_NAME_LEN {
        return Err(CoreError::Validation(format!(
            "User name must not exceed {MAX_USER_NAME_LEN} characters"
        )));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
    {
        return Err(CoreError::Validation(
            "User name may only contain alphanumeric, hyphen, underscore, or dot characters"
                .to_string(),
        ));
    }
    if name.eq_ignore_ascii_case(UNKNOWN_OWNER) {
        return Err(CoreError::Validation(format!(
            "User name '{name}' is reserved"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// Reconciled view of the instance derived from a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstanceStatus {
    Running(Owner),
    Stopped,
}

/// The authoritative claim over the single ComfyUI instance.
///
/// Serialized as `{ "running": bool, "user": string|null, "timestamp": string|null }`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OwnershipRecord {
    running: bool,
    #[serde(rename = "user")]
    owner: Option<Owner>,
    #[serde(rename = "timestamp")]
    declared_at: Option<DateTime<Utc>>,
}

impl OwnershipRecord {
    /// The record of an idle machine.
    pub fn stopped() -> Self {
        Self::default()
    }

    /// A record declaring `owner` holds the instance as of `at`.
    pub fn held(owner: Owner, at: DateTime<Utc>) -> Self {
        Self {
            running: true,
            owner: Some(owner),
            declared_at: Some(at),
        }
    }

    pub fn running(&self) -> bool {
        self.running
    }

    pub fn owner(&self) -> Option<&Owner> {
        self.owner.as_ref()
    }

    pub fn declared_at(&self) -> Option<DateTime<Utc>> {
        self.declared_at
    }

    pub fn status(&self) -> InstanceStatus {
        match (&self.owner, self.running) {
            (Some(owner), true) => InstanceStatus::Running(owner.clone()),
            (None, true) => InstanceStatus::Running(Owner::Unknown),
            (_, false) => InstanceStatus::Stopped,
        }
    }

    /// Whole seconds since the record was declared, or 0 when stopped.
    pub fn uptime_secs(&self, now: DateTime<Utc>) -> i64 {
        match (self.running, self.declared_at) {
            (true, Some(at)) => (now - at).num_seconds().max(0),
            _ => 0,
        }
    }

    /// Restore the owner/running invariant on a record read from outside.
    ///
    /// A running record without an owner becomes `Owner::Unknown`; a
    /// stopped record drops its owner and timestamp.
    pub fn normalized(self) -> Self {
        if self.running {
            Self {
                running: true,
                owner: Some(self.owner.unwrap_or(Owner::Unknown)),
                declared_at: self.declared_at,
            }
        } else {
            Self::stopped()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    // -- validate_user_name ---------------------------------------------------

    #[test]
    fn accepts_plain_user_names() {
        assert!(validate_user_name("Sri").is_ok());
        assert!(validate_user_name("moulika.k").is_ok());
        assert!(validate_user_name("intern_2").is_ok());
        assert!(validate_user_name("a-b").is_ok());
    }

    #[test]
    fn rejects_unsafe_user_names() {
        assert!(validate_user_name("").is_err());
        assert!(validate_user_name("foo bar").is_err());
        assert!(validate_user_name("$(reboot)").is_err());
        assert!(validate_user_name("a;b").is_err());
        assert!(validate_user_name(&"x".repeat(65)).is_err());
    }

    #[test]
    fn rejects_sentinel_spelling() {
        assert!(validate_user_name("unknown").is_err());
        assert!(validate_user_name("Unknown").is_err());
    }

    // -- serialization --------------------------------------------------------

    #[test]
    fn stopped_record_serializes_with_nulls() {
        let json = serde_json::to_value(OwnershipRecord::stopped()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "running": false, "user": null, "timestamp": null })
        );
    }

    #[test]
    fn sentinel_owner_uses_reserved_spelling() {
        let record = OwnershipRecord::held(Owner::Unknown, Utc::now());
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["user"], UNKNOWN_OWNER);

        let back: OwnershipRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back.owner(), Some(&Owner::Unknown));
    }

    #[test]
    fn missing_fields_default_to_stopped() {
        let record: OwnershipRecord = serde_json::from_str("{}").unwrap();
        assert_eq!(record, OwnershipRecord::stopped());
    }

    // -- normalized -----------------------------------------------------------

    #[test]
    fn running_without_owner_normalizes_to_unknown() {
        let record: OwnershipRecord =
            serde_json::from_str(r#"{"running": true, "user": null, "timestamp": null}"#).unwrap();
        let record = record.normalized();
        assert_eq!(record.status(), InstanceStatus::Running(Owner::Unknown));
    }

    #[test]
    fn stopped_with_owner_normalizes_to_empty() {
        let record: OwnershipRecord = serde_json::from_str(
            r#"{"running": false, "user": "Sri", "timestamp": "2026-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(record.normalized(), OwnershipRecord::stopped());
    }

    // -- uptime ---------------------------------------------------------------

    #[test]
    fn uptime_counts_whole_seconds_since_declaration() {
        let now = Utc::now();
        let record = OwnershipRecord::held(Owner::User("Sri".into()), now - Duration::seconds(90));
        assert_eq!(record.uptime_secs(now), 90);
    }

    #[test]
    fn uptime_is_zero_when_stopped_or_in_future() {
        let now = Utc::now();
        assert_eq!(OwnershipRecord::stopped().uptime_secs(now), 0);

        let future = OwnershipRecord::held(Owner::User("Sri".into()), now + Duration::seconds(30));
        assert_eq!(future.uptime_secs(now), 0);
    }
}
