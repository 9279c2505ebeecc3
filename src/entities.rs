use chrono::serde::ts_seconds_option;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;

/// A single query parameter value as sent to the SABnzbd API
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Text(String),
    Int(i64),
    /// Sent as one `key=value` pair per element
    List(Vec<String>),
}

impl ParamValue {
    /// Renders the value into the query-string representation(s)
    #[must_use]
    pub fn to_query_values(&self) -> Vec<String> {
        match self {
            ParamValue::Text(text) => vec![text.clone()],
            ParamValue::Int(number) => vec![number.to_string()],
            ParamValue::List(items) => items.clone(),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Text(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Text(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Int(value)
    }
}

impl From<i32> for ParamValue {
    fn from(value: i32) -> Self {
        ParamValue::Int(i64::from(value))
    }
}

impl From<u32> for ParamValue {
    fn from(value: u32) -> Self {
        ParamValue::Int(i64::from(value))
    }
}

impl From<Vec<String>> for ParamValue {
    fn from(value: Vec<String>) -> Self {
        ParamValue::List(value)
    }
}

/// Extra parameters of a command.
///
/// A key may be present but unset (`None`); unset keys are dropped by
/// [`crate::utils::normalize_params`] before the request is sent, so they never
/// reach the wire, not even as an empty value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params(BTreeMap<String, Option<ParamValue>>);

impl Params {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a parameter to a value
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.0.insert(key.into(), Some(value.into()));
        self
    }

    /// Sets a parameter which may be unset
    #[must_use]
    pub fn with_opt<V: Into<ParamValue>>(mut self, key: impl Into<String>, value: Option<V>) -> Self {
        self.0.insert(key.into(), value.map(Into::into));
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Option<ParamValue>) {
        self.0.insert(key.into(), value);
    }

    /// Returns the value of a set parameter
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.0.get(key).and_then(Option::as_ref)
    }

    /// Returns true if the key is present, set or not
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&ParamValue>)> {
        self.0.iter().map(|(key, value)| (key.as_str(), value.as_ref()))
    }
}

/// Named job priorities understood by SABnzbd
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    /// Use the priority of the job's category
    Default = -100,
    Paused = -2,
    Low = -1,
    Normal = 0,
    High = 1,
    Forced = 2,
}

impl Priority {
    /// Matches a symbolic priority name (case-sensitive)
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "paused" => Some(Priority::Paused),
            "low" => Some(Priority::Low),
            "normal" => Some(Priority::Normal),
            "high" => Some(Priority::High),
            "forced" | "force" => Some(Priority::Forced),
            _ => None,
        }
    }

    #[must_use]
    pub fn value(self) -> i64 {
        self as i64
    }
}

/// Caller supplied priority, either numeric or symbolic
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PriorityToken {
    Number(i64),
    /// Numeric text that is not a whole number, sent verbatim
    Decimal(String),
    Name(String),
}

impl From<i64> for PriorityToken {
    fn from(value: i64) -> Self {
        PriorityToken::Number(value)
    }
}

impl From<Priority> for PriorityToken {
    fn from(value: Priority) -> Self {
        PriorityToken::Number(value.value())
    }
}

impl From<&str> for PriorityToken {
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    fn from(value: &str) -> Self {
        let trimmed = value.trim();
        if let Ok(number) = trimmed.parse::<i64>() {
            return PriorityToken::Number(number);
        }

        // whole numbers written as "2.0" or "1e0" are still protocol units
        match trimmed.parse::<f64>() {
            Ok(number)
                if number.fract() == 0.0
                    && number >= i64::MIN as f64
                    && number < i64::MAX as f64 =>
            {
                PriorityToken::Number(number as i64)
            }
            Ok(number) if number.is_finite() => PriorityToken::Decimal(trimmed.to_string()),
            _ => PriorityToken::Name(value.to_string()),
        }
    }
}

impl From<String> for PriorityToken {
    fn from(value: String) -> Self {
        PriorityToken::from(value.as_str())
    }
}

/// One or more job/history identifiers, or one of the `all`/`failed` sentinels
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ids {
    One(String),
    Many(Vec<String>),
    All,
    Failed,
}

impl From<&str> for Ids {
    fn from(value: &str) -> Self {
        match value {
            "all" => Ids::All,
            "failed" => Ids::Failed,
            id => Ids::One(id.to_string()),
        }
    }
}

impl From<String> for Ids {
    fn from(value: String) -> Self {
        Ids::from(value.as_str())
    }
}

impl From<Vec<String>> for Ids {
    fn from(value: Vec<String>) -> Self {
        Ids::Many(value)
    }
}

impl From<Vec<&str>> for Ids {
    fn from(value: Vec<&str>) -> Self {
        Ids::Many(value.into_iter().map(String::from).collect())
    }
}

impl From<&[&str]> for Ids {
    fn from(value: &[&str]) -> Self {
        Ids::Many(value.iter().map(|id| (*id).to_string()).collect())
    }
}

/// Where [`crate::client::Sabnzbd::move_job`] places a job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwitchTarget {
    /// Put the job right above this other job
    Job(String),
    /// Absolute queue position, 0 is the top
    Position(u32),
}

impl From<&str> for SwitchTarget {
    fn from(value: &str) -> Self {
        SwitchTarget::Job(value.to_string())
    }
}

impl From<u32> for SwitchTarget {
    fn from(value: u32) -> Self {
        SwitchTarget::Position(value)
    }
}

impl From<SwitchTarget> for ParamValue {
    fn from(value: SwitchTarget) -> Self {
        match value {
            SwitchTarget::Job(id) => ParamValue::Text(id),
            SwitchTarget::Position(position) => ParamValue::from(position),
        }
    }
}

/// Post-processing options of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostProcessing {
    /// Use the option of the job's category
    Default = -1,
    Disabled = 0,
    Repair = 1,
    RepairUnpack = 2,
    RepairUnpackDelete = 3,
}

impl From<PostProcessing> for ParamValue {
    fn from(value: PostProcessing) -> Self {
        ParamValue::Int(value as i64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    AvgAge,
    Name,
    Size,
}

impl SortField {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SortField::AvgAge => "avg_age",
            SortField::Name => "name",
            SortField::Size => "size",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

/// Action SABnzbd runs once the queue is empty
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompleteAction {
    HibernatePc,
    StandbyPc,
    ShutdownProgram,
    /// Name of a user script, with or without the `script_` prefix
    Script(String),
}

impl CompleteAction {
    #[must_use]
    pub fn to_wire(&self) -> String {
        match self {
            CompleteAction::HibernatePc => "hibernate_pc".into(),
            CompleteAction::StandbyPc => "standby_pc".into(),
            CompleteAction::ShutdownProgram => "shutdown_program".into(),
            CompleteAction::Script(name) if name.starts_with("script_") => name.clone(),
            CompleteAction::Script(name) => format!("script_{name}"),
        }
    }
}

/// Global download speed limit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeedLimit {
    /// Percentage (1 to 100) of the maximum line speed configured in SABnzbd
    Percent(u8),
    /// Absolute rate such as `400K` or `1M`
    Rate(String),
}

impl From<SpeedLimit> for ParamValue {
    fn from(value: SpeedLimit) -> Self {
        match value {
            SpeedLimit::Percent(percent) => ParamValue::Int(i64::from(percent)),
            SpeedLimit::Rate(rate) => ParamValue::Text(rate),
        }
    }
}

/// Optional arguments for adding a download
#[derive(Debug, Clone, Default)]
pub struct AddOptions {
    pub nzbname: Option<String>,
    pub category: Option<String>,
    pub priority: Option<PriorityToken>,
    pub script: Option<String>,
    pub post_processing: Option<PostProcessing>,
}

impl AddOptions {
    #[must_use]
    pub fn nzbname(mut self, nzbname: impl Into<String>) -> Self {
        self.nzbname = Some(nzbname.into());
        self
    }

    #[must_use]
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    #[must_use]
    pub fn priority(mut self, priority: impl Into<PriorityToken>) -> Self {
        self.priority = Some(priority.into());
        self
    }

    #[must_use]
    pub fn script(mut self, script: impl Into<String>) -> Self {
        self.script = Some(script.into());
        self
    }

    #[must_use]
    pub fn post_processing(mut self, post_processing: PostProcessing) -> Self {
        self.post_processing = Some(post_processing);
        self
    }
}

/// Filters for listing the history
#[derive(Debug, Clone, Default)]
pub struct HistoryQuery {
    pub start: Option<u32>,
    pub limit: Option<u32>,
    pub category: Option<String>,
    pub search: Option<String>,
    pub failed_only: bool,
}

/// Which part of a decoded response an operation is interested in.
///
/// SABnzbd is inconsistent: some commands wrap their payload in a field named
/// after the resource, others answer with a flat status object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnwrapRule {
    Version,
    Queue,
    Status,
    Files,
    /// `nzo_ids`, falling back to `status`
    AddedJobs,
    /// Whole body
    Raw,
}

impl UnwrapRule {
    /// Fields tried in order
    #[must_use]
    pub fn fields(self) -> &'static [&'static str] {
        match self {
            UnwrapRule::Version => &["version"],
            UnwrapRule::Queue => &["queue"],
            UnwrapRule::Status => &["status"],
            UnwrapRule::Files => &["files"],
            UnwrapRule::AddedJobs => &["nzo_ids", "status"],
            UnwrapRule::Raw => &[],
        }
    }

    /// Extracts the first expected field present in `body`, or keeps the whole body
    #[must_use]
    pub fn apply(self, body: Value) -> Payload {
        let Value::Object(mut object) = body else {
            return Payload::Body(body);
        };

        for &name in self.fields() {
            if let Some(value) = object.remove(name) {
                return Payload::Field { name, value };
            }
        }

        Payload::Body(Value::Object(object))
    }
}

/// Result of applying an [`UnwrapRule`] to a decoded response
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// The expected field was present
    Field { name: &'static str, value: Value },
    /// No expected field, the whole decoded body
    Body(Value),
}

impl Payload {
    #[must_use]
    pub fn value(&self) -> &Value {
        match self {
            Payload::Field { value, .. } | Payload::Body(value) => value,
        }
    }

    #[must_use]
    pub fn into_value(self) -> Value {
        match self {
            Payload::Field { value, .. } | Payload::Body(value) => value,
        }
    }

    #[must_use]
    pub fn is_field(&self) -> bool {
        matches!(self, Payload::Field { .. })
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        self.value().as_str()
    }

    /// Boolean status, either the unwrapped `status` field or the one in the body
    #[must_use]
    pub fn as_status(&self) -> Option<bool> {
        match self {
            Payload::Field { value, .. } => value.as_bool(),
            Payload::Body(body) => body.get("status").and_then(Value::as_bool),
        }
    }

    /// Error message the remote service embedded in the body, if any
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match self {
            Payload::Body(body) => body.get("error").and_then(Value::as_str),
            Payload::Field { .. } => None,
        }
    }

    /// Deserializes the payload into a typed view
    ///
    /// # Errors
    ///
    /// Returns an error if the payload does not have the shape of `T`
    pub fn parse<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        T::deserialize(self.value())
    }
}

/// Download queue as returned by the `queue` command
#[derive(Deserialize, Default, Debug)]
#[serde(default)]
pub struct Queue {
    pub status: Option<String>,
    pub paused: bool,
    pub speed: Option<String>,
    pub speedlimit: Option<String>,
    pub kbpersec: Option<String>,
    pub timeleft: Option<String>,
    pub mb: Option<String>,
    pub mbleft: Option<String>,
    pub noofslots: u64,
    pub slots: Vec<QueueSlot>,
}

/// A job in the download queue
#[derive(Deserialize, Default, Debug)]
#[serde(default)]
pub struct QueueSlot {
    pub nzo_id: String,
    pub filename: String,
    pub status: Option<String>,
    pub index: i64,
    pub cat: Option<String>,
    pub priority: Option<String>,
    pub script: Option<String>,
    pub percentage: Option<String>,
    pub mb: Option<String>,
    pub mbleft: Option<String>,
    pub timeleft: Option<String>,
    pub avg_age: Option<String>,
}

/// History as returned by the `history` command
#[derive(Deserialize, Default, Debug)]
#[serde(default)]
pub struct History {
    pub noofslots: u64,
    pub slots: Vec<HistorySlot>,
}

/// A finished (or failed) job in the history
#[derive(Deserialize, Default, Debug)]
#[serde(default)]
pub struct HistorySlot {
    pub nzo_id: String,
    pub name: String,
    pub status: Option<String>,
    pub category: Option<String>,
    pub fail_message: Option<String>,
    pub storage: Option<String>,
    pub script: Option<String>,
    /// Total size in bytes
    pub bytes: u64,
    #[serde(with = "ts_seconds_option")]
    pub completed: Option<DateTime<Utc>>,
}

/// A file belonging to a queued job
#[derive(Deserialize, Default, Debug)]
#[serde(default)]
pub struct JobFile {
    pub nzf_id: String,
    pub filename: String,
    pub status: Option<String>,
    pub age: Option<String>,
    /// Size in bytes, sent as a decimal string
    pub bytes: Option<String>,
    pub mb: Option<String>,
    pub mbleft: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unwrap_expected_field() {
        let payload = UnwrapRule::Version.apply(json!({"version": "3.0.1"}));
        assert!(payload.is_field());
        assert_eq!(payload.as_str(), Some("3.0.1"));
    }

    #[test]
    fn test_unwrap_falls_back_to_body() {
        let body = json!({"status": false, "error": "API Key Incorrect"});
        let payload = UnwrapRule::Queue.apply(body.clone());
        assert_eq!(payload, Payload::Body(body));
        assert_eq!(payload.as_status(), Some(false));
        assert_eq!(payload.error(), Some("API Key Incorrect"));
    }

    #[test]
    fn test_unwrap_added_jobs_order() {
        let payload = UnwrapRule::AddedJobs.apply(json!({"status": true, "nzo_ids": ["SABnzbd_nzo_1"]}));
        assert_eq!(
            payload,
            Payload::Field {
                name: "nzo_ids",
                value: json!(["SABnzbd_nzo_1"])
            }
        );

        let payload = UnwrapRule::AddedJobs.apply(json!({"status": true}));
        assert_eq!(
            payload,
            Payload::Field {
                name: "status",
                value: json!(true)
            }
        );
    }

    #[test]
    fn test_unwrap_null_field_counts_as_present() {
        let payload = UnwrapRule::Status.apply(json!({"status": null}));
        assert!(payload.is_field());
        assert_eq!(payload.as_status(), None);
    }

    #[test]
    fn test_raw_and_non_object_bodies() {
        let body = json!({"status": true});
        assert_eq!(UnwrapRule::Raw.apply(body.clone()), Payload::Body(body));
        assert_eq!(UnwrapRule::Status.apply(json!([1, 2])), Payload::Body(json!([1, 2])));
    }

    #[test]
    fn test_parse_history() {
        let payload = Payload::Body(json!({
            "noofslots": 1,
            "slots": [{
                "nzo_id": "SABnzbd_nzo_a",
                "name": "Ubuntu",
                "status": "Completed",
                "bytes": 1_234_567_890,
                "completed": 1_700_000_000,
                "pp": null
            }]
        }));
        let history: History = payload.parse().unwrap();
        assert_eq!(history.noofslots, 1);
        assert_eq!(history.slots[0].nzo_id, "SABnzbd_nzo_a");
        assert_eq!(
            history.slots[0].completed.map(|time| time.timestamp()),
            Some(1_700_000_000)
        );
    }

    #[test]
    fn test_priority_tokens() {
        assert_eq!(PriorityToken::from("1"), PriorityToken::Number(1));
        assert_eq!(PriorityToken::from("high"), PriorityToken::Name("high".into()));
        assert_eq!(PriorityToken::from("2.0"), PriorityToken::Number(2));
        assert_eq!(PriorityToken::from("1e0"), PriorityToken::Number(1));
        assert_eq!(PriorityToken::from("1.5"), PriorityToken::Decimal("1.5".into()));
        assert_eq!(PriorityToken::from("NaN"), PriorityToken::Name("NaN".into()));
        assert_eq!(PriorityToken::from(Priority::Paused), PriorityToken::Number(-2));
    }

    #[test]
    fn test_ids_from_str() {
        assert_eq!(Ids::from("all"), Ids::All);
        assert_eq!(Ids::from("failed"), Ids::Failed);
        assert_eq!(Ids::from("id1"), Ids::One("id1".into()));
        assert_eq!(Ids::from(vec!["a", "b"]), Ids::Many(vec!["a".into(), "b".into()]));
    }

    #[test]
    fn test_complete_action_wire_names() {
        assert_eq!(CompleteAction::StandbyPc.to_wire(), "standby_pc");
        assert_eq!(CompleteAction::Script("test.py".into()).to_wire(), "script_test.py");
        assert_eq!(CompleteAction::Script("script_test.py".into()).to_wire(), "script_test.py");
    }
}
