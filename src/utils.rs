use crate::client::SabError::InvalidInput;
use crate::entities::{
    HistorySlot, Ids, JobFile, ParamValue, Params, Priority, PriorityToken, QueueSlot,
};
use anyhow::Result;
use byte_unit::{Byte, UnitType};

/// Maps a priority token to the value SABnzbd expects.
///
/// Numbers, numeric strings included, pass through unchanged. Names are
/// matched case-sensitively against `paused`, `low`, `normal`, `high` and
/// `forced`/`force`; anything else, including a missing token, maps to the
/// category default (-100).
#[must_use]
pub fn priority_from_token(token: Option<&PriorityToken>) -> ParamValue {
    match token {
        Some(PriorityToken::Number(number)) => ParamValue::Int(*number),
        Some(PriorityToken::Decimal(text)) => ParamValue::Text(text.clone()),
        Some(PriorityToken::Name(name)) => {
            ParamValue::Int(Priority::from_name(name).unwrap_or(Priority::Default).value())
        }
        None => ParamValue::Int(Priority::Default.value()),
    }
}

/// Returns a copy of `params` without the unset entries
#[must_use]
pub fn normalize_params(params: &Params) -> Params {
    let mut normalized = Params::new();
    for (key, value) in params.iter() {
        if let Some(value) = value {
            normalized.insert(key, Some(value.clone()));
        }
    }
    normalized
}

/// Renders an identifier set into the single comma separated token the API expects
///
/// # Errors
///
/// Returns an error if the set is an empty list or contains an empty identifier
pub fn join_identifiers(ids: &Ids) -> Result<String> {
    match ids {
        Ids::All => Ok("all".into()),
        Ids::Failed => Ok("failed".into()),
        Ids::One(id) if id.is_empty() => Err(InvalidInput("Identifier cannot be empty".into()).into()),
        Ids::One(id) => Ok(id.clone()),
        Ids::Many(list) if list.is_empty() => {
            Err(InvalidInput("Identifier list cannot be empty".into()).into())
        }
        Ids::Many(list) if list.iter().any(String::is_empty) => Err(InvalidInput(format!(
            "Identifier list contains an empty identifier: {list:?}"
        ))
        .into()),
        Ids::Many(list) => Ok(list.join(",")),
    }
}

fn format_size(bytes: u64) -> String {
    format!("{:#.2}", Byte::from(bytes).get_appropriate_unit(UnitType::Decimal))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn parse_size(value: Option<&str>, multiplier: f64) -> Option<u64> {
    value
        .and_then(|value| value.trim().parse::<f64>().ok())
        .filter(|value| value.is_finite() && *value >= 0.0)
        .map(|value| (value * multiplier).round() as u64)
}

impl HistorySlot {
    #[must_use]
    pub fn calculate_size(&self) -> String {
        format_size(self.bytes)
    }
}

impl JobFile {
    #[must_use]
    pub fn calculate_size(&self) -> String {
        parse_size(self.bytes.as_deref(), 1.0)
            .map(format_size)
            .unwrap_or_default()
    }
}

impl QueueSlot {
    /// Total size, SABnzbd reports it in megabytes
    #[must_use]
    pub fn calculate_size(&self) -> String {
        parse_size(self.mb.as_deref(), 1_000_000.0)
            .map(format_size)
            .unwrap_or_default()
    }

    #[must_use]
    pub fn calculate_progress(&self) -> f64 {
        self.percentage
            .as_deref()
            .and_then(|percentage| percentage.trim().parse::<f64>().ok())
            .take_if(|x| !x.is_nan())
            .unwrap_or_default()
    }
}
