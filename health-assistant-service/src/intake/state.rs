use serde::{Deserialize, Serialize};

use super::categories::{MedicalCategory, optional_category};
use super::diagnosis::DiagnosisResult;

/// Everything the client must send back on the next turn. The server keeps no copy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationState {
    #[serde(default)]
    pub step: i64,
    #[serde(default)]
    pub patient: PatientRecord,
    #[serde(default, deserialize_with = "optional_category")]
    pub category: Option<MedicalCategory>,
    /// Last differential produced, used by the "more information" follow-up
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnosis: Option<DiagnosisResult>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PatientRecord {
    pub name: String,
    pub age: String,
    pub sex: String,
    pub symptoms: Vec<String>,
    pub duration: String,
    pub is_constant: bool,
    /// `None` when the answer did not start with a number
    pub severity: Option<i64>,
    pub previous_conditions: Vec<String>,
    pub medications: Vec<String>,
    pub category_specific_answer: Option<String>,
}

/// Split a comma-separated answer, trimming each entry. Empty entries are kept.
pub fn split_list(answer: &str) -> Vec<String> {
    answer.split(',').map(|item| item.trim().to_string()).collect()
}

/// `None` for answers meaning "nothing to list", otherwise the split list.
pub fn optional_list(answer: &str) -> Option<Vec<String>> {
    if answer.trim().eq_ignore_ascii_case("none") {
        None
    } else {
        Some(split_list(answer))
    }
}

pub fn mentions_yes(answer: &str) -> bool {
    answer.to_lowercase().contains("yes")
}

/// Leading-integer parse: optional whitespace and sign, then digits; the rest is ignored.
///
/// No range check is applied; "42" is kept as 42.
pub fn parse_severity(answer: &str) -> Option<i64> {
    let trimmed = answer.trim_start();
    let (negative, rest) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let digits_end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    let value: i64 = rest[..digits_end].parse().ok()?;
    Some(if negative { -value } else { value })
}
