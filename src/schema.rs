// src/schema.rs

use crate::error::ParseError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field names of [`UnifiedRow`], in output order.
pub const FIELD_NAMES: [&str; 9] = [
    "Name",
    "MemberID",
    "T1023AuthId",
    "T1023Range",
    "T1023BillDate",
    "H0044AuthId",
    "H0044Range",
    "H0044BillDate",
    "Paid",
];

/// Key of the row array in the model's JSON object.
const ROWS_KEY: &str = "rows";

/// One billing row in the merged schema shared by all insurers.
///
/// Every field is always serialized; a missing value is `null`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnifiedRow {
    #[serde(rename = "Name")]
    pub name: Option<String>,
    #[serde(rename = "MemberID")]
    pub member_id: Option<String>,
    #[serde(rename = "T1023AuthId")]
    pub t1023_auth_id: Option<String>,
    #[serde(rename = "T1023Range")]
    pub t1023_range: Option<String>,
    #[serde(rename = "T1023BillDate")]
    pub t1023_bill_date: Option<String>,
    #[serde(rename = "H0044AuthId")]
    pub h0044_auth_id: Option<String>,
    #[serde(rename = "H0044Range")]
    pub h0044_range: Option<String>,
    #[serde(rename = "H0044BillDate")]
    pub h0044_bill_date: Option<String>,
    #[serde(rename = "Paid")]
    pub paid: Option<String>,
}

impl UnifiedRow {
    fn field_mut(&mut self, name: &str) -> Option<&mut Option<String>> {
        Some(match name {
            "Name" => &mut self.name,
            "MemberID" => &mut self.member_id,
            "T1023AuthId" => &mut self.t1023_auth_id,
            "T1023Range" => &mut self.t1023_range,
            "T1023BillDate" => &mut self.t1023_bill_date,
            "H0044AuthId" => &mut self.h0044_auth_id,
            "H0044Range" => &mut self.h0044_range,
            "H0044BillDate" => &mut self.h0044_bill_date,
            "Paid" => &mut self.paid,
            _ => return None,
        })
    }

    /// How many fields are filled (out of all of them).
    pub fn coverage(&self) -> (usize, usize) {
        let filled = [
            &self.name,
            &self.member_id,
            &self.t1023_auth_id,
            &self.t1023_range,
            &self.t1023_bill_date,
            &self.h0044_auth_id,
            &self.h0044_range,
            &self.h0044_bill_date,
            &self.paid,
        ]
        .iter()
        .filter(|v| v.is_some())
        .count();
        (filled, FIELD_NAMES.len())
    }

    /// Build a row from one JSON object, keeping only the known fields.
    ///
    /// Strings are copied, numbers and booleans are coerced to their JSON
    /// text, `null` or absent becomes `None`. Arrays and objects are rejected.
    pub fn from_object(index: usize, obj: &Map<String, Value>) -> Result<Self, ParseError> {
        let mut row = Self::default();
        for field in FIELD_NAMES {
            let value = match obj.get(field) {
                None | Some(Value::Null) => None,
                Some(Value::String(s)) => Some(s.clone()),
                Some(v @ (Value::Number(_) | Value::Bool(_))) => Some(v.to_string()),
                Some(Value::Array(_)) => {
                    return Err(ParseError::InvalidField {
                        index,
                        field,
                        kind: "array",
                    });
                }
                Some(Value::Object(_)) => {
                    return Err(ParseError::InvalidField {
                        index,
                        field,
                        kind: "object",
                    });
                }
            };
            if let Some(slot) = row.field_mut(field) {
                *slot = value;
            }
        }
        Ok(row)
    }
}

/// Turn the model's raw reply into rows.
///
/// The reply is parsed strictly first (after dropping markdown fences): an
/// object with a `rows` array, or a bare array. An object without `rows`, or
/// text that is not JSON at all, falls back to the first balanced `[...]`
/// span anywhere in the text that is a list of objects. Either the whole row
/// list parses or the call fails.
pub fn parse_model_response(raw: &str) -> Result<Vec<UnifiedRow>, ParseError> {
    let text = strip_code_fence(raw);

    let items = match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(mut obj)) => match obj.remove(ROWS_KEY) {
            Some(Value::Array(items)) => items,
            Some(_) => return Err(ParseError::MissingRows),
            None => find_row_array(text).ok_or(ParseError::MissingRows)?,
        },
        Ok(Value::Array(items)) => items,
        Ok(_) => return Err(ParseError::MissingRows),
        Err(strict_err) => find_row_array(text).ok_or(ParseError::InvalidJson(strict_err))?,
    };

    items
        .iter()
        .enumerate()
        .map(|(index, item)| match item {
            Value::Object(obj) => UnifiedRow::from_object(index, obj),
            _ => Err(ParseError::RowNotObject { index }),
        })
        .collect()
}

/// Strip markdown fences if the model added them despite instructions.
fn strip_code_fence(s: &str) -> &str {
    s.trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

/// Degraded mode: try each `[` in turn and keep the first balanced span that
/// parses as a JSON array of objects. Prose like `[see below]` or `[1]` is
/// skipped.
fn find_row_array(s: &str) -> Option<Vec<Value>> {
    s.char_indices()
        .filter(|&(_, c)| c == '[')
        .filter_map(|(start, _)| balanced_span(&s[start..]))
        .find_map(|span| {
            let items: Vec<Value> = serde_json::from_str(span).ok()?;
            items.iter().all(Value::is_object).then_some(items)
        })
}

/// The balanced `[` ... `]` prefix of `s`, which must start with `[`.
/// Brackets inside JSON string literals do not count.
fn balanced_span(s: &str) -> Option<&str> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in s.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '[' => depth += 1,
            ']' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(&s[..=offset]);
                }
            }
            _ => {}
        }
    }
    None
}
