// src/prompt.rs

/// Instructs the model to answer with the row object and nothing else.
pub const SYSTEM_PROMPT: &str = "You are a precise information extraction engine for billing tables. \
You will receive text lines from a PDF (header + rows). \
Return ONLY valid JSON of the form: {\"rows\": [ ... ]} with NO extra commentary.";

/// The merged schema and the rules for pairing the look-alike column groups.
const SCHEMA_INSTRUCTIONS: &str = r#"We have billing tables from different insurers with slightly different headers.
Unify each row into this MERGED SCHEMA (use strings; use null if missing):

- Name
- MemberID                (from MRN#, MRN, or MBR ID #)
- T1023AuthId             (from 'T1023 AUTH DATE(S)' column; values can be alphanumeric IDs)
- T1023Range              (from 'DATE RANGE' or 'B/D RANGE' that corresponds to T1023)
- T1023BillDate           (from 'BILLED' or 'BILL DATE' corresponding to T1023)
- H0044AuthId             (from 'H0044 AUTH DATE(S)')
- H0044Range              (from 'DATE RANGE' or 'B/D RANGE' corresponding to H0044)
- H0044BillDate           (from 'BILLED' or 'BILL DATE' corresponding to H0044)
- Paid

IMPORTANT RULES:
1) Pair RANGE/BILL columns correctly (T1023 vs H0044).
2) 'MemberID' comes from MRN#/MBR ID #.
3) Do not invent data. If a cell is blank, use null.
4) Keep date/range formats as found (e.g., '04/01-07/01').
5) Output strictly: {"rows": [ UnifiedRow, ... ]}."#;

/// System + user messages for one extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

/// Embed the filtered lines, as a JSON string array, under the schema rules.
///
/// Non-ASCII text is written as-is, not `\u` escaped.
pub fn build_prompt(lines: &[String]) -> Result<Prompt, serde_json::Error> {
    let lines_json = serde_json::to_string(lines)?;
    Ok(Prompt {
        system: SYSTEM_PROMPT.to_string(),
        user: format!("{SCHEMA_INSTRUCTIONS}\n\nLINES:\n{lines_json}\n"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FIELD_NAMES;

    #[test]
    fn test_lines_are_embedded_as_json() {
        let lines = vec![
            "NAME MRN# T1023 AUTH DATE(S)".to_string(),
            "1 John \"JD\" Doe, 12345".to_string(),
        ];
        let prompt = build_prompt(&lines).unwrap();
        assert!(prompt.user.ends_with(
            "LINES:\n[\"NAME MRN# T1023 AUTH DATE(S)\",\"1 John \\\"JD\\\" Doe, 12345\"]\n"
        ));
    }

    #[test]
    fn test_non_ascii_is_not_escaped() {
        let lines = vec!["1 Kēhaulani Nāone, 555".to_string()];
        let prompt = build_prompt(&lines).unwrap();
        assert!(prompt.user.contains("Kēhaulani Nāone"));
        assert!(!prompt.user.contains("\\u"));
    }

    #[test]
    fn test_every_field_is_described() {
        let prompt = build_prompt(&[]).unwrap();
        for field in FIELD_NAMES {
            assert!(prompt.user.contains(field), "{field} missing from prompt");
        }
        assert!(prompt.system.contains(r#"{"rows": [ ... ]}"#));
    }
}
