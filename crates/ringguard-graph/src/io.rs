//! JSON Lines transaction loading.

use crate::types::TransactionRecord;
use ringguard_core::error::{Result, RingGuardError};
use std::path::Path;

/// Parse one JSON object per line; blank lines are skipped.
pub fn parse_transactions_jsonl(content: &str) -> Result<Vec<TransactionRecord>> {
    let mut records = Vec::new();
    for (line_no, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let record: TransactionRecord = serde_json::from_str(line).map_err(|e| {
            RingGuardError::serialization(format!("line {}: {}", line_no + 1, e))
        })?;
        records.push(record);
    }
    Ok(records)
}

/// Read a JSON Lines transaction file.
pub fn load_transactions_jsonl(path: impl AsRef<Path>) -> Result<Vec<TransactionRecord>> {
    let content = std::fs::read_to_string(path.as_ref())?;
    let records = parse_transactions_jsonl(&content)?;
    tracing::debug!(
        path = %path.as_ref().display(),
        records = records.len(),
        "Loaded transactions"
    );
    Ok(records)
}

/// Serialize records as JSON Lines.
pub fn to_jsonl(records: &[TransactionRecord]) -> Result<String> {
    let mut out = String::new();
    for record in records {
        let line =
            serde_json::to_string(record).map_err(|e| RingGuardError::serialization(e.to_string()))?;
        out.push_str(&line);
        out.push('\n');
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_skips_blank_lines() {
        let content = r#"
{"source_id": "U1", "target_id": "U2", "amount": 10.0, "channel": "web"}

{"source_id": "U2", "target_id": "U1", "timestamp": "2024-05-01T12:00:00Z"}
"#;
        let records = parse_transactions_jsonl(content).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].channel.as_deref(), Some("web"));
        assert!(records[1].timestamp.is_some());
        assert_eq!(records[1].amount, None);
    }

    #[test]
    fn test_parse_reports_line_number() {
        let content = "{\"source_id\": \"A\", \"target_id\": \"B\"}\nnot json\n";
        let err = parse_transactions_jsonl(content).unwrap_err();
        assert!(err.to_string().contains("line 2"), "got: {err}");
    }

    #[test]
    fn test_missing_fields_survive_parsing() {
        let records = parse_transactions_jsonl(r#"{"amount": 3.0}"#).unwrap();
        assert_eq!(records[0].source_id, None);
    }

    #[test]
    fn test_jsonl_round_trip() {
        let records = vec![
            TransactionRecord::new("A", "B", 1.5).with_id("T1"),
            TransactionRecord::new("B", "A", 2.5).with_channel("pos"),
        ];
        let text = to_jsonl(&records).unwrap();
        assert_eq!(parse_transactions_jsonl(&text).unwrap(), records);
    }
}
