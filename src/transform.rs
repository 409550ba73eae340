//! Transformation pipeline: validate raw scan records, gzip+base64 encode survivors.

use crate::codec;
use tracing::warn;

/// An encoded record ready for sub-batching by the delivery engine, paired with
/// the original/encoded sizes the consumer loop and probe endpoint report.
#[derive(Debug, Clone)]
pub struct EncodedRecord {
    pub data: String,
    pub original_size: usize,
    pub encoded_size: usize,
}

/// Validate, then gzip+base64-encode, a batch of raw JSON scan records.
///
/// Survivors preserve input order. The result may be shorter than the input,
/// including empty. A single bad record is dropped with a `warn` log; only a
/// codec-level hard failure short-circuits a record, never the whole batch.
pub fn transform(raw_records: &[Vec<u8>], max_record_size_bytes: usize) -> Vec<EncodedRecord> {
    raw_records
        .iter()
        .filter_map(|raw| transform_one(raw, max_record_size_bytes))
        .collect()
}

fn transform_one(raw: &[u8], max_record_size_bytes: usize) -> Option<EncodedRecord> {
    let trimmed = trim_bytes(raw);
    if trimmed.is_empty() {
        warn!("dropping record: empty after trim");
        return None;
    }
    if trimmed[0] != b'{' || trimmed[trimmed.len() - 1] != b'}' {
        warn!("dropping record: not a well-formed JSON object");
        return None;
    }

    let encoded = match codec::encode(trimmed) {
        Ok(encoded) => encoded,
        Err(e) => {
            warn!(error = %e, "dropping record: codec failure");
            return None;
        }
    };

    if encoded.len() > max_record_size_bytes {
        warn!(
            encoded_size = encoded.len(),
            max = max_record_size_bytes,
            "dropping record: exceeds max-record-size-bytes"
        );
        return None;
    }

    Some(EncodedRecord {
        original_size: trimmed.len(),
        encoded_size: encoded.len(),
        data: encoded,
    })
}

fn trim_bytes(raw: &[u8]) -> &[u8] {
    let start = raw.iter().position(|b| !b.is_ascii_whitespace());
    let end = raw.iter().rposition(|b| !b.is_ascii_whitespace());
    match (start, end) {
        (Some(s), Some(e)) => &raw[s..=e],
        _ => &[],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAX_RECORD: usize = 1_024_000;

    fn rec(s: &str) -> Vec<u8> {
        s.as_bytes().to_vec()
    }

    #[test]
    fn survives_well_formed_object() {
        let out = transform(&[rec(r#"{"a":1}"#)], MAX_RECORD);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].original_size, 7);
    }

    #[test]
    fn drops_non_json_and_null_and_empty() {
        let input = vec![
            rec(r#"{"ok":1}"#),
            rec(r#""not json""#),
            b"null".to_vec(),
            rec(""),
            rec(r#"{"ok":2}"#),
        ];
        let out = transform(&input, MAX_RECORD);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn preserves_order_of_survivors() {
        let input = vec![rec(r#"{"i":1}"#), rec("bad"), rec(r#"{"i":2}"#), rec(r#"{"i":3}"#)];
        let out = transform(&input, MAX_RECORD);
        let originals: Vec<Vec<u8>> = out
            .iter()
            .map(|e| codec::decode(&e.data).unwrap())
            .collect();
        assert_eq!(originals[0], br#"{"i":1}"#);
        assert_eq!(originals[1], br#"{"i":2}"#);
        assert_eq!(originals[2], br#"{"i":3}"#);
    }

    #[test]
    fn trims_surrounding_whitespace_before_checking_braces() {
        let out = transform(&[rec("  \n{\"a\":1}\t ")], MAX_RECORD);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn drops_oversized_encoded_record() {
        let big = format!(r#"{{"payload":"{}"}}"#, "x".repeat(10_000));
        let out = transform(&[rec(&big)], 16);
        assert!(out.is_empty());
    }

    #[test]
    fn empty_batch_yields_empty_output() {
        let out: Vec<EncodedRecord> = transform(&[], MAX_RECORD);
        assert!(out.is_empty());
    }

    #[test]
    fn all_invalid_batch_yields_empty_output() {
        let input = vec![rec("null"), rec(""), rec("not json")];
        assert!(transform(&input, MAX_RECORD).is_empty());
    }
}
