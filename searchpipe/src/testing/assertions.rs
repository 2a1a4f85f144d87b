//! Test assertions for record sequences.

use std::collections::HashSet;

use crate::core::ResultRecord;

/// Asserts that the records carry exactly `expected` URLs, in order.
pub fn assert_urls(records: &[ResultRecord], expected: &[&str]) {
    let actual: Vec<&str> = records.iter().map(ResultRecord::url).collect();
    assert_eq!(actual, expected, "Unexpected record URLs");
}

/// Asserts that the records come in contiguous per-originator blocks, in
/// the order given.
pub fn assert_originator_blocks(records: &[ResultRecord], expected: &[&str]) {
    let mut blocks: Vec<&str> = Vec::new();
    for record in records {
        if blocks.last() != Some(&record.originator()) {
            blocks.push(record.originator());
        }
    }
    assert_eq!(
        blocks, expected,
        "Expected originator blocks {:?}, got {:?}",
        expected, blocks
    );
}

/// Asserts that each originator's records appear in ascending index order.
pub fn assert_index_order(records: &[ResultRecord]) {
    let mut last: Vec<(&str, usize)> = Vec::new();
    for record in records {
        match last.iter_mut().find(|(o, _)| *o == record.originator()) {
            Some((_, index)) => {
                assert!(
                    record.index() > *index,
                    "Record {} from '{}' appears after index {}",
                    record.index(),
                    record.originator(),
                    index
                );
                *index = record.index();
            }
            None => last.push((record.originator(), record.index())),
        }
    }
}

/// Asserts that no URL appears twice.
pub fn assert_unique_urls(records: &[ResultRecord]) {
    let mut seen = HashSet::new();
    for record in records {
        assert!(seen.insert(record.url()), "Duplicate URL: {}", record.url());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures::sample_records;

    #[test]
    fn test_assertions_pass() {
        let mut records = sample_records("alpha", 2).unwrap();
        records.extend(sample_records("beta", 2).unwrap());

        assert_originator_blocks(&records, &["alpha", "beta"]);
        assert_index_order(&records);
        assert_unique_urls(&records);
        assert_urls(
            &records[..1],
            &["https://alpha.example.com/result/0"],
        );
    }

    #[test]
    #[should_panic(expected = "Duplicate URL")]
    fn test_duplicate_urls_panic() {
        let mut records = sample_records("alpha", 1).unwrap();
        records.extend(sample_records("alpha", 1).unwrap());
        assert_unique_urls(&records);
    }
}
