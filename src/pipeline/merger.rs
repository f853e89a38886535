//! Deterministic merge of lookup results into a record.

use crate::pipeline::record::{EnrichedRecord, LookupResult};

/// Folds lookup rows over a base record, last write wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct AggregationMerger;

impl AggregationMerger {
    /// Apply `results` in the order given (dispatch order, not completion
    /// order) and each result's rows in returned order.
    pub fn merge(base: EnrichedRecord, results: &[LookupResult]) -> EnrichedRecord {
        let mut merged = base;
        for row in results.iter().flat_map(LookupResult::rows) {
            for (key, value) in row {
                merged.insert(key.clone(), value.clone());
            }
        }
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::record::Row;
    use serde_json::{json, Value};

    fn row(pairs: &[(&str, Value)]) -> Row {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_later_results_overwrite_earlier() {
        let base = EnrichedRecord::from(row(&[("a", json!(1))]));
        let first = LookupResult::new(vec![row(&[("a", json!(2)), ("b", json!(3))])]);
        let second = LookupResult::new(vec![row(&[("b", json!(4)), ("c", json!(5))])]);

        let merged = AggregationMerger::merge(base, &[first, second]);

        let expected = EnrichedRecord::from(row(&[("a", json!(2)), ("b", json!(4)), ("c", json!(5))]));
        assert_eq!(merged, expected);
    }

    #[test]
    fn test_rows_applied_in_returned_order() {
        let base = EnrichedRecord::default();
        let result = LookupResult::new(vec![row(&[("itemId", json!(1))]), row(&[("itemId", json!(2))])]);

        let merged = AggregationMerger::merge(base, &[result]);
        assert_eq!(merged.get_i64("itemId"), Some(2));
    }

    #[test]
    fn test_empty_results_leave_base() {
        let base = EnrichedRecord::from(row(&[("quantity", json!(4))]));
        let merged = AggregationMerger::merge(base.clone(), &[LookupResult::empty(), LookupResult::empty()]);
        assert_eq!(merged, base);
    }
}
