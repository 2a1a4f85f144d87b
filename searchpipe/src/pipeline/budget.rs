//! Result-budget partitioning.

/// Splits `maximum` across `searchers` searchers in registration order.
///
/// Every searcher receives `maximum / searchers`; the first also receives
/// the remainder. The shares always sum to `maximum`. Without a maximum every
/// share is unbounded.
#[must_use]
pub fn partition_budget(maximum: Option<usize>, searchers: usize) -> Vec<Option<usize>> {
    let Some(maximum) = maximum else {
        return vec![None; searchers];
    };
    if searchers == 0 {
        return Vec::new();
    }

    let base = maximum / searchers;
    let remainder = maximum % searchers;
    (0..searchers)
        .map(|position| {
            if position == 0 {
                Some(base + remainder)
            } else {
                Some(base)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn total(shares: &[Option<usize>]) -> usize {
        shares.iter().map(|s| s.unwrap_or(0)).sum()
    }

    #[test]
    fn test_even_split() {
        assert_eq!(partition_budget(Some(10), 2), vec![Some(5), Some(5)]);
    }

    #[test]
    fn test_first_searcher_takes_remainder() {
        assert_eq!(partition_budget(Some(10), 3), vec![Some(4), Some(3), Some(3)]);
        assert_eq!(partition_budget(Some(11), 3), vec![Some(5), Some(3), Some(3)]);
    }

    #[test]
    fn test_shares_sum_to_maximum() {
        for maximum in 1..=40 {
            for searchers in 1..=7 {
                let shares = partition_budget(Some(maximum), searchers);
                assert_eq!(shares.len(), searchers);
                assert_eq!(total(&shares), maximum, "max={maximum} n={searchers}");
            }
        }
    }

    #[test]
    fn test_fewer_results_than_searchers() {
        assert_eq!(partition_budget(Some(2), 3), vec![Some(2), Some(0), Some(0)]);
    }

    #[test]
    fn test_unbounded() {
        assert_eq!(partition_budget(None, 3), vec![None, None, None]);
        assert!(partition_budget(Some(10), 0).is_empty());
    }
}
