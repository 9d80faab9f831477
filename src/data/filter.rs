use log::{info, warn};

use super::model::Partition;
use crate::config::MonthMatch;

// ---------------------------------------------------------------------------
// Month filter: which partitions take part in a load
// ---------------------------------------------------------------------------

/// Narrows the discovered partitions down to the requested months.
#[derive(Debug, Clone, Copy, Default)]
pub struct PartitionSelector {
    pub mode: MonthMatch,
}

impl PartitionSelector {
    pub fn new(mode: MonthMatch) -> Self {
        Self { mode }
    }

    /// Return the partitions selected by `months`, in discovery order.
    ///
    /// A partition is selected when:
    /// * `months` is absent or empty → every partition
    /// * any token matches the partition under [`MonthMatch`]
    ///
    /// No match is not an error; the load then yields zero rows.
    pub fn select(&self, all: &[Partition], months: Option<&[String]>) -> Vec<Partition> {
        let tokens = match months {
            Some(tokens) if !tokens.is_empty() => tokens,
            _ => return all.to_vec(),
        };

        let selected: Vec<Partition> = all
            .iter()
            .filter(|p| tokens.iter().any(|m| p.matches(m, self.mode)))
            .cloned()
            .collect();

        if selected.is_empty() {
            warn!("No partitions match months {tokens:?}");
        } else {
            let names: Vec<String> = selected.iter().map(Partition::file_name).collect();
            info!("Selected {} partition(s): {names:?}", selected.len());
        }
        selected
    }
}

/// Distinct month keys of `partitions`, ascending.
pub fn month_keys(partitions: &[Partition]) -> Vec<String> {
    let mut months: Vec<String> = partitions.iter().map(|p| p.month_key.clone()).collect();
    months.sort();
    months.dedup();
    months
}

#[cfg(test)]
mod tests {
    use super::*;

    fn partitions() -> Vec<Partition> {
        ["2023-01", "2023-02", "2023-10", "2023-11", "2024-01"]
            .iter()
            .map(|m| Partition::new(format!("raw/fhvhv_tripdata_{m}.parquet"), *m))
            .collect()
    }

    fn keys(ps: &[Partition]) -> Vec<&str> {
        ps.iter().map(|p| p.month_key.as_str()).collect()
    }

    #[test]
    fn test_no_filter_returns_all_in_order() {
        let all = partitions();
        let selector = PartitionSelector::default();
        assert_eq!(selector.select(&all, None), all);
        assert_eq!(selector.select(&all, Some(&[])), all);
    }

    #[test]
    fn test_substring_tokens_preserve_order() {
        let all = partitions();
        let months = vec!["2024-01".to_string(), "2023-1".to_string()];
        let selected = PartitionSelector::default().select(&all, Some(&months));
        assert_eq!(keys(&selected), vec!["2023-10", "2023-11", "2024-01"]);
    }

    #[test]
    fn test_year_token_selects_whole_year() {
        let all = partitions();
        let months = vec!["2023".to_string()];
        let selected = PartitionSelector::default().select(&all, Some(&months));
        assert_eq!(selected.len(), 4);
    }

    #[test]
    fn test_exact_mode() {
        let all = partitions();
        let months = vec!["2023-1".to_string(), "2023-11".to_string()];
        let selected = PartitionSelector::new(MonthMatch::Exact).select(&all, Some(&months));
        assert_eq!(keys(&selected), vec!["2023-11"]);
    }

    #[test]
    fn test_no_match_is_empty() {
        let all = partitions();
        let months = vec!["1999-01".to_string()];
        assert!(PartitionSelector::default().select(&all, Some(&months)).is_empty());
    }

    #[test]
    fn test_month_keys_sorted_distinct() {
        let mut ps = partitions();
        ps.reverse();
        ps.push(Partition::new("other/fhvhv_tripdata_2023-02.parquet", "2023-02"));
        assert_eq!(
            month_keys(&ps),
            vec!["2023-01", "2023-02", "2023-10", "2023-11", "2024-01"]
        );
    }
}
