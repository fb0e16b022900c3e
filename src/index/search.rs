//! Exhaustive top-k selection.
//!
//! Every record passing the filter is scored; a max-heap bounded at `k`
//! keeps the best candidates seen so far so selection costs O(n log k)
//! instead of a full sort.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use ordered_float::OrderedFloat;

use crate::filter::Filter;
use crate::metric::Metric;
use crate::{Record, SearchResult};

/// Heap entry ordered by (distance, id). The heap top is the worst kept hit.
#[derive(Debug)]
struct Candidate<'a> {
    distance: OrderedFloat<f32>,
    record: &'a Record,
}

impl Candidate<'_> {
    fn key(&self) -> (OrderedFloat<f32>, u64) {
        (self.distance, self.record.id)
    }
}

impl PartialEq for Candidate<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Candidate<'_> {}

impl Ord for Candidate<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

impl PartialOrd for Candidate<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Returns the `k` records closest to `query`, ascending by distance with
/// ties broken by ascending id.
///
/// Inputs are assumed validated: `k > 0` and every vector has the query's length.
pub fn top_k<'a, I>(records: I, metric: Metric, query: &[f32], k: usize, filter: &Filter) -> Vec<SearchResult>
where
    I: IntoIterator<Item = &'a Record>,
{
    let mut heap: BinaryHeap<Candidate<'a>> = BinaryHeap::with_capacity(k + 1);

    for record in records {
        if !filter.matches(&record.metadata) {
            continue;
        }
        let candidate = Candidate {
            distance: OrderedFloat(metric.distance(query, &record.vector)),
            record,
        };
        if heap.len() < k {
            heap.push(candidate);
        } else if heap.peek().is_some_and(|worst| candidate < *worst) {
            heap.pop();
            heap.push(candidate);
        }
    }

    heap.into_sorted_vec()
        .into_iter()
        .map(|c| SearchResult {
            id: c.record.id,
            distance: c.distance.0,
            metadata: c.record.metadata.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Metadata;

    fn record(id: u64, vector: Vec<f32>) -> Record {
        Record::new(id, vector, Metadata::new())
    }

    fn ids(results: &[SearchResult]) -> Vec<u64> {
        results.iter().map(|r| r.id).collect()
    }

    #[test]
    fn test_keeps_k_smallest_in_order() {
        let records: Vec<Record> = (0..20).map(|i| record(i, vec![i as f32])).collect();
        let results = top_k(records.iter().rev(), Metric::L2, &[0.0], 4, &Filter::default());

        assert_eq!(ids(&results), vec![0, 1, 2, 3]);
        assert_eq!(results[3].distance, 9.0);
    }

    #[test]
    fn test_ties_break_by_ascending_id() {
        // 2D distances from the origin:
        // [0, 1] -> 1, [1, 0] -> 1, [-1, 0] -> 1, [0, 0] -> 0
        let records = vec![
            record(9, vec![0.0, 1.0]),
            record(4, vec![1.0, 0.0]),
            record(6, vec![-1.0, 0.0]),
            record(5, vec![0.0, 0.0]),
        ];
        let results = top_k(records.iter(), Metric::L2, &[0.0, 0.0], 3, &Filter::default());
        assert_eq!(ids(&results), vec![5, 4, 6]);

        let results = top_k(records.iter().rev(), Metric::L2, &[0.0, 0.0], 3, &Filter::default());
        assert_eq!(ids(&results), vec![5, 4, 6]);
    }

    #[test]
    fn test_k_larger_than_input() {
        let records = vec![record(1, vec![0.0, 1.0]), record(2, vec![0.0, 2.0])];
        let results = top_k(records.iter(), Metric::L2, &[0.0, 0.0], 10, &Filter::default());
        assert_eq!(ids(&results), vec![1, 2]);
    }

    #[test]
    fn test_filter_applied_before_ranking() {
        let mut far = record(1, vec![10.0]);
        far.metadata.insert("category".to_string(), "architecture".to_string());
        let near = record(2, vec![0.0]);

        let records = vec![far, near];
        let filter = Filter::new().with("category", "architecture");
        let results = top_k(records.iter(), Metric::L2, &[0.0], 1, &filter);

        assert_eq!(ids(&results), vec![1]);
        assert_eq!(results[0].metadata.get("category").map(String::as_str), Some("architecture"));
    }

    #[test]
    fn test_empty_input() {
        let results = top_k(std::iter::empty::<&Record>(), Metric::Cosine, &[1.0], 3, &Filter::default());
        assert!(results.is_empty());
    }
}
