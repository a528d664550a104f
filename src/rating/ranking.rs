//! Stable descending ranking.
//!
//! Ties are never collapsed: equal values keep their input order and still
//! receive distinct, consecutive ranks. NaN sorts after every number.

use ordered_float::OrderedFloat;
use serde::Serialize;
use std::cmp::Reverse;

/// A row together with its 1-based rank.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ranked<T> {
    pub rank: usize,
    #[serde(flatten)]
    pub item: T,
}

fn descending_key(value: f64) -> (bool, Reverse<OrderedFloat<f64>>) {
    (value.is_nan(), Reverse(OrderedFloat(value)))
}

/// Sorts `rows` by `value` descending (stable) and numbers them from 1.
pub fn add_ranking_column<T, F>(mut rows: Vec<T>, value: F) -> Vec<Ranked<T>>
where
    F: Fn(&T) -> f64,
{
    rows.sort_by_key(|row| descending_key(value(row)));
    rows.into_iter()
        .enumerate()
        .map(|(position, item)| Ranked {
            rank: position + 1,
            item,
        })
        .collect()
}

/// Sorts `rows` by `value` descending without numbering them.
pub fn sort_descending<T, F>(rows: &mut [T], value: F)
where
    F: Fn(&T) -> f64,
{
    rows.sort_by_key(|row| descending_key(value(row)));
}

/// Rank of every input position under a stable descending sort.
///
/// `ranks[i]` is the rank of `values[i]`.
pub fn rank_descending(values: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by_key(|&index| descending_key(values[index]));

    let mut ranks = vec![0; values.len()];
    for (position, index) in order.into_iter().enumerate() {
        ranks[index] = position + 1;
    }
    ranks
}
