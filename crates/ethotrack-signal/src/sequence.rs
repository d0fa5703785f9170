//! Statistics over categorical label sequences.
//!
//! Label sequences come from outside the tagging core (an unsupervised
//! clustering model, or rule-based tags reduced to one label per window).
//! This module counts state transitions, measures lag-1 autocorrelation and
//! cleans up short bouts.

use std::collections::{BTreeSet, HashMap};

use ethotrack_core::utils;
use serde::{Deserialize, Serialize};

use crate::{Result, SignalError};

/// How transition counts become probabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Normalization {
    /// Each departing state's row sums to one; unobserved rows stay zero
    #[default]
    RowWise,
    /// All entries sum to one
    Global,
}

/// Observed transition counts and their normalized probabilities.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionMatrix {
    counts: Vec<Vec<u64>>,
    probabilities: Vec<Vec<f64>>,
}

impl TransitionMatrix {
    #[allow(clippy::cast_precision_loss)]
    fn from_counts(counts: Vec<Vec<u64>>, normalization: Normalization) -> Self {
        let to_f64 = |c: u64| c as f64;
        let probabilities = match normalization {
            Normalization::RowWise => counts
                .iter()
                .map(|row| {
                    let total: u64 = row.iter().sum();
                    row.iter()
                        .map(|&c| if total == 0 { 0.0 } else { to_f64(c) / to_f64(total) })
                        .collect()
                })
                .collect(),
            Normalization::Global => {
                let total: u64 = counts.iter().flatten().sum();
                counts
                    .iter()
                    .map(|row| {
                        row.iter()
                            .map(|&c| if total == 0 { 0.0 } else { to_f64(c) / to_f64(total) })
                            .collect()
                    })
                    .collect()
            }
        };
        Self {
            counts,
            probabilities,
        }
    }

    /// Number of states.
    #[must_use]
    pub fn n_states(&self) -> usize {
        self.counts.len()
    }

    /// Raw transition counts, `[from][to]`.
    #[must_use]
    pub fn counts(&self) -> &[Vec<u64>] {
        &self.counts
    }

    /// Normalized probabilities, `[from][to]`.
    #[must_use]
    pub fn probabilities(&self) -> &[Vec<f64>] {
        &self.probabilities
    }

    /// Probability of moving from `from` to `to` (zero when out of range).
    #[must_use]
    pub fn probability(&self, from: usize, to: usize) -> f64 {
        self.probabilities
            .get(from)
            .and_then(|row| row.get(to))
            .copied()
            .unwrap_or(0.0)
    }

    /// Probabilities with every entry raised to at least `epsilon`, for
    /// consumers that need strictly positive weights.
    #[must_use]
    pub fn clipped(&self, epsilon: f64) -> Vec<Vec<f64>> {
        self.probabilities
            .iter()
            .map(|row| row.iter().map(|&p| p.max(epsilon)).collect())
            .collect()
    }

    /// Natural log of the clipped probabilities.
    #[must_use]
    pub fn log_probabilities(&self, epsilon: f64) -> Vec<Vec<f64>> {
        self.clipped(epsilon)
            .into_iter()
            .map(|row| row.into_iter().map(f64::ln).collect())
            .collect()
    }

    /// Directed weighted graph with one edge per nonzero probability.
    #[must_use]
    pub fn as_graph(&self) -> TransitionGraph {
        let mut graph = TransitionGraph::new(self.n_states());
        for (from, row) in self.probabilities.iter().enumerate() {
            for (to, &weight) in row.iter().enumerate() {
                if weight > 0.0 {
                    graph.add_edge(from, to, weight);
                }
            }
        }
        graph
    }
}

/// One weighted edge of a [`TransitionGraph`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransitionEdge {
    /// Departing state
    pub from: usize,
    /// Arriving state
    pub to: usize,
    /// Transition probability
    pub weight: f64,
}

/// Directed graph over cluster states.
#[derive(Debug, Clone, Default)]
pub struct TransitionGraph {
    n_nodes: usize,
    edges: HashMap<usize, Vec<TransitionEdge>>, // from -> outgoing
}

impl TransitionGraph {
    /// Creates a graph with `n_nodes` states and no edges.
    #[must_use]
    pub fn new(n_nodes: usize) -> Self {
        Self {
            n_nodes,
            edges: (0..n_nodes).map(|n| (n, Vec::new())).collect(),
        }
    }

    fn add_edge(&mut self, from: usize, to: usize, weight: f64) {
        self.edges
            .entry(from)
            .or_default()
            .push(TransitionEdge { from, to, weight });
    }

    /// Number of states, including isolated ones.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.n_nodes
    }

    /// Number of edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.values().map(Vec::len).sum()
    }

    /// Outgoing edges of `node`, ordered by destination.
    #[must_use]
    pub fn successors(&self, node: usize) -> &[TransitionEdge] {
        self.edges.get(&node).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Weight of the edge `from -> to`, if present.
    #[must_use]
    pub fn weight(&self, from: usize, to: usize) -> Option<f64> {
        self.successors(from)
            .iter()
            .find(|e| e.to == to)
            .map(|e| e.weight)
    }

    /// All edges ordered by `(from, to)`.
    #[must_use]
    pub fn edges(&self) -> Vec<TransitionEdge> {
        (0..self.n_nodes)
            .flat_map(|n| self.successors(n).iter().copied())
            .collect()
    }
}

/// Lag-1 Pearson autocorrelation of a label sequence.
///
/// Returns `None` when undefined: fewer than three labels, or a constant
/// sequence (zero variance).
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn autocorrelation(labels: &[usize]) -> Option<f64> {
    if labels.len() < 3 {
        return None;
    }
    let series: Vec<f64> = labels.iter().map(|&l| l as f64).collect();
    utils::pearson_correlation(&series[..series.len() - 1], &series[1..])
}

/// Run-length encoding: each bout's label and length, in order.
#[must_use]
pub fn bout_lengths<T: PartialEq + Clone>(labels: &[T]) -> Vec<(T, usize)> {
    let mut bouts: Vec<(T, usize)> = Vec::new();
    for label in labels {
        if let Some((current, len)) = bouts.last_mut() {
            if *current == *label {
                *len += 1;
                continue;
            }
        }
        bouts.push((label.clone(), 1));
    }
    bouts
}

/// Relabels bouts shorter than `min_length` with the preceding bout's label
/// (the following bout's label for a short leading bout).
///
/// The output has the input's length. Applying it repeatedly is idempotent
/// once every bout meets the minimum.
#[must_use]
pub fn filter_short_bouts<T: PartialEq + Clone>(labels: &[T], min_length: usize) -> Vec<T> {
    let bouts = bout_lengths(labels);
    if bouts.len() < 2 {
        return labels.to_vec();
    }

    let mut out = Vec::with_capacity(labels.len());
    let mut previous: Option<T> = None;
    for (i, (label, len)) in bouts.iter().enumerate() {
        let keep = *len >= min_length;
        let value = match (&previous, keep) {
            (_, true) => label.clone(),
            (Some(prev), false) => prev.clone(),
            (None, false) => bouts
                .iter()
                .skip(i + 1)
                .find(|(_, l)| *l >= min_length)
                .map_or_else(|| label.clone(), |(l, _)| l.clone()),
        };
        out.extend(std::iter::repeat(value.clone()).take(*len));
        previous = Some(value);
    }
    out
}

/// Stable mapping between category names and state indices.
///
/// Indices follow the sorted order of the distinct names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    /// Learns the distinct categories of `names`.
    #[must_use]
    pub fn fit<S: AsRef<str>>(names: &[S]) -> Self {
        let classes: BTreeSet<&str> = names.iter().map(AsRef::as_ref).collect();
        Self {
            classes: classes.into_iter().map(str::to_owned).collect(),
        }
    }

    /// Number of categories.
    #[must_use]
    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }

    /// Known categories in index order.
    #[must_use]
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// Index of every name.
    ///
    /// # Errors
    ///
    /// Returns [`SignalError::InvalidParameter`] for a name not seen by `fit`.
    pub fn encode<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<usize>> {
        names
            .iter()
            .map(|name| {
                self.classes
                    .binary_search_by(|c| c.as_str().cmp(name.as_ref()))
                    .map_err(|_| {
                        SignalError::invalid_parameter(
                            "labels",
                            format!("unknown category '{}'", name.as_ref()),
                        )
                    })
            })
            .collect()
    }

    /// Name of state `index`, if known.
    #[must_use]
    pub fn decode(&self, index: usize) -> Option<&str> {
        self.classes.get(index).map(String::as_str)
    }
}

/// Computes transition statistics over label sequences with a fixed state
/// space.
#[derive(Debug, Clone)]
pub struct ClusterSequenceAnalyzer {
    n_states: usize,
    overlapping: bool,
    normalization: Normalization,
}

impl ClusterSequenceAnalyzer {
    /// Creates an analyzer counting overlapping transitions with row-wise
    /// normalization.
    #[must_use]
    pub fn new(n_states: usize) -> Self {
        Self {
            n_states,
            overlapping: true,
            normalization: Normalization::RowWise,
        }
    }

    /// Counts consecutive pairs with step 1 (`true`) or step 2 (`false`).
    #[must_use]
    pub fn with_overlapping(mut self, overlapping: bool) -> Self {
        self.overlapping = overlapping;
        self
    }

    /// Sets the normalization scheme.
    #[must_use]
    pub fn with_normalization(mut self, normalization: Normalization) -> Self {
        self.normalization = normalization;
        self
    }

    /// Empirical transition matrix of `labels`.
    ///
    /// # Errors
    ///
    /// Returns [`SignalError::InvalidLabel`] if a label is not below the
    /// declared number of states.
    pub fn transition_matrix(&self, labels: &[usize]) -> Result<TransitionMatrix> {
        if let Some(&label) = labels.iter().find(|&&l| l >= self.n_states) {
            return Err(SignalError::InvalidLabel {
                label,
                n_states: self.n_states,
            });
        }

        let step = if self.overlapping { 1 } else { 2 };
        let mut counts = vec![vec![0u64; self.n_states]; self.n_states];
        for pair in labels.windows(2).step_by(step) {
            counts[pair[0]][pair[1]] += 1;
        }
        tracing::trace!(
            n_states = self.n_states,
            transitions = labels.len().saturating_sub(1),
            "counted transitions"
        );
        Ok(TransitionMatrix::from_counts(counts, self.normalization))
    }

    /// Lag-1 autocorrelation of `labels`.
    #[must_use]
    pub fn autocorrelation(&self, labels: &[usize]) -> Option<f64> {
        autocorrelation(labels)
    }
}
