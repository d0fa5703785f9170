//! Aggregate statistics over an annotation table.

use std::collections::BTreeMap;

use ethotrack_core::AnnotationTable;
use ethotrack_signal::{
    filter_short_bouts, ClusterSequenceAnalyzer, LabelEncoder, TransitionMatrix,
};

use crate::config::WindowConfig;
use crate::error::RulesResult;

/// Label used for windows where no trait is active.
pub const NO_TRAIT: &str = "none";

/// Fraction of frames each Boolean trait is active.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn trait_proportions(table: &AnnotationTable) -> BTreeMap<String, f64> {
    let n = table.n_frames();
    table
        .iter()
        .filter_map(|(name, column)| {
            let flags = column.as_flags()?;
            let active = flags.iter().filter(|&&f| f).count();
            let share = if n == 0 { 0.0 } else { active as f64 / n as f64 };
            Some((name.to_string(), share))
        })
        .collect()
}

/// Seconds each Boolean trait is active at `fps` frames per second.
#[must_use]
pub fn trait_durations(table: &AnnotationTable, fps: f64) -> BTreeMap<String, f64> {
    #[allow(clippy::cast_precision_loss)]
    let n = table.n_frames() as f64;
    trait_proportions(table)
        .into_iter()
        .map(|(name, share)| (name, share * n / fps))
        .collect()
}

/// Most frequently active trait in a window centered on every `step`-th
/// frame.
///
/// Only the named `columns` compete; an empty list means every Boolean
/// column. Ties go to the column that sorts first. Windows where nothing is
/// active yield `None`.
#[must_use]
pub fn dominant_trait(
    table: &AnnotationTable,
    columns: &[&str],
    window: WindowConfig,
) -> Vec<Option<String>> {
    let candidates: Vec<(&str, &[bool])> = table
        .iter()
        .filter(|(name, _)| columns.is_empty() || columns.contains(name))
        .filter_map(|(name, column)| Some((name, column.as_flags()?)))
        .collect();

    let n = table.n_frames();
    let half = window.size / 2;
    (0..n)
        .step_by(window.step.max(1))
        .map(|t| {
            let start = t.saturating_sub(half);
            let end = (start + window.size).min(n);
            let mut best: Option<(&str, usize)> = None;
            for (name, flags) in &candidates {
                let count = flags[start..end].iter().filter(|&&f| f).count();
                if count > 0 && best.map_or(true, |(_, c)| count > c) {
                    best = Some((*name, count));
                }
            }
            best.map(|(name, _)| name.to_string())
        })
        .collect()
}

/// Transition statistics of the dominant-trait sequence.
///
/// Windows without an active trait are labelled [`NO_TRAIT`]. Bouts shorter
/// than `min_bout` windows are merged into their neighbors first.
///
/// # Errors
///
/// Propagates label encoding and transition counting errors.
pub fn trait_transitions(
    table: &AnnotationTable,
    columns: &[&str],
    window: WindowConfig,
    min_bout: usize,
) -> RulesResult<(LabelEncoder, TransitionMatrix)> {
    let labels: Vec<String> = dominant_trait(table, columns, window)
        .into_iter()
        .map(|label| label.unwrap_or_else(|| NO_TRAIT.to_string()))
        .collect();
    let labels = filter_short_bouts(&labels, min_bout);
    let encoder = LabelEncoder::fit(&labels);
    let encoded = encoder.encode(&labels)?;
    let matrix = ClusterSequenceAnalyzer::new(encoder.n_classes()).transition_matrix(&encoded)?;
    Ok((encoder, matrix))
}
