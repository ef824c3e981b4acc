//! Accuracy summaries over evaluated forecasts.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::{EvaluatedForecast, ModelConfig};

pub const DEFAULT_WORST_LIMIT: usize = 10;

/// Error statistics for one group of evaluated forecasts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupAccuracy {
    /// Target date or instrument, depending on the grouping.
    pub label: String,
    pub model: ModelConfig,
    pub count: usize,
    /// Mean relative error over the evaluations that have one.
    pub mape: Option<f64>,
    pub mae: f64,
    pub rmse: f64,
    pub bias: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AccuracySummary {
    pub evaluations: usize,
    pub by_date: Vec<GroupAccuracy>,
    pub by_instrument: Vec<GroupAccuracy>,
    /// Instrument groups with the largest MAE first.
    pub worst: Vec<GroupAccuracy>,
}

#[derive(Default)]
struct Accumulator {
    count: usize,
    rel_sum: f64,
    rel_count: usize,
    abs_sum: f64,
    sq_sum: f64,
    raw_sum: f64,
}

impl Accumulator {
    fn add(&mut self, row: &EvaluatedForecast) {
        let evaluation = &row.evaluation;
        self.count += 1;
        if let Some(rel) = evaluation.error_rel {
            self.rel_sum += rel;
            self.rel_count += 1;
        }
        self.abs_sum += evaluation.error_abs;
        self.sq_sum += evaluation.error_sq;
        self.raw_sum += evaluation.error_raw;
    }

    fn finish(self, label: String, model: ModelConfig) -> GroupAccuracy {
        let n = self.count as f64;
        GroupAccuracy {
            label,
            model,
            count: self.count,
            mape: (self.rel_count > 0).then(|| self.rel_sum / self.rel_count as f64),
            mae: self.abs_sum / n,
            rmse: (self.sq_sum / n).sqrt(),
            bias: self.raw_sum / n,
        }
    }
}

pub fn summarize(rows: &[EvaluatedForecast], worst_limit: usize) -> AccuracySummary {
    let mut by_date: BTreeMap<(String, ModelConfig), Accumulator> = BTreeMap::new();
    let mut by_instrument: BTreeMap<(String, ModelConfig), Accumulator> = BTreeMap::new();

    for row in rows {
        let model = row.forecast.model;
        by_date
            .entry((row.forecast.target_date.to_string(), model))
            .or_default()
            .add(row);
        by_instrument
            .entry((row.forecast.symbol.to_string(), model))
            .or_default()
            .add(row);
    }

    let by_date: Vec<GroupAccuracy> = by_date
        .into_iter()
        .map(|((label, model), acc)| acc.finish(label, model))
        .collect();
    let by_instrument: Vec<GroupAccuracy> = by_instrument
        .into_iter()
        .map(|((label, model), acc)| acc.finish(label, model))
        .collect();

    let mut worst = by_instrument.clone();
    worst.sort_by(|left, right| right.mae.total_cmp(&left.mae));
    worst.truncate(worst_limit);

    AccuracySummary {
        evaluations: rows.len(),
        by_date,
        by_instrument,
        worst,
    }
}
