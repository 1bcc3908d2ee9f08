use crate::calc::{apply_round_off, ratio_or_zero, round_nearest_half, RoundOffRule};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalculationFormula {
    Sum,
    Average,
    BestOfN,
    WeightedAverage,
}

impl CalculationFormula {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "sum" => Some(Self::Sum),
            "average" => Some(Self::Average),
            "best_of_n" => Some(Self::BestOfN),
            "weighted_average" => Some(Self::WeightedAverage),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sum => "sum",
            Self::Average => "average",
            Self::BestOfN => "best_of_n",
            Self::WeightedAverage => "weighted_average",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentDef {
    pub id: String,
    pub name: String,
    pub max_marks: f64,
    pub weightage_percent: f64,
    pub calculation_formula: CalculationFormula,
    #[serde(default)]
    pub best_of_n_count: Option<u32>,
    #[serde(default)]
    pub round_off_rule: RoundOffRule,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentMark {
    pub component_def_id: String,
    pub marks_obtained: Option<f64>,
    #[serde(default)]
    pub is_absent: bool,
    pub max_marks: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalOptions {
    #[serde(default)]
    pub total_internal_out_of: Option<f64>,
    #[serde(default)]
    pub grace_marks: Option<f64>,
    #[serde(default)]
    pub max_grace_marks: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentBreakdown {
    pub component: String,
    pub raw: f64,
    pub weighted: f64,
    pub rounded: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalResult {
    /// Weighted percentage plus grace, rounded to the nearest half point.
    pub total: f64,
    pub weighted_contribution: f64,
    pub grace_applied: f64,
    /// `weighted_contribution` rescaled to `total_internal_out_of`; grace is not included.
    pub scaled: Option<f64>,
    /// Sum of component weightages, 100 when the components carry no weight.
    #[serde(default)]
    pub total_weightage: f64,
    #[serde(default)]
    pub breakdown: Vec<ComponentBreakdown>,
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Reduces one component's usable marks to a single score.
pub fn apply_formula(
    formula: CalculationFormula,
    best_of_n_count: Option<u32>,
    values: &[f64],
) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    match formula {
        CalculationFormula::Sum => values.iter().sum(),
        CalculationFormula::Average => mean(values),
        CalculationFormula::BestOfN => {
            let mut sorted = values.to_vec();
            sorted.sort_by(|a, b| b.partial_cmp(a).unwrap_or(Ordering::Equal));
            match best_of_n_count {
                Some(n) if n > 0 => {
                    let take = (n as usize).min(sorted.len());
                    mean(&sorted[..take])
                }
                _ => mean(&sorted),
            }
        }
        // Known simplification: no per-entry weights, identical to `Average`.
        CalculationFormula::WeightedAverage => mean(values),
    }
}

pub fn grace_to_apply(options: &InternalOptions) -> f64 {
    match options.grace_marks {
        Some(g) if g > 0.0 => g.min(options.max_grace_marks.unwrap_or(g)),
        _ => 0.0,
    }
}

pub fn calculate_internal_marks(
    components: &[ComponentDef],
    marks: &[ComponentMark],
    options: &InternalOptions,
) -> InternalResult {
    let mut total_weighted = 0.0_f64;
    let mut total_weight = 0.0_f64;
    let mut breakdown = Vec::with_capacity(components.len());

    for comp in components {
        let values: Vec<f64> = marks
            .iter()
            .filter(|m| m.component_def_id == comp.id && !m.is_absent)
            .filter_map(|m| m.marks_obtained)
            .collect();

        let raw = apply_formula(comp.calculation_formula, comp.best_of_n_count, &values);
        let rounded = apply_round_off(raw, comp.round_off_rule);
        let weighted = ratio_or_zero(rounded, comp.max_marks) * (comp.weightage_percent / 100.0) * 100.0;

        total_weighted += weighted;
        total_weight += comp.weightage_percent;
        breakdown.push(ComponentBreakdown {
            component: comp.name.clone(),
            raw,
            weighted,
            rounded,
        });
    }

    // Weights are not normalised; the sum only guards the degenerate case.
    if total_weight == 0.0 {
        total_weight = 100.0;
    }

    let scaled = match options.total_internal_out_of {
        Some(out_of) if out_of > 0.0 => Some(round_nearest_half((total_weighted / 100.0) * out_of)),
        _ => None,
    };
    let grace_applied = grace_to_apply(options);
    let total = round_nearest_half(total_weighted + grace_applied);

    tracing::debug!(
        components = components.len(),
        marks = marks.len(),
        total_weighted,
        grace_applied,
        "internal marks calculated"
    );

    InternalResult {
        total,
        weighted_contribution: total_weighted,
        grace_applied,
        scaled,
        total_weightage: total_weight,
        breakdown,
    }
}

/// Re-runs the aggregation with some components' marks replaced. Every existing
/// mark of an overridden component takes the override value and is treated as
/// present; a component with no marks at all gets one synthetic mark.
pub fn calculate_what_if(
    components: &[ComponentDef],
    marks: &[ComponentMark],
    overrides: &HashMap<String, f64>,
    options: &InternalOptions,
) -> InternalResult {
    let mut projected: Vec<ComponentMark> = marks
        .iter()
        .map(|m| match overrides.get(&m.component_def_id) {
            Some(v) => ComponentMark {
                marks_obtained: Some(*v),
                is_absent: false,
                ..m.clone()
            },
            None => m.clone(),
        })
        .collect();

    for comp in components {
        let Some(v) = overrides.get(&comp.id) else {
            continue;
        };
        if !marks.iter().any(|m| m.component_def_id == comp.id) {
            projected.push(ComponentMark {
                component_def_id: comp.id.clone(),
                marks_obtained: Some(*v),
                is_absent: false,
                max_marks: comp.max_marks,
            });
        }
    }

    calculate_internal_marks(components, &projected, options)
}
