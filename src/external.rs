use crate::calc::round_nearest_half;
use crate::config::DEFAULT_EXTERNAL_OUT_OF;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalMark {
    #[serde(default)]
    pub component_name: Option<String>,
    pub marks_obtained: Option<f64>,
    #[serde(default)]
    pub is_absent: bool,
    pub max_marks: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalResult {
    pub raw: f64,
    pub scaled: f64,
    pub max_raw: f64,
    pub absent: bool,
}

impl ExternalResult {
    pub fn absent() -> Self {
        Self {
            raw: 0.0,
            scaled: 0.0,
            max_raw: 0.0,
            absent: true,
        }
    }
}

/// Sums the external components and rescales to `external_out_of` (70 when not
/// given). One absent component voids the whole external score.
pub fn calculate_external_marks(marks: &[ExternalMark], external_out_of: Option<f64>) -> ExternalResult {
    if marks.is_empty() || marks.iter().any(|m| m.is_absent) {
        return ExternalResult::absent();
    }

    let out_of = external_out_of.unwrap_or(DEFAULT_EXTERNAL_OUT_OF);
    let max_raw: f64 = marks.iter().map(|m| m.max_marks).sum();
    let raw: f64 = marks
        .iter()
        .map(|m| if m.is_absent { 0.0 } else { m.marks_obtained.unwrap_or(0.0) })
        .sum();
    let scaled = if max_raw > 0.0 {
        round_nearest_half((raw / max_raw) * out_of)
    } else {
        0.0
    };

    ExternalResult {
        raw,
        scaled,
        max_raw,
        absent: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mark(v: Option<f64>, max: f64, absent: bool) -> ExternalMark {
        ExternalMark {
            component_name: None,
            marks_obtained: v,
            is_absent: absent,
            max_marks: max,
        }
    }

    #[test]
    fn one_absence_voids_the_external_score() {
        let res = calculate_external_marks(
            &[mark(Some(28.0), 40.0, false), mark(None, 30.0, true)],
            Some(70.0),
        );
        assert!(res.absent);
        assert_eq!(res.scaled, 0.0);
        assert_eq!(res.raw, 0.0);
        assert_eq!(res.max_raw, 0.0);
    }

    #[test]
    fn absence_wins_regardless_of_other_scores() {
        for score in [0.0, 35.0, 60.0] {
            let res = calculate_external_marks(
                &[mark(Some(score), 60.0, false), mark(Some(10.0), 10.0, true)],
                None,
            );
            assert!(res.absent);
            assert_eq!(res.scaled, 0.0);
        }
    }

    #[test]
    fn empty_list_is_absent() {
        assert_eq!(calculate_external_marks(&[], None), ExternalResult::absent());
    }

    #[test]
    fn present_marks_scale_to_default_seventy() {
        let res = calculate_external_marks(&[mark(Some(45.0), 60.0, false), mark(Some(20.0), 40.0, false)], None);
        assert!(!res.absent);
        assert_eq!(res.raw, 65.0);
        assert_eq!(res.max_raw, 100.0);
        assert_eq!(res.scaled, 45.5);
    }

    #[test]
    fn blank_mark_counts_as_zero_and_zero_max_scales_to_zero() {
        let res = calculate_external_marks(&[mark(None, 50.0, false), mark(Some(25.0), 50.0, false)], Some(100.0));
        assert_eq!(res.raw, 25.0);
        assert_eq!(res.scaled, 25.0);

        let degenerate = calculate_external_marks(&[mark(Some(0.0), 0.0, false)], None);
        assert!(!degenerate.absent);
        assert_eq!(degenerate.scaled, 0.0);
    }
}
