use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Largest gap between consecutive bands that still counts as contiguous.
/// Default bands end at `x.99` and the next begins at `x+1`.
const BAND_GAP_TOLERANCE: f64 = 0.01 + 1e-9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradingScaleEntry {
    pub grade: String,
    pub min_pct: f64,
    pub max_pct: f64,
    pub grade_points: f64,
    pub is_pass: bool,
    #[serde(default)]
    pub sort_order: i64,
}

impl GradingScaleEntry {
    fn band(grade: &str, min_pct: f64, max_pct: f64, grade_points: f64, sort_order: i64) -> Self {
        Self {
            grade: grade.to_string(),
            min_pct,
            max_pct,
            grade_points,
            is_pass: grade != "F",
            sort_order,
        }
    }

    fn contains(&self, pct: f64) -> bool {
        pct >= self.min_pct && pct <= self.max_pct
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeAssignment {
    pub grade: String,
    pub grade_points: f64,
    pub is_pass: bool,
}

/// Ten-point scale used when no scale has been configured.
pub fn default_scale() -> Vec<GradingScaleEntry> {
    vec![
        GradingScaleEntry::band("O", 90.0, 100.0, 10.0, 1),
        GradingScaleEntry::band("A+", 80.0, 89.99, 9.0, 2),
        GradingScaleEntry::band("A", 70.0, 79.99, 8.0, 3),
        GradingScaleEntry::band("B+", 60.0, 69.99, 7.0, 4),
        GradingScaleEntry::band("B", 50.0, 59.99, 6.0, 5),
        GradingScaleEntry::band("C", 40.0, 49.99, 5.0, 6),
        GradingScaleEntry::band("D", 30.0, 39.99, 4.0, 7),
        GradingScaleEntry::band("F", 0.0, 29.99, 0.0, 8),
    ]
}

/// Maps `total_marks / max_marks` onto the scale. `None` means no grade can be
/// determined: bad inputs, an empty scale, or a percentage that falls in a gap
/// between bands. Callers must not substitute a default grade for `None`.
pub fn marks_to_grade(
    total_marks: f64,
    max_marks: f64,
    scale: &[GradingScaleEntry],
) -> Option<GradeAssignment> {
    if max_marks <= 0.0 || total_marks < 0.0 || scale.is_empty() {
        return None;
    }
    let pct = total_marks / max_marks * 100.0;

    // Higher bands first so a shared boundary resolves upward.
    let mut sorted: Vec<&GradingScaleEntry> = scale.iter().collect();
    sorted.sort_by(|a, b| b.min_pct.partial_cmp(&a.min_pct).unwrap_or(Ordering::Equal));

    match sorted.into_iter().find(|e| e.contains(pct)) {
        Some(entry) => Some(GradeAssignment {
            grade: entry.grade.clone(),
            grade_points: entry.grade_points,
            is_pass: entry.is_pass,
        }),
        None => {
            tracing::warn!(pct, bands = scale.len(), "no grading band matched percentage");
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ScaleIssue {
    Inverted { grade: String },
    OutOfRange { grade: String },
    Overlap { upper: String, lower: String },
    Gap { from: f64, to: f64 },
}

impl ScaleIssue {
    /// Gaps leave percentages ungradable but do not make lookups ambiguous.
    pub fn is_blocking(&self) -> bool {
        !matches!(self, ScaleIssue::Gap { .. })
    }
}

/// Checks that bands are well-formed, disjoint and cover [0, 100].
pub fn validate_scale(entries: &[GradingScaleEntry]) -> Vec<ScaleIssue> {
    let mut issues = Vec::new();
    for e in entries {
        if e.min_pct > e.max_pct {
            issues.push(ScaleIssue::Inverted {
                grade: e.grade.clone(),
            });
        }
        if e.min_pct < 0.0 || e.max_pct > 100.0 {
            issues.push(ScaleIssue::OutOfRange {
                grade: e.grade.clone(),
            });
        }
    }

    let mut sorted: Vec<&GradingScaleEntry> = entries.iter().collect();
    sorted.sort_by(|a, b| a.min_pct.partial_cmp(&b.min_pct).unwrap_or(Ordering::Equal));

    let mut covered_to = 0.0_f64;
    let mut previous: Option<&GradingScaleEntry> = None;
    for e in sorted {
        match previous {
            None => {
                if e.min_pct > BAND_GAP_TOLERANCE {
                    issues.push(ScaleIssue::Gap {
                        from: 0.0,
                        to: e.min_pct,
                    });
                }
            }
            Some(prev) => {
                if e.min_pct <= prev.max_pct {
                    issues.push(ScaleIssue::Overlap {
                        upper: e.grade.clone(),
                        lower: prev.grade.clone(),
                    });
                } else if e.min_pct - covered_to > BAND_GAP_TOLERANCE {
                    issues.push(ScaleIssue::Gap {
                        from: covered_to,
                        to: e.min_pct,
                    });
                }
            }
        }
        covered_to = covered_to.max(e.max_pct);
        previous = Some(e);
    }
    if previous.is_some() && covered_to < 100.0 {
        issues.push(ScaleIssue::Gap {
            from: covered_to,
            to: 100.0,
        });
    }
    if entries.is_empty() {
        issues.push(ScaleIssue::Gap {
            from: 0.0,
            to: 100.0,
        });
    }
    issues
}
