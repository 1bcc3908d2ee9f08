use crate::calc::round_nearest_half;
use crate::config::GradingConfig;
use crate::external::{calculate_external_marks, ExternalMark, ExternalResult};
use crate::grading_scale::{marks_to_grade, GradeAssignment, GradingScaleEntry};
use crate::internal::{calculate_internal_marks, ComponentDef, ComponentMark, InternalOptions, InternalResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectOutcome {
    Passed,
    Detained,
    Absent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalMarksResult {
    pub internal: f64,
    pub external: f64,
    pub total: f64,
    pub grace_applied: f64,
    pub pass_external: bool,
    pub pass_total: bool,
    pub passed: bool,
    pub detained: bool,
    pub absent: bool,
}

impl TotalMarksResult {
    pub fn outcome(&self) -> SubjectOutcome {
        if self.absent {
            SubjectOutcome::Absent
        } else if self.passed {
            SubjectOutcome::Passed
        } else {
            SubjectOutcome::Detained
        }
    }
}

pub fn calculate_total_marks(
    internal_result: &InternalResult,
    external_result: &ExternalResult,
    config: &GradingConfig,
) -> TotalMarksResult {
    let internal = internal_result
        .scaled
        .unwrap_or((internal_result.total / 100.0) * config.internal_out_of);
    let external = external_result.scaled;
    let total = round_nearest_half(internal + external);

    let min_external = config.external_out_of * (config.pass_pct_external / 100.0);
    let min_total = config.max_total() * (config.pass_pct_total / 100.0);

    if external_result.absent {
        return TotalMarksResult {
            internal,
            external,
            total,
            grace_applied: internal_result.grace_applied,
            pass_external: false,
            pass_total: false,
            passed: false,
            detained: false,
            absent: true,
        };
    }

    let pass_external = external >= min_external;
    let pass_total = total >= min_total;
    let passed = pass_external && pass_total;

    TotalMarksResult {
        internal,
        external,
        total,
        grace_applied: internal_result.grace_applied,
        pass_external,
        pass_total,
        passed,
        detained: !passed,
        absent: false,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectTotal {
    pub result: TotalMarksResult,
    pub outcome: SubjectOutcome,
    pub internal: InternalResult,
    pub external: ExternalResult,
}

/// Runs internal, external and total evaluation for one subject.
pub fn compute_subject_total(
    components: &[ComponentDef],
    marks: &[ComponentMark],
    external_marks: &[ExternalMark],
    config: &GradingConfig,
) -> SubjectTotal {
    let options = InternalOptions {
        total_internal_out_of: Some(config.internal_out_of),
        grace_marks: Some(config.grace_marks),
        max_grace_marks: config.max_grace_marks,
    };
    let internal = calculate_internal_marks(components, marks, &options);
    let external = calculate_external_marks(external_marks, Some(config.external_out_of));
    let result = calculate_total_marks(&internal, &external, config);

    tracing::debug!(
        total = result.total,
        passed = result.passed,
        absent = result.absent,
        "subject total evaluated"
    );

    SubjectTotal {
        outcome: result.outcome(),
        result,
        internal,
        external,
    }
}

/// Letter grade for an evaluated subject, out of `internal_out_of + external_out_of`.
/// Absent subjects are not graded.
pub fn grade_subject(
    result: &TotalMarksResult,
    config: &GradingConfig,
    scale: &[GradingScaleEntry],
) -> Option<GradeAssignment> {
    if result.absent {
        return None;
    }
    marks_to_grade(result.total, config.max_total(), scale)
}
