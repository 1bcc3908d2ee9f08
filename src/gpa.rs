use crate::calc::ratio_or_zero;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Grades that carry neither credits nor points: withdrawn, incomplete, and
/// the placeholders used before a grade is published.
pub const EXCLUDED_GRADES: [&str; 4] = ["W", "I", "—", ""];

pub fn is_excluded_grade(letter_grade: &str) -> bool {
    EXCLUDED_GRADES.contains(&letter_grade)
}

/// Ungraded enrollments come through as `null`; they read as the empty placeholder.
fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptItem {
    pub semester: String,
    #[serde(default)]
    pub course_code: String,
    #[serde(default)]
    pub course_title: String,
    pub credits: f64,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub letter_grade: String,
    #[serde(default)]
    pub grade_points: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectCreditPoints {
    pub course_code: String,
    pub letter_grade: String,
    pub credits: f64,
    pub grade_points: f64,
    pub credit_points: f64,
    pub is_failed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SgpaResult {
    pub semester: String,
    pub total_credit_points: f64,
    pub total_credits: f64,
    pub sgpa: f64,
    pub subject_wise: Vec<SubjectCreditPoints>,
    pub failed_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SemesterHistoryPoint {
    pub semester: String,
    pub sgpa: f64,
    pub credits: f64,
    pub credit_points: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CgpaResult {
    pub cumulative_credit_points: f64,
    pub cumulative_credits: f64,
    pub cgpa: f64,
    pub sgpa_by_semester: Vec<SgpaResult>,
    pub history: Vec<SemesterHistoryPoint>,
}

fn subject_credit_points(item: &TranscriptItem) -> SubjectCreditPoints {
    let excluded = is_excluded_grade(&item.letter_grade);
    let (credits, grade_points) = if excluded {
        (0.0, 0.0)
    } else {
        (item.credits, item.grade_points.unwrap_or(0.0))
    };
    let is_failed = item.letter_grade == "F" || (grade_points == 0.0 && !excluded);

    SubjectCreditPoints {
        course_code: item.course_code.clone(),
        letter_grade: item.letter_grade.clone(),
        credits,
        grade_points,
        credit_points: credits * grade_points,
        is_failed,
    }
}

/// Credit-weighted average for one semester's items. The caller filters by
/// semester; the label is taken from the first item.
pub fn calculate_sgpa(items: &[TranscriptItem]) -> SgpaResult {
    let subject_wise: Vec<SubjectCreditPoints> = items.iter().map(subject_credit_points).collect();
    let total_credit_points: f64 = subject_wise.iter().map(|s| s.credit_points).sum();
    let total_credits: f64 = subject_wise.iter().map(|s| s.credits).sum();
    let failed_count = subject_wise.iter().filter(|s| s.is_failed).count();

    SgpaResult {
        semester: items.first().map(|i| i.semester.clone()).unwrap_or_default(),
        total_credit_points,
        total_credits,
        sgpa: ratio_or_zero(total_credit_points, total_credits),
        subject_wise,
        failed_count,
    }
}

/// Aggregates every semester in the transcript, ordered by semester label as a
/// plain string. Labels must sort chronologically.
pub fn calculate_cgpa(transcript: &[TranscriptItem]) -> CgpaResult {
    let mut by_semester: BTreeMap<&str, Vec<TranscriptItem>> = BTreeMap::new();
    for item in transcript {
        by_semester
            .entry(item.semester.as_str())
            .or_default()
            .push(item.clone());
    }

    let mut cumulative_credit_points = 0.0_f64;
    let mut cumulative_credits = 0.0_f64;
    let mut sgpa_by_semester = Vec::with_capacity(by_semester.len());
    let mut history = Vec::with_capacity(by_semester.len());

    for items in by_semester.values() {
        let sem = calculate_sgpa(items);
        cumulative_credit_points += sem.total_credit_points;
        cumulative_credits += sem.total_credits;
        history.push(SemesterHistoryPoint {
            semester: sem.semester.clone(),
            sgpa: sem.sgpa,
            credits: sem.total_credits,
            credit_points: sem.total_credit_points,
        });
        sgpa_by_semester.push(sem);
    }

    tracing::debug!(
        semesters = sgpa_by_semester.len(),
        cumulative_credits,
        "cgpa aggregated"
    );

    CgpaResult {
        cumulative_credit_points,
        cumulative_credits,
        cgpa: ratio_or_zero(cumulative_credit_points, cumulative_credits),
        sgpa_by_semester,
        history,
    }
}

/// CGPA once backlogs are cleared. Expects the caller to have already replaced
/// failed entries with their cleared grades; no merging happens here.
// TODO: decide whether to keep the better of original and cleared grade per course
// instead of trusting the caller's replacement.
pub fn calculate_cgpa_after_backlog_clearance(transcript: &[TranscriptItem]) -> f64 {
    calculate_cgpa(transcript).cgpa
}
