//! Reads pipeline inputs out of a workspace database.

use crate::calc::{CalcError, RoundOffRule};
use crate::config::{GradingConfig, GradingConfigPatch, SETTINGS_KEY};
use crate::db;
use crate::external::ExternalMark;
use crate::gpa::TranscriptItem;
use crate::grading_scale::{default_scale, GradingScaleEntry};
use crate::internal::{CalculationFormula, ComponentDef, ComponentMark};
use rusqlite::Connection;
use serde_json::json;

pub const DEFAULT_SCALE_NAME: &str = "default";

/// Error code for a stored `grading.defaults` value that no longer validates.
pub const INVALID_SETTINGS: &str = "invalid_settings";

fn query_err(e: rusqlite::Error) -> CalcError {
    CalcError::new("db_query_failed", e.to_string())
}

pub fn load_settings_patch(conn: &Connection) -> Result<GradingConfigPatch, CalcError> {
    let stored = db::settings_get_json(conn, SETTINGS_KEY)
        .map_err(|e| CalcError::new("db_query_failed", e.to_string()))?;
    GradingConfigPatch::parse(stored.as_ref()).map_err(|e| CalcError {
        code: INVALID_SETTINGS.to_string(),
        ..e
    })
}

/// Built-in defaults with the workspace patch and then `request` laid over them.
pub fn effective_config(
    conn: Option<&Connection>,
    request: &GradingConfigPatch,
) -> Result<GradingConfig, CalcError> {
    let workspace = match conn {
        Some(c) => load_settings_patch(c)?,
        None => GradingConfigPatch::default(),
    };
    Ok(GradingConfig::default().with_patch(&workspace.merged(request)))
}

pub fn load_scale_names(conn: &Connection) -> Result<Vec<String>, CalcError> {
    let mut stmt = conn
        .prepare("SELECT DISTINCT scale_name FROM grading_scales ORDER BY scale_name")
        .map_err(query_err)?;
    let names = stmt
        .query_map([], |r| r.get(0))
        .and_then(|it| it.collect::<Result<Vec<String>, _>>())
        .map_err(query_err)?;
    Ok(names)
}

/// Entries of a stored scale. The `default` scale falls back to the built-in
/// bands when nothing has been stored under that name; any other missing name
/// is `not_found`.
pub fn load_grading_scale(conn: &Connection, scale_name: &str) -> Result<Vec<GradingScaleEntry>, CalcError> {
    let mut stmt = conn
        .prepare(
            "SELECT grade, min_pct, max_pct, grade_points, is_pass, sort_order
             FROM grading_scales
             WHERE scale_name = ?
             ORDER BY sort_order",
        )
        .map_err(query_err)?;
    let entries: Vec<GradingScaleEntry> = stmt
        .query_map([scale_name], |r| {
            Ok(GradingScaleEntry {
                grade: r.get(0)?,
                min_pct: r.get(1)?,
                max_pct: r.get(2)?,
                grade_points: r.get(3)?,
                is_pass: r.get::<_, i64>(4)? != 0,
                sort_order: r.get(5)?,
            })
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(query_err)?;

    if entries.is_empty() {
        if scale_name == DEFAULT_SCALE_NAME {
            return Ok(default_scale());
        }
        return Err(CalcError::new("not_found", "grading scale not found")
            .with_details(json!({ "scaleName": scale_name })));
    }
    Ok(entries)
}

pub fn replace_grading_scale(
    conn: &mut Connection,
    scale_name: &str,
    entries: &[GradingScaleEntry],
) -> Result<(), CalcError> {
    let tx = conn
        .transaction()
        .map_err(|e| CalcError::new("db_tx_failed", e.to_string()))?;
    tx.execute("DELETE FROM grading_scales WHERE scale_name = ?", [scale_name])
        .map_err(|e| CalcError::new("db_delete_failed", e.to_string()))?;
    let now = chrono::Utc::now().to_rfc3339();
    for (i, e) in entries.iter().enumerate() {
        let sort_order = if e.sort_order != 0 { e.sort_order } else { i as i64 + 1 };
        tx.execute(
            "INSERT INTO grading_scales(id, scale_name, grade, min_pct, max_pct, grade_points, is_pass, sort_order, updated_at)
             VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?)",
            (
                uuid::Uuid::new_v4().to_string(),
                scale_name,
                &e.grade,
                e.min_pct,
                e.max_pct,
                e.grade_points,
                e.is_pass as i64,
                sort_order,
                &now,
            ),
        )
        .map_err(|err| {
            CalcError::new("db_insert_failed", err.to_string())
                .with_details(json!({ "table": "grading_scales", "grade": e.grade }))
        })?;
    }
    tx.commit()
        .map_err(|e| CalcError::new("db_commit_failed", e.to_string()))?;
    Ok(())
}

pub fn load_component_defs(conn: &Connection, course_code: &str) -> Result<Vec<ComponentDef>, CalcError> {
    let mut stmt = conn
        .prepare(
            "SELECT id, name, max_marks, weightage_percent, calculation_formula, best_of_n_count, round_off_rule
             FROM assessment_component_definitions
             WHERE course_code = ?
             ORDER BY sort_order, rowid",
        )
        .map_err(query_err)?;
    let rows: Vec<(String, String, f64, f64, String, Option<i64>, String)> = stmt
        .query_map([course_code], |r| {
            Ok((
                r.get(0)?,
                r.get(1)?,
                r.get(2)?,
                r.get(3)?,
                r.get(4)?,
                r.get(5)?,
                r.get(6)?,
            ))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(query_err)?;

    let mut defs = Vec::with_capacity(rows.len());
    for (id, name, max_marks, weightage_percent, formula, best_of_n, round_off) in rows {
        let Some(calculation_formula) = CalculationFormula::parse(&formula) else {
            return Err(CalcError::new("invalid_component", "unknown calculation formula")
                .with_details(json!({ "componentDefId": id, "calculationFormula": formula })));
        };
        let best_of_n_count = match best_of_n {
            None => None,
            Some(n) => match u32::try_from(n) {
                Ok(n) => Some(n),
                Err(_) => {
                    return Err(CalcError::new("invalid_component", "best-of-n count must not be negative")
                        .with_details(json!({ "componentDefId": id, "bestOfNCount": n })));
                }
            },
        };
        let Some(round_off_rule) = RoundOffRule::parse(&round_off) else {
            return Err(CalcError::new("invalid_component", "unknown round-off rule")
                .with_details(json!({ "componentDefId": id, "roundOffRule": round_off })));
        };
        defs.push(ComponentDef {
            id,
            name,
            max_marks,
            weightage_percent,
            calculation_formula,
            best_of_n_count,
            round_off_rule,
        });
    }
    tracing::debug!(course_code, count = defs.len(), "loaded component definitions");
    Ok(defs)
}

pub fn load_component_marks(
    conn: &Connection,
    course_code: &str,
    student_id: &str,
) -> Result<Vec<ComponentMark>, CalcError> {
    let mut stmt = conn
        .prepare(
            "SELECT m.component_def_id, m.marks_obtained, m.is_absent, m.max_marks
             FROM assessment_component_marks m
             JOIN assessment_component_definitions d ON d.id = m.component_def_id
             WHERE d.course_code = ? AND m.student_id = ?
             ORDER BY d.sort_order, m.rowid",
        )
        .map_err(query_err)?;
    let marks: Vec<ComponentMark> = stmt
        .query_map((course_code, student_id), |r| {
            Ok(ComponentMark {
                component_def_id: r.get(0)?,
                marks_obtained: r.get(1)?,
                is_absent: r.get::<_, i64>(2)? != 0,
                max_marks: r.get(3)?,
            })
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(query_err)?;
    tracing::debug!(course_code, student_id, count = marks.len(), "loaded component marks");
    Ok(marks)
}

pub fn load_external_marks(
    conn: &Connection,
    course_code: &str,
    student_id: &str,
) -> Result<Vec<ExternalMark>, CalcError> {
    let mut stmt = conn
        .prepare(
            "SELECT component_name, marks_obtained, is_absent, max_marks
             FROM external_marks
             WHERE course_code = ? AND student_id = ?
             ORDER BY sort_order, rowid",
        )
        .map_err(query_err)?;
    let marks: Vec<ExternalMark> = stmt
        .query_map((course_code, student_id), |r| {
            Ok(ExternalMark {
                component_name: r.get(0)?,
                marks_obtained: r.get(1)?,
                is_absent: r.get::<_, i64>(2)? != 0,
                max_marks: r.get(3)?,
            })
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(query_err)?;
    tracing::debug!(course_code, student_id, count = marks.len(), "loaded external marks");
    Ok(marks)
}

pub fn load_transcript(conn: &Connection, student_id: &str) -> Result<Vec<TranscriptItem>, CalcError> {
    let mut stmt = conn
        .prepare(
            "SELECT g.semester, g.course_code, c.title, c.credits, g.letter_grade, g.grade_points
             FROM grades g
             JOIN courses c ON c.code = g.course_code
             WHERE g.student_id = ?
             ORDER BY g.semester, g.course_code",
        )
        .map_err(query_err)?;
    let items: Vec<TranscriptItem> = stmt
        .query_map([student_id], |r| {
            Ok(TranscriptItem {
                semester: r.get(0)?,
                course_code: r.get(1)?,
                course_title: r.get(2)?,
                credits: r.get(3)?,
                letter_grade: r.get(4)?,
                grade_points: r.get(5)?,
            })
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(query_err)?;
    tracing::debug!(student_id, count = items.len(), "loaded transcript");
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_conn(prefix: &str) -> Connection {
        let ws = std::env::temp_dir().join(format!(
            "{}-{}",
            prefix,
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .expect("clock")
                .as_nanos()
        ));
        db::open_db(&ws).expect("open db")
    }

    fn seed_course(conn: &Connection) {
        conn.execute("INSERT INTO courses(code, title, credits) VALUES('CS101','Programming',4)", [])
            .expect("course");
        conn.execute(
            "INSERT INTO assessment_component_definitions(id, course_code, name, max_marks, weightage_percent, calculation_formula, best_of_n_count, round_off_rule, sort_order)
             VALUES('q','CS101','Quizzes',10,40,'best_of_n',2,'nearest_half',1),
                   ('m','CS101','Mid-term',50,60,'sum',NULL,'none',2)",
            [],
        )
        .expect("defs");
    }

    #[test]
    fn component_defs_load_in_definition_order_with_enums() {
        let conn = temp_conn("gradingd-store-defs");
        seed_course(&conn);
        let defs = load_component_defs(&conn, "CS101").expect("defs");
        assert_eq!(defs.len(), 2);
        assert_eq!(defs[0].id, "q");
        assert_eq!(defs[0].calculation_formula, CalculationFormula::BestOfN);
        assert_eq!(defs[0].best_of_n_count, Some(2));
        assert_eq!(defs[0].round_off_rule, RoundOffRule::NearestHalf);
        assert_eq!(defs[1].best_of_n_count, None);
    }

    #[test]
    fn unknown_formula_is_an_error_not_a_default() {
        let conn = temp_conn("gradingd-store-badformula");
        conn.execute("INSERT INTO courses(code, title, credits) VALUES('X','X',1)", [])
            .expect("course");
        conn.execute(
            "INSERT INTO assessment_component_definitions(id, course_code, name, max_marks, weightage_percent, calculation_formula)
             VALUES('z','X','Odd',10,100,'median')",
            [],
        )
        .expect("def");
        let e = load_component_defs(&conn, "X").unwrap_err();
        assert_eq!(e.code, "invalid_component");
    }

    #[test]
    fn negative_best_of_n_count_is_rejected() {
        let conn = temp_conn("gradingd-store-negative-n");
        conn.execute("INSERT INTO courses(code, title, credits) VALUES('X','X',1)", [])
            .expect("course");
        conn.execute(
            "INSERT INTO assessment_component_definitions(id, course_code, name, max_marks, weightage_percent, calculation_formula, best_of_n_count)
             VALUES('q','X','Quizzes',10,100,'best_of_n',-2)",
            [],
        )
        .expect("def");
        let e = load_component_defs(&conn, "X").unwrap_err();
        assert_eq!(e.code, "invalid_component");
        assert_eq!(e.details.as_ref().map(|d| d["bestOfNCount"].clone()), Some(json!(-2)));
    }

    #[test]
    fn default_scale_falls_back_and_named_scale_roundtrips() {
        let mut conn = temp_conn("gradingd-store-scale");
        assert_eq!(load_grading_scale(&conn, "default").expect("default"), default_scale());
        assert_eq!(load_grading_scale(&conn, "pg").unwrap_err().code, "not_found");

        let pg = vec![
            GradingScaleEntry {
                grade: "P".to_string(),
                min_pct: 50.0,
                max_pct: 100.0,
                grade_points: 6.0,
                is_pass: true,
                sort_order: 0,
            },
            GradingScaleEntry {
                grade: "F".to_string(),
                min_pct: 0.0,
                max_pct: 49.99,
                grade_points: 0.0,
                is_pass: false,
                sort_order: 0,
            },
        ];
        replace_grading_scale(&mut conn, "pg", &pg).expect("store");
        replace_grading_scale(&mut conn, "pg", &pg).expect("replace");
        let loaded = load_grading_scale(&conn, "pg").expect("load");
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].grade, "P");
        assert_eq!(loaded[1].sort_order, 2);
        assert_eq!(load_scale_names(&conn).expect("names"), vec!["pg".to_string()]);
    }

    #[test]
    fn transcript_joins_course_credits() {
        let conn = temp_conn("gradingd-store-transcript");
        seed_course(&conn);
        conn.execute(
            "INSERT INTO grades(id, student_id, course_code, semester, letter_grade, grade_points)
             VALUES('g1','s1','CS101','2024-1','A',8)",
            [],
        )
        .expect("grade");
        let items = load_transcript(&conn, "s1").expect("transcript");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].credits, 4.0);
        assert_eq!(items[0].course_title, "Programming");
        assert_eq!(items[0].grade_points, Some(8.0));
        assert!(load_transcript(&conn, "nobody").expect("empty").is_empty());
    }

    #[test]
    fn workspace_settings_layer_under_request_overrides() {
        let conn = temp_conn("gradingd-store-config");
        db::settings_set_json(&conn, SETTINGS_KEY, &json!({ "internalOutOf": 50, "externalOutOf": 50 }))
            .expect("settings");
        let request = GradingConfigPatch {
            external_out_of: Some(100.0),
            ..Default::default()
        };
        let cfg = effective_config(Some(&conn), &request).expect("config");
        assert_eq!(cfg.internal_out_of, 50.0);
        assert_eq!(cfg.external_out_of, 100.0);
        assert_eq!(effective_config(None, &request).expect("config").internal_out_of, 30.0);
    }
}
