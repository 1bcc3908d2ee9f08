use crate::config::{GradingConfig, GradingConfigPatch};
use crate::external::{calculate_external_marks, ExternalMark, ExternalResult};
use crate::grading_scale::{default_scale, marks_to_grade, GradingScaleEntry};
use crate::internal::{
    calculate_internal_marks, calculate_what_if, ComponentDef, ComponentMark, InternalOptions,
    InternalResult,
};
use crate::ipc::error::{calc_err, err, ok};
use crate::ipc::helpers::{
    db_conn, has_param, optional_param, required_f64, required_param, required_str,
};
use crate::ipc::types::{AppState, Request};
use crate::store::{self, DEFAULT_SCALE_NAME};
use crate::total::{calculate_total_marks, compute_subject_total, grade_subject};
use serde_json::json;
use std::collections::HashMap;

fn effective_config(state: &AppState, req: &Request) -> Result<GradingConfig, serde_json::Value> {
    let patch = GradingConfigPatch::parse(req.params.get("config")).map_err(|e| calc_err(&req.id, e))?;
    store::effective_config(state.db.as_ref(), &patch).map_err(|e| calc_err(&req.id, e))
}

/// Inline `scale`, else the named (or default) scale from the workspace.
fn resolve_scale(state: &AppState, req: &Request) -> Result<Vec<GradingScaleEntry>, serde_json::Value> {
    if let Some(scale) = optional_param::<Vec<GradingScaleEntry>>(req, "scale")? {
        return Ok(scale);
    }
    let name: String =
        optional_param(req, "scaleName")?.unwrap_or_else(|| DEFAULT_SCALE_NAME.to_string());
    match state.db.as_ref() {
        Some(conn) => store::load_grading_scale(conn, &name).map_err(|e| calc_err(&req.id, e)),
        None if name == DEFAULT_SCALE_NAME => Ok(default_scale()),
        None => Err(err(&req.id, "no_workspace", "select a workspace first", None)),
    }
}

fn subject_key(req: &Request) -> Result<(String, String), serde_json::Value> {
    Ok((required_str(req, "courseCode")?, required_str(req, "studentId")?))
}

fn internal_inputs(
    state: &AppState,
    req: &Request,
) -> Result<(Vec<ComponentDef>, Vec<ComponentMark>), serde_json::Value> {
    if has_param(req, "components") {
        let components: Vec<ComponentDef> = required_param(req, "components")?;
        let marks: Vec<ComponentMark> = optional_param(req, "marks")?.unwrap_or_default();
        return Ok((components, marks));
    }
    let conn = db_conn(state, req)?;
    let (course_code, student_id) = subject_key(req)?;
    let components = store::load_component_defs(conn, &course_code).map_err(|e| calc_err(&req.id, e))?;
    let marks = store::load_component_marks(conn, &course_code, &student_id)
        .map_err(|e| calc_err(&req.id, e))?;
    Ok((components, marks))
}

fn external_inputs(
    state: &AppState,
    req: &Request,
    inline_key: &str,
) -> Result<Vec<ExternalMark>, serde_json::Value> {
    if has_param(req, inline_key) {
        return required_param(req, inline_key);
    }
    let conn = db_conn(state, req)?;
    let (course_code, student_id) = subject_key(req)?;
    store::load_external_marks(conn, &course_code, &student_id).map_err(|e| calc_err(&req.id, e))
}

fn handle_marks_to_grade(state: &mut AppState, req: &Request) -> serde_json::Value {
    let total_marks = match required_f64(req, "totalMarks") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let max_marks = match required_f64(req, "maxMarks") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let scale = match resolve_scale(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let grade = marks_to_grade(total_marks, max_marks, &scale);
    ok(
        &req.id,
        json!({
            "gradable": grade.is_some(),
            "grade": grade,
        }),
    )
}

fn handle_internal_calculate(state: &mut AppState, req: &Request) -> serde_json::Value {
    let (components, marks) = match internal_inputs(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let options: InternalOptions = match optional_param(req, "options") {
        Ok(v) => v.unwrap_or_default(),
        Err(e) => return e,
    };
    ok(&req.id, json!(calculate_internal_marks(&components, &marks, &options)))
}

fn handle_internal_what_if(state: &mut AppState, req: &Request) -> serde_json::Value {
    let (components, marks) = match internal_inputs(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let options: InternalOptions = match optional_param(req, "options") {
        Ok(v) => v.unwrap_or_default(),
        Err(e) => return e,
    };
    let overrides: HashMap<String, f64> = match required_param(req, "overrides") {
        Ok(v) => v,
        Err(e) => return e,
    };
    if let Some(unknown) = overrides.keys().find(|k| !components.iter().any(|c| &c.id == *k)) {
        return err(
            &req.id,
            "bad_params",
            "override targets an unknown component",
            Some(json!({ "componentDefId": unknown })),
        );
    }
    let current = calculate_internal_marks(&components, &marks, &options);
    let projected = calculate_what_if(&components, &marks, &overrides, &options);
    ok(
        &req.id,
        json!({
            "current": current,
            "projected": projected,
        }),
    )
}

fn handle_external_calculate(state: &mut AppState, req: &Request) -> serde_json::Value {
    let marks = match external_inputs(state, req, "marks") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let external_out_of = match optional_param::<f64>(req, "externalOutOf") {
        Ok(Some(v)) => v,
        Ok(None) => match effective_config(state, req) {
            Ok(cfg) => cfg.external_out_of,
            Err(e) => return e,
        },
        Err(e) => return e,
    };
    ok(
        &req.id,
        json!(calculate_external_marks(&marks, Some(external_out_of))),
    )
}

fn handle_total_calculate(state: &mut AppState, req: &Request) -> serde_json::Value {
    let internal: InternalResult = match required_param(req, "internal") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let external: ExternalResult = match required_param(req, "external") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let cfg = match effective_config(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let result = calculate_total_marks(&internal, &external, &cfg);
    ok(
        &req.id,
        json!({
            "result": result,
            "outcome": result.outcome(),
        }),
    )
}

fn handle_subject_compute(state: &mut AppState, req: &Request) -> serde_json::Value {
    let (components, marks) = match internal_inputs(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let external_marks = match external_inputs(state, req, "externalMarks") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let cfg = match effective_config(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let scale = match resolve_scale(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };

    let subject = compute_subject_total(&components, &marks, &external_marks, &cfg);
    let grade = grade_subject(&subject.result, &cfg, &scale);
    ok(
        &req.id,
        json!({
            "subject": subject,
            "grade": grade,
            "config": cfg,
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "grading.marksToGrade" => Some(handle_marks_to_grade(state, req)),
        "internal.calculate" => Some(handle_internal_calculate(state, req)),
        "internal.whatIf" => Some(handle_internal_what_if(state, req)),
        "external.calculate" => Some(handle_external_calculate(state, req)),
        "total.calculate" => Some(handle_total_calculate(state, req)),
        "subject.compute" => Some(handle_subject_compute(state, req)),
        _ => None,
    }
}
