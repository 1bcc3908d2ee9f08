use crate::grading_scale::{default_scale, validate_scale, GradingScaleEntry};
use crate::ipc::error::{calc_err, err, ok};
use crate::ipc::helpers::{db_conn, optional_param, required_param, required_str};
use crate::ipc::types::{AppState, Request};
use crate::store::{self, DEFAULT_SCALE_NAME};
use serde_json::json;

const SCALE_NAME_MAX_LEN: usize = 64;
const SCALE_MAX_BANDS: usize = 32;

fn handle_scales_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match store::load_scale_names(conn) {
        Ok(names) => ok(&req.id, json!({ "scales": names })),
        Err(e) => calc_err(&req.id, e),
    }
}

fn handle_scales_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let name: String = match optional_param(req, "name") {
        Ok(v) => v.unwrap_or_else(|| DEFAULT_SCALE_NAME.to_string()),
        Err(e) => return e,
    };
    // Without a workspace only the built-in scale is known.
    let entries = match state.db.as_ref() {
        Some(conn) => match store::load_grading_scale(conn, &name) {
            Ok(v) => v,
            Err(e) => return calc_err(&req.id, e),
        },
        None if name == DEFAULT_SCALE_NAME => default_scale(),
        None => return err(&req.id, "no_workspace", "select a workspace first", None),
    };
    ok(&req.id, json!({ "name": name, "entries": entries }))
}

fn handle_scales_validate(_state: &mut AppState, req: &Request) -> serde_json::Value {
    let entries: Vec<GradingScaleEntry> = match required_param(req, "entries") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let issues = validate_scale(&entries);
    ok(
        &req.id,
        json!({
            "valid": issues.is_empty(),
            "issues": issues,
        }),
    )
}

fn handle_scales_upsert(state: &mut AppState, req: &Request) -> serde_json::Value {
    let name = match required_str(req, "name") {
        Ok(v) => v.trim().to_string(),
        Err(e) => return e,
    };
    if name.is_empty() || name.len() > SCALE_NAME_MAX_LEN {
        return err(
            &req.id,
            "bad_params",
            format!("name must be 1..={} characters", SCALE_NAME_MAX_LEN),
            None,
        );
    }
    let entries: Vec<GradingScaleEntry> = match required_param(req, "entries") {
        Ok(v) => v,
        Err(e) => return e,
    };
    if entries.is_empty() || entries.len() > SCALE_MAX_BANDS {
        return err(
            &req.id,
            "bad_params",
            format!("entries must contain 1..={} bands", SCALE_MAX_BANDS),
            None,
        );
    }

    let issues = validate_scale(&entries);
    if issues.iter().any(|i| i.is_blocking()) {
        return err(
            &req.id,
            "scale_invalid",
            "grading bands must be ordered, disjoint and within 0..=100",
            Some(json!({ "issues": issues })),
        );
    }

    let Some(conn) = state.db.as_mut() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    if let Err(e) = store::replace_grading_scale(conn, &name, &entries) {
        return calc_err(&req.id, e);
    }
    tracing::info!(scale = %name, bands = entries.len(), "grading scale stored");
    ok(
        &req.id,
        json!({
            "name": name,
            "bands": entries.len(),
            "warnings": issues,
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "scales.list" => Some(handle_scales_list(state, req)),
        "scales.get" => Some(handle_scales_get(state, req)),
        "scales.validate" => Some(handle_scales_validate(state, req)),
        "scales.upsert" => Some(handle_scales_upsert(state, req)),
        _ => None,
    }
}
