use crate::config::{GradingConfig, GradingConfigPatch, SETTINGS_KEY};
use crate::db;
use crate::ipc::error::{calc_err, err, ok};
use crate::ipc::helpers::db_conn;
use crate::ipc::types::{AppState, Request};
use crate::store::{self, INVALID_SETTINGS};
use serde_json::json;

/// Without a workspace nothing is stored and the built-in defaults apply.
fn handle_setup_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let stored = match state.db.as_ref() {
        Some(conn) => match store::load_settings_patch(conn) {
            Ok(v) => v,
            Err(e) => return calc_err(&req.id, e),
        },
        None => GradingConfigPatch::default(),
    };
    let effective = GradingConfig::default().with_patch(&stored);
    ok(
        &req.id,
        json!({
            "grading": effective,
            "stored": stored,
            "builtIn": GradingConfig::default(),
        }),
    )
}

fn handle_setup_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    if !req.params.get("patch").map(|v| v.is_object()).unwrap_or(false) {
        return err(&req.id, "bad_params", "patch must be an object", None);
    }
    let patch = match GradingConfigPatch::parse(req.params.get("patch")) {
        Ok(v) => v,
        Err(e) => return calc_err(&req.id, e),
    };
    let stored = match store::load_settings_patch(conn) {
        Ok(v) => v,
        Err(e) if e.code == INVALID_SETTINGS => {
            tracing::warn!(error = %e, "replacing unreadable grading defaults");
            GradingConfigPatch::default()
        }
        Err(e) => return calc_err(&req.id, e),
    };
    let merged = stored.merged(&patch);

    let value = match serde_json::to_value(&merged) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "internal", e.to_string(), None),
    };
    if let Err(e) = db::settings_set_json(conn, SETTINGS_KEY, &value) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    tracing::info!(settings = %value, "grading defaults updated");
    ok(
        &req.id,
        json!({ "grading": GradingConfig::default().with_patch(&merged) }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "setup.get" => Some(handle_setup_get(state, req)),
        "setup.update" => Some(handle_setup_update(state, req)),
        _ => None,
    }
}
