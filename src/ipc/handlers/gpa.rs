use crate::gpa::{calculate_cgpa, calculate_cgpa_after_backlog_clearance, calculate_sgpa, TranscriptItem};
use crate::ipc::error::{calc_err, ok};
use crate::ipc::helpers::{db_conn, has_param, required_param, required_str};
use crate::ipc::types::{AppState, Request};
use crate::store;
use serde_json::json;

fn transcript_input(state: &AppState, req: &Request) -> Result<Vec<TranscriptItem>, serde_json::Value> {
    if has_param(req, "transcript") {
        return required_param(req, "transcript");
    }
    let conn = db_conn(state, req)?;
    let student_id = required_str(req, "studentId")?;
    store::load_transcript(conn, &student_id).map_err(|e| calc_err(&req.id, e))
}

fn handle_gpa_sgpa(_state: &mut AppState, req: &Request) -> serde_json::Value {
    let items: Vec<TranscriptItem> = match required_param(req, "items") {
        Ok(v) => v,
        Err(e) => return e,
    };
    ok(&req.id, json!(calculate_sgpa(&items)))
}

fn handle_gpa_cgpa(state: &mut AppState, req: &Request) -> serde_json::Value {
    let transcript = match transcript_input(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    ok(&req.id, json!(calculate_cgpa(&transcript)))
}

fn handle_gpa_cgpa_after_backlog_clearance(state: &mut AppState, req: &Request) -> serde_json::Value {
    let transcript = match transcript_input(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    ok(
        &req.id,
        json!({ "cgpa": calculate_cgpa_after_backlog_clearance(&transcript) }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "gpa.sgpa" => Some(handle_gpa_sgpa(state, req)),
        "gpa.cgpa" => Some(handle_gpa_cgpa(state, req)),
        "gpa.cgpaAfterBacklogClearance" => Some(handle_gpa_cgpa_after_backlog_clearance(state, req)),
        _ => None,
    }
}
