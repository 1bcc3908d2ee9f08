use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

pub const DB_FILE_NAME: &str = "gradingd.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL,
            updated_at TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS grading_scales(
            id TEXT PRIMARY KEY,
            scale_name TEXT NOT NULL,
            grade TEXT NOT NULL,
            min_pct REAL NOT NULL,
            max_pct REAL NOT NULL,
            grade_points REAL NOT NULL,
            is_pass INTEGER NOT NULL,
            sort_order INTEGER NOT NULL,
            updated_at TEXT,
            UNIQUE(scale_name, grade)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_grading_scales_name ON grading_scales(scale_name)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS courses(
            code TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            credits REAL NOT NULL DEFAULT 0
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS assessment_component_definitions(
            id TEXT PRIMARY KEY,
            course_code TEXT NOT NULL,
            name TEXT NOT NULL,
            max_marks REAL NOT NULL,
            weightage_percent REAL NOT NULL,
            calculation_formula TEXT NOT NULL DEFAULT 'sum',
            best_of_n_count INTEGER,
            round_off_rule TEXT NOT NULL DEFAULT 'none',
            sort_order INTEGER NOT NULL DEFAULT 0,
            FOREIGN KEY(course_code) REFERENCES courses(code)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_component_defs_course ON assessment_component_definitions(course_code, sort_order)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS assessment_component_marks(
            id TEXT PRIMARY KEY,
            component_def_id TEXT NOT NULL,
            student_id TEXT NOT NULL,
            marks_obtained REAL,
            is_absent INTEGER NOT NULL DEFAULT 0,
            max_marks REAL NOT NULL,
            FOREIGN KEY(component_def_id) REFERENCES assessment_component_definitions(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_component_marks_student ON assessment_component_marks(student_id, component_def_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS external_marks(
            id TEXT PRIMARY KEY,
            course_code TEXT NOT NULL,
            student_id TEXT NOT NULL,
            component_name TEXT,
            marks_obtained REAL,
            is_absent INTEGER NOT NULL DEFAULT 0,
            max_marks REAL NOT NULL,
            sort_order INTEGER NOT NULL DEFAULT 0,
            FOREIGN KEY(course_code) REFERENCES courses(code)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_external_marks_student ON external_marks(student_id, course_code)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS grades(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            course_code TEXT NOT NULL,
            semester TEXT NOT NULL,
            letter_grade TEXT NOT NULL DEFAULT '',
            grade_points REAL,
            FOREIGN KEY(course_code) REFERENCES courses(code)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_grades_student ON grades(student_id, semester)",
        [],
    )?;

    Ok(conn)
}

pub fn settings_get_json(conn: &Connection, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row("SELECT value_json FROM settings WHERE key = ?", [key], |r| r.get(0))
        .optional()?;
    match raw {
        Some(s) => Ok(Some(serde_json::from_str(&s)?)),
        None => Ok(None),
    }
}

pub fn settings_set_json(conn: &Connection, key: &str, value: &serde_json::Value) -> anyhow::Result<()> {
    let now = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO settings(key, value_json, updated_at) VALUES(?, ?, ?)
         ON CONFLICT(key) DO UPDATE SET
           value_json = excluded.value_json,
           updated_at = excluded.updated_at",
        (key, serde_json::to_string(value)?, now),
    )?;
    Ok(())
}
