use rusqlite::Connection;
use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_gradingd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn gradingd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn num(v: &serde_json::Value) -> f64 {
    v.as_f64().expect("number")
}

fn seed_workspace(workspace: &Path) {
    let conn = Connection::open(workspace.join("gradingd.sqlite3")).expect("open db");
    conn.execute_batch(
        "INSERT INTO courses(code, title, credits) VALUES
            ('CS101', 'Programming', 4),
            ('MA101', 'Calculus', 3),
            ('PH101', 'Physics', 3),
            ('CS201', 'Data Structures', 4);

         INSERT INTO assessment_component_definitions(id, course_code, name, max_marks, weightage_percent, calculation_formula, best_of_n_count, round_off_rule, sort_order) VALUES
            ('cs101-quiz', 'CS101', 'Quizzes', 10, 50, 'average', NULL, 'ceiling', 1),
            ('cs101-mid', 'CS101', 'Mid-term', 40, 50, 'sum', NULL, 'none', 2);

         INSERT INTO assessment_component_marks(id, component_def_id, student_id, marks_obtained, is_absent, max_marks) VALUES
            ('m1', 'cs101-quiz', 's1', 7, 0, 10),
            ('m2', 'cs101-quiz', 's1', 8, 0, 10),
            ('m3', 'cs101-quiz', 's1', NULL, 1, 10),
            ('m4', 'cs101-mid', 's1', 30, 0, 40),
            ('m5', 'cs101-quiz', 's2', 2, 0, 10),
            ('m6', 'cs101-mid', 's2', 8, 0, 40);

         INSERT INTO external_marks(id, course_code, student_id, component_name, marks_obtained, is_absent, max_marks, sort_order) VALUES
            ('e1', 'CS101', 's1', 'Theory', 50, 0, 80, 1),
            ('e2', 'CS101', 's1', 'Practical', 15, 0, 20, 2),
            ('e3', 'CS101', 's2', 'Theory', 20, 0, 80, 1),
            ('e4', 'CS101', 's2', 'Practical', 10, 0, 20, 2),
            ('e5', 'CS101', 's3', 'Theory', 70, 0, 80, 1),
            ('e6', 'CS101', 's3', 'Practical', NULL, 1, 20, 2);

         INSERT INTO grades(id, student_id, course_code, semester, letter_grade, grade_points) VALUES
            ('g1', 's1', 'CS101', '2024-1', 'A', 8),
            ('g2', 's1', 'MA101', '2024-1', 'F', 0),
            ('g3', 's1', 'PH101', '2024-2', 'W', NULL),
            ('g4', 's1', 'CS201', '2024-2', 'O', 10);",
    )
    .expect("seed");
}

#[test]
fn subject_compute_reads_marks_from_workspace() {
    let workspace = temp_dir("gradingd-workspace-subject");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    seed_workspace(&workspace);

    // s1: quiz avg 7.5 -> ceil 8 -> 40 weighted; mid 30/40 -> 37.5 weighted.
    let internal = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "internal.calculate",
        json!({ "courseCode": "CS101", "studentId": "s1", "options": { "totalInternalOutOf": 30 } }),
    );
    assert_eq!(num(&internal["breakdown"][0]["raw"]), 7.5);
    assert_eq!(num(&internal["breakdown"][0]["rounded"]), 8.0);
    assert_eq!(num(&internal["total"]), 77.5);
    assert_eq!(num(&internal["scaled"]), 23.5);

    let s1 = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "subject.compute",
        json!({ "courseCode": "CS101", "studentId": "s1" }),
    );
    assert_eq!(num(&s1["subject"]["external"]["raw"]), 65.0);
    assert_eq!(num(&s1["subject"]["external"]["scaled"]), 45.5);
    assert_eq!(num(&s1["subject"]["result"]["total"]), 69.0);
    assert_eq!(s1["subject"]["outcome"], json!("passed"));
    assert_eq!(s1["grade"]["grade"], json!("B+"));

    // s2 is present but below the external threshold.
    let s2 = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "subject.compute",
        json!({ "courseCode": "CS101", "studentId": "s2" }),
    );
    assert_eq!(num(&s2["subject"]["external"]["scaled"]), 21.0);
    assert_eq!(s2["subject"]["result"]["passExternal"], json!(false));
    assert_eq!(s2["subject"]["result"]["detained"], json!(true));
    assert_eq!(s2["subject"]["outcome"], json!("detained"));

    // s3 missed one external paper.
    let s3 = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "subject.compute",
        json!({ "courseCode": "CS101", "studentId": "s3" }),
    );
    assert_eq!(s3["subject"]["result"]["absent"], json!(true));
    assert_eq!(s3["subject"]["result"]["detained"], json!(false));
    assert!(s3["grade"].is_null());

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn cgpa_reads_transcript_from_workspace() {
    let workspace = temp_dir("gradingd-workspace-cgpa");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    seed_workspace(&workspace);

    let res = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "gpa.cgpa",
        json!({ "studentId": "s1" }),
    );
    // 2024-1: 32 points / 7 credits; 2024-2: 40 points / 4 credits (W excluded).
    assert_eq!(num(&res["cumulativeCredits"]), 11.0);
    assert_eq!(num(&res["cumulativeCreditPoints"]), 72.0);
    assert!((num(&res["cgpa"]) - 72.0 / 11.0).abs() < 1e-9);
    let history = res["history"].as_array().expect("history");
    assert_eq!(history.len(), 2);
    assert_eq!(history[0]["semester"], json!("2024-1"));
    assert_eq!(num(&history[1]["sgpa"]), 10.0);
    assert_eq!(res["sgpaBySemester"][1]["subjectWise"].as_array().map(|a| a.len()), Some(2));

    let cleared = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "gpa.cgpaAfterBacklogClearance",
        json!({ "studentId": "s1" }),
    );
    assert_eq!(num(&cleared["cgpa"]), num(&res["cgpa"]));

    let invalid = {
        let conn = Connection::open(workspace.join("gradingd.sqlite3")).expect("open db");
        conn.execute(
            "INSERT INTO assessment_component_definitions(id, course_code, name, max_marks, weightage_percent, calculation_formula)
             VALUES('bad', 'MA101', 'Odd', 10, 100, 'median')",
            [],
        )
        .expect("bad def");
        request(
            &mut stdin,
            &mut reader,
            "4",
            "internal.calculate",
            json!({ "courseCode": "MA101", "studentId": "s1" }),
        )
    };
    assert_eq!(invalid["error"]["code"], json!("invalid_component"));

    drop(stdin);
    let _ = child.wait();
}
