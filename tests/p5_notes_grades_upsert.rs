mod test_support;

use serde_json::json;
use std::io::BufReader;
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout};
use test_support::{error_code, request, seed_db, select_workspace, shutdown, spawn_sidecar, temp_dir};

const SEED: &str = "INSERT INTO terms(id, name, is_active) VALUES('T1', '2024/2025 Ganjil', 1);
         INSERT INTO classes(id, name, room_code, term_id, coordinator)
           VALUES('C1', 'X-1', 'R101', 'T1', 'alice');
         INSERT INTO students(id, name, nis, nisn) VALUES('S1', 'Ani', '1001', '0091');
         INSERT INTO students(id, name, nis, nisn) VALUES('S2', 'Budi', '1002', '0092');
         INSERT INTO class_members(class_id, student_id) VALUES('C1', 'S1');
         INSERT INTO class_members(class_id, student_id) VALUES('C1', 'S2');
         INSERT INTO reports(id, student_id, term_id, status, updated_at)
           VALUES('R2', 'S2', 'T1', 'draft', '2024-12-01T00:00:00.000Z');
         INSERT INTO p5_projects(id, class_id, theme, title, description)
           VALUES('P1', 'C1', 'Suara Demokrasi', 'Pemilihan OSIS', '');
         INSERT INTO p5_targets(id, project_id, dimension, element, sub_element, target)
           VALUES('G1', 'P1', 'Bernalar Kritis', 'Analisis', 'Argumen', 'Menilai pendapat');";

fn open_workspace(
    prefix: &str,
) -> (
    PathBuf,
    rusqlite::Connection,
    Child,
    ChildStdin,
    BufReader<ChildStdout>,
) {
    let workspace = temp_dir(prefix);
    let (child, mut stdin, mut reader) = spawn_sidecar();
    select_workspace(&mut stdin, &mut reader, &workspace);
    let conn = seed_db(&workspace, SEED);
    (workspace, conn, child, stdin, reader)
}

fn written(value: &serde_json::Value) -> Option<u64> {
    value
        .get("result")
        .and_then(|r| r.get("written"))
        .and_then(|v| v.as_u64())
}

fn stored_notes(conn: &rusqlite::Connection) -> Vec<(String, Option<String>)> {
    let mut stmt = conn
        .prepare("SELECT student_id, note FROM p5_notes WHERE project_id = 'P1' ORDER BY student_id")
        .expect("prepare");
    stmt.query_map([], |r| Ok((r.get(0)?, r.get(1)?)))
        .expect("query")
        .collect::<Result<Vec<_>, _>>()
        .expect("rows")
}

#[test]
fn notes_for_unreported_and_draft_students_are_saved_and_resubmit_is_stable() {
    let (workspace, conn, child, mut stdin, mut reader) = open_workspace("p5d-upsert-notes");
    let batch = json!({
        "projectId": "P1",
        "notes": [
            { "studentId": "S1", "note": "Aktif berdiskusi" },
            { "studentId": "S2", "note": "Perlu bimbingan" }
        ]
    });

    let first = request(&mut stdin, &mut reader, Some("alice"), "1", "p5.notes.upsert", batch.clone());
    assert_eq!(written(&first), Some(2), "{}", first);
    let expected = vec![
        ("S1".to_string(), Some("Aktif berdiskusi".to_string())),
        ("S2".to_string(), Some("Perlu bimbingan".to_string())),
    ];
    assert_eq!(stored_notes(&conn), expected);

    let again = request(&mut stdin, &mut reader, Some("alice"), "2", "p5.notes.upsert", batch);
    assert_eq!(written(&again), Some(2));
    assert_eq!(stored_notes(&conn), expected);

    let listed = request(
        &mut stdin,
        &mut reader,
        Some("alice"),
        "3",
        "p5.notes.list",
        json!({ "projectId": "P1" }),
    );
    let notes: Vec<Option<&str>> = listed
        .get("result")
        .and_then(|r| r.get("students"))
        .and_then(|v| v.as_array())
        .expect("students")
        .iter()
        .map(|s| s.get("note").and_then(|v| v.as_str()))
        .collect();
    assert_eq!(notes, vec![Some("Aktif berdiskusi"), Some("Perlu bimbingan")]);

    shutdown(child, stdin, &workspace);
}

#[test]
fn omitted_value_keeps_stored_grade() {
    let (workspace, conn, child, mut stdin, mut reader) = open_workspace("p5d-upsert-omit");

    let first = request(
        &mut stdin,
        &mut reader,
        Some("alice"),
        "1",
        "p5.grades.upsert",
        json!({ "targetId": "G1", "grades": [{ "studentId": "S1", "grade": "BSH" }] }),
    );
    assert_eq!(written(&first), Some(1), "{}", first);

    let touch = request(
        &mut stdin,
        &mut reader,
        Some("alice"),
        "2",
        "p5.grades.upsert",
        json!({ "targetId": "G1", "grades": [{ "studentId": "S1" }, { "studentId": "S2" }] }),
    );
    assert_eq!(written(&touch), Some(2), "{}", touch);

    let mut stmt = conn
        .prepare("SELECT student_id, grade FROM p5_grades WHERE target_id = 'G1' ORDER BY student_id")
        .expect("prepare");
    let rows: Vec<(String, Option<String>)> = stmt
        .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))
        .expect("query")
        .collect::<Result<Vec<_>, _>>()
        .expect("rows");
    assert_eq!(
        rows,
        vec![
            ("S1".to_string(), Some("BSH".to_string())),
            ("S2".to_string(), None)
        ]
    );

    shutdown(child, stdin, &workspace);
}

#[test]
fn constraint_failure_mid_batch_leaves_no_rows() {
    let (workspace, conn, child, mut stdin, mut reader) = open_workspace("p5d-upsert-atomic");
    conn.execute_batch(
        "CREATE TRIGGER reject_s2_note BEFORE INSERT ON p5_notes
         WHEN NEW.student_id = 'S2'
         BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
    )
    .expect("trigger");

    let resp = request(
        &mut stdin,
        &mut reader,
        Some("alice"),
        "1",
        "p5.notes.upsert",
        json!({
            "projectId": "P1",
            "notes": [
                { "studentId": "S1", "note": "Aktif" },
                { "studentId": "S2", "note": "Rajin" }
            ]
        }),
    );
    assert_eq!(error_code(&resp), Some("PERSISTENCE_FAILED"), "{}", resp);
    assert_eq!(
        resp.get("error")
            .and_then(|e| e.get("details"))
            .and_then(|d| d.get("retryable"))
            .and_then(|v| v.as_bool()),
        Some(true)
    );
    assert!(stored_notes(&conn).is_empty());

    shutdown(child, stdin, &workspace);
}

#[test]
fn outsider_student_is_not_found_and_batch_is_dropped() {
    let (workspace, conn, child, mut stdin, mut reader) = open_workspace("p5d-upsert-outsider");
    conn.execute(
        "INSERT INTO students(id, name, nis, nisn) VALUES('S9', 'Dewi', '1009', '0099')",
        [],
    )
    .expect("student");

    let resp = request(
        &mut stdin,
        &mut reader,
        Some("alice"),
        "1",
        "p5.notes.upsert",
        json!({
            "projectId": "P1",
            "notes": [
                { "studentId": "S1", "note": "Aktif" },
                { "studentId": "S9", "note": "Tamu" }
            ]
        }),
    );
    assert_eq!(error_code(&resp), Some("NOT_FOUND"), "{}", resp);
    assert!(stored_notes(&conn).is_empty());

    let empty = request(
        &mut stdin,
        &mut reader,
        Some("alice"),
        "2",
        "p5.notes.upsert",
        json!({ "projectId": "P1", "notes": [] }),
    );
    assert_eq!(written(&empty), Some(0), "{}", empty);

    shutdown(child, stdin, &workspace);
}
