//! In-memory workspace used by the p5 unit tests.
//!
//! Term `T1` (active) and `T0` (previous). Class `C1` (alice) holds students
//! `S1`, `S2`; class `C2` (bob) holds `S3`. `P1`/`G1` sit under `C1`,
//! `P2`/`G2` under `C2`.

use rusqlite::Connection;

use crate::config::P5Config;
use crate::db;

pub fn workspace() -> Connection {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    db::init_schema(&conn).expect("init schema");
    conn.execute_batch(
        "INSERT INTO terms(id, name, is_active) VALUES('T0', '2023/2024 Genap', 0);
         INSERT INTO terms(id, name, is_active) VALUES('T1', '2024/2025 Ganjil', 1);
         INSERT INTO classes(id, name, room_code, term_id, coordinator)
           VALUES('C1', 'X-1', 'R101', 'T1', 'alice');
         INSERT INTO classes(id, name, room_code, term_id, coordinator)
           VALUES('C2', 'X-2', 'R102', 'T1', 'bob');
         INSERT INTO classes(id, name, room_code, term_id, coordinator)
           VALUES('C0', 'IX-1', NULL, 'T0', 'alice');
         INSERT INTO students(id, name, nis, nisn) VALUES('S1', 'Ani', '1001', '0091');
         INSERT INTO students(id, name, nis, nisn) VALUES('S2', 'Budi', '1002', '0092');
         INSERT INTO students(id, name, nis, nisn) VALUES('S3', 'Citra', '1003', '0093');
         INSERT INTO class_members(class_id, student_id) VALUES('C1', 'S1');
         INSERT INTO class_members(class_id, student_id) VALUES('C1', 'S2');
         INSERT INTO class_members(class_id, student_id) VALUES('C2', 'S3');
         INSERT INTO p5_projects(id, class_id, theme, title, description)
           VALUES('P1', 'C1', 'Gaya Hidup Berkelanjutan', 'Kompos Sekolah', 'Mengolah sampah organik');
         INSERT INTO p5_projects(id, class_id, theme, title, description)
           VALUES('P2', 'C2', 'Kearifan Lokal', 'Batik', '');
         INSERT INTO p5_targets(id, project_id, dimension, element, sub_element, target)
           VALUES('G1', 'P1', 'Bernalar Kritis', 'Analisis', 'Refleksi', 'Menganalisis data sampah');
         INSERT INTO p5_targets(id, project_id, dimension, element, sub_element, target)
           VALUES('G2', 'P2', 'Kreatif', 'Karya', 'Orisinal', 'Membuat motif');",
    )
    .expect("seed fixture");
    conn
}

pub fn config() -> P5Config {
    P5Config::default()
}

pub fn set_report(conn: &Connection, id: &str, student_id: &str, term_id: &str, status: &str, at: &str) {
    conn.execute(
        "INSERT INTO reports(id, student_id, term_id, status, updated_at) VALUES(?, ?, ?, ?, ?)",
        (id, student_id, term_id, status, at),
    )
    .expect("insert report");
}

pub fn note_of(conn: &Connection, project_id: &str, student_id: &str) -> Option<Option<String>> {
    use rusqlite::OptionalExtension;
    conn.query_row(
        "SELECT note FROM p5_notes WHERE project_id = ? AND student_id = ?",
        (project_id, student_id),
        |r| r.get(0),
    )
    .optional()
    .expect("query note")
}

pub fn grade_of(conn: &Connection, target_id: &str, student_id: &str) -> Option<Option<String>> {
    use rusqlite::OptionalExtension;
    conn.query_row(
        "SELECT grade FROM p5_grades WHERE target_id = ? AND student_id = ?",
        (target_id, student_id),
        |r| r.get(0),
    )
    .optional()
    .expect("query grade")
}

pub fn count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| r.get(0))
        .expect("count rows")
}
