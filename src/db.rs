use rusqlite::Connection;
use std::path::Path;
use std::time::Duration;

pub const DB_FILE_NAME: &str = "p5.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(db_path)?;
    // Report rows are written by another process against the same file.
    conn.busy_timeout(Duration::from_secs(5))?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    // Externally owned: terms, classes, students, membership and reports are
    // produced by the administration side. The sidecar only reads them.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS terms(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 0
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS classes(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            room_code TEXT,
            term_id TEXT NOT NULL,
            coordinator TEXT,
            FOREIGN KEY(term_id) REFERENCES terms(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_classes_coordinator ON classes(coordinator, term_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            nis TEXT,
            nisn TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS class_members(
            class_id TEXT NOT NULL,
            student_id TEXT NOT NULL,
            PRIMARY KEY(class_id, student_id),
            FOREIGN KEY(class_id) REFERENCES classes(id),
            FOREIGN KEY(student_id) REFERENCES students(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_class_members_student ON class_members(student_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS reports(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            term_id TEXT NOT NULL,
            status TEXT NOT NULL,
            updated_at TEXT,
            FOREIGN KEY(student_id) REFERENCES students(id),
            FOREIGN KEY(term_id) REFERENCES terms(id)
        )",
        [],
    )?;
    ensure_updated_at(conn, "reports")?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_reports_student_term ON reports(student_id, term_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS p5_projects(
            id TEXT PRIMARY KEY,
            class_id TEXT NOT NULL,
            theme TEXT NOT NULL,
            title TEXT NOT NULL,
            description TEXT NOT NULL,
            FOREIGN KEY(class_id) REFERENCES classes(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_p5_projects_class ON p5_projects(class_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS p5_targets(
            id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL,
            dimension TEXT NOT NULL,
            element TEXT NOT NULL,
            sub_element TEXT NOT NULL,
            target TEXT NOT NULL,
            FOREIGN KEY(project_id) REFERENCES p5_projects(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_p5_targets_project ON p5_targets(project_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS p5_notes(
            project_id TEXT NOT NULL,
            student_id TEXT NOT NULL,
            note TEXT,
            updated_at TEXT,
            PRIMARY KEY(project_id, student_id),
            FOREIGN KEY(project_id) REFERENCES p5_projects(id),
            FOREIGN KEY(student_id) REFERENCES students(id)
        )",
        [],
    )?;
    ensure_updated_at(conn, "p5_notes")?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_p5_notes_student ON p5_notes(student_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS p5_grades(
            target_id TEXT NOT NULL,
            student_id TEXT NOT NULL,
            grade TEXT CHECK(grade IS NULL OR grade IN ('BB', 'MB', 'BSH', 'SB')),
            updated_at TEXT,
            PRIMARY KEY(target_id, student_id),
            FOREIGN KEY(target_id) REFERENCES p5_targets(id),
            FOREIGN KEY(student_id) REFERENCES students(id)
        )",
        [],
    )?;
    ensure_updated_at(conn, "p5_grades")?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_p5_grades_student ON p5_grades(student_id)",
        [],
    )?;

    Ok(())
}

fn ensure_updated_at(conn: &Connection, table: &str) -> anyhow::Result<()> {
    if table_has_column(conn, table, "updated_at")? {
        return Ok(());
    }
    conn.execute(
        &format!("ALTER TABLE {} ADD COLUMN updated_at TEXT", table),
        [],
    )?;
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}
