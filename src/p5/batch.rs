use chrono::{SecondsFormat, Utc};
use rusqlite::Transaction;

use super::error::P5Result;
use super::types::GradeLevel;

/// One composite-key write. A `None` value creates the row empty and leaves
/// an existing value untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOp<'a> {
    Note {
        project_id: &'a str,
        student_id: &'a str,
        note: Option<&'a str>,
    },
    Grade {
        target_id: &'a str,
        student_id: &'a str,
        grade: Option<GradeLevel>,
    },
}

const UPSERT_NOTE_SQL: &str = "INSERT INTO p5_notes(project_id, student_id, note, updated_at)
     VALUES(?, ?, ?, ?)
     ON CONFLICT(project_id, student_id) DO UPDATE SET
       note = COALESCE(excluded.note, p5_notes.note),
       updated_at = excluded.updated_at";

const UPSERT_GRADE_SQL: &str = "INSERT INTO p5_grades(target_id, student_id, grade, updated_at)
     VALUES(?, ?, ?, ?)
     ON CONFLICT(target_id, student_id) DO UPDATE SET
       grade = COALESCE(excluded.grade, p5_grades.grade),
       updated_at = excluded.updated_at";

pub fn now_ts() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Applies `ops` in order on an open transaction. The first failing row
/// aborts the call; the caller drops the transaction so nothing is kept.
pub fn apply_upserts(tx: &Transaction<'_>, ops: &[UpsertOp<'_>]) -> P5Result<usize> {
    let now = now_ts();
    let mut written = 0usize;
    for op in ops {
        match *op {
            UpsertOp::Note {
                project_id,
                student_id,
                note,
            } => {
                let mut stmt = tx.prepare_cached(UPSERT_NOTE_SQL)?;
                stmt.execute((project_id, student_id, note, &now))?;
            }
            UpsertOp::Grade {
                target_id,
                student_id,
                grade,
            } => {
                let mut stmt = tx.prepare_cached(UPSERT_GRADE_SQL)?;
                stmt.execute((target_id, student_id, grade, &now))?;
            }
        }
        written += 1;
    }
    Ok(written)
}
