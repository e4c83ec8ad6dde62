use rusqlite::Connection;
use serde_json::json;
use std::collections::{BTreeSet, HashMap};

use super::error::{P5Error, P5Result};
use crate::config::P5Config;

/// Latest report status of `m.student_id` in the term of class `c`.
///
/// A student may have more than one report row for a term; the most recently
/// updated one wins, rows without a timestamp rank last, then insertion order.
pub(crate) const CURRENT_REPORT_STATUS_SQL: &str = "(SELECT r.status FROM reports r
   WHERE r.student_id = m.student_id AND r.term_id = c.term_id
   ORDER BY r.updated_at IS NULL, r.updated_at DESC, r.rowid DESC
   LIMIT 1)";

/// Whether a report status forbids further edits. No report at all is editable.
pub fn is_terminal_or_later(status: Option<&str>, policy: &P5Config) -> bool {
    match status {
        None => false,
        Some(s) => !policy.is_editable_status(s),
    }
}

fn member_statuses(
    conn: &Connection,
    class_id: &str,
) -> P5Result<Vec<(String, Option<String>)>> {
    let sql = format!(
        "SELECT m.student_id, {status}
         FROM class_members m
         JOIN classes c ON c.id = m.class_id
         WHERE m.class_id = ?",
        status = CURRENT_REPORT_STATUS_SQL
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([class_id], |r| Ok((r.get::<_, String>(0)?, r.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// A class is locked once any of its students has a locked report for the
/// class term.
pub fn is_class_locked(conn: &Connection, class_id: &str, policy: &P5Config) -> P5Result<bool> {
    Ok(member_statuses(conn, class_id)?
        .iter()
        .any(|(_, status)| is_terminal_or_later(status.as_deref(), policy)))
}

pub fn is_student_locked(
    conn: &Connection,
    student_id: &str,
    class_id: &str,
    policy: &P5Config,
) -> P5Result<bool> {
    Ok(member_statuses(conn, class_id)?
        .iter()
        .any(|(sid, status)| sid == student_id && is_terminal_or_later(status.as_deref(), policy)))
}

pub fn ensure_class_not_locked(conn: &Connection, class_id: &str, policy: &P5Config) -> P5Result<()> {
    if is_class_locked(conn, class_id, policy)? {
        return Err(P5Error::locked(Some(json!({ "classId": class_id }))));
    }
    Ok(())
}

/// All-or-nothing check over a batch: one locked student rejects the whole
/// batch. Students outside the class are rejected as not found.
pub fn ensure_students_not_locked<'a, I>(
    conn: &Connection,
    class_id: &str,
    student_ids: I,
    policy: &P5Config,
) -> P5Result<()>
where
    I: IntoIterator<Item = &'a str>,
{
    let requested: BTreeSet<&str> = student_ids.into_iter().collect();
    if requested.is_empty() {
        return Ok(());
    }

    let statuses: HashMap<String, Option<String>> =
        member_statuses(conn, class_id)?.into_iter().collect();

    let outsiders: Vec<&str> = requested
        .iter()
        .copied()
        .filter(|sid| !statuses.contains_key(*sid))
        .collect();
    if !outsiders.is_empty() {
        return Err(P5Error::NotFound {
            message: "student not found in class".to_string(),
            details: Some(json!({ "classId": class_id, "studentIds": outsiders })),
        });
    }

    let locked: Vec<&str> = requested
        .iter()
        .copied()
        .filter(|sid| {
            statuses
                .get(*sid)
                .map(|s| is_terminal_or_later(s.as_deref(), policy))
                .unwrap_or(false)
        })
        .collect();
    if !locked.is_empty() {
        return Err(P5Error::locked(Some(
            json!({ "classId": class_id, "studentIds": locked }),
        )));
    }
    Ok(())
}
