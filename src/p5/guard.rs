use rusqlite::Connection;
use subtle::ConstantTimeEq;

use super::error::{P5Error, P5Result};
use super::hierarchy::{ClassScope, EntityKind};

pub fn ensure_owns_class(conn: &Connection, caller: &str, class_id: &str) -> P5Result<ClassScope> {
    ensure_owns_entity(conn, caller, EntityKind::Class, class_id)
}

/// Resolves `id` to its root class and checks the caller is its coordinator.
///
/// Absent entities fail with `NotFound`; entities under a class coordinated
/// by someone else fail with `Forbidden`. Both outcomes cost the same single
/// resolver query.
pub fn ensure_owns_entity(
    conn: &Connection,
    caller: &str,
    kind: EntityKind,
    id: &str,
) -> P5Result<ClassScope> {
    let Some(scope) = kind.resolve(conn, id)? else {
        return Err(P5Error::not_found(format!("{} not found", kind.label())));
    };
    if !is_coordinator(&scope, caller) {
        return Err(P5Error::forbidden(format!(
            "{} is not accessible",
            kind.label()
        )));
    }
    Ok(scope)
}

fn is_coordinator(scope: &ClassScope, caller: &str) -> bool {
    let recorded = scope.coordinator.as_deref().unwrap_or("");
    let same: bool = recorded.as_bytes().ct_eq(caller.as_bytes()).into();
    same && !recorded.is_empty()
}
