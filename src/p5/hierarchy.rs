use rusqlite::{Connection, OptionalExtension};

use super::error::P5Result;

/// Root of an entity's hierarchy: the owning class, its term and the
/// username recorded as P5 coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassScope {
    pub class_id: String,
    pub term_id: String,
    pub coordinator: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Class,
    Project,
    Target,
}

impl EntityKind {
    pub fn label(self) -> &'static str {
        match self {
            EntityKind::Class => "class",
            EntityKind::Project => "project",
            EntityKind::Target => "target",
        }
    }

    // Each walk is one statement; the joins climb Target -> Project -> Class.
    fn scope_sql(self) -> &'static str {
        match self {
            EntityKind::Class => {
                "SELECT c.id, c.term_id, c.coordinator
                 FROM classes c
                 WHERE c.id = ?"
            }
            EntityKind::Project => {
                "SELECT c.id, c.term_id, c.coordinator
                 FROM p5_projects p
                 JOIN classes c ON c.id = p.class_id
                 WHERE p.id = ?"
            }
            EntityKind::Target => {
                "SELECT c.id, c.term_id, c.coordinator
                 FROM p5_targets t
                 JOIN p5_projects p ON p.id = t.project_id
                 JOIN classes c ON c.id = p.class_id
                 WHERE t.id = ?"
            }
        }
    }

    pub fn resolve(self, conn: &Connection, id: &str) -> P5Result<Option<ClassScope>> {
        let scope = conn
            .query_row(self.scope_sql(), [id], |r| {
                Ok(ClassScope {
                    class_id: r.get(0)?,
                    term_id: r.get(1)?,
                    coordinator: r.get(2)?,
                })
            })
            .optional()?;
        Ok(scope)
    }
}

pub fn resolve_class(conn: &Connection, class_id: &str) -> P5Result<Option<ClassScope>> {
    EntityKind::Class.resolve(conn, class_id)
}

pub fn resolve_project(conn: &Connection, project_id: &str) -> P5Result<Option<ClassScope>> {
    EntityKind::Project.resolve(conn, project_id)
}

pub fn resolve_target(conn: &Connection, target_id: &str) -> P5Result<Option<ClassScope>> {
    EntityKind::Target.resolve(conn, target_id)
}
