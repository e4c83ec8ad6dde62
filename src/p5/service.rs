use rusqlite::{Connection, OptionalExtension, Transaction, TransactionBehavior};
use tracing::{debug, info};
use uuid::Uuid;

use super::batch::{apply_upserts, UpsertOp};
use super::error::{P5Error, P5Result};
use super::guard::{ensure_owns_class, ensure_owns_entity};
use super::hierarchy::EntityKind;
use super::lock::{
    ensure_class_not_locked, ensure_students_not_locked, is_class_locked,
    is_terminal_or_later, CURRENT_REPORT_STATUS_SQL,
};
use super::types::{
    ClassDetail, ClassSummary, GradeInput, GradeLevel, NoteInput, ProjectDetail, ProjectInput,
    ProjectSummary, StudentGrade, StudentNote, TargetDetail, TargetInput, TargetSummary,
    TermSummary,
};
use crate::config::P5Config;

/// Every operation runs authorize -> (writes) lock check -> execute.
///
/// Writes open an IMMEDIATE transaction before authorizing, so the ownership
/// and lock state they check are the ones in force when the rows land.
pub struct AssessmentService<'a> {
    conn: &'a Connection,
    config: &'a P5Config,
}

fn require_caller(caller: &str) -> P5Result<&str> {
    if caller.trim().is_empty() {
        return Err(P5Error::Unauthenticated);
    }
    Ok(caller)
}

impl<'a> AssessmentService<'a> {
    pub fn new(conn: &'a Connection, config: &'a P5Config) -> Self {
        Self { conn, config }
    }

    fn begin_write(&self) -> P5Result<Transaction<'a>> {
        Ok(Transaction::new_unchecked(
            self.conn,
            TransactionBehavior::Immediate,
        )?)
    }

    fn check_batch_len(&self, len: usize) -> P5Result<()> {
        if len > self.config.max_batch_rows {
            return Err(P5Error::invalid(format!(
                "batch exceeds max rows: {} > {}",
                len, self.config.max_batch_rows
            )));
        }
        Ok(())
    }

    pub fn list_terms(&self) -> P5Result<Vec<TermSummary>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, is_active FROM terms ORDER BY is_active DESC, name DESC")?;
        let terms = stmt
            .query_map([], |r| {
                Ok(TermSummary {
                    id: r.get(0)?,
                    name: r.get(1)?,
                    is_active: r.get::<_, i64>(2)? != 0,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(terms)
    }

    pub fn list_classes(&self, caller: &str, term_id: Option<&str>) -> P5Result<Vec<ClassSummary>> {
        let caller = require_caller(caller)?;
        let mut stmt = self.conn.prepare(
            "SELECT id, name, room_code, term_id
             FROM classes
             WHERE coordinator = ?1 AND (?2 IS NULL OR term_id = ?2)
             ORDER BY name, id",
        )?;
        let classes = stmt
            .query_map((caller, term_id), |r| {
                Ok(ClassSummary {
                    id: r.get(0)?,
                    name: r.get(1)?,
                    room_code: r.get(2)?,
                    term_id: r.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        debug!(caller, rows = classes.len(), "listed classes");
        Ok(classes)
    }

    pub fn get_class(&self, caller: &str, class_id: &str) -> P5Result<ClassDetail> {
        let caller = require_caller(caller)?;
        ensure_owns_class(self.conn, caller, class_id)?;
        let class = self
            .conn
            .query_row(
                "SELECT id, name, room_code, term_id FROM classes WHERE id = ?",
                [class_id],
                |r| {
                    Ok(ClassSummary {
                        id: r.get(0)?,
                        name: r.get(1)?,
                        room_code: r.get(2)?,
                        term_id: r.get(3)?,
                    })
                },
            )
            .optional()?
            .ok_or_else(|| P5Error::not_found("class not found"))?;
        let locked = is_class_locked(self.conn, class_id, self.config)?;
        Ok(ClassDetail { locked, class })
    }

    pub fn list_projects(&self, caller: &str, class_id: &str) -> P5Result<Vec<ProjectSummary>> {
        let caller = require_caller(caller)?;
        ensure_owns_class(self.conn, caller, class_id)?;
        let mut stmt = self
            .conn
            .prepare("SELECT id, title FROM p5_projects WHERE class_id = ? ORDER BY rowid")?;
        let projects = stmt
            .query_map([class_id], |r| {
                Ok(ProjectSummary {
                    id: r.get(0)?,
                    title: r.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(projects)
    }

    pub fn create_project(
        &self,
        caller: &str,
        class_id: &str,
        input: &ProjectInput,
    ) -> P5Result<String> {
        let caller = require_caller(caller)?;
        let input = input.normalized()?;
        let tx = self.begin_write()?;
        ensure_owns_class(&tx, caller, class_id)?;
        ensure_class_not_locked(&tx, class_id, self.config)?;

        let project_id = Uuid::new_v4().to_string();
        tx.execute(
            "INSERT INTO p5_projects(id, class_id, theme, title, description)
             VALUES(?, ?, ?, ?, ?)",
            (
                &project_id,
                class_id,
                &input.theme,
                &input.title,
                &input.description,
            ),
        )?;
        tx.commit()?;
        info!(caller, class_id, project_id = %project_id, "created project");
        Ok(project_id)
    }

    pub fn update_project(
        &self,
        caller: &str,
        project_id: &str,
        input: &ProjectInput,
    ) -> P5Result<()> {
        let caller = require_caller(caller)?;
        let input = input.normalized()?;
        let tx = self.begin_write()?;
        let scope = ensure_owns_entity(&tx, caller, EntityKind::Project, project_id)?;
        ensure_class_not_locked(&tx, &scope.class_id, self.config)?;

        tx.execute(
            "UPDATE p5_projects SET theme = ?, title = ?, description = ? WHERE id = ?",
            (&input.theme, &input.title, &input.description, project_id),
        )?;
        tx.commit()?;
        info!(caller, project_id, "updated project");
        Ok(())
    }

    pub fn get_project(&self, caller: &str, project_id: &str) -> P5Result<ProjectDetail> {
        let caller = require_caller(caller)?;
        let scope = ensure_owns_entity(self.conn, caller, EntityKind::Project, project_id)?;
        let locked = is_class_locked(self.conn, &scope.class_id, self.config)?;
        let project = self
            .conn
            .query_row(
                "SELECT id, class_id, theme, title, description FROM p5_projects WHERE id = ?",
                [project_id],
                |r| {
                    Ok(ProjectDetail {
                        locked,
                        id: r.get(0)?,
                        class_id: r.get(1)?,
                        theme: r.get(2)?,
                        title: r.get(3)?,
                        description: r.get(4)?,
                    })
                },
            )
            .optional()?
            .ok_or_else(|| P5Error::not_found("project not found"))?;
        Ok(project)
    }

    pub fn delete_project(&self, caller: &str, project_id: &str) -> P5Result<()> {
        let caller = require_caller(caller)?;
        let tx = self.begin_write()?;
        let scope = ensure_owns_entity(&tx, caller, EntityKind::Project, project_id)?;
        ensure_class_not_locked(&tx, &scope.class_id, self.config)?;

        // Dependency order; the schema has no ON DELETE CASCADE.
        tx.execute(
            "DELETE FROM p5_grades
             WHERE target_id IN (SELECT id FROM p5_targets WHERE project_id = ?)",
            [project_id],
        )?;
        tx.execute("DELETE FROM p5_targets WHERE project_id = ?", [project_id])?;
        tx.execute("DELETE FROM p5_notes WHERE project_id = ?", [project_id])?;
        tx.execute("DELETE FROM p5_projects WHERE id = ?", [project_id])?;
        tx.commit()?;
        info!(caller, project_id, "deleted project");
        Ok(())
    }

    pub fn list_student_notes(&self, caller: &str, project_id: &str) -> P5Result<Vec<StudentNote>> {
        let caller = require_caller(caller)?;
        let scope = ensure_owns_entity(self.conn, caller, EntityKind::Project, project_id)?;
        let sql = format!(
            "SELECT s.id, s.name, s.nis, s.nisn, {status}, n.note
             FROM class_members m
             JOIN classes c ON c.id = m.class_id
             JOIN students s ON s.id = m.student_id
             LEFT JOIN p5_notes n ON n.project_id = ?1 AND n.student_id = s.id
             WHERE m.class_id = ?2
             ORDER BY s.name, s.id",
            status = CURRENT_REPORT_STATUS_SQL
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map((project_id, &scope.class_id), |r| {
                let status: Option<String> = r.get(4)?;
                Ok(StudentNote {
                    student_id: r.get(0)?,
                    name: r.get(1)?,
                    nis: r.get(2)?,
                    nisn: r.get(3)?,
                    locked: is_terminal_or_later(status.as_deref(), self.config),
                    note: r.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        debug!(caller, project_id, rows = rows.len(), "listed student notes");
        Ok(rows)
    }

    pub fn upsert_student_notes(
        &self,
        caller: &str,
        project_id: &str,
        notes: &[NoteInput],
    ) -> P5Result<usize> {
        let caller = require_caller(caller)?;
        self.check_batch_len(notes.len())?;
        let tx = self.begin_write()?;
        let scope = ensure_owns_entity(&tx, caller, EntityKind::Project, project_id)?;
        ensure_students_not_locked(
            &tx,
            &scope.class_id,
            notes.iter().map(|n| n.student_id.as_str()),
            self.config,
        )?;

        let ops: Vec<UpsertOp<'_>> = notes
            .iter()
            .map(|n| UpsertOp::Note {
                project_id,
                student_id: n.student_id.as_str(),
                note: n.note.as_deref(),
            })
            .collect();
        let written = apply_upserts(&tx, &ops)?;
        tx.commit()?;
        info!(caller, project_id, rows = written, "saved student notes");
        Ok(written)
    }

    pub fn list_targets(&self, caller: &str, project_id: &str) -> P5Result<Vec<TargetSummary>> {
        let caller = require_caller(caller)?;
        ensure_owns_entity(self.conn, caller, EntityKind::Project, project_id)?;
        let mut stmt = self.conn.prepare(
            "SELECT id, dimension, target FROM p5_targets WHERE project_id = ? ORDER BY rowid",
        )?;
        let targets = stmt
            .query_map([project_id], |r| {
                Ok(TargetSummary {
                    id: r.get(0)?,
                    dimension: r.get(1)?,
                    target: r.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(targets)
    }

    pub fn create_target(
        &self,
        caller: &str,
        project_id: &str,
        input: &TargetInput,
    ) -> P5Result<String> {
        let caller = require_caller(caller)?;
        let input = input.normalized()?;
        let tx = self.begin_write()?;
        let scope = ensure_owns_entity(&tx, caller, EntityKind::Project, project_id)?;
        ensure_class_not_locked(&tx, &scope.class_id, self.config)?;

        let target_id = Uuid::new_v4().to_string();
        tx.execute(
            "INSERT INTO p5_targets(id, project_id, dimension, element, sub_element, target)
             VALUES(?, ?, ?, ?, ?, ?)",
            (
                &target_id,
                project_id,
                &input.dimension,
                &input.element,
                &input.sub_element,
                &input.target,
            ),
        )?;
        tx.commit()?;
        info!(caller, project_id, target_id = %target_id, "created target");
        Ok(target_id)
    }

    pub fn update_target(&self, caller: &str, target_id: &str, input: &TargetInput) -> P5Result<()> {
        let caller = require_caller(caller)?;
        let input = input.normalized()?;
        let tx = self.begin_write()?;
        let scope = ensure_owns_entity(&tx, caller, EntityKind::Target, target_id)?;
        ensure_class_not_locked(&tx, &scope.class_id, self.config)?;

        tx.execute(
            "UPDATE p5_targets
             SET dimension = ?, element = ?, sub_element = ?, target = ?
             WHERE id = ?",
            (
                &input.dimension,
                &input.element,
                &input.sub_element,
                &input.target,
                target_id,
            ),
        )?;
        tx.commit()?;
        info!(caller, target_id, "updated target");
        Ok(())
    }

    pub fn get_target(&self, caller: &str, target_id: &str) -> P5Result<TargetDetail> {
        let caller = require_caller(caller)?;
        let scope = ensure_owns_entity(self.conn, caller, EntityKind::Target, target_id)?;
        let locked = is_class_locked(self.conn, &scope.class_id, self.config)?;
        let target = self
            .conn
            .query_row(
                "SELECT id, dimension, element, sub_element, target FROM p5_targets WHERE id = ?",
                [target_id],
                |r| {
                    Ok(TargetDetail {
                        locked,
                        id: r.get(0)?,
                        dimension: r.get(1)?,
                        element: r.get(2)?,
                        sub_element: r.get(3)?,
                        target: r.get(4)?,
                    })
                },
            )
            .optional()?
            .ok_or_else(|| P5Error::not_found("target not found"))?;
        Ok(target)
    }

    pub fn delete_target(&self, caller: &str, target_id: &str) -> P5Result<()> {
        let caller = require_caller(caller)?;
        let tx = self.begin_write()?;
        let scope = ensure_owns_entity(&tx, caller, EntityKind::Target, target_id)?;
        ensure_class_not_locked(&tx, &scope.class_id, self.config)?;

        tx.execute("DELETE FROM p5_grades WHERE target_id = ?", [target_id])?;
        tx.execute("DELETE FROM p5_targets WHERE id = ?", [target_id])?;
        tx.commit()?;
        info!(caller, target_id, "deleted target");
        Ok(())
    }

    pub fn list_student_grades(&self, caller: &str, target_id: &str) -> P5Result<Vec<StudentGrade>> {
        let caller = require_caller(caller)?;
        let scope = ensure_owns_entity(self.conn, caller, EntityKind::Target, target_id)?;
        let sql = format!(
            "SELECT s.id, s.name, s.nis, s.nisn, {status}, g.grade
             FROM class_members m
             JOIN classes c ON c.id = m.class_id
             JOIN students s ON s.id = m.student_id
             LEFT JOIN p5_grades g ON g.target_id = ?1 AND g.student_id = s.id
             WHERE m.class_id = ?2
             ORDER BY s.name, s.id",
            status = CURRENT_REPORT_STATUS_SQL
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map((target_id, &scope.class_id), |r| {
                let status: Option<String> = r.get(4)?;
                Ok(StudentGrade {
                    student_id: r.get(0)?,
                    name: r.get(1)?,
                    nis: r.get(2)?,
                    nisn: r.get(3)?,
                    locked: is_terminal_or_later(status.as_deref(), self.config),
                    grade: r.get::<_, Option<GradeLevel>>(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        debug!(caller, target_id, rows = rows.len(), "listed student grades");
        Ok(rows)
    }

    pub fn upsert_student_grades(
        &self,
        caller: &str,
        target_id: &str,
        grades: &[GradeInput],
    ) -> P5Result<usize> {
        let caller = require_caller(caller)?;
        self.check_batch_len(grades.len())?;
        let tx = self.begin_write()?;
        let scope = ensure_owns_entity(&tx, caller, EntityKind::Target, target_id)?;
        ensure_students_not_locked(
            &tx,
            &scope.class_id,
            grades.iter().map(|g| g.student_id.as_str()),
            self.config,
        )?;

        let ops: Vec<UpsertOp<'_>> = grades
            .iter()
            .map(|g| UpsertOp::Grade {
                target_id,
                student_id: g.student_id.as_str(),
                grade: g.grade,
            })
            .collect();
        let written = apply_upserts(&tx, &ops)?;
        tx.commit()?;
        info!(caller, target_id, rows = written, "saved student grades");
        Ok(written)
    }
}
