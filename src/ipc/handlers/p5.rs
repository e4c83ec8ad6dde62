use rusqlite::Connection;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

use crate::config::P5Config;
use crate::ipc::error::{err, ok, p5_err};
use crate::ipc::types::{AppState, Request};
use crate::p5::types::{GradeInput, NoteInput, ProjectInput, TargetInput};
use crate::p5::{AssessmentService, P5Result};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClassesListParams {
    #[serde(default)]
    term_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClassParams {
    class_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectParams {
    project_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TargetParams {
    target_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectCreateParams {
    class_id: String,
    project: ProjectInput,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectUpdateParams {
    project_id: String,
    project: ProjectInput,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TargetCreateParams {
    project_id: String,
    target: TargetInput,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TargetUpdateParams {
    target_id: String,
    target: TargetInput,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NotesUpsertParams {
    project_id: String,
    notes: Vec<NoteInput>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GradesUpsertParams {
    target_id: String,
    grades: Vec<GradeInput>,
}

fn workspace<'s>(
    state: &'s AppState,
    req: &Request,
) -> Result<(&'s Connection, &'s P5Config), serde_json::Value> {
    match (state.db.as_ref(), state.config.as_ref()) {
        (Some(conn), Some(config)) => Ok((conn, config)),
        _ => Err(err(&req.id, "NO_WORKSPACE", "select a workspace first", None)),
    }
}

fn params<P: DeserializeOwned>(req: &Request) -> Result<P, serde_json::Value> {
    let raw = if req.params.is_null() {
        json!({})
    } else {
        req.params.clone()
    };
    serde_json::from_value(raw).map_err(|e| {
        err(
            &req.id,
            "VALIDATION_FAILED",
            format!("bad params: {e}"),
            None,
        )
    })
}

/// Parses params, runs one service call and wraps the outcome in the
/// response envelope.
fn run<P, F>(state: &AppState, req: &Request, call: F) -> serde_json::Value
where
    P: DeserializeOwned,
    F: FnOnce(&AssessmentService<'_>, &str, P) -> P5Result<serde_json::Value>,
{
    let (conn, config) = match workspace(state, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let p: P = match params(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let svc = AssessmentService::new(conn, config);
    match call(&svc, req.caller(), p) {
        Ok(result) => ok(&req.id, result),
        Err(e) => p5_err(&req.id, &req.method, req.caller(), &e),
    }
}

fn handle_terms_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    run(state, req, |svc, _caller, _p: serde_json::Value| {
        Ok(json!({ "terms": svc.list_terms()? }))
    })
}

fn handle_classes_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    run(state, req, |svc, caller, p: ClassesListParams| {
        Ok(json!({ "classes": svc.list_classes(caller, p.term_id.as_deref())? }))
    })
}

fn handle_classes_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    run(state, req, |svc, caller, p: ClassParams| {
        Ok(json!({ "class": svc.get_class(caller, &p.class_id)? }))
    })
}

fn handle_projects_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    run(state, req, |svc, caller, p: ClassParams| {
        Ok(json!({ "projects": svc.list_projects(caller, &p.class_id)? }))
    })
}

fn handle_projects_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    run(state, req, |svc, caller, p: ProjectCreateParams| {
        let project_id = svc.create_project(caller, &p.class_id, &p.project)?;
        Ok(json!({ "projectId": project_id }))
    })
}

fn handle_projects_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    run(state, req, |svc, caller, p: ProjectUpdateParams| {
        svc.update_project(caller, &p.project_id, &p.project)?;
        Ok(json!({ "ok": true }))
    })
}

fn handle_projects_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    run(state, req, |svc, caller, p: ProjectParams| {
        Ok(json!({ "project": svc.get_project(caller, &p.project_id)? }))
    })
}

fn handle_projects_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    run(state, req, |svc, caller, p: ProjectParams| {
        svc.delete_project(caller, &p.project_id)?;
        Ok(json!({ "ok": true }))
    })
}

fn handle_notes_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    run(state, req, |svc, caller, p: ProjectParams| {
        Ok(json!({ "students": svc.list_student_notes(caller, &p.project_id)? }))
    })
}

fn handle_notes_upsert(state: &mut AppState, req: &Request) -> serde_json::Value {
    run(state, req, |svc, caller, p: NotesUpsertParams| {
        let written = svc.upsert_student_notes(caller, &p.project_id, &p.notes)?;
        Ok(json!({ "written": written }))
    })
}

fn handle_targets_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    run(state, req, |svc, caller, p: ProjectParams| {
        Ok(json!({ "targets": svc.list_targets(caller, &p.project_id)? }))
    })
}

fn handle_targets_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    run(state, req, |svc, caller, p: TargetCreateParams| {
        let target_id = svc.create_target(caller, &p.project_id, &p.target)?;
        Ok(json!({ "targetId": target_id }))
    })
}

fn handle_targets_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    run(state, req, |svc, caller, p: TargetUpdateParams| {
        svc.update_target(caller, &p.target_id, &p.target)?;
        Ok(json!({ "ok": true }))
    })
}

fn handle_targets_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    run(state, req, |svc, caller, p: TargetParams| {
        Ok(json!({ "target": svc.get_target(caller, &p.target_id)? }))
    })
}

fn handle_targets_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    run(state, req, |svc, caller, p: TargetParams| {
        svc.delete_target(caller, &p.target_id)?;
        Ok(json!({ "ok": true }))
    })
}

fn handle_grades_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    run(state, req, |svc, caller, p: TargetParams| {
        Ok(json!({ "students": svc.list_student_grades(caller, &p.target_id)? }))
    })
}

fn handle_grades_upsert(state: &mut AppState, req: &Request) -> serde_json::Value {
    run(state, req, |svc, caller, p: GradesUpsertParams| {
        let written = svc.upsert_student_grades(caller, &p.target_id, &p.grades)?;
        Ok(json!({ "written": written }))
    })
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "terms.list" => Some(handle_terms_list(state, req)),
        "p5.classes.list" => Some(handle_classes_list(state, req)),
        "p5.classes.get" => Some(handle_classes_get(state, req)),
        "p5.projects.list" => Some(handle_projects_list(state, req)),
        "p5.projects.create" => Some(handle_projects_create(state, req)),
        "p5.projects.update" => Some(handle_projects_update(state, req)),
        "p5.projects.get" => Some(handle_projects_get(state, req)),
        "p5.projects.delete" => Some(handle_projects_delete(state, req)),
        "p5.notes.list" => Some(handle_notes_list(state, req)),
        "p5.notes.upsert" => Some(handle_notes_upsert(state, req)),
        "p5.targets.list" => Some(handle_targets_list(state, req)),
        "p5.targets.create" => Some(handle_targets_create(state, req)),
        "p5.targets.update" => Some(handle_targets_update(state, req)),
        "p5.targets.get" => Some(handle_targets_get(state, req)),
        "p5.targets.delete" => Some(handle_targets_delete(state, req)),
        "p5.grades.list" => Some(handle_grades_list(state, req)),
        "p5.grades.upsert" => Some(handle_grades_upsert(state, req)),
        _ => None,
    }
}
