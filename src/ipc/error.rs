use serde_json::json;
use tracing::{error, warn};

use crate::p5::P5Error;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

/// Single conversion point from service failures to the wire envelope.
pub fn p5_err(id: &str, method: &str, caller: &str, e: &P5Error) -> serde_json::Value {
    match e {
        P5Error::Storage(inner) => {
            error!(method, caller, error = %inner, "storage failure");
        }
        _ => {
            warn!(method, caller, code = e.code(), reason = %e, "request denied");
        }
    }
    err(id, e.code(), e.to_string(), e.details())
}
