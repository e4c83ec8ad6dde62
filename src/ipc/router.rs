use tracing::debug;

use super::handlers;
use super::types::{AppState, Request};
use crate::ipc::error::err;

pub fn handle_request(state: &mut AppState, req: Request) -> serde_json::Value {
    debug!(id = %req.id, method = %req.method, "request");
    if let Some(resp) = handlers::core::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::p5::try_handle(state, &req) {
        return resp;
    }

    err(
        &req.id,
        "NOT_IMPLEMENTED",
        format!("unknown method: {}", req.method),
        None,
    )
}
