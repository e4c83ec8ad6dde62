use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

use crate::config::P5Config;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    /// Username established by the session layer in front of the sidecar.
    #[serde(default)]
    pub caller: Option<String>,
    #[serde(default)]
    pub params: serde_json::Value,
}

impl Request {
    pub fn caller(&self) -> &str {
        self.caller.as_deref().unwrap_or("")
    }
}

#[derive(Default)]
pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    pub config: Option<P5Config>,
}
