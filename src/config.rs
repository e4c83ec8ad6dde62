use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const CONFIG_FILE_NAME: &str = "p5d.json";

const DEFAULT_MAX_BATCH_ROWS: usize = 5000;

/// Workspace-level settings, stored next to the database as `p5d.json`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct P5Config {
    /// Report statuses that still allow edits. Every other status locks the
    /// student; a student without a report row is never locked.
    pub editable_report_statuses: Vec<String>,
    pub max_batch_rows: usize,
}

impl Default for P5Config {
    fn default() -> Self {
        Self {
            editable_report_statuses: vec!["draft".to_string()],
            max_batch_rows: DEFAULT_MAX_BATCH_ROWS,
        }
    }
}

impl P5Config {
    pub fn load_or_init(workspace: &Path) -> anyhow::Result<Self> {
        std::fs::create_dir_all(workspace)
            .with_context(|| format!("create workspace dir {}", workspace.display()))?;
        let path = workspace.join(CONFIG_FILE_NAME);
        if path.exists() {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("read {}", path.display()))?;
            let config: P5Config = serde_json::from_str(&raw)
                .with_context(|| format!("parse {}", path.display()))?;
            return Ok(config);
        }
        let config = P5Config::default();
        let payload = serde_json::to_string_pretty(&config)?;
        std::fs::write(&path, payload).with_context(|| format!("write {}", path.display()))?;
        Ok(config)
    }

    pub fn is_editable_status(&self, status: &str) -> bool {
        self.editable_report_statuses
            .iter()
            .any(|s| s.eq_ignore_ascii_case(status.trim()))
    }
}
