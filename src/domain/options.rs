use chrono::NaiveDate;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// Data synchronisation stage, sent with write / import / done requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    IncrementalSyncStreaming,
    IncrementalSyncDaily,
    PreSync,
    HistorySync,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::IncrementalSyncStreaming => "incremental_sync_streaming",
            Stage::IncrementalSyncDaily => "incremental_sync_daily",
            Stage::PreSync => "pre_sync",
            Stage::HistorySync => "history_sync",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "incremental_sync_streaming" => Ok(Stage::IncrementalSyncStreaming),
            "incremental_sync_daily" => Ok(Stage::IncrementalSyncDaily),
            "pre_sync" => Ok(Stage::PreSync),
            "history_sync" => Ok(Stage::HistorySync),
            other => Err(format!("unknown stage: {}", other)),
        }
    }
}

/// Per-call options handed to the client alongside a request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallOptions {
    pub timeout: Option<Duration>,
    pub request_id: Option<String>,
    pub headers: HashMap<String, String>,
    pub stage: Option<Stage>,
    pub data_date: Option<NaiveDate>,
    /// How long the server may spend before answering; should stay below `timeout`.
    pub server_timeout: Option<Duration>,
    pub scene: Option<String>,
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn with_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers.extend(headers);
        self
    }

    pub fn with_stage(mut self, stage: Stage) -> Self {
        self.stage = Some(stage);
        self
    }

    pub fn with_data_date(mut self, date: NaiveDate) -> Self {
        self.data_date = Some(date);
        self
    }

    pub fn with_server_timeout(mut self, timeout: Duration) -> Self {
        self.server_timeout = Some(timeout);
        self
    }

    pub fn with_scene(mut self, scene: impl Into<String>) -> Self {
        self.scene = Some(scene.into());
        self
    }
}

pub fn new_request_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

pub fn default_options(timeout: Duration) -> CallOptions {
    CallOptions::new()
        .with_timeout(timeout)
        .with_request_id(new_request_id())
}

/// Real-time writes are only accepted in the streaming stage.
pub fn streaming_write_options(timeout: Duration) -> CallOptions {
    let server_timeout = timeout.saturating_sub(Duration::from_millis(50));
    default_options(timeout)
        .with_stage(Stage::IncrementalSyncStreaming)
        .with_server_timeout(server_timeout)
}

pub fn daily_write_options(stage: Stage, date: NaiveDate, timeout: Duration) -> CallOptions {
    default_options(timeout)
        .with_stage(stage)
        .with_data_date(date)
}

pub fn done_options(stage: Stage, timeout: Duration) -> CallOptions {
    default_options(timeout).with_stage(stage)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_streaming_options_keep_server_timeout_below_timeout() {
        let opts = streaming_write_options(Duration::from_millis(800));
        assert_eq!(opts.stage, Some(Stage::IncrementalSyncStreaming));
        assert_eq!(opts.server_timeout, Some(Duration::from_millis(750)));
        assert!(opts.request_id.is_some());
    }

    #[test]
    fn test_default_options_generate_distinct_request_ids() {
        let a = default_options(Duration::from_millis(800));
        let b = default_options(Duration::from_millis(800));
        assert_ne!(a.request_id, b.request_id);
    }

    #[test]
    fn test_stage_parse() {
        assert_eq!("pre_sync".parse::<Stage>().unwrap(), Stage::PreSync);
        assert!("weekly".parse::<Stage>().is_err());
        assert_eq!(Stage::HistorySync.to_string(), "history_sync");
    }
}
