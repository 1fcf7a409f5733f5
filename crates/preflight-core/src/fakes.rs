//! In-memory fakes for the HTTP and process capabilities (testing only)
//!
//! Provides `ScriptedProbe` and `RecordingProcessRunner`, which satisfy
//! [`HttpProbe`] and [`ProcessRunner`] without touching the network or
//! spawning anything.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::error::ProbeError;
use crate::probe::HttpProbe;
use crate::test_run::{CommandSpec, ProcessRunner};

// ---------------------------------------------------------------------------
// ScriptedProbe
// ---------------------------------------------------------------------------

/// One scripted reply for a GET.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedResponse {
    Status(u16),
    Network(String),
}

impl From<u16> for ScriptedResponse {
    fn from(status: u16) -> Self {
        ScriptedResponse::Status(status)
    }
}

#[derive(Debug, Default)]
struct ProbeState {
    routes: HashMap<String, Vec<ScriptedResponse>>,
    calls: Vec<(String, Instant)>,
}

/// [`HttpProbe`] that replays a per-URL script of responses.
///
/// Each call consumes the next response for its URL; the last response
/// repeats forever. Unknown URLs fail with a network error.
#[derive(Debug, Default)]
pub struct ScriptedProbe {
    state: Mutex<ProbeState>,
}

impl ScriptedProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the responses for `url`.
    pub fn route<I, R>(self, url: &str, responses: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<ScriptedResponse>,
    {
        let responses: Vec<ScriptedResponse> = responses.into_iter().map(Into::into).collect();
        assert!(!responses.is_empty(), "route {url} needs at least one response");
        self.state
            .lock()
            .unwrap()
            .routes
            .insert(url.to_string(), responses);
        self
    }

    /// All URLs requested, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .map(|(url, _)| url.clone())
            .collect()
    }

    pub fn call_count(&self, url: &str) -> usize {
        self.call_times(url).len()
    }

    /// When each request for `url` was made.
    pub fn call_times(&self, url: &str) -> Vec<Instant> {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|(u, _)| u == url)
            .map(|(_, at)| *at)
            .collect()
    }
}

#[async_trait]
impl HttpProbe for ScriptedProbe {
    async fn get_status(&self, url: &str) -> Result<u16, ProbeError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push((url.to_string(), Instant::now()));

        let Some(script) = state.routes.get_mut(url) else {
            return Err(ProbeError::Network {
                url: url.to_string(),
                message: "no route".to_string(),
            });
        };
        let response = if script.len() > 1 {
            script.remove(0)
        } else {
            script[0].clone()
        };

        match response {
            ScriptedResponse::Status(status) => Ok(status),
            ScriptedResponse::Network(message) => Err(ProbeError::Network {
                url: url.to_string(),
                message,
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// RecordingProcessRunner
// ---------------------------------------------------------------------------

/// [`ProcessRunner`] that records every command and exits with a fixed code.
#[derive(Debug)]
pub struct RecordingProcessRunner {
    exit_code: Option<i32>,
    commands: Mutex<Vec<CommandSpec>>,
}

impl RecordingProcessRunner {
    pub fn exiting_with(exit_code: i32) -> Self {
        Self {
            exit_code: Some(exit_code),
            commands: Mutex::new(Vec::new()),
        }
    }

    /// Simulate a child killed by a signal (no exit code).
    pub fn killed() -> Self {
        Self {
            exit_code: None,
            commands: Mutex::new(Vec::new()),
        }
    }

    pub fn commands(&self) -> Vec<CommandSpec> {
        self.commands.lock().unwrap().clone()
    }
}

impl ProcessRunner for RecordingProcessRunner {
    fn run(&self, command: &CommandSpec) -> std::io::Result<Option<i32>> {
        self.commands.lock().unwrap().push(command.clone());
        Ok(self.exit_code)
    }
}
