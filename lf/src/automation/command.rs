//! AutomationClient backed by an external command
//!
//! The browser driver lives outside this process. For each scrape the
//! configured command is spawned, handed one JSON object on stdin:
//!
//! ```json
//! {"session": {...}, "request": {...}}
//! ```
//!
//! and expected to print `{"profiles": [...]}` on stdout. A non-zero exit
//! or an `"error"` field fails the scrape.

use std::io::ErrorKind;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::domain::AutomationSettings;

use super::{AutomationClient, AutomationError, ExtractedProfile, ScrapeRequest, Session};

#[derive(Serialize)]
struct CommandInput<'a> {
    session: &'a Session,
    request: &'a ScrapeRequest,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CommandOutput {
    profiles: Vec<ExtractedProfile>,
    error: Option<String>,
}

/// Runs `program args...` once per scrape
#[derive(Debug, Clone)]
pub struct CommandAutomationClient {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandAutomationClient {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    async fn run(&self, input: &[u8]) -> Result<std::process::Output, AutomationError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| AutomationError::Session(format!("Failed to start {}: {}", self.program, e)))?;

        // Feed stdin while collecting output, both under the one deadline
        let stdin = child.stdin.take();
        let write = async move {
            let Some(mut stdin) = stdin else {
                return Ok(());
            };
            match stdin.write_all(input).await {
                // The driver exited without reading all of it; its output decides
                Err(e) if e.kind() == ErrorKind::BrokenPipe => {
                    debug!("CommandAutomationClient::run: driver closed stdin early");
                    Ok(())
                }
                other => other,
            }
        };
        let exchange = async move { tokio::join!(write, child.wait_with_output()) };

        match tokio::time::timeout(self.timeout, exchange).await {
            Ok((Err(e), _)) => Err(AutomationError::Protocol(format!("Failed to write request: {}", e))),
            Ok((Ok(()), Ok(output))) => Ok(output),
            Ok((Ok(()), Err(e))) => Err(AutomationError::Scrape(format!("Failed to wait for {}: {}", self.program, e))),
            Err(_) => Err(AutomationError::Timeout(self.timeout)),
        }
    }
}

#[async_trait]
impl AutomationClient for CommandAutomationClient {
    async fn acquire(&self, settings: &AutomationSettings) -> Result<Session, AutomationError> {
        debug!(program = %self.program, "CommandAutomationClient::acquire: called");
        settings.validate().map_err(AutomationError::Session)?;
        let session = Session::open(settings);
        debug!(session_id = %session.id, headless = settings.headless, "CommandAutomationClient::acquire: opened");
        Ok(session)
    }

    async fn scrape(&self, session: &Session, request: &ScrapeRequest) -> Result<Vec<ExtractedProfile>, AutomationError> {
        debug!(task_id = %request.task_id, session_id = %session.id, "CommandAutomationClient::scrape: called");

        let delay = session.settings.pace_delay();
        if !delay.is_zero() {
            debug!(?delay, "CommandAutomationClient::scrape: pacing");
            tokio::time::sleep(delay).await;
        }

        let input = serde_json::to_vec(&CommandInput { session, request })?;
        let output = self.run(&input).await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(exit_code = ?output.status.code(), "Automation command failed");
            return Err(AutomationError::Scrape(format!(
                "exit code {}: {}",
                output.status.code().unwrap_or(-1),
                stderr.trim()
            )));
        }

        let parsed: CommandOutput = serde_json::from_slice(&output.stdout)?;
        if let Some(message) = parsed.error {
            return Err(AutomationError::Scrape(message));
        }

        info!(task_id = %request.task_id, profiles = parsed.profiles.len(), "Scrape finished");
        Ok(parsed.profiles)
    }

    async fn release(&self, session: Session) {
        debug!(session_id = %session.id, "CommandAutomationClient::release: called");
    }
}
