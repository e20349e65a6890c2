//! The configuration "set" boundary.
//!
//! The orchestrator hands update and delete paths to a [`ConfigSubmitter`]
//! and gets back a status code and message. Everything about reaching the
//! device lives behind this trait.

use async_trait::async_trait;
use tracing::debug;

use crate::error::DashPerfResult;
use crate::shell;

/// Outcome of one set call. Code 0 is success; any other code is a failure
/// described by `message`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitStatus {
    pub code: i32,
    pub message: String,
}

impl SubmitStatus {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            code: 0,
            message: message.into(),
        }
    }

    pub fn failed(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == 0
    }
}

/// Applies configuration to the device under test.
#[async_trait]
pub trait ConfigSubmitter: Send + Sync {
    /// Applies `update_paths` then `delete_paths` in a single set request.
    ///
    /// A non-zero [`SubmitStatus::code`] reports a rejected request; `Err`
    /// is reserved for failing to reach the collaborator at all.
    async fn submit(
        &self,
        update_paths: &[String],
        delete_paths: &[String],
    ) -> DashPerfResult<SubmitStatus>;
}

/// Submits through an external gNMI set command line tool.
///
/// Each update path is passed as `<update_flag> <path>` and each delete
/// path as `<delete_flag> <path>`, after the fixed `args`. The tool's exit
/// code becomes the status code and its output the message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GnmiCliSubmitter {
    program: String,
    args: Vec<String>,
    update_flag: String,
    delete_flag: String,
}

impl GnmiCliSubmitter {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            update_flag: "--update".to_string(),
            delete_flag: "--delete".to_string(),
        }
    }

    /// Appends fixed arguments (target address, credentials, ...).
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn with_update_flag(mut self, flag: impl Into<String>) -> Self {
        self.update_flag = flag.into();
        self
    }

    pub fn with_delete_flag(mut self, flag: impl Into<String>) -> Self {
        self.delete_flag = flag.into();
        self
    }

    /// Builds the command line for one request.
    pub fn command_line(&self, update_paths: &[String], delete_paths: &[String]) -> String {
        let mut argv: Vec<&str> = self.args.iter().map(String::as_str).collect();
        for path in update_paths {
            argv.push(&self.update_flag);
            argv.push(path);
        }
        for path in delete_paths {
            argv.push(&self.delete_flag);
            argv.push(path);
        }
        shell::command_line(&self.program, argv)
    }
}

#[async_trait]
impl ConfigSubmitter for GnmiCliSubmitter {
    async fn submit(
        &self,
        update_paths: &[String],
        delete_paths: &[String],
    ) -> DashPerfResult<SubmitStatus> {
        let cmd = self.command_line(update_paths, delete_paths);
        debug!(
            updates = update_paths.len(),
            deletes = delete_paths.len(),
            "Issuing gNMI set"
        );
        let result = shell::exec(&cmd).await?;
        Ok(SubmitStatus {
            code: result.exit_code,
            message: result.combined_output(),
        })
    }
}
