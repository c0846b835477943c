//! Test support utilities shared across unit and integration tests.
//!
//! [`ScriptedRunner`] fakes the local process layer beneath
//! [`crate::remote::SshEndpoint`]. [`FakeHost`] replaces the node as a whole:
//! it interprets the heredoc writes and `cat` reads produced by
//! [`crate::command`], keeps an in-memory file system, and records every call
//! as a typed [`HostCall`].

use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::ffi::OsString;
use std::rc::Rc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::command::{HEREDOC_DELIMITER, RemoteCommand};
use crate::remote::{CommandOutput, CommandRunner, RemoteEndpoint, RemoteError};
use crate::secret::{ClusterId, ClusterIdSource};
use crate::service::{ServiceAction, ServiceController};

/// Scripted command runner that returns pre-seeded outputs in FIFO order.
///
/// Used to drive deterministic command outcomes without spawning processes.
#[derive(Clone, Debug, Default)]
pub struct ScriptedRunner {
    responses: Rc<RefCell<VecDeque<CommandOutput>>>,
    invocations: Rc<RefCell<Vec<CommandInvocation>>>,
}

/// Records a single invocation made through [`ScriptedRunner`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandInvocation {
    /// Program name as passed to the runner.
    pub program: String,
    /// Arguments passed to the program.
    pub args: Vec<OsString>,
}

impl CommandInvocation {
    /// Returns a shell-like command string for assertions.
    #[must_use]
    pub fn command_string(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(self.program.clone());
        parts.extend(
            self.args
                .iter()
                .map(|arg| arg.to_string_lossy().into_owned()),
        );
        parts.join(" ")
    }
}

impl ScriptedRunner {
    /// Creates a new runner with no queued responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all invocations recorded so far.
    #[must_use]
    pub fn invocations(&self) -> Vec<CommandInvocation> {
        self.invocations.borrow().clone()
    }

    /// Pushes a successful exit status with empty output.
    pub fn push_success(&self) {
        self.push_output(Some(0), "", "");
    }

    /// Pushes a response with no exit code to simulate abnormal termination.
    pub fn push_missing_exit_code(&self) {
        self.push_output(None, "", "");
    }

    /// Pushes an explicit command output response.
    pub fn push_output(
        &self,
        code: Option<i32>,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
    ) {
        self.responses.borrow_mut().push_back(CommandOutput {
            code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        });
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, program: &str, args: &[OsString]) -> Result<CommandOutput, RemoteError> {
        self.invocations.borrow_mut().push(CommandInvocation {
            program: program.to_owned(),
            args: args.to_vec(),
        });
        self.responses
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| RemoteError::Spawn {
                program: program.to_owned(),
                message: String::from("no scripted response available"),
            })
    }
}

/// One call observed by [`FakeHost`], classified by intent.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum HostCall {
    /// Heredoc write of `content` to `path`.
    Write {
        /// Destination path, unescaped.
        path: String,
        /// Exact bytes the file would hold.
        content: String,
        /// Whether the write went through `sudo`.
        privileged: bool,
    },
    /// `cat` of `path`.
    Read {
        /// Path that was read, unescaped.
        path: String,
    },
    /// Pull secret replacement through the cluster API.
    ReplacePullSecret,
    /// Cluster version merge patch.
    PatchClusterId {
        /// Identifier carried by the patch.
        cluster_id: String,
    },
    /// Pod sandbox stop and removal.
    StopAndRemovePods,
    /// [`ServiceController::start`] call.
    StartService(String),
    /// [`ServiceController::stop`] call.
    StopService(String),
    /// Any other command string, verbatim.
    Other(String),
}

#[derive(Debug)]
struct FailureRule {
    fragment: String,
    remaining: Option<u32>,
}

#[derive(Debug, Default)]
struct HostState {
    files: BTreeMap<String, String>,
    calls: Vec<HostCall>,
    failures: Vec<FailureRule>,
}

impl HostState {
    fn should_fail(&mut self, command: &str) -> bool {
        let Some(rule) = self.failures.iter_mut().find(|rule| {
            command.contains(rule.fragment.as_str()) && rule.remaining.is_none_or(|left| left > 0)
        }) else {
            return false;
        };
        if let Some(left) = rule.remaining.as_mut() {
            *left -= 1;
        }
        true
    }
}

/// In-memory stand-in for a provisionable node.
///
/// Implements both [`RemoteEndpoint`] and [`ServiceController`], so a single
/// instance can back a [`crate::remote::RemoteHost`] by reference. Failed
/// calls are still recorded.
#[derive(Debug, Default)]
pub struct FakeHost {
    state: Mutex<HostState>,
}

impl FakeHost {
    /// Creates a host with an empty file system and no scripted failures.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every call recorded so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<HostCall> {
        self.lock().calls.clone()
    }

    /// Returns the current content of `path`, if it was written.
    #[must_use]
    pub fn file(&self, path: &str) -> Option<String> {
        self.lock().files.get(path).cloned()
    }

    /// Fails every command whose rendered text contains `fragment`.
    ///
    /// Service calls are matched against their `systemctl` rendering.
    pub fn fail_commands_containing(&self, fragment: &str) {
        self.lock().failures.push(FailureRule {
            fragment: fragment.to_owned(),
            remaining: None,
        });
    }

    /// Fails the next `times` commands containing `fragment`, then lets
    /// them succeed.
    pub fn fail_commands_containing_times(&self, fragment: &str, times: u32) {
        self.lock().failures.push(FailureRule {
            fragment: fragment.to_owned(),
            remaining: Some(times),
        });
    }

    fn lock(&self) -> MutexGuard<'_, HostState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn service(&self, action: ServiceAction, service: &str) -> Result<(), RemoteError> {
        let rendered = RemoteCommand::Systemctl { action, service }.render();
        let mut state = self.lock();
        state.calls.push(match action {
            ServiceAction::Start => HostCall::StartService(service.to_owned()),
            ServiceAction::Stop => HostCall::StopService(service.to_owned()),
        });
        if state.should_fail(&rendered) {
            return Err(simulated_failure());
        }
        Ok(())
    }
}

impl RemoteEndpoint for FakeHost {
    fn run(&self, command: &str) -> Result<String, RemoteError> {
        let call = classify(command);
        let mut state = self.lock();
        state.calls.push(call.clone());
        if state.should_fail(command) {
            return Err(simulated_failure());
        }

        match call {
            HostCall::Write { path, content, .. } => {
                state.files.insert(path, content);
                Ok(String::new())
            }
            HostCall::Read { path } => state.files.get(&path).cloned().ok_or_else(|| {
                RemoteError::failure(1, &format!("cat: {path}: No such file or directory"))
            }),
            _ => Ok(String::new()),
        }
    }
}

impl ServiceController for FakeHost {
    fn start(&self, service: &str) -> Result<(), RemoteError> {
        self.service(ServiceAction::Start, service)
    }

    fn stop(&self, service: &str) -> Result<(), RemoteError> {
        self.service(ServiceAction::Stop, service)
    }
}

fn simulated_failure() -> RemoteError {
    RemoteError::failure(1, "simulated failure")
}

fn classify(command: &str) -> HostCall {
    if let Some(write) = parse_write(command) {
        return write;
    }
    if let Some(path) = command.strip_prefix("cat ") {
        return HostCall::Read {
            path: unescape(path),
        };
    }
    if command.contains(" replace -f ") {
        return HostCall::ReplacePullSecret;
    }
    if command.contains("patch clusterversion") {
        let cluster_id = command
            .split_once("\"clusterID\":\"")
            .and_then(|(_, rest)| rest.split_once('"'))
            .map_or_else(String::new, |(id, _)| id.to_owned());
        return HostCall::PatchClusterId { cluster_id };
    }
    if command.contains("crictl") {
        return HostCall::StopAndRemovePods;
    }
    HostCall::Other(command.to_owned())
}

fn parse_write(command: &str) -> Option<HostCall> {
    let header = format!("cat <<'{HEREDOC_DELIMITER}' | head -c -1 | ");
    let trailer = format!("\n{HEREDOC_DELIMITER}");
    let (pipeline, body) = command.strip_prefix(header.as_str())?.split_once('\n')?;
    let (privileged, tee) = pipeline
        .strip_prefix("sudo ")
        .map_or((false, pipeline), |rest| (true, rest));
    let path = tee.strip_prefix("tee ")?.strip_suffix(" >/dev/null")?;
    let content = body.strip_suffix(trailer.as_str())?;
    Some(HostCall::Write {
        path: unescape(path),
        content: content.to_owned(),
        privileged,
    })
}

fn unescape(word: &str) -> String {
    word.strip_prefix('\'')
        .and_then(|inner| inner.strip_suffix('\''))
        .map_or_else(|| word.to_owned(), |inner| inner.replace("'\\''", "'"))
}

/// Deterministic [`ClusterIdSource`] yielding `cluster-id-1`, `cluster-id-2`,
/// and so on.
#[derive(Debug, Default)]
pub struct SequentialClusterIds {
    issued: AtomicU32,
}

impl SequentialClusterIds {
    /// Creates a source whose first identifier is `cluster-id-1`.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            issued: AtomicU32::new(0),
        }
    }

    /// Number of identifiers handed out so far.
    #[must_use]
    pub fn issued(&self) -> u32 {
        self.issued.load(Ordering::SeqCst)
    }
}

impl ClusterIdSource for SequentialClusterIds {
    fn next_id(&self) -> ClusterId {
        let next = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        ClusterId::new(format!("cluster-id-{next}"))
    }
}
