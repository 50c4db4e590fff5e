//! Host-control actions: kill a process, shut down, restart, log off.
//!
//! Power actions go through a small table keyed by [`HostOs`]. Each call
//! issues one external command and returns without waiting for it; calls
//! are neither serialized nor deduplicated here.

use crate::provider::{ProviderError, TelemetryProvider};
use crate::types::ActionResult;
use std::io;
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostOs {
    Windows,
    Linux,
    MacOs,
    Other,
}

impl HostOs {
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            HostOs::Windows
        } else if cfg!(target_os = "linux") {
            HostOs::Linux
        } else if cfg!(target_os = "macos") {
            HostOs::MacOs
        } else {
            HostOs::Other
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerAction {
    Shutdown,
    Restart,
    Logoff,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    /// Kills every process of the current user, this server included.
    pub destructive: bool,
}

impl CommandSpec {
    fn new(program: &str, args: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            destructive: false,
        }
    }

    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Native command for `action` on `os`. `user` is only used by the
/// non-Windows logoff, which has no session manager to ask.
pub fn power_command(os: HostOs, action: PowerAction, user: &str) -> CommandSpec {
    match (os, action) {
        (HostOs::Windows, PowerAction::Shutdown) => CommandSpec::new("shutdown", &["/s", "/t", "1"]),
        (HostOs::Windows, PowerAction::Restart) => CommandSpec::new("shutdown", &["/r", "/t", "1"]),
        (HostOs::Windows, PowerAction::Logoff) => CommandSpec::new("shutdown", &["/l"]),
        (_, PowerAction::Shutdown) => CommandSpec::new("shutdown", &["-h", "now"]),
        (_, PowerAction::Restart) => CommandSpec::new("shutdown", &["-r", "now"]),
        (_, PowerAction::Logoff) => CommandSpec {
            destructive: true,
            ..CommandSpec::new("pkill", &["-KILL", "-u", user])
        },
    }
}

/// Launches a command without waiting for it.
pub trait CommandRunner: Send + Sync {
    fn spawn(&self, cmd: &CommandSpec) -> io::Result<()>;
}

pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn spawn(&self, cmd: &CommandSpec) -> io::Result<()> {
        let mut child = Command::new(&cmd.program)
            .args(&cmd.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        // Reap in the background so the caller never waits on the host.
        std::thread::spawn(move || {
            let _ = child.wait();
        });
        Ok(())
    }
}

/// Records commands instead of running them.
#[derive(Default)]
pub struct RecordingRunner {
    issued: Mutex<Vec<CommandSpec>>,
    fail_with: Option<io::ErrorKind>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every spawn fails with `kind`, as if the program were missing.
    pub fn failing(kind: io::ErrorKind) -> Self {
        Self {
            issued: Mutex::new(Vec::new()),
            fail_with: Some(kind),
        }
    }

    pub fn issued(&self) -> Vec<CommandSpec> {
        self.issued.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

impl CommandRunner for RecordingRunner {
    fn spawn(&self, cmd: &CommandSpec) -> io::Result<()> {
        if let Some(kind) = self.fail_with {
            return Err(io::Error::new(kind, format!("{}: not found", cmd.program)));
        }
        if let Ok(mut v) = self.issued.lock() {
            v.push(cmd.clone());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionPolicy {
    /// Master switch for every host action.
    pub enabled: bool,
    /// Opt-in for the logoff that kills all of the user's processes.
    pub allow_user_kill: bool,
}

impl Default for ActionPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            allow_user_kill: false,
        }
    }
}

pub struct HostActionDispatcher {
    provider: Arc<dyn TelemetryProvider>,
    runner: Arc<dyn CommandRunner>,
    os: HostOs,
    policy: ActionPolicy,
    user: Option<String>,
}

fn current_user() -> Option<String> {
    ["USER", "USERNAME", "LOGNAME"]
        .iter()
        .find_map(|k| std::env::var(k).ok().filter(|v| !v.is_empty()))
}

impl HostActionDispatcher {
    pub fn new(
        provider: Arc<dyn TelemetryProvider>,
        runner: Arc<dyn CommandRunner>,
        policy: ActionPolicy,
    ) -> Self {
        Self {
            provider,
            runner,
            os: HostOs::current(),
            policy,
            user: current_user(),
        }
    }

    pub fn with_os(mut self, os: HostOs) -> Self {
        self.os = os;
        self
    }

    pub fn with_user(mut self, user: Option<String>) -> Self {
        self.user = user;
        self
    }

    fn disabled() -> ActionResult {
        ActionResult::failed(403, "Host actions are disabled")
    }

    pub fn kill_process(&self, pid: u32) -> ActionResult {
        if !self.policy.enabled {
            return Self::disabled();
        }
        match self.provider.kill_process(pid) {
            Ok(()) => {
                info!(pid, "process killed");
                ActionResult::ok_with(format!("Process {pid} killed"))
            }
            Err(ProviderError::NotFound) => ActionResult::failed(404, "Process not found"),
            Err(ProviderError::AccessDenied) => ActionResult::failed(403, "Access denied"),
            Err(ProviderError::Unavailable(msg)) => {
                warn!(pid, "kill failed: {msg}");
                ActionResult::failed(500, msg)
            }
        }
    }

    pub fn shutdown(&self) -> ActionResult {
        self.power(PowerAction::Shutdown)
    }

    pub fn restart(&self) -> ActionResult {
        self.power(PowerAction::Restart)
    }

    pub fn logoff(&self) -> ActionResult {
        self.power(PowerAction::Logoff)
    }

    fn power(&self, action: PowerAction) -> ActionResult {
        if !self.policy.enabled {
            return Self::disabled();
        }
        let needs_user = self.os != HostOs::Windows && action == PowerAction::Logoff;
        let user = match (&self.user, needs_user) {
            (Some(u), _) => u.as_str(),
            (None, false) => "",
            (None, true) => {
                return ActionResult::failed(500, "Cannot determine the current user");
            }
        };

        let cmd = power_command(self.os, action, user);
        if cmd.destructive && !self.policy.allow_user_kill {
            return ActionResult::failed(
                403,
                "Logoff here kills every process of the current user, including this server; \
                 start with --allow-user-kill or SYSDASH_ALLOW_USER_KILL=1 to permit it",
            );
        }

        warn!(?action, command = %cmd.command_line(), "issuing host action");
        match self.runner.spawn(&cmd) {
            Ok(()) => ActionResult::ok(),
            Err(e) => {
                warn!(?action, "failed to issue {}: {e}", cmd.program);
                ActionResult::failed(500, e.to_string())
            }
        }
    }
}
