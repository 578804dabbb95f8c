// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plugin process supervisor.
//!
//! Spawns each registered `fluxion-<name>` command with piped
//! stdin/stdout (the IPC pipe) and inherited stderr, and restarts it per
//! policy. Before every spawn the entry's prepare hook installs the
//! fresh pipe endpoints into the owning engine instance.

use fluxion_wire::Pipe;
use parking_lot::Mutex;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// What to do when a plugin process exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RestartPolicy {
    /// Restart on any exit, clean or not.
    Always,
    /// Restart only on non-zero exit or spawn failure.
    #[default]
    OnError,
    Never,
}

/// Installs new pipe endpoints into the engine instance on each spawn.
pub(crate) type PrepareFn = Arc<dyn Fn(Pipe) + Send + Sync>;
/// Crash reporting callback.
pub(crate) type CrashFn = Arc<dyn Fn(String) + Send + Sync>;

pub(crate) struct ProcessEntry {
    pub name: String,
    pub command: String,
    pub prepare: PrepareFn,
    pub on_crash: CrashFn,
}

/// Supervises every external plugin process of an engine.
pub(crate) struct Supervisor {
    policy: RestartPolicy,
    restart_delay: Duration,
    entries: Mutex<Vec<ProcessEntry>>,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Supervisor {
    pub fn new(policy: RestartPolicy, restart_delay: Duration) -> Self {
        Self {
            policy,
            restart_delay,
            entries: Mutex::new(Vec::new()),
            cancel: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Register a process. Must be called before [`Supervisor::start`].
    pub fn add(&self, entry: ProcessEntry) {
        self.entries.lock().push(entry);
    }

    /// Spawn one supervision task per registered process.
    pub fn start(&self) {
        let entries: Vec<ProcessEntry> = self.entries.lock().drain(..).collect();
        let mut tasks = self.tasks.lock();
        for entry in entries {
            tasks.push(tokio::spawn(supervise(
                entry,
                self.policy,
                self.restart_delay,
                self.cancel.clone(),
            )));
        }
    }

    /// Kill remaining children and wait for supervision tasks to finish.
    pub async fn stop(&self) {
        self.cancel.cancel();
        let tasks: Vec<JoinHandle<()>> = self.tasks.lock().drain(..).collect();
        for task in tasks {
            if task.await.is_err() {
                warn!("supervision task panicked");
            }
        }
    }
}

async fn supervise(
    entry: ProcessEntry,
    policy: RestartPolicy,
    restart_delay: Duration,
    cancel: CancellationToken,
) {
    loop {
        match spawn_child(&entry) {
            Ok(mut child) => {
                info!(plugin = %entry.name, command = %entry.command, "plugin process started");
                tokio::select! {
                    status = child.wait() => match status {
                        Ok(status) if status.success() => {
                            info!(plugin = %entry.name, "plugin process exited cleanly");
                            if policy != RestartPolicy::Always {
                                return;
                            }
                        }
                        Ok(status) => {
                            (entry.on_crash)(format!("exited with {status}"));
                            if policy == RestartPolicy::Never {
                                return;
                            }
                        }
                        Err(err) => {
                            (entry.on_crash)(format!("wait failed: {err}"));
                            if policy == RestartPolicy::Never {
                                return;
                            }
                        }
                    },
                    _ = cancel.cancelled() => {
                        if let Err(err) = child.kill().await {
                            warn!(plugin = %entry.name, error = %err, "kill failed");
                        }
                        debug!(plugin = %entry.name, "plugin process killed");
                        return;
                    }
                }
            }
            Err(err) => {
                (entry.on_crash)(format!("spawn failed: {err}"));
                if policy == RestartPolicy::Never {
                    return;
                }
            }
        }

        tokio::select! {
            _ = sleep(restart_delay) => {}
            _ = cancel.cancelled() => return,
        }
    }
}

fn spawn_child(entry: &ProcessEntry) -> std::io::Result<tokio::process::Child> {
    let mut child = Command::new(&entry.command)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .kill_on_drop(true)
        .spawn()?;

    // stdout carries plugin → engine traffic, stdin the reverse.
    match (child.stdout.take(), child.stdin.take()) {
        (Some(stdout), Some(stdin)) => {
            (entry.prepare)(Pipe::from_stream(stdout, stdin));
            Ok(child)
        }
        _ => Err(std::io::Error::other("child spawned without piped stdio")),
    }
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
