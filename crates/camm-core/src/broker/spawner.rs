//! Launching of workflow-engine processes.
//!
//! The listener never blocks on a launched process. Every launch hands back a
//! [`LaunchHandle`] whose exit status can be awaited by whoever cares.

use super::error::BrokerError;
use std::fmt;
use std::io;
use std::path::PathBuf;
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl CommandLine {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// A launched process. The exit code is `None` when the process was killed by a signal.
#[derive(Debug)]
pub struct LaunchHandle {
    pub pid: Option<u32>,
    pub command: CommandLine,
    exit: JoinHandle<io::Result<Option<i32>>>,
}

impl LaunchHandle {
    pub fn new(pid: Option<u32>, command: CommandLine, exit: JoinHandle<io::Result<Option<i32>>>) -> Self {
        Self { pid, command, exit }
    }

    pub async fn wait(self) -> io::Result<Option<i32>> {
        self.exit.await.map_err(io::Error::other)?
    }
}

pub trait ProcessSpawner: Send + Sync {
    /// Starts `command` without waiting for it to finish.
    fn spawn(&self, command: &CommandLine) -> Result<LaunchHandle, BrokerError>;
}

/// Spawns real child processes and supervises their exit in a background task.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSpawner;

impl ProcessSpawner for TokioSpawner {
    fn spawn(&self, command: &CommandLine) -> Result<LaunchHandle, BrokerError> {
        let mut child = Command::new(&command.program)
            .args(&command.args)
            .spawn()
            .map_err(|source| BrokerError::Spawn {
                program: command.program.display().to_string(),
                source,
            })?;
        let pid = child.id();
        debug!("Launched '{}' (pid {:?})", command, pid);

        let described = command.to_string();
        let exit = tokio::spawn(async move {
            match child.wait().await {
                Ok(status) => {
                    if !status.success() {
                        warn!("'{}' exited with {}", described, status);
                    }
                    Ok(status.code())
                }
                Err(e) => {
                    error!("Lost track of '{}': {}", described, e);
                    Err(e)
                }
            }
        });
        Ok(LaunchHandle::new(pid, command.clone(), exit))
    }
}

#[cfg(any(test, feature = "test-util"))]
pub mod mock {
    //! A spawner that records command lines instead of running them.

    use super::*;
    use std::sync::{Arc, Mutex, PoisonError};

    #[derive(Debug, Clone)]
    pub enum MockBehavior {
        /// The launch succeeds and the "process" exits with this code.
        Succeed { exit_code: i32 },
        /// The launch itself fails, as if the executable were missing.
        Fail { error: String },
    }

    #[derive(Debug, Clone)]
    pub struct MockSpawner {
        behavior: Arc<Mutex<MockBehavior>>,
        spawned: Arc<Mutex<Vec<CommandLine>>>,
    }

    impl MockSpawner {
        pub fn new(behavior: MockBehavior) -> Self {
            Self {
                behavior: Arc::new(Mutex::new(behavior)),
                spawned: Arc::new(Mutex::new(Vec::new())),
            }
        }

        /// Every command line passed to `spawn`, failed launches included.
        pub fn spawned(&self) -> Vec<CommandLine> {
            self.spawned.lock().unwrap_or_else(PoisonError::into_inner).clone()
        }

        pub fn set_behavior(&self, behavior: MockBehavior) {
            *self.behavior.lock().unwrap_or_else(PoisonError::into_inner) = behavior;
        }
    }

    impl ProcessSpawner for MockSpawner {
        fn spawn(&self, command: &CommandLine) -> Result<LaunchHandle, BrokerError> {
            self.spawned
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(command.clone());
            let behavior = self.behavior.lock().unwrap_or_else(PoisonError::into_inner).clone();
            match behavior {
                MockBehavior::Succeed { exit_code } => {
                    let exit = tokio::spawn(async move { Ok(Some(exit_code)) });
                    Ok(LaunchHandle::new(None, command.clone(), exit))
                }
                MockBehavior::Fail { error } => Err(BrokerError::Spawn {
                    program: command.program.display().to_string(),
                    source: io::Error::new(io::ErrorKind::NotFound, error),
                }),
            }
        }
    }
}
