//! Test-only helpers: a scripted jail backend that records calls
//! instead of touching the system.

use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::io::backend::JailBackend;

/// One recorded backend invocation, in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    CreateInstance {
        flavour: String,
        instance: String,
        network: String,
    },
    Start(String),
    Stop(String),
    Exec {
        instance: String,
        command: String,
        env: BTreeMap<String, String>,
    },
    BindMount {
        source: PathBuf,
        dest: PathBuf,
    },
    Unmount {
        dest: PathBuf,
    },
}

/// Backend double with queued statuses for command-shaped calls.
///
/// Each `exec`/`bind_mount`/`unmount` pops the next queued status;
/// an empty queue yields success. Lifecycle calls always succeed.
pub struct ScriptedBackend {
    statuses: RefCell<VecDeque<i32>>,
    calls: RefCell<Vec<BackendCall>>,
    exec_unavailable: RefCell<bool>,
}

impl Default for ScriptedBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::with_statuses(Vec::new())
    }

    pub fn with_statuses(statuses: Vec<i32>) -> Self {
        Self {
            statuses: RefCell::new(statuses.into()),
            calls: RefCell::new(Vec::new()),
            exec_unavailable: RefCell::new(false),
        }
    }

    /// Make subsequent `exec` calls fail as backend-unavailable.
    pub fn fail_exec_with_backend_error(&self) {
        *self.exec_unavailable.borrow_mut() = true;
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.borrow().clone()
    }

    /// Just the command texts of recorded exec calls, in order.
    pub fn exec_commands(&self) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|call| match call {
                BackendCall::Exec { command, .. } => Some(command.clone()),
                _ => None,
            })
            .collect()
    }

    fn next_status(&self) -> i32 {
        self.statuses.borrow_mut().pop_front().unwrap_or(0)
    }

    fn record(&self, call: BackendCall) {
        self.calls.borrow_mut().push(call);
    }
}

impl JailBackend for ScriptedBackend {
    fn create_instance(&self, flavour: &str, instance: &str, network: &str) -> Result<()> {
        self.record(BackendCall::CreateInstance {
            flavour: flavour.to_string(),
            instance: instance.to_string(),
            network: network.to_string(),
        });
        Ok(())
    }

    fn start(&self, instance: &str) -> Result<()> {
        self.record(BackendCall::Start(instance.to_string()));
        Ok(())
    }

    fn stop(&self, instance: &str) -> Result<()> {
        self.record(BackendCall::Stop(instance.to_string()));
        Ok(())
    }

    fn exec(&self, instance: &str, command: &str, env: &BTreeMap<String, String>) -> Result<i32> {
        if *self.exec_unavailable.borrow() {
            return Err(Error::Backend("scripted backend unreachable".to_string()));
        }
        self.record(BackendCall::Exec {
            instance: instance.to_string(),
            command: command.to_string(),
            env: env.clone(),
        });
        Ok(self.next_status())
    }

    fn bind_mount(&self, source: &Path, dest: &Path) -> Result<i32> {
        self.record(BackendCall::BindMount {
            source: source.to_path_buf(),
            dest: dest.to_path_buf(),
        });
        Ok(self.next_status())
    }

    fn unmount(&self, dest: &Path) -> Result<i32> {
        self.record(BackendCall::Unmount {
            dest: dest.to_path_buf(),
        });
        Ok(self.next_status())
    }
}
