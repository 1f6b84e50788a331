//! Debugger - Target process control
//!
//! Just enough process control to inspect a stopped target: attach (which
//! stops it), resume, pause again, detach. Every transition into the stopped
//! state is an update tick for the watch session.
//! Windows uses the Debug API (windows-rs), Linux uses ptrace (nix).

use thiserror::Error;

/// Debugger-specific errors
#[derive(Error, Debug)]
pub enum DebugError {
    #[error("Failed to attach to process {pid}: {reason}")]
    AttachFailed { pid: u32, reason: String },

    #[error("Failed to detach from process {pid}: {reason}")]
    DetachFailed { pid: u32, reason: String },

    #[error("Failed to {action} process {pid}: {reason}")]
    ControlFailed {
        pid: u32,
        action: &'static str,
        reason: String,
    },

    #[error("No process attached")]
    NotAttached,

    #[error("{0} is not supported on this platform")]
    Unsupported(&'static str),
}

/// Run state of the attached target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TargetState {
    #[default]
    Detached,
    Stopped,
    Running,
}

/// Attached target process
pub struct Debugger {
    /// Target process ID
    target_pid: Option<u32>,

    state: TargetState,
}

impl Debugger {
    /// Create a new debugger instance
    pub fn new() -> Self {
        Self {
            target_pid: None,
            state: TargetState::Detached,
        }
    }

    /// Attach to an existing process by PID; the target ends up stopped
    pub fn attach(&mut self, pid: u32) -> Result<(), DebugError> {
        log::info!("Attaching to process {}", pid);
        platform::attach(pid)?;

        self.target_pid = Some(pid);
        self.state = TargetState::Stopped;
        log::info!("Successfully attached to process {}", pid);
        Ok(())
    }

    /// Detach from the current process, letting it run freely
    pub fn detach(&mut self) -> Result<(), DebugError> {
        let pid = self.target_pid.ok_or(DebugError::NotAttached)?;
        log::info!("Detaching from process {}", pid);
        platform::detach(pid, self.state)?;

        self.target_pid = None;
        self.state = TargetState::Detached;
        Ok(())
    }

    /// Let a stopped target run
    pub fn resume(&mut self) -> Result<(), DebugError> {
        let pid = self.target_pid.ok_or(DebugError::NotAttached)?;
        if self.state == TargetState::Running {
            return Ok(());
        }
        platform::resume(pid)?;
        self.state = TargetState::Running;
        Ok(())
    }

    /// Stop a running target
    pub fn pause(&mut self) -> Result<(), DebugError> {
        let pid = self.target_pid.ok_or(DebugError::NotAttached)?;
        if self.state == TargetState::Stopped {
            return Ok(());
        }
        platform::pause(pid)?;
        self.state = TargetState::Stopped;
        Ok(())
    }

    /// Get current target PID
    pub fn target_pid(&self) -> Option<u32> {
        self.target_pid
    }

    pub fn state(&self) -> TargetState {
        self.state
    }
}

// Windows-specific implementations
#[cfg(target_os = "windows")]
mod platform {
    use super::{DebugError, TargetState};
    use windows::Win32::System::Diagnostics::Debug::{DebugActiveProcess, DebugActiveProcessStop};

    pub fn attach(pid: u32) -> Result<(), DebugError> {
        unsafe {
            DebugActiveProcess(pid).map_err(|e| DebugError::AttachFailed {
                pid,
                reason: e.to_string(),
            })
        }
    }

    pub fn detach(pid: u32, _state: TargetState) -> Result<(), DebugError> {
        unsafe {
            DebugActiveProcessStop(pid).map_err(|e| DebugError::DetachFailed {
                pid,
                reason: e.to_string(),
            })
        }
    }

    pub fn resume(_pid: u32) -> Result<(), DebugError> {
        Err(DebugError::Unsupported("resume"))
    }

    pub fn pause(_pid: u32) -> Result<(), DebugError> {
        Err(DebugError::Unsupported("pause"))
    }
}

// Linux-specific implementations
#[cfg(target_os = "linux")]
mod platform {
    use super::{DebugError, TargetState};
    use nix::sys::ptrace;
    use nix::sys::signal::{kill, Signal};
    use nix::sys::wait::waitpid;
    use nix::unistd::Pid;

    pub fn attach(pid: u32) -> Result<(), DebugError> {
        let target = Pid::from_raw(pid as i32);
        let to_error = |e: nix::Error| DebugError::AttachFailed {
            pid,
            reason: e.to_string(),
        };
        ptrace::attach(target).map_err(to_error)?;
        waitpid(target, None).map_err(to_error)?;
        Ok(())
    }

    pub fn detach(pid: u32, state: TargetState) -> Result<(), DebugError> {
        // ptrace requests need a stopped tracee
        if state == TargetState::Running {
            pause(pid)?;
        }

        ptrace::detach(Pid::from_raw(pid as i32), None).map_err(|e| DebugError::DetachFailed {
            pid,
            reason: e.to_string(),
        })
    }

    pub fn resume(pid: u32) -> Result<(), DebugError> {
        ptrace::cont(Pid::from_raw(pid as i32), None).map_err(|e| DebugError::ControlFailed {
            pid,
            action: "resume",
            reason: e.to_string(),
        })
    }

    pub fn pause(pid: u32) -> Result<(), DebugError> {
        let target = Pid::from_raw(pid as i32);
        let to_error = |e: nix::Error| DebugError::ControlFailed {
            pid,
            action: "pause",
            reason: e.to_string(),
        };
        kill(target, Signal::SIGSTOP).map_err(to_error)?;
        waitpid(target, None).map_err(to_error)?;
        Ok(())
    }
}

#[cfg(not(any(target_os = "windows", target_os = "linux")))]
mod platform {
    use super::{DebugError, TargetState};

    pub fn attach(_pid: u32) -> Result<(), DebugError> {
        Err(DebugError::Unsupported("attach"))
    }

    pub fn detach(_pid: u32, _state: TargetState) -> Result<(), DebugError> {
        Err(DebugError::Unsupported("detach"))
    }

    pub fn resume(_pid: u32) -> Result<(), DebugError> {
        Err(DebugError::Unsupported("resume"))
    }

    pub fn pause(_pid: u32) -> Result<(), DebugError> {
        Err(DebugError::Unsupported("pause"))
    }
}

impl Default for Debugger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_requires_attach() {
        let mut dbg = Debugger::new();
        assert_eq!(dbg.state(), TargetState::Detached);
        assert!(matches!(dbg.detach(), Err(DebugError::NotAttached)));
        assert!(matches!(dbg.resume(), Err(DebugError::NotAttached)));
        assert!(matches!(dbg.pause(), Err(DebugError::NotAttached)));
        assert_eq!(dbg.target_pid(), None);
    }
}
