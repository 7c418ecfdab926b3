use crate::trapframe::TrapFrame;
use alloc::string::String;
use alloc::vec::Vec;
use kestrel_signal::{ProcessSignals, Signo, ThreadSignals};
use memory_addr::VirtAddr;

/// Real, effective and saved user ids.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Credentials {
    pub uid: u32,
    pub euid: u32,
    pub suid: u32,
}

impl Credentials {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn user(uid: u32) -> Self {
        Self {
            uid,
            euid: uid,
            suid: uid,
        }
    }

    pub fn is_root(&self) -> bool {
        self.euid == 0
    }
}

/// A stop or continue of a process its parent has not collected yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobEvent {
    Stopped(Signo),
    Continued,
}

impl JobEvent {
    /// Packed status in the layout `waitpid` reports.
    pub fn wait_status(self) -> i32 {
        match self {
            JobEvent::Stopped(signo) => ((signo.raw() as i32) << 8) | 0x7f,
            JobEvent::Continued => 0xffff,
        }
    }
}

pub struct ProcessData {
    /// Pending signals and the disposition table
    pub signal: ProcessSignals,
    pub cred: Credentials,
    /// Stopped by a stop-class signal and not continued since.
    pub stopped: bool,
    /// Unreported stop/continue, for `WUNTRACED` and `WCONTINUED`.
    pub job_event: Option<JobEvent>,
    /// The command line arguments
    pub command_line: Vec<String>,
}

impl ProcessData {
    pub fn new(cred: Credentials, command_line: Vec<String>) -> Self {
        Self {
            signal: ProcessSignals::new(),
            cred,
            stopped: false,
            job_event: None,
            command_line,
        }
    }

    /// Data of a forked child. Pending signals and job state are not inherited.
    pub fn fork(&self) -> Self {
        Self {
            signal: self.signal.inherit(),
            cred: self.cred,
            stopped: false,
            job_event: None,
            command_line: self.command_line.clone(),
        }
    }
}

/// Scheduling state of a task as last requested from the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Ready,
    Running,
    Blocked,
    Stopped,
    Exited,
}

pub struct ThreadData {
    pub signal: ThreadSignals,
    /// Register state to resume the task with.
    pub context: TrapFrame,
    pub state: TaskState,
    pub priority: u8,
    pub kernel_stack: VirtAddr,
    /// Top of the user stack mapped for this task by `create_task`. Tasks
    /// running on a stack of the image or of their parent have none.
    pub user_stack: Option<VirtAddr>,
}

impl ThreadData {
    pub fn new(signal: ThreadSignals, context: TrapFrame, priority: u8, kernel_stack: VirtAddr) -> Self {
        Self {
            signal,
            context,
            state: TaskState::Ready,
            priority,
            kernel_stack,
            user_stack: None,
        }
    }
}
