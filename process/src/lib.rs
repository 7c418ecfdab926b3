//! POSIX-like multitasking and process management.
//! Includes a strict two-level hierarchy of processes (session and process group).
//! See https://man7.org/linux/man-pages/man7/credentials.7.html for more details.
//! Session contain ProcessGroup, ProcessGroup contain Process, Process contain Thread.
//! Process has child processes.
//!
//! Every entity lives in one id-indexed [`ProcessTable`] and refers to the others
//! by id only, so the table as a whole is the single thing that gets locked.
#![cfg_attr(not(test), no_std)]

extern crate alloc;
#[macro_use]
extern crate log;

pub mod process;
pub mod process_group;
pub mod session;
pub mod table;
pub mod thread;

pub use process::{ExitStatus, Process};
pub use process_group::ProcessGroup;
pub use session::{Detached, Session};
pub use table::ProcessTable;
pub use thread::Thread;

/// Type alias for session ID, process group ID and process ID.
pub type Pid = u32;
/// Task (thread) ID. Task ids are drawn from their own counter.
pub type Tid = u32;
/// Identifier of a terminal device, as handed out by the terminal driver.
pub type TerminalId = u32;

/// The kernel idle process. Owns the bootstrap and idle tasks.
pub const IDLE_PID: Pid = 0;
/// The init process, reaper of orphans.
pub const INIT_PID: Pid = 1;
/// Bootstrap task of the idle process.
pub const BOOT_TID: Tid = 0;
/// Idle task of the idle process.
pub const IDLE_TID: Tid = 1;
