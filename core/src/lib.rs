//! The kestrel kernel core: process, task and signal management on top of the
//! [`kestrel_process`] hierarchy and [`kestrel_signal`] bookkeeping.
//!
//! Everything hangs off one [`Kernel`] object holding the locked process table
//! and the collaborators (memory, scheduler, terminal, file system) it drives.
#![cfg_attr(not(test), no_std)]

extern crate alloc;
#[macro_use]
extern crate log;

pub mod collab;
pub mod config;
pub mod cred;
pub mod exit;
pub mod jobctl;
pub mod kernel;
pub mod process;
pub mod signal;
pub mod task;
pub mod trapframe;
pub mod wait;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use collab::Collaborators;
pub use config::KernelConfig;
pub use kernel::{Kernel, Table};
pub use process::{Credentials, JobEvent, ProcessData, TaskState, ThreadData};
pub use trapframe::TrapFrame;
