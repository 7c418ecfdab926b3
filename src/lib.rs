//! kestrel: the process, task and signal core of a 32-bit x86 kernel.
//!
//! This crate ties the pieces together for the trap entry code: it decodes
//! i386 system calls into the [`kestrel_api`] functions and runs signal
//! delivery on every return to user mode.
#![cfg_attr(not(test), no_std)]

#[macro_use]
extern crate log;

mod syscall;
mod trap;

pub use kestrel_core::{Kernel, KernelConfig, TrapFrame};
pub use syscall::handle_syscall;
pub use trap::{SYSCALL_VECTOR, handle_user_trap};
