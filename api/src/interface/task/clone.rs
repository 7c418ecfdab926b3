//! sys_fork:
//! The child is a copy of the caller: same registers (with `eax` 0), same
//! blocked mask, a copy of the dispositions, nothing pending.
use crate::imp::task::sys_fork_impl;
use axerrno::LinuxResult;
use kestrel_core::{Kernel, TrapFrame};
use syscall_trace::syscall_trace;

#[syscall_trace]
pub fn sys_fork(kernel: &Kernel, tf: &TrapFrame) -> LinuxResult<isize> {
    sys_fork_impl(kernel, tf)
}
