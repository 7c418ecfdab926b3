use crate::imp::task::sys_execve_impl;
use crate::ptr::UserConstPtr;
use axerrno::LinuxResult;
use core::ffi::c_char;
use kestrel_core::{Kernel, TrapFrame};
use syscall_trace::syscall_trace;

#[syscall_trace]
pub fn sys_execve(
    kernel: &Kernel,
    tf: &mut TrapFrame,
    path: UserConstPtr<c_char>,
    argv: UserConstPtr<u32>,
    envp: UserConstPtr<u32>,
) -> LinuxResult<isize> {
    let path = path.read_str(kernel)?;
    let args = argv.read_str_array(kernel)?;
    let envs = envp.read_str_array(kernel)?;
    sys_execve_impl(kernel, tf, path, args, envs)
}
