use crate::imp::task::sys_exit_impl;
use axerrno::LinuxResult;
use core::ffi::c_int;
use kestrel_core::Kernel;
use syscall_trace::syscall_trace;

#[syscall_trace]
pub fn sys_exit(kernel: &Kernel, status: c_int) -> LinuxResult<isize> {
    sys_exit_impl(kernel, status, false)
}

#[syscall_trace]
pub fn sys_exit_group(kernel: &Kernel, status: c_int) -> LinuxResult<isize> {
    sys_exit_impl(kernel, status, true)
}
