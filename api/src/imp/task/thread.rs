use axerrno::{LinuxError, LinuxResult};
use kestrel_core::Kernel;
use kestrel_process::Pid;
use syscall_trace::syscall_trace;

/// Ids at the syscall boundary are signed; a negative one never names a
/// process.
fn check_pid(pid: i32) -> LinuxResult<Pid> {
    Pid::try_from(pid).map_err(|_| LinuxError::EINVAL)
}

#[syscall_trace]
pub fn sys_getpid(kernel: &Kernel) -> LinuxResult<isize> {
    Ok(kernel.current_pid()? as isize)
}

#[syscall_trace]
pub fn sys_getppid(kernel: &Kernel) -> LinuxResult<isize> {
    let pid = kernel.current_pid()?;
    let parent = kernel
        .lock()
        .process(pid)
        .and_then(|process| process.get_parent())
        .unwrap_or(0);
    Ok(parent as isize)
}

#[syscall_trace]
pub fn sys_gettid(kernel: &Kernel) -> LinuxResult<isize> {
    Ok(kernel.current_tid() as isize)
}

#[syscall_trace]
pub fn sys_setpgid(kernel: &Kernel, pid: i32, pgid: i32) -> LinuxResult<isize> {
    kernel.setpgid(check_pid(pid)?, check_pid(pgid)?)?;
    Ok(0)
}

#[syscall_trace]
pub fn sys_getpgid(kernel: &Kernel, pid: i32) -> LinuxResult<isize> {
    let pid = Pid::try_from(pid).map_err(|_| LinuxError::ESRCH)?;
    Ok(kernel.getpgid(pid)? as isize)
}

#[syscall_trace]
pub fn sys_getpgrp(kernel: &Kernel) -> LinuxResult<isize> {
    Ok(kernel.getpgrp()? as isize)
}

#[syscall_trace]
pub fn sys_setsid(kernel: &Kernel) -> LinuxResult<isize> {
    Ok(kernel.setsid()? as isize)
}

#[syscall_trace]
pub fn sys_getsid(kernel: &Kernel, pid: i32) -> LinuxResult<isize> {
    let pid = Pid::try_from(pid).map_err(|_| LinuxError::ESRCH)?;
    Ok(kernel.getsid(pid)? as isize)
}
