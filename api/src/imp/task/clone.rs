use axerrno::LinuxResult;
use kestrel_core::{Kernel, TrapFrame};

/// `fork`: the child resumes from the caller's registers `tf` and sees 0.
pub fn sys_fork_impl(kernel: &Kernel, tf: &TrapFrame) -> LinuxResult<isize> {
    let pid = kernel.fork(tf)?;
    Ok(pid as isize)
}
