use alloc::string::String;
use alloc::vec::Vec;
use axerrno::LinuxResult;
use kestrel_core::{Kernel, TrapFrame};

pub fn sys_execve_impl(
    kernel: &Kernel,
    tf: &mut TrapFrame,
    path: String,
    args: Vec<String>,
    envs: Vec<String>,
) -> LinuxResult<isize> {
    debug!("[execve] args = {:?}, envs = {:?}", &args, &envs);
    kernel.exec(tf, &path, args, envs)?;
    // the new image starts with a clean eax
    Ok(0)
}
