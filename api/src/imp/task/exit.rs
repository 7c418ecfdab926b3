use axerrno::LinuxResult;
use kestrel_core::Kernel;

/// End the current task, or with `exit_group` its whole process. The task is
/// gone when this returns; the trap path must not resume it.
pub fn sys_exit_impl(kernel: &Kernel, exit_code: i32, exit_group: bool) -> LinuxResult<isize> {
    if exit_group {
        info!(
            "[exit] process {:?} exiting with code {}",
            kernel.current_pid(),
            exit_code
        );
        kernel.exit_group(exit_code);
    } else {
        info!(
            "[exit] task {} exiting with code {}",
            kernel.current_tid(),
            exit_code
        );
        kernel.exit_task(exit_code);
    }
    Ok(0)
}
