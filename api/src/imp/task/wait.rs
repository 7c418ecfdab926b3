use axerrno::{LinuxError, LinuxResult};
use kestrel_core::Kernel;
use kestrel_core::wait::{WaitOptions, WaitTarget};
use syscall_trace::syscall_trace;

use crate::ptr::{PtrWrapper, UserPtr};

#[syscall_trace]
pub fn sys_wait4(
    kernel: &Kernel,
    pid: i32,
    exit_code_ptr: UserPtr<i32>,
    option: u32,
    rusage: usize,
) -> LinuxResult<isize> {
    let options = WaitOptions::from_bits(option).ok_or(LinuxError::EINVAL)?;
    if rusage != 0 {
        debug!("[wait4] rusage at {:#x} is left untouched", rusage);
    }
    // a child must not be reaped for a status that cannot be delivered
    if let Some(ptr) = exit_code_ptr.nullable() {
        ptr.write(kernel, ptr.read(kernel)?)?;
    }
    match kernel.wait(WaitTarget::from_raw(pid), options)? {
        Some((child, status)) => {
            exit_code_ptr.write_nullable(kernel, status)?;
            Ok(child as isize)
        }
        None => Ok(0),
    }
}

#[syscall_trace]
pub fn sys_waitpid(
    kernel: &Kernel,
    pid: i32,
    exit_code_ptr: UserPtr<i32>,
    option: u32,
) -> LinuxResult<isize> {
    sys_wait4(kernel, pid, exit_code_ptr, option, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ptr::UserConstPtr;
    use kestrel_core::mock::{MockEnv, STACK_TOP};
    use kestrel_core::wait::WaitStatus;

    const STATUS: usize = STACK_TOP - 0x800;

    #[test]
    fn status_lands_in_user_memory() {
        let env = MockEnv::boot();
        let (init, init_tid) = env.spawn_init();
        let kernel = &env.kernel;
        let child = kernel.fork(&env.user_frame(init)).unwrap();
        env.run_as_process(child);
        kernel.exit_group(0x11);

        env.run_as(init_tid);
        let status = UserPtr::<i32>::from(STATUS);
        assert_eq!(sys_waitpid(kernel, -1, status, 0), Ok(child as isize));
        let raw = UserConstPtr::<i32>::from(STATUS).read(kernel).unwrap();
        assert_eq!(WaitStatus::decode(raw), WaitStatus::Exited(0x11));
        assert_eq!(
            sys_wait4(kernel, -1, UserPtr::from(0), 0, 0),
            Err(LinuxError::ECHILD)
        );
    }

    #[test]
    fn nohang_with_a_live_child() {
        let env = MockEnv::boot();
        let (init, _) = env.spawn_init();
        let kernel = &env.kernel;
        let child = kernel.fork(&env.user_frame(init)).unwrap();
        let nohang = WaitOptions::WNOHANG.bits();
        assert_eq!(sys_wait4(kernel, child as i32, UserPtr::from(0), nohang, 0), Ok(0));
    }

    #[test]
    fn bad_status_pointer_keeps_the_zombie() {
        let env = MockEnv::boot();
        let (init, init_tid) = env.spawn_init();
        let kernel = &env.kernel;
        let child = kernel.fork(&env.user_frame(init)).unwrap();
        env.run_as_process(child);
        kernel.exit_group(3);

        env.run_as(init_tid);
        assert_eq!(
            sys_wait4(kernel, child as i32, UserPtr::from(0x10), 0, 0),
            Err(LinuxError::EFAULT)
        );
        assert!(kernel.lock().process(child).is_some_and(|p| p.is_zombie()));
        let status = UserPtr::<i32>::from(STATUS);
        assert_eq!(sys_wait4(kernel, child as i32, status, 0, 0), Ok(child as isize));
        assert_eq!(status.read(kernel), Ok(0x300));
    }

    #[test]
    fn unknown_option_bits_are_rejected() {
        let env = MockEnv::boot();
        let (init, _) = env.spawn_init();
        let kernel = &env.kernel;
        let child = kernel.fork(&env.user_frame(init)).unwrap();
        let bogus = WaitOptions::WNOHANG.bits() | 0x100;
        assert_eq!(
            sys_wait4(kernel, child as i32, UserPtr::from(0), bogus, 0),
            Err(LinuxError::EINVAL)
        );
        assert!(kernel.lock().process(child).is_some());
    }
}
