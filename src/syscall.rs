use axerrno::{LinuxError, LinuxResult};
use kestrel_api::imp::task::signal::*;
use kestrel_api::imp::task::*;
use kestrel_api::interface::task::*;
use kestrel_api::interface::user::*;
use kestrel_core::{Kernel, TrapFrame};
use syscalls::x86::Sysno;

/// Run the system call in `tf` (number in `eax`, arguments in `ebx`, `ecx`,
/// `edx`, `esi`, `edi`, `ebp`) and leave its result or `-errno` in `eax`.
pub fn handle_syscall(kernel: &Kernel, tf: &mut TrapFrame) {
    let syscall_num = tf.syscall_num();
    let Some(sysno) = Sysno::new(syscall_num) else {
        warn!("Unknown syscall number: {}, ENOSYS", syscall_num);
        tf.set_retval(-LinuxError::ENOSYS.code() as isize);
        return;
    };
    trace!("[syscall] <{:?}> begin", sysno);
    let result: LinuxResult<isize> = match sysno {
        Sysno::fork => sys_fork(kernel, tf),
        Sysno::execve => {
            let (path, argv, envp) = (tf.arg0().into(), tf.arg1().into(), tf.arg2().into());
            sys_execve(kernel, tf, path, argv, envp)
        }
        Sysno::exit => sys_exit(kernel, tf.arg0() as _),
        Sysno::exit_group => sys_exit_group(kernel, tf.arg0() as _),
        Sysno::waitpid => sys_waitpid(
            kernel,
            tf.arg0() as _,
            tf.arg1().into(),
            tf.arg2() as _,
        ),
        Sysno::wait4 => sys_wait4(
            kernel,
            tf.arg0() as _,
            tf.arg1().into(),
            tf.arg2() as _,
            tf.arg3(),
        ),
        Sysno::kill => sys_kill(kernel, tf.arg0() as _, tf.arg1() as _),
        Sysno::tkill => sys_tkill(kernel, tf.arg0() as _, tf.arg1() as _),
        Sysno::rt_sigaction => sys_rt_sigaction(
            kernel,
            tf.arg0() as _,
            tf.arg1().into(),
            tf.arg2().into(),
            tf.arg3(),
        ),
        Sysno::sigaction => sys_sigaction(
            kernel,
            tf.arg0() as _,
            tf.arg1().into(),
            tf.arg2().into(),
        ),
        Sysno::rt_sigprocmask => sys_rt_sigprocmask(
            kernel,
            tf.arg0() as _,
            tf.arg1().into(),
            tf.arg2().into(),
            tf.arg3(),
        ),
        Sysno::sigprocmask => sys_sigprocmask(
            kernel,
            tf.arg0() as _,
            tf.arg1().into(),
            tf.arg2().into(),
        ),
        Sysno::rt_sigpending => sys_rt_sigpending(kernel, tf.arg0().into(), tf.arg1()),
        Sysno::sigpending => sys_sigpending(kernel, tf.arg0().into()),
        Sysno::rt_sigsuspend => sys_rt_sigsuspend(kernel, tf.arg0().into(), tf.arg1()),
        Sysno::sigsuspend => sys_sigsuspend(kernel, tf.arg2() as _),
        Sysno::sigreturn => sys_sigreturn(kernel, tf),
        Sysno::rt_sigreturn => sys_rt_sigreturn(kernel, tf),
        Sysno::getpid => sys_getpid(kernel),
        Sysno::getppid => sys_getppid(kernel),
        Sysno::gettid => sys_gettid(kernel),
        Sysno::setpgid => sys_setpgid(kernel, tf.arg0() as _, tf.arg1() as _),
        Sysno::getpgid => sys_getpgid(kernel, tf.arg0() as _),
        Sysno::getpgrp => sys_getpgrp(kernel),
        Sysno::setsid => sys_setsid(kernel),
        Sysno::getsid => sys_getsid(kernel, tf.arg0() as _),
        Sysno::getuid => sys_getuid(kernel),
        Sysno::geteuid => sys_geteuid(kernel),
        Sysno::setuid => sys_setuid(kernel, tf.arg0() as _),
        Sysno::setreuid => sys_setreuid(kernel, tf.arg0() as _, tf.arg1() as _),
        Sysno::getuid32 => sys_getuid32(kernel),
        Sysno::geteuid32 => sys_geteuid32(kernel),
        Sysno::setuid32 => sys_setuid32(kernel, tf.arg0() as _),
        Sysno::setreuid32 => sys_setreuid32(kernel, tf.arg0() as _, tf.arg1() as _),
        Sysno::setresuid => sys_setresuid(
            kernel,
            tf.arg0() as _,
            tf.arg1() as _,
            tf.arg2() as _,
        ),
        Sysno::setresuid32 => sys_setresuid32(
            kernel,
            tf.arg0() as _,
            tf.arg1() as _,
            tf.arg2() as _,
        ),
        Sysno::getresuid => sys_getresuid(
            kernel,
            tf.arg0().into(),
            tf.arg1().into(),
            tf.arg2().into(),
        ),
        Sysno::getresuid32 => sys_getresuid32(
            kernel,
            tf.arg0().into(),
            tf.arg1().into(),
            tf.arg2().into(),
        ),
        _ => stub_unimplemented(sysno),
    };
    let ans = result.unwrap_or_else(|err| -err.code() as _);
    trace!("[syscall] <{:?}> return {}", sysno, ans);
    tf.set_retval(ans);
}

fn stub_unimplemented(sysno: Sysno) -> LinuxResult<isize> {
    warn!("Unimplemented syscall: {:?}, ENOSYS", sysno);
    Err(LinuxError::ENOSYS)
}
