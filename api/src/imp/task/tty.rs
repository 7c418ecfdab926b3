//! Entry points for the terminal driver. The driver resolves a descriptor or
//! device to its [`TerminalId`] before calling in.

use axerrno::{LinuxError, LinuxResult};
use kestrel_core::Kernel;
use kestrel_process::{Detached, Pid, TerminalId};
use syscall_trace::syscall_trace;

use crate::ptr::{UserConstPtr, UserPtr};

/// `TIOCSCTTY`: the caller's session takes `terminal` as its controlling
/// terminal.
#[syscall_trace]
pub fn sys_tiocsctty(kernel: &Kernel, terminal: TerminalId) -> LinuxResult<isize> {
    kernel.attach_controlling_terminal(terminal)?;
    Ok(0)
}

/// `TIOCSPGRP` / `tcsetpgrp`; the group id is read from `pgrp`.
#[syscall_trace]
pub fn sys_tiocspgrp(
    kernel: &Kernel,
    terminal: TerminalId,
    pgrp: UserConstPtr<i32>,
) -> LinuxResult<isize> {
    let pgid = Pid::try_from(pgrp.read(kernel)?).map_err(|_| LinuxError::EINVAL)?;
    kernel.set_foreground_group(terminal, pgid)?;
    Ok(0)
}

/// `TIOCGPGRP` / `tcgetpgrp`; the group id is written to `pgrp`.
#[syscall_trace]
pub fn sys_tiocgpgrp(
    kernel: &Kernel,
    terminal: TerminalId,
    pgrp: UserPtr<i32>,
) -> LinuxResult<isize> {
    let pgid = kernel.foreground_group(terminal)?;
    pgrp.write(kernel, pgid as i32)?;
    Ok(0)
}

/// The device was closed or lost its carrier.
pub fn tty_detach(kernel: &Kernel, terminal: TerminalId) -> Option<Detached> {
    let detached = kernel.detach_terminal(terminal);
    if let Some(detached) = &detached {
        info!(
            "[tty] terminal {} detached from session {}",
            terminal, detached.sid
        );
    }
    detached
}

#[cfg(test)]
mod tests {
    use super::*;
    use kestrel_core::mock::{MockEnv, STACK_TOP};

    const TTY: TerminalId = 4;
    const PGRP: usize = STACK_TOP - 0x400;

    #[test]
    fn foreground_group_round_trip() {
        let env = MockEnv::boot();
        let (init, _) = env.spawn_init();
        let kernel = &env.kernel;
        let shell = kernel.fork(&env.user_frame(init)).unwrap();
        env.run_as_process(shell);
        kernel.setsid().unwrap();
        assert_eq!(sys_tiocsctty(kernel, TTY), Ok(0));
        assert_eq!(env.terminal.foreground(TTY), Some(shell));

        let job = kernel.fork(&env.user_frame(shell)).unwrap();
        kernel.setpgid(job, job).unwrap();
        UserPtr::<i32>::from(PGRP).write(kernel, job as i32).unwrap();
        assert_eq!(sys_tiocspgrp(kernel, TTY, PGRP.into()), Ok(0));
        assert_eq!(env.terminal.foreground(TTY), Some(job));

        UserPtr::<i32>::from(PGRP).write(kernel, 0).unwrap();
        assert_eq!(sys_tiocgpgrp(kernel, TTY, PGRP.into()), Ok(0));
        assert_eq!(UserConstPtr::<i32>::from(PGRP).read(kernel), Ok(job as i32));

        let detached = tty_detach(kernel, TTY).unwrap();
        assert_eq!(detached.sid, shell);
        assert!(tty_detach(kernel, TTY).is_none());
        assert_eq!(sys_tiocgpgrp(kernel, TTY, PGRP.into()), Err(LinuxError::ENOTTY));
    }
}
