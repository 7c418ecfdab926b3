use crate::kernel::{Kernel, Table};
use crate::process::JobEvent;
use alloc::vec::Vec;
use axerrno::{LinuxError, LinuxResult};
use bitflags::bitflags;
use kestrel_process::Pid;
use kestrel_signal::Signo;
use linux_raw_sys::general::{WCONTINUED, WNOHANG, WNOWAIT, WUNTRACED};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct WaitOptions: u32 {
        /// Do not block when there are no processes wishing to report status.
        const WNOHANG = WNOHANG;
        /// Report the status of selected processes which are stopped due to a
        /// `SIGTTIN`, `SIGTTOU`, `SIGTSTP`, or `SIGSTOP` signal.
        const WUNTRACED = WUNTRACED;
        /// Report the status of selected processes that have continued from a
        /// job control stop by receiving a `SIGCONT` signal.
        const WCONTINUED = WCONTINUED;
        /// Don't reap, just poll status.
        const WNOWAIT = WNOWAIT;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitTarget {
    /// Wait for any child process
    Any,
    /// Wait for the child whose process ID is equal to the value.
    Pid(Pid),
    /// Wait for any child process whose process group ID is equal to the
    /// value; 0 is the caller's group.
    Group(Pid),
}

impl WaitTarget {
    pub fn from_raw(pid: i32) -> Self {
        match pid {
            -1 => WaitTarget::Any,
            0 => WaitTarget::Group(0),
            p if p > 0 => WaitTarget::Pid(p as Pid),
            p => WaitTarget::Group(p.unsigned_abs()),
        }
    }

    fn matches(&self, table: &Table, child: Pid) -> bool {
        match *self {
            WaitTarget::Any => true,
            WaitTarget::Pid(pid) => child == pid,
            WaitTarget::Group(pgid) => table.expect_process(child).get_pgid() == pgid,
        }
    }
}

/// A packed `waitpid` status, decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStatus {
    Exited(u8),
    Signaled(u8),
    Stopped(u8),
    Continued,
}

impl WaitStatus {
    pub fn decode(status: i32) -> Self {
        let low = (status & 0x7f) as u8;
        let high = ((status >> 8) & 0xff) as u8;
        if status == 0xffff {
            WaitStatus::Continued
        } else if low == 0x7f {
            WaitStatus::Stopped(high)
        } else if low == 0 {
            WaitStatus::Exited(high)
        } else {
            WaitStatus::Signaled(low)
        }
    }

    pub fn encode(self) -> i32 {
        match self {
            WaitStatus::Exited(code) => (code as i32) << 8,
            WaitStatus::Signaled(signo) => (signo & 0x7f) as i32,
            WaitStatus::Stopped(signo) => ((signo as i32) << 8) | 0x7f,
            WaitStatus::Continued => 0xffff,
        }
    }
}

impl Kernel {
    /// `wait4` for the current process.
    ///
    /// Returns the pid and packed status of a child that has something to
    /// report, or `None` under `WNOHANG` if none has yet.
    pub fn wait(&self, target: WaitTarget, options: WaitOptions) -> LinuxResult<Option<(Pid, i32)>> {
        let mut table = self.lock();
        let (tid, me) = self.current_locked(&table)?;
        let target = match target {
            WaitTarget::Group(0) => WaitTarget::Group(table.expect_process(me).get_pgid()),
            other => other,
        };
        debug!("[wait] {} waits for {:?}, {:?}", me, target, options);
        loop {
            let children: Vec<Pid> = table
                .expect_process(me)
                .get_children()
                .into_iter()
                .filter(|&child| target.matches(&table, child))
                .collect();
            if children.is_empty() {
                return Err(LinuxError::ECHILD);
            }
            if let Some(found) = Self::take_report(&mut table, me, &children, options) {
                return Ok(Some(found));
            }
            if options.contains(WaitOptions::WNOHANG) {
                return Ok(None);
            }
            let blocked = table.expect_thread(tid).data.signal.blocked();
            if table.expect_process(me).data.signal.has_interrupting(blocked) {
                return Err(LinuxError::EINTR);
            }
            table = self.block_current(table, tid);
            if table.thread(tid).is_none() {
                return Err(LinuxError::EINTR);
            }
        }
    }

    /// Zombies first, then stop and continue events the options ask for.
    fn take_report(
        table: &mut Table,
        me: Pid,
        children: &[Pid],
        options: WaitOptions,
    ) -> Option<(Pid, i32)> {
        let keep = options.contains(WaitOptions::WNOWAIT);
        if let Some(&child) = children
            .iter()
            .find(|&&child| table.expect_process(child).is_zombie())
        {
            let status = table.expect_process(child).exit_status()?.wait_status();
            if !keep {
                table.release(child);
                if table.zombie_children(me).is_empty() {
                    table.expect_process_mut(me).data.signal.clear(Signo::SIGCHLD);
                }
                info!("[wait] {} reaped {}", me, child);
            }
            return Some((child, status));
        }

        for &child in children {
            let data = &mut table.expect_process_mut(child).data;
            let Some(event) = data.job_event else {
                continue;
            };
            let wanted = match event {
                JobEvent::Stopped(_) => options.contains(WaitOptions::WUNTRACED),
                JobEvent::Continued => options.contains(WaitOptions::WCONTINUED),
            };
            if wanted {
                if !keep {
                    data.job_event = None;
                }
                return Some((child, event.wait_status()));
            }
        }
        None
    }
}
