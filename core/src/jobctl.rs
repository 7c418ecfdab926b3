//! Process groups, sessions and controlling terminals for the current process.

use crate::kernel::{Kernel, Table};
use axerrno::LinuxResult;
use kestrel_process::{Detached, IDLE_PID, INIT_PID, Pid, TerminalId};
use kestrel_signal::Signo;

impl Kernel {
    /// `setpgid`; `pid == 0` is the caller, `pgid == 0` means `pid`.
    pub fn setpgid(&self, pid: Pid, pgid: Pid) -> LinuxResult<()> {
        let mut table = self.lock();
        let (_, me) = self.current_locked(&table)?;
        table.set_pgid(me, pid, pgid)
    }

    pub fn getpgid(&self, pid: Pid) -> LinuxResult<Pid> {
        let table = self.lock();
        let (_, me) = self.current_locked(&table)?;
        table.get_pgid(me, pid)
    }

    pub fn getpgrp(&self) -> LinuxResult<Pid> {
        self.getpgid(0)
    }

    /// `setsid`: returns the new session id.
    pub fn setsid(&self) -> LinuxResult<Pid> {
        let mut table = self.lock();
        let (_, me) = self.current_locked(&table)?;
        table.set_sid(me)
    }

    pub fn getsid(&self, pid: Pid) -> LinuxResult<Pid> {
        let table = self.lock();
        let (_, me) = self.current_locked(&table)?;
        table.get_sid(me, pid)
    }

    /// Make `terminal` the controlling terminal of the caller's session. The
    /// caller must lead that session; its group becomes the foreground group.
    pub fn attach_controlling_terminal(&self, terminal: TerminalId) -> LinuxResult<Pid> {
        let mut table = self.lock();
        let (_, me) = self.current_locked(&table)?;
        let pgid = table.attach_terminal(me, terminal)?;
        self.collab.terminal.set_foreground_group(terminal, pgid);
        Ok(pgid)
    }

    /// The terminal went away. Its session and every process holding it lose
    /// it; nobody is signalled.
    pub fn detach_terminal(&self, terminal: TerminalId) -> Option<Detached> {
        self.lock().detach_terminal(terminal)
    }

    /// `tcsetpgrp` on the caller's controlling terminal.
    pub fn set_foreground_group(&self, terminal: TerminalId, pgid: Pid) -> LinuxResult<()> {
        let mut table = self.lock();
        let (_, me) = self.current_locked(&table)?;
        table.set_foreground(me, terminal, pgid)?;
        self.collab.terminal.set_foreground_group(terminal, pgid);
        Ok(())
    }

    /// `tcgetpgrp`
    pub fn foreground_group(&self, terminal: TerminalId) -> LinuxResult<Pid> {
        let table = self.lock();
        let (_, me) = self.current_locked(&table)?;
        table.get_foreground(me, terminal)
    }

    /// The session leader holding `terminal` is gone: detach it and send the
    /// foreground group `SIGHUP` then `SIGCONT`.
    pub(crate) fn hangup_locked(&self, table: &mut Table, terminal: TerminalId) {
        let Some(detached) = table.detach_terminal(terminal) else {
            return;
        };
        let Some(foreground) = detached.foreground else {
            return;
        };
        info!("[jobctl] hangup of terminal {}, group {}", terminal, foreground);
        for pid in table.group_members(foreground) {
            if pid == IDLE_PID || pid == INIT_PID {
                continue;
            }
            for signo in [Signo::SIGHUP, Signo::SIGCONT] {
                let _ = self.raise_locked(table, pid, signo, None);
            }
        }
    }
}
