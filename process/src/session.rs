use crate::process_group::ProcessGroup;
use crate::table::ProcessTable;
use crate::{Pid, TerminalId};
use alloc::collections::BTreeSet;
use alloc::vec::Vec;
use axerrno::{LinuxError, LinuxResult};

pub struct Session {
    sid: Pid,
    pub(crate) groups: BTreeSet<Pid>,
    terminal: Option<TerminalId>,
    foreground: Option<Pid>,
}

/// What a terminal detach took away, so the caller can hang up the foreground.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detached {
    pub sid: Pid,
    pub foreground: Option<Pid>,
    /// Processes that lost the terminal.
    pub processes: Vec<Pid>,
}

impl Session {
    pub(crate) fn new(sid: Pid, first_group: Pid) -> Self {
        let mut groups = BTreeSet::new();
        groups.insert(first_group);
        Self {
            sid,
            groups,
            terminal: None,
            foreground: None,
        }
    }

    /// Get session id
    pub fn get_sid(&self) -> Pid {
        self.sid
    }

    pub fn get_process_groups(&self) -> impl Iterator<Item = Pid> + '_ {
        self.groups.iter().copied()
    }

    pub fn controlling_terminal(&self) -> Option<TerminalId> {
        self.terminal
    }

    pub fn foreground_group(&self) -> Option<Pid> {
        self.foreground
    }
}

impl<P, T> ProcessTable<P, T> {
    pub fn is_session_leader(&self, pid: Pid) -> bool {
        self.sid_of(pid) == Some(pid)
    }

    /// `getsid`; `pid == 0` names the caller.
    pub fn get_sid(&self, caller: Pid, pid: Pid) -> LinuxResult<Pid> {
        let pid = if pid == 0 { caller } else { pid };
        self.sid_of(pid).ok_or(LinuxError::ESRCH)
    }

    /// `setsid`: make `pid` the leader of a new session and of a new process
    /// group inside it, both numbered `pid`. The process loses its controlling
    /// terminal.
    pub fn set_sid(&mut self, pid: Pid) -> LinuxResult<Pid> {
        match self.process(pid) {
            Some(p) if !p.is_zombie() => {
                if p.is_group_leader() {
                    return Err(LinuxError::EPERM);
                }
            }
            _ => return Err(LinuxError::ESRCH),
        }
        if self.groups.contains_key(&pid) || self.sessions.contains_key(&pid) {
            // some group still carries this id
            return Err(LinuxError::EPERM);
        }
        let old_pgid = self.expect_process(pid).get_pgid();
        self.sessions.insert(pid, Session::new(pid, pid));
        self.groups.insert(pid, ProcessGroup::new(pid, pid, pid));
        let process = self.expect_process_mut(pid);
        process.pgid = pid;
        process.terminal = None;
        self.remove_from_group(old_pgid, pid);
        info!("[process] process {} leads new session", pid);
        Ok(pid)
    }

    /// The session a terminal is currently controlling, if any.
    pub fn terminal_session(&self, terminal: TerminalId) -> Option<Pid> {
        self.sessions
            .values()
            .find(|s| s.terminal == Some(terminal))
            .map(|s| s.sid)
    }

    /// Make `terminal` the controlling terminal of the session led by `pid`.
    ///
    /// Only a session leader whose session has no terminal yet may attach, and
    /// only a terminal no other session controls. The caller's group becomes
    /// the foreground group, which is returned.
    pub fn attach_terminal(&mut self, pid: Pid, terminal: TerminalId) -> LinuxResult<Pid> {
        let process = match self.process(pid) {
            Some(p) if !p.is_zombie() => p,
            _ => return Err(LinuxError::ESRCH),
        };
        let pgid = process.get_pgid();
        if !self.is_session_leader(pid) {
            return Err(LinuxError::EPERM);
        }
        if self.session(pid).is_some_and(|s| s.terminal.is_some()) {
            return Err(LinuxError::EPERM);
        }
        if self.terminal_session(terminal).is_some() {
            return Err(LinuxError::EPERM);
        }
        let session = self.expect_session_mut(pid);
        session.terminal = Some(terminal);
        session.foreground = Some(pgid);
        self.expect_process_mut(pid).terminal = Some(terminal);
        info!(
            "[process] terminal {} attached to session {}, foreground {}",
            terminal, pid, pgid
        );
        Ok(pgid)
    }

    /// Take `terminal` away from its session and from every process holding it.
    pub fn detach_terminal(&mut self, terminal: TerminalId) -> Option<Detached> {
        let sid = self.terminal_session(terminal)?;
        let session = self.expect_session_mut(sid);
        session.terminal = None;
        let foreground = session.foreground.take();
        let mut processes = Vec::new();
        for process in self.processes.values_mut() {
            if process.terminal == Some(terminal) {
                process.terminal = None;
                processes.push(process.get_pid());
            }
        }
        info!("[process] terminal {} detached from session {}", terminal, sid);
        Some(Detached {
            sid,
            foreground,
            processes,
        })
    }

    /// `tcsetpgrp`: `pid` must have `terminal` as its controlling terminal and
    /// `pgid` must be a group of its session.
    pub fn set_foreground(&mut self, pid: Pid, terminal: TerminalId, pgid: Pid) -> LinuxResult<()> {
        let sid = self.check_terminal(pid, terminal)?;
        match self.groups.get(&pgid) {
            Some(group) if group.get_sid() == sid => {}
            Some(_) => return Err(LinuxError::EPERM),
            None => return Err(LinuxError::ESRCH),
        }
        self.expect_session_mut(sid).foreground = Some(pgid);
        Ok(())
    }

    /// `tcgetpgrp`
    pub fn get_foreground(&self, pid: Pid, terminal: TerminalId) -> LinuxResult<Pid> {
        let sid = self.check_terminal(pid, terminal)?;
        self.session(sid)
            .and_then(|s| s.foreground)
            .ok_or(LinuxError::ESRCH)
    }

    fn check_terminal(&self, pid: Pid, terminal: TerminalId) -> LinuxResult<Pid> {
        let process = self.process(pid).ok_or(LinuxError::ESRCH)?;
        if process.controlling_terminal() != Some(terminal) {
            return Err(LinuxError::ENOTTY);
        }
        let sid = self.sid_of(pid).ok_or(LinuxError::ESRCH)?;
        if self.session(sid).and_then(|s| s.terminal) != Some(terminal) {
            return Err(LinuxError::ENOTTY);
        }
        Ok(sid)
    }
}
