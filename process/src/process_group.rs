use crate::Pid;
use crate::table::ProcessTable;
use alloc::collections::BTreeSet;
use axerrno::{LinuxError, LinuxResult};

pub struct ProcessGroup {
    pgid: Pid,
    sid: Pid,
    pub(crate) members: BTreeSet<Pid>,
}

impl ProcessGroup {
    pub(crate) fn new(pgid: Pid, sid: Pid, leader: Pid) -> Self {
        let mut members = BTreeSet::new();
        members.insert(leader);
        Self { pgid, sid, members }
    }

    /// Get process group id
    pub fn get_pgid(&self) -> Pid {
        self.pgid
    }

    /// Get the id of the session the group belongs to
    pub fn get_sid(&self) -> Pid {
        self.sid
    }

    /// Get the leader process of the process group
    /// Return `None` if the leader process does not exist (maybe exited)
    pub fn get_leader(&self) -> Option<Pid> {
        // "leader" process is the process with the same id as the process group id
        self.members.contains(&self.pgid).then_some(self.pgid)
    }

    pub fn get_processes(&self) -> impl Iterator<Item = Pid> + '_ {
        self.members.iter().copied()
    }
}

impl<P, T> ProcessTable<P, T> {
    pub fn is_group_leader(&self, pid: Pid) -> bool {
        self.process(pid).is_some_and(|p| p.is_group_leader())
    }

    /// Drop `pid` from a group; empty groups leave their session, empty
    /// sessions leave the table.
    pub(crate) fn remove_from_group(&mut self, pgid: Pid, pid: Pid) {
        let group = self.expect_group_mut(pgid);
        group.members.remove(&pid);
        if !group.members.is_empty() {
            return;
        }
        let sid = group.sid;
        self.groups.remove(&pgid);
        let session = self.expect_session_mut(sid);
        session.groups.remove(&pgid);
        if session.groups.is_empty() {
            self.sessions.remove(&sid);
            trace!("[process] session {} is gone", sid);
        }
    }

    /// Move a process into an existing group, or into a freshly created group
    /// `new_pgid` of session `sid`.
    pub(crate) fn change_group(&mut self, pid: Pid, new_pgid: Pid, sid: Pid) {
        let old_pgid = self.expect_process(pid).get_pgid();
        if old_pgid == new_pgid {
            return;
        }
        match self.groups.get_mut(&new_pgid) {
            Some(group) => {
                group.members.insert(pid);
            }
            None => {
                self.groups
                    .insert(new_pgid, ProcessGroup::new(new_pgid, sid, pid));
                self.expect_session_mut(sid).groups.insert(new_pgid);
            }
        }
        self.expect_process_mut(pid).pgid = new_pgid;
        // join first: leaving could otherwise empty the session being joined
        self.remove_from_group(old_pgid, pid);
    }

    /// `setpgid` on behalf of `caller`.
    ///
    /// `pid == 0` names the caller, `pgid == 0` means "use the target's pid".
    /// Only the caller itself or one of its direct children may be moved, a
    /// child only before it has exec'd, never a session leader, and never into
    /// a group of another session.
    pub fn set_pgid(&mut self, caller: Pid, pid: Pid, pgid: Pid) -> LinuxResult<()> {
        let pid = if pid == 0 { caller } else { pid };
        let pgid = if pgid == 0 { pid } else { pgid };

        let target = match self.process(pid) {
            Some(p) if !p.is_zombie() => p,
            _ => return Err(LinuxError::ESRCH),
        };
        if pid != caller {
            if target.get_parent() != Some(caller) {
                return Err(LinuxError::ESRCH);
            }
            if target.has_exec() {
                return Err(LinuxError::EACCES);
            }
        }
        let caller_sid = self.sid_of(caller).ok_or(LinuxError::ESRCH)?;
        let target_sid = self.sid_of(pid).ok_or(LinuxError::ESRCH)?;
        if target_sid != caller_sid {
            return Err(LinuxError::EPERM);
        }
        if target_sid == pid {
            // a session leader cannot leave its own group
            return Err(LinuxError::EPERM);
        }
        match self.groups.get(&pgid) {
            Some(group) if group.sid != caller_sid => return Err(LinuxError::EPERM),
            Some(_) => {}
            None if pgid != pid => return Err(LinuxError::EPERM),
            None => {}
        }
        self.change_group(pid, pgid, caller_sid);
        debug!("[process] process {} moved to group {}", pid, pgid);
        Ok(())
    }

    /// `getpgid`; `pid == 0` names the caller.
    pub fn get_pgid(&self, caller: Pid, pid: Pid) -> LinuxResult<Pid> {
        let pid = if pid == 0 { caller } else { pid };
        self.process(pid)
            .map(|p| p.get_pgid())
            .ok_or(LinuxError::ESRCH)
    }
}
