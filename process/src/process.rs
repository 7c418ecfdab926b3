use crate::table::ProcessTable;
use crate::{INIT_PID, Pid, TerminalId, Tid};
use alloc::collections::BTreeSet;
use alloc::vec::Vec;
use axerrno::{LinuxError, LinuxResult};

/// Why a process terminated, kept in its zombie until the parent reaps it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// Exited normally with the given code.
    Exited(i32),
    /// Killed by the given signal number.
    Signaled(u8),
}

impl ExitStatus {
    /// Packed status in the layout `waitpid` reports.
    pub fn wait_status(self) -> i32 {
        match self {
            ExitStatus::Exited(code) => (code & 0xff) << 8,
            ExitStatus::Signaled(signo) => (signo & 0x7f) as i32,
        }
    }
}

pub struct Process<P> {
    pid: Pid,
    parent: Option<Pid>,
    pub(crate) children: BTreeSet<Pid>,
    pub(crate) threads: BTreeSet<Tid>,
    pub(crate) pgid: Pid,
    pub(crate) terminal: Option<TerminalId>,
    exec_done: bool,
    exit_status: Option<ExitStatus>,
    /// Kernel data bound to this process.
    pub data: P,
}

impl<P> Process<P> {
    pub(crate) fn new(
        pid: Pid,
        parent: Option<Pid>,
        pgid: Pid,
        terminal: Option<TerminalId>,
        data: P,
    ) -> Self {
        Self {
            pid,
            parent,
            children: BTreeSet::new(),
            threads: BTreeSet::new(),
            pgid,
            terminal,
            exec_done: false,
            exit_status: None,
            data,
        }
    }

    pub fn get_pid(&self) -> Pid {
        self.pid
    }

    pub fn get_parent(&self) -> Option<Pid> {
        self.parent
    }

    pub fn get_pgid(&self) -> Pid {
        self.pgid
    }

    pub fn get_children(&self) -> Vec<Pid> {
        self.children.iter().copied().collect()
    }

    pub fn get_threads(&self) -> Vec<Tid> {
        self.threads.iter().copied().collect()
    }

    /// The lowest-numbered live thread, if any thread is still alive.
    pub fn first_thread(&self) -> Option<Tid> {
        self.threads.first().copied()
    }

    pub fn is_group_leader(&self) -> bool {
        self.pgid == self.pid
    }

    pub fn controlling_terminal(&self) -> Option<TerminalId> {
        self.terminal
    }

    /// Whether the process has replaced its image since it was forked.
    pub fn has_exec(&self) -> bool {
        self.exec_done
    }

    pub fn mark_exec(&mut self) {
        self.exec_done = true;
    }

    pub fn is_zombie(&self) -> bool {
        self.exit_status.is_some()
    }

    pub fn exit_status(&self) -> Option<ExitStatus> {
        self.exit_status
    }
}

impl<P, T> ProcessTable<P, T> {
    /// Create a child of `parent` with one main thread.
    ///
    /// The child joins the parent's process group (and so its session) and
    /// inherits its controlling terminal. Fails without touching the tables if
    /// either table is full.
    pub fn fork(&mut self, parent: Pid, data: P, main_thread: T) -> LinuxResult<(Pid, Tid)> {
        let (pgid, terminal) = match self.processes.get(&parent) {
            Some(p) if !p.is_zombie() => (p.pgid, p.terminal),
            _ => return Err(LinuxError::ESRCH),
        };
        if !self.has_process_slot() || !self.has_thread_slot() {
            warn!("[process] table full, cannot fork from {}", parent);
            return Err(LinuxError::EAGAIN);
        }
        let pid = self.take_pid();
        let mut process = Process::new(pid, Some(parent), pgid, terminal, data);
        let tid = self.take_tid();
        process.threads.insert(tid);
        self.processes.insert(pid, process);
        self.threads
            .insert(tid, crate::thread::Thread::new(tid, pid, main_thread));
        self.expect_group_mut(pgid).members.insert(pid);
        self.expect_process_mut(parent).children.insert(pid);
        debug!("[process] forked {} (thread {}) from {}", pid, tid, parent);
        Ok((pid, tid))
    }

    /// Turn a process whose last thread has exited into a zombie.
    ///
    /// Live children are handed to init. Returns the pids that were moved so the
    /// caller can notify init about the ones that are already zombies.
    pub fn exit(&mut self, pid: Pid, status: ExitStatus) -> Vec<Pid> {
        let process = self.expect_process_mut(pid);
        assert!(
            !process.is_zombie(),
            "[process] process {} is already exited",
            pid
        );
        assert!(
            process.threads.is_empty(),
            "[process] process {} still has threads",
            pid
        );
        process.exit_status = Some(status);
        let children = core::mem::take(&mut process.children);

        if pid == INIT_PID || !self.processes.contains_key(&INIT_PID) {
            // nobody left to adopt them; keep them where they are
            self.expect_process_mut(pid).children = children;
            return Vec::new();
        }
        let moved: Vec<Pid> = children.into_iter().collect();
        for &child in &moved {
            self.expect_process_mut(child).parent = Some(INIT_PID);
        }
        self.expect_process_mut(INIT_PID)
            .children
            .extend(moved.iter().copied());
        moved
    }

    /// Remove a reaped zombie from every table.
    pub fn release(&mut self, pid: Pid) -> Process<P> {
        let process = self
            .processes
            .remove(&pid)
            .unwrap_or_else(|| panic!("[process] release of unknown process {}", pid));
        assert!(
            process.is_zombie(),
            "[process] process {} is not exited",
            pid
        );
        if let Some(parent) = process.parent {
            if let Some(parent) = self.processes.get_mut(&parent) {
                parent.children.remove(&pid);
            }
        }
        self.remove_from_group(process.pgid, pid);
        debug!("[process] released {}", pid);
        process
    }

    /// Children of `pid` that are zombies, lowest pid first.
    pub fn zombie_children(&self, pid: Pid) -> Vec<Pid> {
        self.processes
            .get(&pid)
            .map(|p| {
                p.children
                    .iter()
                    .copied()
                    .filter(|c| self.expect_process(*c).is_zombie())
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> ProcessTable<(), ()> {
        ProcessTable::new(8, 16, (), (), ())
    }

    #[test]
    fn fork_assigns_monotonic_pids() {
        let mut t = table();
        let (init, _) = t.fork(0, (), ()).unwrap();
        let (a, _) = t.fork(init, (), ()).unwrap();
        let (b, _) = t.fork(init, (), ()).unwrap();
        assert_eq!((init, a, b), (1, 2, 3));
        assert_eq!(t.expect_process(init).get_children(), [2, 3]);
        assert_eq!(t.expect_process(a).get_parent(), Some(1));
        assert_eq!(t.expect_process(a).get_pgid(), 0);
    }

    #[test]
    fn fork_fails_cleanly_when_full() {
        let mut t: ProcessTable<(), ()> = ProcessTable::new(2, 16, (), (), ());
        t.fork(0, (), ()).unwrap();
        assert_eq!(t.fork(1, (), ()), Err(LinuxError::EAGAIN));
        assert_eq!(t.peek_next_pid(), 2);
        assert!(t.expect_process(1).get_children().is_empty());
    }

    #[test]
    fn exit_reparents_children_to_init() {
        let mut t = table();
        t.fork(0, (), ()).unwrap();
        let (mid, mid_tid) = t.fork(1, (), ()).unwrap();
        let (leaf, _) = t.fork(mid, (), ()).unwrap();
        t.remove_thread(mid_tid);
        let moved = t.exit(mid, ExitStatus::Exited(3));
        assert_eq!(moved, [leaf]);
        assert_eq!(t.expect_process(leaf).get_parent(), Some(INIT_PID));
        assert!(t.expect_process(INIT_PID).children.contains(&leaf));
        assert_eq!(t.zombie_children(INIT_PID), [mid]);
    }

    #[test]
    fn release_removes_everything() {
        let mut t = table();
        t.fork(0, (), ()).unwrap();
        let (child, tid) = t.fork(1, (), ()).unwrap();
        t.set_sid(child).unwrap();
        t.remove_thread(tid);
        t.exit(child, ExitStatus::Signaled(9));
        let released = t.release(child);
        assert_eq!(released.exit_status(), Some(ExitStatus::Signaled(9)));
        assert!(t.process(child).is_none());
        assert!(t.group(child).is_none());
        assert!(t.session(child).is_none());
        assert!(t.expect_process(1).get_children().is_empty());
    }

    #[test]
    fn wait_status_layout() {
        assert_eq!(ExitStatus::Exited(0x11).wait_status(), 0x1100);
        assert_eq!(ExitStatus::Exited(0x1ff).wait_status(), 0xff00);
        assert_eq!(ExitStatus::Signaled(15).wait_status(), 15);
    }
}
