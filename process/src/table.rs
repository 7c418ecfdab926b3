use crate::process::Process;
use crate::process_group::ProcessGroup;
use crate::session::Session;
use crate::thread::Thread;
use crate::{BOOT_TID, IDLE_PID, IDLE_TID, Pid, Tid};
use alloc::collections::{BTreeMap, BTreeSet};
use alloc::vec::Vec;

/// The global process, thread, process group and session tables.
///
/// `P` and `T` are the per-process and per-thread payloads owned by the kernel
/// core (signal state, credentials, saved context, ...). The hierarchy here knows
/// nothing about them.
pub struct ProcessTable<P, T> {
    pub(crate) processes: BTreeMap<Pid, Process<P>>,
    pub(crate) threads: BTreeMap<Tid, Thread<T>>,
    pub(crate) groups: BTreeMap<Pid, ProcessGroup>,
    pub(crate) sessions: BTreeMap<Pid, Session>,
    next_pid: Pid,
    next_tid: Tid,
    max_processes: usize,
    max_threads: usize,
}

impl<P, T> ProcessTable<P, T> {
    /// Create the tables holding only the idle process, its session and group
    /// (all id 0), and the bootstrap and idle tasks (tids 0 and 1).
    pub fn new(max_processes: usize, max_threads: usize, idle: P, boot: T, idle_task: T) -> Self {
        let mut table = Self {
            processes: BTreeMap::new(),
            threads: BTreeMap::new(),
            groups: BTreeMap::new(),
            sessions: BTreeMap::new(),
            next_pid: IDLE_PID + 1,
            next_tid: IDLE_TID + 1,
            max_processes,
            max_threads,
        };
        table
            .sessions
            .insert(IDLE_PID, Session::new(IDLE_PID, IDLE_PID));
        table
            .groups
            .insert(IDLE_PID, ProcessGroup::new(IDLE_PID, IDLE_PID, IDLE_PID));
        let mut process = Process::new(IDLE_PID, None, IDLE_PID, None, idle);
        process.threads.insert(BOOT_TID);
        process.threads.insert(IDLE_TID);
        table.processes.insert(IDLE_PID, process);
        table
            .threads
            .insert(BOOT_TID, Thread::new(BOOT_TID, IDLE_PID, boot));
        table
            .threads
            .insert(IDLE_TID, Thread::new(IDLE_TID, IDLE_PID, idle_task));
        table
    }

    /// The pid the next successful fork will receive.
    pub fn peek_next_pid(&self) -> Pid {
        self.next_pid
    }

    /// The tid the next successful thread creation will receive.
    pub fn peek_next_tid(&self) -> Tid {
        self.next_tid
    }

    pub(crate) fn take_pid(&mut self) -> Pid {
        let pid = self.next_pid;
        self.next_pid += 1;
        pid
    }

    pub(crate) fn take_tid(&mut self) -> Tid {
        let tid = self.next_tid;
        self.next_tid += 1;
        tid
    }

    pub fn has_process_slot(&self) -> bool {
        self.processes.len() < self.max_processes
    }

    pub fn has_thread_slot(&self) -> bool {
        self.threads.len() < self.max_threads
    }

    pub fn process(&self, pid: Pid) -> Option<&Process<P>> {
        self.processes.get(&pid)
    }

    pub fn process_mut(&mut self, pid: Pid) -> Option<&mut Process<P>> {
        self.processes.get_mut(&pid)
    }

    pub fn thread(&self, tid: Tid) -> Option<&Thread<T>> {
        self.threads.get(&tid)
    }

    pub fn thread_mut(&mut self, tid: Tid) -> Option<&mut Thread<T>> {
        self.threads.get_mut(&tid)
    }

    pub fn group(&self, pgid: Pid) -> Option<&ProcessGroup> {
        self.groups.get(&pgid)
    }

    pub fn session(&self, sid: Pid) -> Option<&Session> {
        self.sessions.get(&sid)
    }

    /// Look up a process that other table entries refer to.
    ///
    /// A dangling reference means the tables are corrupted, which cannot be
    /// contained, so this panics.
    pub fn expect_process(&self, pid: Pid) -> &Process<P> {
        self.processes
            .get(&pid)
            .unwrap_or_else(|| panic!("[process] table corrupted: process {} missing", pid))
    }

    pub fn expect_process_mut(&mut self, pid: Pid) -> &mut Process<P> {
        self.processes
            .get_mut(&pid)
            .unwrap_or_else(|| panic!("[process] table corrupted: process {} missing", pid))
    }

    pub fn expect_thread(&self, tid: Tid) -> &Thread<T> {
        self.threads
            .get(&tid)
            .unwrap_or_else(|| panic!("[process] table corrupted: thread {} missing", tid))
    }

    pub fn expect_thread_mut(&mut self, tid: Tid) -> &mut Thread<T> {
        self.threads
            .get_mut(&tid)
            .unwrap_or_else(|| panic!("[process] table corrupted: thread {} missing", tid))
    }

    pub(crate) fn expect_group_mut(&mut self, pgid: Pid) -> &mut ProcessGroup {
        self.groups
            .get_mut(&pgid)
            .unwrap_or_else(|| panic!("[process] table corrupted: process group {} missing", pgid))
    }

    pub(crate) fn expect_session_mut(&mut self, sid: Pid) -> &mut Session {
        self.sessions
            .get_mut(&sid)
            .unwrap_or_else(|| panic!("[process] table corrupted: session {} missing", sid))
    }

    /// Session id of a process, reached through its process group.
    pub fn sid_of(&self, pid: Pid) -> Option<Pid> {
        let pgid = self.processes.get(&pid)?.get_pgid();
        Some(
            self.groups
                .get(&pgid)
                .unwrap_or_else(|| panic!("[process] table corrupted: process group {} missing", pgid))
                .get_sid(),
        )
    }

    pub fn processes(&self) -> impl Iterator<Item = &Process<P>> {
        self.processes.values()
    }

    pub fn pids(&self) -> Vec<Pid> {
        self.processes.keys().copied().collect()
    }

    /// Live thread ids of a process, lowest first.
    pub fn thread_ids(&self, pid: Pid) -> Vec<Tid> {
        self.processes
            .get(&pid)
            .map(|p| p.threads.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Members of a process group, or an empty list if the group does not exist.
    pub fn group_members(&self, pgid: Pid) -> Vec<Pid> {
        self.groups
            .get(&pgid)
            .map(|g| g.get_processes().collect())
            .unwrap_or_default()
    }

    pub(crate) fn group_ids_of_session(&self, sid: Pid) -> BTreeSet<Pid> {
        self.sessions
            .get(&sid)
            .map(|s| s.groups.clone())
            .unwrap_or_default()
    }
}
