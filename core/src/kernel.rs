use crate::collab::Collaborators;
use crate::config::KernelConfig;
use crate::process::{Credentials, ProcessData, TaskState, ThreadData};
use crate::trapframe::TrapFrame;
use alloc::string::String;
use alloc::vec;
use axerrno::{LinuxError, LinuxResult};
use kestrel_process::{Pid, ProcessTable, Tid};
use kestrel_signal::ThreadSignals;
use memory_addr::VirtAddr;
use spin::{Mutex, MutexGuard};

/// The process table with the kernel's payloads.
pub type Table = ProcessTable<ProcessData, ThreadData>;

/// The process-management core.
///
/// All process, task, group and session state sits behind one lock. Operations
/// hold it for a short critical section and release it before blocking.
pub struct Kernel {
    table: Mutex<Table>,
    pub(crate) collab: Collaborators,
    config: KernelConfig,
}

impl Kernel {
    /// Boot the core: only the idle process 0 exists, with the bootstrap task
    /// 0 and the idle task 1. The first fork from it creates init.
    pub fn new(collab: Collaborators, config: KernelConfig) -> Self {
        let idle = ProcessData::new(Credentials::root(), vec![String::from("idle")]);
        let task = || {
            ThreadData::new(
                ThreadSignals::default(),
                TrapFrame::default(),
                config.default_priority,
                VirtAddr::from_usize(0),
            )
        };
        let table = ProcessTable::new(config.max_processes, config.max_tasks, idle, task(), task());
        info!(
            "[kernel] process core up: {} processes, {} tasks",
            config.max_processes, config.max_tasks
        );
        Self {
            table: Mutex::new(table),
            collab,
            config,
        }
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    pub fn collaborators(&self) -> &Collaborators {
        &self.collab
    }

    /// Lock the process table.
    pub fn lock(&self) -> MutexGuard<'_, Table> {
        self.table.lock()
    }

    pub fn current_tid(&self) -> Tid {
        self.collab.scheduler.current()
    }

    pub fn current_pid(&self) -> LinuxResult<Pid> {
        let table = self.lock();
        self.current_locked(&table).map(|(_, pid)| pid)
    }

    /// The current task and its process.
    pub(crate) fn current_locked(&self, table: &Table) -> LinuxResult<(Tid, Pid)> {
        let tid = self.current_tid();
        let thread = table.thread(tid).ok_or(LinuxError::ESRCH)?;
        Ok((tid, thread.get_pid()))
    }

    /// Saved register context of a task.
    pub fn context(&self, tid: Tid) -> Option<TrapFrame> {
        self.lock().thread(tid).map(|t| t.data.context)
    }

    /// Scheduling state of a task; a task that existed once and is gone now
    /// is [`TaskState::Exited`].
    pub fn task_state(&self, tid: Tid) -> Option<TaskState> {
        let table = self.lock();
        match table.thread(tid) {
            Some(thread) => Some(thread.data.state),
            None if tid < table.peek_next_tid() => Some(TaskState::Exited),
            None => None,
        }
    }

    pub(crate) fn enqueue_locked(&self, table: &mut Table, tid: Tid) {
        let thread = table.expect_thread_mut(tid);
        thread.data.state = TaskState::Ready;
        self.collab.scheduler.enqueue(tid, thread.data.priority);
    }

    /// Wake the blocked tasks of `pid` selected by `filter`.
    pub(crate) fn wake_tasks<F>(&self, table: &mut Table, pid: Pid, filter: F)
    where
        F: Fn(&ThreadData) -> bool,
    {
        for tid in table.thread_ids(pid) {
            let thread = table.expect_thread_mut(tid);
            if thread.data.state == TaskState::Blocked && filter(&thread.data) {
                thread.data.state = TaskState::Ready;
                self.collab.scheduler.wake(tid);
            }
        }
    }

    /// Sleep the current task `tid` with the table unlocked. Returns the
    /// re-acquired lock; the caller re-evaluates, and must expect the task to
    /// be gone if its process was killed meanwhile.
    pub(crate) fn block_current<'a>(
        &'a self,
        mut table: MutexGuard<'a, Table>,
        tid: Tid,
    ) -> MutexGuard<'a, Table> {
        table.expect_thread_mut(tid).data.state = TaskState::Blocked;
        drop(table);
        self.collab.scheduler.block(tid);
        let mut table = self.lock();
        if let Some(thread) = table.thread_mut(tid) {
            if matches!(thread.data.state, TaskState::Blocked | TaskState::Ready) {
                thread.data.state = TaskState::Running;
            }
        }
        table
    }
}
