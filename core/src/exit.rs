use crate::kernel::{Kernel, Table};
use kestrel_process::{ExitStatus, INIT_PID, Pid, Tid};
use kestrel_signal::Signo;

impl Kernel {
    /// `exit`: end the current task. The process becomes a zombie with
    /// `code` once its last task is gone.
    pub fn exit_task(&self, code: i32) {
        let mut table = self.lock();
        if let Ok((tid, _)) = self.current_locked(&table) {
            self.terminate_task_locked(&mut table, tid, ExitStatus::Exited(code & 0xff));
        }
    }

    /// `exit_group`: end every task of the current process.
    pub fn exit_group(&self, code: i32) {
        let mut table = self.lock();
        if let Ok((_, pid)) = self.current_locked(&table) {
            self.exit_group_locked(&mut table, pid, ExitStatus::Exited(code & 0xff));
        }
    }

    /// Remove one task. `status` is used if it was the last of its process.
    pub(crate) fn terminate_task_locked(&self, table: &mut Table, tid: Tid, status: ExitStatus) {
        let Some((thread, last)) = table.remove_thread(tid) else {
            return;
        };
        self.collab.scheduler.dequeue(tid);
        let pid = thread.get_pid();
        if let Some(top) = thread.data.user_stack {
            self.collab.mm.free_user_stack(pid, top);
        }
        self.collab.mm.free_kernel_stack(thread.data.kernel_stack);
        debug!("[exit] task {} of {} gone", tid, pid);
        if last {
            self.exit_process_locked(table, pid, status);
        }
    }

    pub(crate) fn exit_group_locked(&self, table: &mut Table, pid: Pid, status: ExitStatus) {
        for tid in table.thread_ids(pid) {
            self.terminate_task_locked(table, tid, status);
        }
    }

    fn exit_process_locked(&self, table: &mut Table, pid: Pid, status: ExitStatus) {
        self.collab.fs.close_all(pid);
        self.collab.mm.release_address_space(pid);

        let process = table.expect_process(pid);
        let parent = process.get_parent();
        let terminal = process
            .controlling_terminal()
            .filter(|_| table.is_session_leader(pid));
        let adopted = table.exit(pid, status);
        info!("[exit] process {} exited: {:?}", pid, status);
        if pid == INIT_PID {
            error!("[exit] init exited");
        }

        if adopted.iter().any(|&child| table.expect_process(child).is_zombie()) {
            self.notify_exit(table, INIT_PID);
        }
        if let Some(terminal) = terminal {
            self.hangup_locked(table, terminal);
        }
        if let Some(parent) = parent {
            self.notify_exit(table, parent);
        }
    }

    /// Queue `SIGCHLD` on `parent` whatever its disposition, and wake its
    /// waiters.
    fn notify_exit(&self, table: &mut Table, parent: Pid) {
        let _ = self.raise_locked(table, parent, Signo::SIGCHLD, None);
        self.wake_tasks(table, parent, |_| true);
    }
}
