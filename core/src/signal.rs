//! Raising, masking and delivering signals.

use crate::cred::may_signal;
use crate::kernel::{Kernel, Table};
use crate::process::{JobEvent, TaskState};
use crate::trapframe::{SignalFrame, TrapFrame};
use alloc::vec::Vec;
use axerrno::{LinuxError, LinuxResult};
use kestrel_process::{ExitStatus, IDLE_PID, IDLE_TID, INIT_PID, Pid, Tid};
use kestrel_signal::{
    Delivery, HandlerRef, RaiseEffect, SigmaskHow, SignalAction, SignalActionFlags, SignalSet,
    Signo,
};
use memory_addr::VirtAddr;

/// Who a `kill` is aimed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalTarget {
    Process(Pid),
    /// A process group; 0 is the caller's own.
    Group(Pid),
    /// Every process the caller may signal, except init and the caller.
    All,
}

impl SignalTarget {
    /// Decode the `pid` argument of `kill`.
    pub fn from_raw(pid: i32) -> Self {
        match pid {
            -1 => SignalTarget::All,
            0 => SignalTarget::Group(0),
            p if p > 0 => SignalTarget::Process(p as Pid),
            p => SignalTarget::Group(p.unsigned_abs()),
        }
    }
}

impl Kernel {
    /// Raise `signo` on process `pid`.
    ///
    /// The idle process and init cannot be signalled this way. A zombie
    /// accepts the signal and ignores it.
    pub fn raise(&self, pid: Pid, signo: Signo) -> LinuxResult<()> {
        if pid == IDLE_PID || pid == INIT_PID {
            return Err(LinuxError::ESRCH);
        }
        let mut table = self.lock();
        self.raise_locked(&mut table, pid, signo, None)
    }

    /// `kill` on behalf of the current process. `None` only checks that the
    /// target exists and may be signalled.
    pub fn kill(&self, target: SignalTarget, signo: Option<Signo>) -> LinuxResult<()> {
        let mut table = self.lock();
        let (_, me) = self.current_locked(&table)?;
        let sender = table.expect_process(me).data.cred;

        if let SignalTarget::Process(pid) = target {
            if pid == IDLE_PID || pid == INIT_PID {
                return Err(LinuxError::ESRCH);
            }
            let process = table.process(pid).ok_or(LinuxError::ESRCH)?;
            if !may_signal(&sender, &process.data.cred) {
                return Err(LinuxError::EPERM);
            }
            return match signo {
                Some(signo) => self.raise_locked(&mut table, pid, signo, None),
                None => Ok(()),
            };
        }

        let targets: Vec<Pid> = match target {
            SignalTarget::Group(0) => table.group_members(table.expect_process(me).get_pgid()),
            SignalTarget::Group(pgid) => table.group_members(pgid),
            _ => table.pids().into_iter().filter(|&pid| pid != me).collect(),
        };
        let targets: Vec<Pid> = targets
            .into_iter()
            .filter(|&pid| pid != IDLE_PID && pid != INIT_PID)
            .collect();
        if targets.is_empty() {
            return Err(LinuxError::ESRCH);
        }
        let permitted: Vec<Pid> = targets
            .into_iter()
            .filter(|&pid| may_signal(&sender, &table.expect_process(pid).data.cred))
            .collect();
        if permitted.is_empty() {
            return Err(LinuxError::EPERM);
        }
        if let Some(signo) = signo {
            for pid in permitted {
                self.raise_locked(&mut table, pid, signo, None)?;
            }
        }
        Ok(())
    }

    /// `tkill`: the signal becomes pending for the whole process, but only
    /// task `tid` is woken for it.
    pub fn tkill(&self, tid: Tid, signo: Option<Signo>) -> LinuxResult<()> {
        if tid <= IDLE_TID {
            return Err(LinuxError::ESRCH);
        }
        let mut table = self.lock();
        let (_, me) = self.current_locked(&table)?;
        let pid = table.thread(tid).ok_or(LinuxError::ESRCH)?.get_pid();
        if pid == IDLE_PID || pid == INIT_PID {
            return Err(LinuxError::ESRCH);
        }
        let sender = table.expect_process(me).data.cred;
        if !may_signal(&sender, &table.expect_process(pid).data.cred) {
            return Err(LinuxError::EPERM);
        }
        match signo {
            Some(signo) => self.raise_locked(&mut table, pid, signo, Some(tid)),
            None => Ok(()),
        }
    }

    /// Record a signal and apply its raise-time effects: `SIGKILL` and
    /// `SIGCONT` resume a stopped process, and blocked tasks that do not
    /// block the signal are woken (only `wake` if given).
    pub(crate) fn raise_locked(
        &self,
        table: &mut Table,
        pid: Pid,
        signo: Signo,
        wake: Option<Tid>,
    ) -> LinuxResult<()> {
        let process = table.process_mut(pid).ok_or(LinuxError::ESRCH)?;
        if process.is_zombie() {
            trace!("[signal] {} to zombie {} dropped", signo, pid);
            return Ok(());
        }
        let effect = process.data.signal.raise(signo);
        debug!("[signal] {} raised on {}: {:?}", signo, pid, effect);
        match signo {
            Signo::SIGKILL => self.resume_locked(table, pid, false),
            Signo::SIGCONT => self.resume_locked(table, pid, true),
            _ => {}
        }
        if effect == RaiseEffect::Pending {
            let unblocked = |blocked: SignalSet| !blocked.has(signo);
            match wake {
                Some(tid) => {
                    let thread = table.expect_thread_mut(tid);
                    if thread.data.state == TaskState::Blocked && unblocked(thread.data.signal.blocked()) {
                        thread.data.state = TaskState::Ready;
                        self.collab.scheduler.wake(tid);
                    }
                }
                None => self.wake_tasks(table, pid, |t| unblocked(t.signal.blocked())),
            }
        }
        Ok(())
    }

    /// Take a process out of the stopped state. `report` records a
    /// `Continued` event and tells the parent.
    fn resume_locked(&self, table: &mut Table, pid: Pid, report: bool) {
        let process = table.expect_process_mut(pid);
        if !process.data.stopped {
            return;
        }
        process.data.stopped = false;
        if report {
            process.data.job_event = Some(JobEvent::Continued);
        }
        let parent = process.get_parent();
        for tid in table.thread_ids(pid) {
            if table.expect_thread(tid).data.state == TaskState::Stopped {
                self.enqueue_locked(table, tid);
            }
        }
        info!("[signal] process {} continued", pid);
        if let (true, Some(parent)) = (report, parent) {
            self.notify_job_change(table, parent);
        }
    }

    /// Stop every task of `pid` because of `signo`.
    fn stop_locked(&self, table: &mut Table, pid: Pid, signo: Signo) {
        let process = table.expect_process_mut(pid);
        process.data.stopped = true;
        process.data.job_event = Some(JobEvent::Stopped(signo));
        let parent = process.get_parent();
        for tid in table.thread_ids(pid) {
            table.expect_thread_mut(tid).data.state = TaskState::Stopped;
            self.collab.scheduler.dequeue(tid);
        }
        info!("[signal] process {} stopped by {}", pid, signo);
        if let Some(parent) = parent {
            self.notify_job_change(table, parent);
        }
    }

    /// A child stopped or continued: `SIGCHLD` unless the parent asked for
    /// `SA_NOCLDSTOP`, and a wake-up for its waiters either way.
    fn notify_job_change(&self, table: &mut Table, parent: Pid) {
        let nocldstop = table
            .expect_process(parent)
            .data
            .signal
            .action(Signo::SIGCHLD)
            .flags
            .contains(SignalActionFlags::NOCLDSTOP);
        if !nocldstop {
            let _ = self.raise_locked(table, parent, Signo::SIGCHLD, None);
        }
        self.wake_tasks(table, parent, |_| true);
    }

    /// `sigprocmask` for the current task. Returns the previous mask.
    pub fn set_mask(&self, how: SigmaskHow, set: SignalSet) -> LinuxResult<SignalSet> {
        let mut table = self.lock();
        let (tid, _) = self.current_locked(&table)?;
        Ok(table.expect_thread_mut(tid).data.signal.set_mask(how, set))
    }

    pub fn blocked(&self) -> LinuxResult<SignalSet> {
        let table = self.lock();
        let (tid, _) = self.current_locked(&table)?;
        Ok(table.expect_thread(tid).data.signal.blocked())
    }

    /// `sigaction` for the current process. Returns the previous action.
    pub fn set_action(&self, signo: Signo, action: SignalAction) -> LinuxResult<SignalAction> {
        let mut table = self.lock();
        let (_, pid) = self.current_locked(&table)?;
        table.expect_process_mut(pid).data.signal.set_action(signo, action)
    }

    pub fn action(&self, signo: Signo) -> LinuxResult<SignalAction> {
        let table = self.lock();
        let (_, pid) = self.current_locked(&table)?;
        Ok(*table.expect_process(pid).data.signal.action(signo))
    }

    /// `sigpending`: signals pending for the process that the current task
    /// blocks.
    pub fn pending_signals(&self) -> LinuxResult<SignalSet> {
        let table = self.lock();
        let (tid, pid) = self.current_locked(&table)?;
        let blocked = table.expect_thread(tid).data.signal.blocked();
        Ok(table.expect_process(pid).data.signal.pending() & blocked)
    }

    /// `sigsuspend`: wait with `mask` blocked until a signal that does
    /// something arrives. Always fails with `EINTR`; the old mask comes back
    /// when the signal has been handled.
    pub fn suspend(&self, mask: SignalSet) -> LinuxResult<()> {
        let mut table = self.lock();
        let (tid, pid) = self.current_locked(&table)?;
        table.expect_thread_mut(tid).data.signal.suspend(mask);
        loop {
            let blocked = table.expect_thread(tid).data.signal.blocked();
            if table.expect_process(pid).data.signal.has_interrupting(blocked) {
                break;
            }
            table = self.block_current(table, tid);
            if table.thread(tid).is_none() {
                break;
            }
        }
        Err(LinuxError::EINTR)
    }

    /// Deliver pending signals to the current task before it returns to user
    /// mode with registers `tf`.
    ///
    /// Ignored and continue signals are consumed as they come. The pass ends
    /// at the first signal that enters a handler, stops or kills the process.
    pub fn process_signals(&self, tf: &mut TrapFrame) {
        let mut table = self.lock();
        let Ok((tid, pid)) = self.current_locked(&table) else {
            return;
        };
        loop {
            let blocked = table.expect_thread(tid).data.signal.blocked();
            let Some(delivery) = table.expect_process_mut(pid).data.signal.dequeue(blocked) else {
                break;
            };
            debug!("[signal] task {} takes {:?}", tid, delivery);
            match delivery {
                Delivery::Ignore(_) | Delivery::Continue(_) => continue,
                Delivery::Handler {
                    signo,
                    handler,
                    action,
                } => {
                    if let Err(err) = self.enter_handler(&mut table, tid, pid, tf, signo, handler, &action) {
                        warn!("[signal] cannot build frame for {} in {}: {:?}", signo, pid, err);
                        self.exit_group_locked(&mut table, pid, ExitStatus::Signaled(Signo::SIGSEGV.raw()));
                    }
                    return;
                }
                Delivery::Stop(signo) => {
                    self.stop_locked(&mut table, pid, signo);
                    break;
                }
                Delivery::Terminate(signo) => {
                    self.exit_group_locked(&mut table, pid, ExitStatus::Signaled(signo.raw()));
                    return;
                }
            }
        }
        table.expect_thread_mut(tid).data.signal.finish_pass();
    }

    /// Push a [`SignalFrame`] and point `tf` at the handler.
    #[allow(clippy::too_many_arguments)]
    fn enter_handler(
        &self,
        table: &mut Table,
        tid: Tid,
        pid: Pid,
        tf: &mut TrapFrame,
        signo: Signo,
        handler: HandlerRef,
        action: &SignalAction,
    ) -> LinuxResult<()> {
        let restore = table.expect_thread_mut(tid).data.signal.enter_handler(signo, action);
        let ret_addr = handler
            .restorer
            .unwrap_or_else(|| self.collab.mm.signal_trampoline());
        let frame = SignalFrame::new(ret_addr, signo, *tf, restore);
        let sp = tf
            .sp()
            .checked_sub(SignalFrame::SIZE)
            .ok_or(LinuxError::EFAULT)?
            & !0xf;
        self.collab
            .mm
            .copy_to_user(pid, VirtAddr::from_usize(sp), &frame.to_bytes())?;
        tf.set_sp(sp);
        tf.set_ip(handler.entry.as_usize());
        tf.eax = signo.raw() as u32;
        Ok(())
    }

    /// `sigreturn`: restore the registers and mask saved by the handler frame.
    /// A frame that cannot be read kills the process with `SIGSEGV`.
    pub fn sigreturn(&self, tf: &mut TrapFrame) -> LinuxResult<isize> {
        let mut table = self.lock();
        let (tid, pid) = self.current_locked(&table)?;
        let mut bytes = [0u8; SignalFrame::SIZE];
        let read = tf
            .sp()
            .checked_sub(SignalFrame::SIGRETURN_OFFSET)
            .ok_or(LinuxError::EFAULT)
            .and_then(|addr| {
                self.collab
                    .mm
                    .copy_from_user(pid, VirtAddr::from_usize(addr), &mut bytes)
            });
        if let Err(err) = read {
            warn!("[signal] bad sigreturn frame in {}", pid);
            self.exit_group_locked(&mut table, pid, ExitStatus::Signaled(Signo::SIGSEGV.raw()));
            return Err(err);
        }
        let frame = SignalFrame::from_bytes(&bytes);
        tf.restore_user(&frame.regs);
        table.expect_thread_mut(tid).data.signal.restore(frame.mask);
        Ok(tf.retval())
    }
}
