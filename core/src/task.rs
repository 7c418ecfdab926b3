use crate::kernel::Kernel;
use crate::process::ThreadData;
use crate::trapframe::TrapFrame;
use alloc::string::String;
use alloc::vec::Vec;
use axerrno::{LinuxError, LinuxResult};
use kestrel_process::{ExitStatus, Pid, Tid};
use kestrel_signal::ThreadSignals;
use memory_addr::VirtAddr;

/// Who asks for a new task inside an existing process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Kernel,
    User,
}

impl Kernel {
    /// `fork`: duplicate the current process.
    ///
    /// The child gets one task resuming from `tf` with a return value of 0,
    /// the caller's blocked mask, a copy of the dispositions (nothing pending),
    /// and the caller's group, session, terminal and credentials. Returns the
    /// child's pid. On failure nothing is left behind and no pid is used up.
    pub fn fork(&self, tf: &TrapFrame) -> LinuxResult<Pid> {
        let mut table = self.lock();
        let (tid, parent) = self.current_locked(&table)?;
        if !table.has_process_slot() || !table.has_thread_slot() {
            warn!("[task] table full, fork from {} refused", parent);
            return Err(LinuxError::EAGAIN);
        }
        let mm = &self.collab.mm;
        let kernel_stack = mm.alloc_kernel_stack(self.config().kernel_stack_size)?;
        let child = table.peek_next_pid();
        if let Err(err) = mm.clone_address_space(parent, child) {
            mm.free_kernel_stack(kernel_stack);
            return Err(err);
        }

        let caller = &table.expect_thread(tid).data;
        let mut context = *tf;
        context.set_retval(0);
        let thread = ThreadData::new(
            ThreadSignals::with_blocked(caller.signal.blocked()),
            context,
            caller.priority,
            kernel_stack,
        );
        let data = table.expect_process(parent).data.fork();
        let (pid, child_tid) = match table.fork(parent, data, thread) {
            Ok(ids) => ids,
            Err(err) => {
                mm.release_address_space(child);
                mm.free_kernel_stack(kernel_stack);
                return Err(err);
            }
        };
        self.enqueue_locked(&mut table, child_tid);
        info!("[task] {} forked {} (task {})", parent, pid, child_tid);
        Ok(pid)
    }

    /// Start a new task in process `pid` at `entry`, with `arg` as its only
    /// argument on a fresh user stack. Only the kernel may do this.
    ///
    /// The task blocks what the lowest-numbered live task of the process
    /// blocks; nothing else is copied.
    pub fn create_task(&self, pid: Pid, entry: VirtAddr, arg: u32, origin: Origin) -> LinuxResult<Tid> {
        if origin != Origin::Kernel {
            return Err(LinuxError::EPERM);
        }
        let mut table = self.lock();
        let blocked = match table.process(pid) {
            Some(process) if !process.is_zombie() => process
                .first_thread()
                .map(|tid| table.expect_thread(tid).data.signal.blocked())
                .unwrap_or_default(),
            _ => return Err(LinuxError::ESRCH),
        };
        if !table.has_thread_slot() {
            return Err(LinuxError::EAGAIN);
        }

        let mm = &self.collab.mm;
        let kernel_stack = mm.alloc_kernel_stack(self.config().kernel_stack_size)?;
        let (top, sp) = match self.push_start_arg(pid, arg) {
            Ok(stack) => stack,
            Err(err) => {
                mm.free_kernel_stack(kernel_stack);
                return Err(err);
            }
        };
        let mut thread = ThreadData::new(
            ThreadSignals::with_blocked(blocked),
            TrapFrame::new_user(entry, sp),
            self.config().default_priority,
            kernel_stack,
        );
        thread.user_stack = Some(top);
        let tid = match table.create_thread(pid, thread) {
            Ok(tid) => tid,
            Err(err) => {
                mm.free_user_stack(pid, top);
                mm.free_kernel_stack(kernel_stack);
                return Err(err);
            }
        };
        self.enqueue_locked(&mut table, tid);
        info!("[task] task {} started in {} at {:#x}", tid, pid, entry.as_usize());
        Ok(tid)
    }

    /// New user stack laid out as a cdecl call: `[sp]` a null return address,
    /// `[sp + 4]` the argument. Returns the stack top and `sp`.
    fn push_start_arg(&self, pid: Pid, arg: u32) -> LinuxResult<(VirtAddr, VirtAddr)> {
        let mm = &self.collab.mm;
        let top = mm.alloc_user_stack(pid, self.config().user_stack_size)?;
        let sp = VirtAddr::from_usize(top.as_usize() - 8);
        let mut words = [0u8; 8];
        words[4..].copy_from_slice(&arg.to_le_bytes());
        if let Err(err) = mm.copy_to_user(pid, sp, &words) {
            mm.free_user_stack(pid, top);
            return Err(err);
        }
        Ok((top, sp))
    }

    /// `execve` for the current task.
    ///
    /// Every other task of the process is terminated, caught signals go back
    /// to their default action, and a set-user-id image raises the effective
    /// and saved uid. `tf` is rewritten to enter the new image.
    pub fn exec(
        &self,
        tf: &mut TrapFrame,
        path: &str,
        argv: Vec<String>,
        envp: Vec<String>,
    ) -> LinuxResult<()> {
        let image = self.collab.fs.open_image(path)?;
        let mut table = self.lock();
        let (tid, pid) = self.current_locked(&table)?;
        let loaded = self.collab.mm.load_image(pid, &image, &argv, &envp)?;

        // user stacks went away with the old address space
        for other in table.thread_ids(pid) {
            table.expect_thread_mut(other).data.user_stack = None;
            if other != tid {
                self.terminate_task_locked(&mut table, other, ExitStatus::Exited(0));
            }
        }
        let process = table.expect_process_mut(pid);
        process.mark_exec();
        let data = &mut process.data;
        data.signal.reset_on_exec();
        if image.set_uid {
            data.cred.euid = image.owner;
            data.cred.suid = image.owner;
        }
        data.command_line = argv;
        self.collab.fs.on_exec(pid);

        *tf = TrapFrame::new_user(loaded.entry, loaded.stack_pointer);
        table.expect_thread_mut(tid).data.context = *tf;
        info!("[task] {} exec {}", pid, image.path);
        Ok(())
    }
}
