//! Interfaces of the subsystems the process core drives but does not own.
//!
//! Every method may be called with the process table locked, so none of them
//! may call back into the [`Kernel`](crate::Kernel) or block, with the single
//! exception of [`Scheduler::block`], which is always called unlocked.

use alloc::string::String;
use alloc::sync::Arc;
use axerrno::LinuxResult;
use kestrel_process::{Pid, TerminalId, Tid};
use memory_addr::VirtAddr;

/// An executable resolved by the file system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecImage {
    pub path: String,
    /// Owner uid of the file.
    pub owner: u32,
    /// The set-user-id bit is set on the file.
    pub set_uid: bool,
}

/// Where a freshly loaded image starts running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadedImage {
    pub entry: VirtAddr,
    pub stack_pointer: VirtAddr,
}

pub trait MemoryManager: Send + Sync {
    /// Reserve a kernel stack; returns its base.
    fn alloc_kernel_stack(&self, size: usize) -> LinuxResult<VirtAddr>;
    fn free_kernel_stack(&self, base: VirtAddr);
    /// Give `child` a copy of the address space of `parent`.
    fn clone_address_space(&self, parent: Pid, child: Pid) -> LinuxResult<()>;
    fn release_address_space(&self, pid: Pid);
    /// Map a new user stack in `pid`; returns its top.
    fn alloc_user_stack(&self, pid: Pid, size: usize) -> LinuxResult<VirtAddr>;
    /// Unmap the user stack whose top [`MemoryManager::alloc_user_stack`]
    /// returned.
    fn free_user_stack(&self, pid: Pid, top: VirtAddr);
    /// Replace the address space of `pid` with `image`, with `argv` and
    /// `envp` laid out on the new stack. Every mapping of the old space goes
    /// with it, user stacks included.
    fn load_image(
        &self,
        pid: Pid,
        image: &ExecImage,
        argv: &[String],
        envp: &[String],
    ) -> LinuxResult<LoadedImage>;
    fn copy_to_user(&self, pid: Pid, addr: VirtAddr, data: &[u8]) -> LinuxResult<()>;
    fn copy_from_user(&self, pid: Pid, addr: VirtAddr, buf: &mut [u8]) -> LinuxResult<()>;
    /// Code in every address space that performs `sigreturn`.
    fn signal_trampoline(&self) -> VirtAddr;
}

pub trait Scheduler: Send + Sync {
    /// The task running on this CPU.
    fn current(&self) -> Tid;
    fn enqueue(&self, tid: Tid, priority: u8);
    fn dequeue(&self, tid: Tid);
    /// Put the current task `tid` to sleep until [`Scheduler::wake`].
    /// Spurious returns are allowed.
    ///
    /// The task is marked blocked in the process table before the lock is
    /// dropped and this is called, so a `wake` may arrive first. Such a wake
    /// must not be lost: it leaves a token that makes the next `block` of
    /// `tid` consume it and return at once.
    fn block(&self, tid: Tid);
    /// Make `tid` runnable, or leave a wake token if it is not asleep yet.
    fn wake(&self, tid: Tid);
}

pub trait TerminalDriver: Send + Sync {
    fn set_foreground_group(&self, terminal: TerminalId, pgid: Pid);
}

pub trait FileSystem: Send + Sync {
    fn open_image(&self, path: &str) -> LinuxResult<ExecImage>;
    /// Close every file of a dying process.
    fn close_all(&self, pid: Pid);
    /// Close-on-exec and friends.
    fn on_exec(&self, pid: Pid);
}

#[derive(Clone)]
pub struct Collaborators {
    pub mm: Arc<dyn MemoryManager>,
    pub scheduler: Arc<dyn Scheduler>,
    pub terminal: Arc<dyn TerminalDriver>,
    pub fs: Arc<dyn FileSystem>,
}
