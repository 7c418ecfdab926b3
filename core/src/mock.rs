//! In-memory collaborators for exercising the core without hardware.
//!
//! Blocking is simulated: [`MockScheduler::block`] runs the next hook queued
//! with [`MockScheduler::on_block`] (with the process table unlocked) and
//! returns. A block with no hook queued would never be woken, so it panics,
//! unless a wake token left by an early `wake` lets it return at once.

use crate::collab::{
    Collaborators, ExecImage, FileSystem, LoadedImage, MemoryManager, Scheduler, TerminalDriver,
};
use crate::config::KernelConfig;
use crate::kernel::Kernel;
use crate::trapframe::TrapFrame;
use alloc::boxed::Box;
use alloc::collections::{BTreeMap, BTreeSet, VecDeque};
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;
use axerrno::{LinuxError, LinuxResult};
use kestrel_process::{BOOT_TID, Pid, TerminalId, Tid};
use memory_addr::VirtAddr;
use spin::Mutex;

/// Entry point of every image the mock loader maps.
pub const IMAGE_ENTRY: usize = 0x0804_8000;
/// Top of the stack an image is loaded with.
pub const STACK_TOP: usize = 0xc000_0000;
pub const TRAMPOLINE: usize = 0xffff_e000;
const IMAGE_STACK_SIZE: usize = 0x1_0000;
const GUARD_SIZE: usize = 0x1000;
const KERNEL_STACK_BASE: usize = 0xd000_0000;

struct Region {
    start: usize,
    bytes: Vec<u8>,
}

impl Region {
    fn zeroed(start: usize, len: usize) -> Self {
        Self {
            start,
            bytes: vec![0; len],
        }
    }

    fn range(&self, addr: usize, len: usize) -> Option<core::ops::Range<usize>> {
        let offset = addr.checked_sub(self.start)?;
        let end = offset.checked_add(len)?;
        (end <= self.bytes.len()).then_some(offset..end)
    }
}

#[derive(Default)]
struct MemoryState {
    spaces: BTreeMap<Pid, Vec<Region>>,
    kernel_stacks: BTreeSet<usize>,
    next_kernel_stack: usize,
    fail_clone: bool,
    fail_kernel_stack: bool,
    fail_copy_to_user: bool,
}

/// Address spaces as lists of byte regions.
#[derive(Default)]
pub struct MockMemory {
    state: Mutex<MemoryState>,
}

impl MockMemory {
    pub fn fail_next_clone(&self) {
        self.state.lock().fail_clone = true;
    }

    pub fn fail_next_kernel_stack(&self) {
        self.state.lock().fail_kernel_stack = true;
    }

    pub fn fail_next_copy_to_user(&self) {
        self.state.lock().fail_copy_to_user = true;
    }

    pub fn live_kernel_stacks(&self) -> usize {
        self.state.lock().kernel_stacks.len()
    }

    /// Number of regions mapped in `pid`.
    pub fn regions(&self, pid: Pid) -> usize {
        self.state.lock().spaces.get(&pid).map_or(0, Vec::len)
    }

    /// Highest mapped address of `pid`, if anything is mapped.
    pub fn stack_top(&self, pid: Pid) -> Option<usize> {
        let state = self.state.lock();
        state
            .spaces
            .get(&pid)?
            .iter()
            .map(|r| r.start + r.bytes.len())
            .max()
    }

    pub fn read_u32(&self, pid: Pid, addr: usize) -> Option<u32> {
        let mut word = [0u8; 4];
        self.copy_from_user(pid, VirtAddr::from_usize(addr), &mut word)
            .ok()?;
        Some(u32::from_le_bytes(word))
    }
}

impl MemoryManager for MockMemory {
    fn alloc_kernel_stack(&self, size: usize) -> LinuxResult<VirtAddr> {
        let mut state = self.state.lock();
        if core::mem::take(&mut state.fail_kernel_stack) {
            return Err(LinuxError::ENOMEM);
        }
        let base = KERNEL_STACK_BASE + state.next_kernel_stack;
        state.next_kernel_stack += size;
        state.kernel_stacks.insert(base);
        Ok(VirtAddr::from_usize(base))
    }

    fn free_kernel_stack(&self, base: VirtAddr) {
        self.state.lock().kernel_stacks.remove(&base.as_usize());
    }

    fn clone_address_space(&self, parent: Pid, child: Pid) -> LinuxResult<()> {
        let mut state = self.state.lock();
        if core::mem::take(&mut state.fail_clone) {
            return Err(LinuxError::ENOMEM);
        }
        let copy = state
            .spaces
            .get(&parent)
            .map(|regions| {
                regions
                    .iter()
                    .map(|r| Region {
                        start: r.start,
                        bytes: r.bytes.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        state.spaces.insert(child, copy);
        Ok(())
    }

    fn release_address_space(&self, pid: Pid) {
        self.state.lock().spaces.remove(&pid);
    }

    fn alloc_user_stack(&self, pid: Pid, size: usize) -> LinuxResult<VirtAddr> {
        let mut state = self.state.lock();
        let regions = state.spaces.entry(pid).or_default();
        let lowest = regions.iter().map(|r| r.start).min().unwrap_or(STACK_TOP);
        let start = lowest
            .checked_sub(GUARD_SIZE + size)
            .ok_or(LinuxError::ENOMEM)?;
        regions.push(Region::zeroed(start, size));
        Ok(VirtAddr::from_usize(start + size))
    }

    fn free_user_stack(&self, pid: Pid, top: VirtAddr) {
        let mut state = self.state.lock();
        if let Some(regions) = state.spaces.get_mut(&pid) {
            regions.retain(|r| r.start + r.bytes.len() != top.as_usize());
        }
    }

    fn load_image(
        &self,
        pid: Pid,
        _image: &ExecImage,
        _argv: &[String],
        _envp: &[String],
    ) -> LinuxResult<LoadedImage> {
        let stack = Region::zeroed(STACK_TOP - IMAGE_STACK_SIZE, IMAGE_STACK_SIZE);
        self.state.lock().spaces.insert(pid, vec![stack]);
        Ok(LoadedImage {
            entry: VirtAddr::from_usize(IMAGE_ENTRY),
            stack_pointer: VirtAddr::from_usize(STACK_TOP - 16),
        })
    }

    fn copy_to_user(&self, pid: Pid, addr: VirtAddr, data: &[u8]) -> LinuxResult<()> {
        let mut state = self.state.lock();
        if core::mem::take(&mut state.fail_copy_to_user) {
            return Err(LinuxError::EFAULT);
        }
        let regions = state.spaces.get_mut(&pid).ok_or(LinuxError::EFAULT)?;
        for region in regions {
            if let Some(range) = region.range(addr.as_usize(), data.len()) {
                region.bytes[range].copy_from_slice(data);
                return Ok(());
            }
        }
        Err(LinuxError::EFAULT)
    }

    fn copy_from_user(&self, pid: Pid, addr: VirtAddr, buf: &mut [u8]) -> LinuxResult<()> {
        let state = self.state.lock();
        let regions = state.spaces.get(&pid).ok_or(LinuxError::EFAULT)?;
        for region in regions {
            if let Some(range) = region.range(addr.as_usize(), buf.len()) {
                buf.copy_from_slice(&region.bytes[range]);
                return Ok(());
            }
        }
        Err(LinuxError::EFAULT)
    }

    fn signal_trampoline(&self) -> VirtAddr {
        VirtAddr::from_usize(TRAMPOLINE)
    }
}

type BlockHook = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct RunQueue {
    current: Tid,
    ready: BTreeSet<Tid>,
    blocked: BTreeSet<Tid>,
    tokens: BTreeSet<Tid>,
}

#[derive(Default)]
pub struct MockScheduler {
    queue: Mutex<RunQueue>,
    hooks: Mutex<VecDeque<BlockHook>>,
}

impl MockScheduler {
    pub fn set_current(&self, tid: Tid) {
        self.queue.lock().current = tid;
    }

    pub fn is_ready(&self, tid: Tid) -> bool {
        self.queue.lock().ready.contains(&tid)
    }

    pub fn is_blocked(&self, tid: Tid) -> bool {
        self.queue.lock().blocked.contains(&tid)
    }

    /// A wake reached `tid` before it went to sleep.
    pub fn has_wake_token(&self, tid: Tid) -> bool {
        self.queue.lock().tokens.contains(&tid)
    }

    /// Queue what "the rest of the system" does during the next block.
    pub fn on_block<F>(&self, hook: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.hooks.lock().push_back(Box::new(hook));
    }
}

impl Scheduler for MockScheduler {
    fn current(&self) -> Tid {
        self.queue.lock().current
    }

    fn enqueue(&self, tid: Tid, _priority: u8) {
        let mut queue = self.queue.lock();
        queue.blocked.remove(&tid);
        queue.ready.insert(tid);
    }

    fn dequeue(&self, tid: Tid) {
        let mut queue = self.queue.lock();
        queue.ready.remove(&tid);
        queue.blocked.remove(&tid);
        queue.tokens.remove(&tid);
    }

    fn block(&self, tid: Tid) {
        {
            let mut queue = self.queue.lock();
            if queue.tokens.remove(&tid) {
                trace!("[mock] task {} consumed a wake token", tid);
                return;
            }
            queue.ready.remove(&tid);
            queue.blocked.insert(tid);
        }
        let hook = self.hooks.lock().pop_front();
        let Some(hook) = hook else {
            panic!("task {} blocked with nothing left to wake it", tid);
        };
        let current = self.current();
        hook();
        self.set_current(current);
    }

    fn wake(&self, tid: Tid) {
        let mut queue = self.queue.lock();
        if queue.blocked.remove(&tid) {
            queue.ready.insert(tid);
        } else {
            queue.tokens.insert(tid);
        }
    }
}

/// Remembers the foreground group last set per terminal.
#[derive(Default)]
pub struct MockTerminal {
    foreground: Mutex<BTreeMap<TerminalId, Pid>>,
}

impl MockTerminal {
    pub fn foreground(&self, terminal: TerminalId) -> Option<Pid> {
        self.foreground.lock().get(&terminal).copied()
    }
}

impl TerminalDriver for MockTerminal {
    fn set_foreground_group(&self, terminal: TerminalId, pgid: Pid) {
        self.foreground.lock().insert(terminal, pgid);
    }
}

/// A file system holding nothing but executables. `/sbin/init` is always
/// there.
pub struct MockFs {
    images: Mutex<BTreeMap<String, ExecImage>>,
    closed: Mutex<Vec<Pid>>,
    execs: Mutex<Vec<Pid>>,
}

impl Default for MockFs {
    fn default() -> Self {
        let fs = Self {
            images: Mutex::new(BTreeMap::new()),
            closed: Mutex::new(Vec::new()),
            execs: Mutex::new(Vec::new()),
        };
        fs.add_image("/sbin/init", 0, false);
        fs
    }
}

impl MockFs {
    pub fn add_image(&self, path: &str, owner: u32, set_uid: bool) {
        let image = ExecImage {
            path: String::from(path),
            owner,
            set_uid,
        };
        self.images.lock().insert(String::from(path), image);
    }

    /// Processes whose files were closed on exit.
    pub fn closed(&self) -> Vec<Pid> {
        self.closed.lock().clone()
    }

    /// Processes that completed an exec, in order.
    pub fn exec_calls(&self) -> Vec<Pid> {
        self.execs.lock().clone()
    }
}

impl FileSystem for MockFs {
    fn open_image(&self, path: &str) -> LinuxResult<ExecImage> {
        self.images
            .lock()
            .get(path)
            .cloned()
            .ok_or(LinuxError::ENOENT)
    }

    fn close_all(&self, pid: Pid) {
        self.closed.lock().push(pid);
    }

    fn on_exec(&self, pid: Pid) {
        self.execs.lock().push(pid);
    }
}

/// A booted [`Kernel`] together with handles on its mock collaborators.
pub struct MockEnv {
    pub kernel: Arc<Kernel>,
    pub mm: Arc<MockMemory>,
    pub scheduler: Arc<MockScheduler>,
    pub terminal: Arc<MockTerminal>,
    pub fs: Arc<MockFs>,
}

impl MockEnv {
    pub fn boot() -> Self {
        Self::boot_with(KernelConfig::default())
    }

    /// Only the idle process exists, running its bootstrap task.
    pub fn boot_with(config: KernelConfig) -> Self {
        let mm = Arc::new(MockMemory::default());
        let scheduler = Arc::new(MockScheduler::default());
        let terminal = Arc::new(MockTerminal::default());
        let fs = Arc::new(MockFs::default());
        let collab = Collaborators {
            mm: mm.clone(),
            scheduler: scheduler.clone(),
            terminal: terminal.clone(),
            fs: fs.clone(),
        };
        scheduler.set_current(BOOT_TID);
        Self {
            kernel: Arc::new(Kernel::new(collab, config)),
            mm,
            scheduler,
            terminal,
            fs,
        }
    }

    /// Fork init from the bootstrap task and exec `/sbin/init` in it. Leaves
    /// init's task current.
    pub fn spawn_init(&self) -> (Pid, Tid) {
        self.run_as(BOOT_TID);
        let pid = match self.kernel.fork(&TrapFrame::default()) {
            Ok(pid) => pid,
            Err(err) => panic!("cannot fork init: {:?}", err),
        };
        let tid = self.run_as_process(pid);
        let mut tf = TrapFrame::default();
        if let Err(err) = self
            .kernel
            .exec(&mut tf, "/sbin/init", vec![String::from("init")], Vec::new())
        {
            panic!("cannot exec init: {:?}", err);
        }
        (pid, tid)
    }

    pub fn run_as(&self, tid: Tid) {
        self.scheduler.set_current(tid);
    }

    /// Make the lowest task of `pid` current and return it.
    pub fn run_as_process(&self, pid: Pid) -> Tid {
        let tid = self
            .kernel
            .lock()
            .process(pid)
            .and_then(|p| p.first_thread())
            .unwrap_or_else(|| panic!("process {} has no task", pid));
        self.run_as(tid);
        tid
    }

    /// A user frame of `pid` somewhere inside its highest stack.
    pub fn user_frame(&self, pid: Pid) -> TrapFrame {
        let top = self.mm.stack_top(pid).unwrap_or(STACK_TOP);
        TrapFrame::new_user(
            VirtAddr::from_usize(IMAGE_ENTRY),
            VirtAddr::from_usize(top - 0x200),
        )
    }
}
