#![allow(dead_code)]

use kestrel::{SYSCALL_VECTOR, TrapFrame, handle_syscall, handle_user_trap};
use kestrel_core::collab::MemoryManager;
use kestrel_core::mock::{MockEnv, STACK_TOP};
use kestrel_process::Pid;
use memory_addr::VirtAddr;
use syscalls::x86::Sysno;

/// Free user memory in every process spawned from init.
pub const SCRATCH: usize = STACK_TOP - 0x1000;

pub const SIG_BLOCK: usize = 0;
pub const SIG_UNBLOCK: usize = 1;
pub const SIG_SETMASK: usize = 2;

pub fn boot() -> (MockEnv, Pid) {
    let env = MockEnv::boot();
    let (init, _) = env.spawn_init();
    (env, init)
}

/// A frame of `pid` trapping into `sysno` with `args` in `ebx`, `ecx`, ...
pub fn syscall_frame(env: &MockEnv, pid: Pid, sysno: Sysno, args: &[usize]) -> TrapFrame {
    let mut tf = env.user_frame(pid);
    tf.trapno = SYSCALL_VECTOR;
    tf.eax = sysno.id() as u32;
    let regs = [
        &mut tf.ebx,
        &mut tf.ecx,
        &mut tf.edx,
        &mut tf.esi,
        &mut tf.edi,
        &mut tf.ebp,
    ];
    for (reg, arg) in regs.into_iter().zip(args) {
        *reg = *arg as u32;
    }
    tf
}

/// Run a system call as the first task of `pid`, without signal delivery.
pub fn call(env: &MockEnv, pid: Pid, sysno: Sysno, args: &[usize]) -> isize {
    env.run_as_process(pid);
    let mut tf = syscall_frame(env, pid, sysno, args);
    handle_syscall(&env.kernel, &mut tf);
    tf.retval()
}

/// Like [`call`] but through the whole trap path. Returns the final frame
/// and whether the task goes back to user mode.
pub fn trap(env: &MockEnv, pid: Pid, sysno: Sysno, args: &[usize]) -> (TrapFrame, bool) {
    env.run_as_process(pid);
    let mut tf = syscall_frame(env, pid, sysno, args);
    let resumes = handle_user_trap(&env.kernel, &mut tf);
    (tf, resumes)
}

pub fn fork(env: &MockEnv, parent: Pid) -> Pid {
    let child = call(env, parent, Sysno::fork, &[]);
    assert!(child > 0, "fork from {} failed: {}", parent, child);
    child as Pid
}

pub fn write_bytes(env: &MockEnv, pid: Pid, addr: usize, bytes: &[u8]) {
    env.mm
        .copy_to_user(pid, VirtAddr::from_usize(addr), bytes)
        .unwrap();
}

pub fn write_u64(env: &MockEnv, pid: Pid, addr: usize, value: u64) {
    write_bytes(env, pid, addr, &value.to_le_bytes());
}

pub fn read_u64(env: &MockEnv, pid: Pid, addr: usize) -> u64 {
    let mut buf = [0u8; 8];
    env.mm
        .copy_from_user(pid, VirtAddr::from_usize(addr), &mut buf)
        .unwrap();
    u64::from_le_bytes(buf)
}

pub fn read_i32(env: &MockEnv, pid: Pid, addr: usize) -> i32 {
    env.mm.read_u32(pid, addr).unwrap() as i32
}

/// Install an `rt_sigaction` with the given handler word for `signo` in `pid`.
pub fn set_handler(env: &MockEnv, pid: Pid, signo: usize, handler: u32) -> isize {
    let mut act = [0u8; 20];
    act[..4].copy_from_slice(&handler.to_le_bytes());
    write_bytes(env, pid, SCRATCH + 0x100, &act);
    call(env, pid, Sysno::rt_sigaction, &[signo, SCRATCH + 0x100, 0, 8])
}

pub fn sig_bit(signo: usize) -> u64 {
    1 << (signo - 1)
}
