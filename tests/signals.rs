mod common;

use common::*;
use kestrel_core::TaskState;
use kestrel_core::mock::TRAMPOLINE;
use kestrel_core::wait::WaitStatus;
use syscalls::x86::Sysno;

const SIGHUP: usize = 1;
const SIGKILL: usize = 9;
const SIGUSR1: usize = 10;
const SIGCHLD: usize = 17;
const SIGCONT: usize = 18;
const SIGSTOP: usize = 19;
const SIGTSTP: usize = 20;
const SIGTTIN: usize = 21;

const SIG_DFL: u32 = 0;
const SIG_IGN: u32 = 1;
const HANDLER: u32 = 0x0804_9000;

const WUNTRACED: usize = 2;
const WCONTINUED: usize = 8;

fn block(env: &kestrel_core::mock::MockEnv, pid: u32, set: u64) {
    write_u64(env, pid, SCRATCH, set);
    assert_eq!(call(env, pid, Sysno::rt_sigprocmask, &[SIG_BLOCK, SCRATCH, 0, 8]), 0);
}

fn pending(env: &kestrel_core::mock::MockEnv, pid: u32) -> u64 {
    assert_eq!(call(env, pid, Sysno::rt_sigpending, &[SCRATCH + 8, 8]), 0);
    read_u64(env, pid, SCRATCH + 8)
}

#[test]
fn ignoring_a_blocked_pending_signal_discards_it() {
    let (env, init) = boot();
    assert_eq!(fork(&env, init), 2);
    assert_eq!(fork(&env, init), 3);

    block(&env, 3, sig_bit(SIGUSR1));
    assert_eq!(call(&env, init, Sysno::kill, &[3, SIGUSR1]), 0);
    assert_eq!(pending(&env, 3), sig_bit(SIGUSR1));
    assert_eq!(set_handler(&env, 3, SIGUSR1, SIG_IGN), 0);
    assert_eq!(pending(&env, 3), 0);
}

#[test]
fn default_action_keeps_pending_unless_it_ignores() {
    let (env, init) = boot();
    let child = fork(&env, init);
    block(&env, child, sig_bit(SIGUSR1) | sig_bit(SIGCHLD));
    call(&env, init, Sysno::kill, &[child as usize, SIGUSR1]);
    call(&env, init, Sysno::kill, &[child as usize, SIGCHLD]);
    assert_eq!(pending(&env, child), sig_bit(SIGUSR1) | sig_bit(SIGCHLD));

    assert_eq!(set_handler(&env, child, SIGUSR1, SIG_DFL), 0);
    assert_eq!(set_handler(&env, child, SIGCHLD, SIG_DFL), 0);
    assert_eq!(pending(&env, child), sig_bit(SIGUSR1));
}

#[test]
fn blocked_mask_never_holds_kill_or_stop() {
    let (env, init) = boot();
    let masks = [u64::MAX, sig_bit(SIGKILL) | sig_bit(SIGSTOP), 0x5555_5555_5555_5555, 0];
    for how in [SIG_BLOCK, SIG_UNBLOCK, SIG_SETMASK] {
        for mask in masks {
            write_u64(&env, init, SCRATCH, mask);
            let ret = call(&env, init, Sysno::rt_sigprocmask, &[how, SCRATCH, SCRATCH + 8, 8]);
            assert_eq!(ret, 0);
            assert_eq!(call(&env, init, Sysno::rt_sigprocmask, &[how, 0, SCRATCH + 8, 8]), 0);
            let blocked = read_u64(&env, init, SCRATCH + 8);
            assert_eq!(blocked & (sig_bit(SIGKILL) | sig_bit(SIGSTOP)), 0, "how {} mask {:#x}", how, mask);
        }
    }
    assert_eq!(call(&env, init, Sysno::rt_sigprocmask, &[3, SCRATCH, 0, 8]), -22);
}

#[test]
fn stop_and_continue_cancel_each_other() {
    let (env, init) = boot();
    let child = fork(&env, init);
    block(&env, child, sig_bit(SIGTSTP) | sig_bit(SIGTTIN) | sig_bit(SIGCONT));
    let kill = |signo: usize| call(&env, init, Sysno::kill, &[child as usize, signo]);

    kill(SIGTSTP);
    assert_eq!(pending(&env, child), sig_bit(SIGTSTP));
    kill(SIGCONT);
    assert_eq!(pending(&env, child), 0);
    kill(SIGCONT);
    assert_eq!(pending(&env, child), sig_bit(SIGCONT));
    kill(SIGTTIN);
    assert_eq!(pending(&env, child), 0);
}

#[test]
fn handler_runs_and_sigreturn_restores() {
    let (env, init) = boot();
    let child = fork(&env, init);
    assert_eq!(set_handler(&env, child, SIGUSR1, HANDLER), 0);

    let (mut tf, resumes) = trap(&env, child, Sysno::kill, &[child as usize, SIGUSR1]);
    assert!(resumes);
    let before = syscall_frame(&env, child, Sysno::kill, &[child as usize, SIGUSR1]);
    assert_eq!(tf.ip(), HANDLER as usize);
    assert_eq!(tf.eax, SIGUSR1 as u32);
    assert!(tf.sp() < before.sp());
    assert_eq!(env.mm.read_u32(child, tf.sp()), Some(TRAMPOLINE as u32));
    assert_eq!(env.mm.read_u32(child, tf.sp() + 4), Some(SIGUSR1 as u32));

    // the signal is blocked while its handler runs
    assert_eq!(call(&env, child, Sysno::rt_sigprocmask, &[SIG_BLOCK, 0, SCRATCH, 8]), 0);
    assert_eq!(read_u64(&env, child, SCRATCH), sig_bit(SIGUSR1));

    // handler returns into the trampoline, which pops the argument and traps
    tf.set_sp(tf.sp() + 8);
    tf.eax = Sysno::sigreturn.id() as u32;
    env.run_as_process(child);
    assert!(kestrel::handle_user_trap(&env.kernel, &mut tf));
    assert_eq!(tf.ip(), before.ip());
    assert_eq!(tf.sp(), before.sp());
    assert_eq!(tf.ebx, child);
    assert_eq!(tf.retval(), 0);
    assert_eq!(call(&env, child, Sysno::rt_sigprocmask, &[SIG_BLOCK, 0, SCRATCH, 8]), 0);
    assert_eq!(read_u64(&env, child, SCRATCH), 0);
}

#[test]
fn default_terminate_is_reported_as_signaled() {
    let (env, init) = boot();
    let child = fork(&env, init);
    assert_eq!(call(&env, init, Sysno::kill, &[child as usize, SIGHUP]), 0);
    let (_, resumes) = trap(&env, child, Sysno::getpid, &[]);
    assert!(!resumes);
    assert_eq!(call(&env, init, Sysno::waitpid, &[child as usize, SCRATCH, 0]), child as isize);
    let status = read_i32(&env, init, SCRATCH);
    assert_eq!(WaitStatus::decode(status), WaitStatus::Signaled(SIGHUP as u8));
}

#[test]
fn stop_and_continue_are_reported_to_the_parent() {
    let (env, init) = boot();
    let child = fork(&env, init);
    let tid = env.run_as_process(child);
    assert_eq!(call(&env, init, Sysno::kill, &[child as usize, SIGSTOP]), 0);
    let (_, resumes) = trap(&env, child, Sysno::getpid, &[]);
    assert!(!resumes);
    assert_eq!(env.kernel.task_state(tid), Some(TaskState::Stopped));

    assert_eq!(
        call(&env, init, Sysno::waitpid, &[child as usize, SCRATCH, WUNTRACED]),
        child as isize
    );
    let status = read_i32(&env, init, SCRATCH);
    assert_eq!(WaitStatus::decode(status), WaitStatus::Stopped(SIGSTOP as u8));

    assert_eq!(call(&env, init, Sysno::kill, &[child as usize, SIGCONT]), 0);
    assert!(env.scheduler.is_ready(tid));
    assert_eq!(
        call(&env, init, Sysno::waitpid, &[child as usize, SCRATCH, WCONTINUED]),
        child as isize
    );
    assert_eq!(WaitStatus::decode(read_i32(&env, init, SCRATCH)), WaitStatus::Continued);
}

#[test]
fn kill_permissions_follow_user_ids() {
    let (env, init) = boot();
    let a = fork(&env, init);
    let b = fork(&env, init);
    assert_eq!(call(&env, a, Sysno::setuid32, &[1000]), 0);
    assert_eq!(call(&env, b, Sysno::setuid32, &[2000]), 0);
    assert_eq!(call(&env, a, Sysno::kill, &[b as usize, SIGUSR1]), -1);
    assert_eq!(call(&env, a, Sysno::kill, &[b as usize, 0]), -1);
    assert_eq!(call(&env, init, Sysno::kill, &[b as usize, 0]), 0);
    assert_eq!(call(&env, a, Sysno::kill, &[4242, 0]), -3);
}

#[test]
fn sigsuspend_is_interrupted_and_restores_the_mask() {
    let (env, init) = boot();
    let child = fork(&env, init);
    assert_eq!(set_handler(&env, child, SIGUSR1, HANDLER), 0);
    block(&env, child, sig_bit(SIGUSR1));
    write_u64(&env, child, SCRATCH, 0);

    let kernel = env.kernel.clone();
    env.scheduler.on_block(move || {
        kernel.raise(child, kestrel_signal::Signo::SIGUSR1).unwrap();
    });
    let (mut tf, resumes) = trap(&env, child, Sysno::rt_sigsuspend, &[SCRATCH, 8]);
    assert!(resumes);
    assert_eq!(tf.ip(), HANDLER as usize);
    // the saved eax, after the return address, signo and seven registers
    let saved_eax = env.mm.read_u32(child, tf.sp() + 8 + 7 * 4);
    assert_eq!(saved_eax, Some(-4i32 as u32));

    tf.set_sp(tf.sp() + 8);
    tf.eax = Sysno::rt_sigreturn.id() as u32;
    env.run_as_process(child);
    assert!(kestrel::handle_user_trap(&env.kernel, &mut tf));
    assert_eq!(tf.retval(), -4);
    assert_eq!(call(&env, child, Sysno::rt_sigprocmask, &[SIG_BLOCK, 0, SCRATCH, 8]), 0);
    assert_eq!(read_u64(&env, child, SCRATCH), sig_bit(SIGUSR1));
}
