mod common;

use common::*;
use kestrel_api::imp::task::{sys_tiocgpgrp, sys_tiocsctty, tty_detach};
use kestrel_core::wait::WaitStatus;
use syscalls::x86::Sysno;

const EPERM: isize = -1;
const TTY: u32 = 1;
const OTHER_TTY: u32 = 2;

#[test]
fn a_terminal_controls_one_session() {
    let (env, init) = boot();
    let kernel = &env.kernel;
    let a = fork(&env, init);
    let b = fork(&env, init);
    assert_eq!(call(&env, a, Sysno::setsid, &[]), a as isize);
    assert_eq!(call(&env, b, Sysno::setsid, &[]), b as isize);

    env.run_as_process(a);
    assert_eq!(sys_tiocsctty(kernel, TTY), Ok(0));
    assert_eq!(sys_tiocsctty(kernel, OTHER_TTY).unwrap_err().code(), 1);
    env.run_as_process(b);
    assert_eq!(sys_tiocsctty(kernel, TTY).unwrap_err().code(), 1);

    // a member of a's session, not its leader
    let member = fork(&env, a);
    env.run_as_process(member);
    assert_eq!(sys_tiocsctty(kernel, OTHER_TTY).unwrap_err().code(), 1);
    assert_eq!(env.terminal.foreground(TTY), Some(a));

    assert_eq!(tty_detach(kernel, TTY).map(|d| d.sid), Some(a));
    env.run_as_process(b);
    assert_eq!(sys_tiocsctty(kernel, TTY), Ok(0));
    assert_eq!(env.terminal.foreground(TTY), Some(b));
}

#[test]
fn process_groups_stay_inside_the_session() {
    let (env, init) = boot();
    let shell = fork(&env, init);
    assert_eq!(call(&env, shell, Sysno::setsid, &[]), shell as isize);
    assert_eq!(call(&env, shell, Sysno::setsid, &[]), EPERM);
    let job = fork(&env, shell);
    assert_eq!(call(&env, shell, Sysno::setpgid, &[job as usize, 0]), 0);
    assert_eq!(call(&env, job, Sysno::getpgrp, &[]), job as isize);
    assert_eq!(call(&env, job, Sysno::getsid, &[0]), shell as isize);

    // init's group lives in another session
    assert_eq!(call(&env, shell, Sysno::setpgid, &[job as usize, init as usize]), EPERM);
    // not a child of the caller
    assert_eq!(call(&env, init, Sysno::setpgid, &[job as usize, job as usize]), -3);
    assert_eq!(call(&env, shell, Sysno::setpgid, &[0, job as usize]), EPERM);
}

#[test]
fn session_leader_exit_hangs_up_the_foreground_group() {
    let (env, init) = boot();
    let kernel = &env.kernel;
    let shell = fork(&env, init);
    call(&env, shell, Sysno::setsid, &[]);
    env.run_as_process(shell);
    assert_eq!(sys_tiocsctty(kernel, TTY), Ok(0));
    let job = fork(&env, shell);

    call(&env, shell, Sysno::exit_group, &[0]);
    assert_eq!(call(&env, job, Sysno::getppid, &[]), init as isize);
    env.run_as_process(job);
    assert!(sys_tiocgpgrp(kernel, TTY, SCRATCH.into()).is_err());

    let (_, resumes) = trap(&env, job, Sysno::getpid, &[]);
    assert!(!resumes);
    assert_eq!(call(&env, init, Sysno::waitpid, &[job as usize, SCRATCH, 0]), job as isize);
    let status = read_i32(&env, init, SCRATCH);
    assert_eq!(WaitStatus::decode(status), WaitStatus::Signaled(1));
    assert_eq!(call(&env, init, Sysno::waitpid, &[shell as usize, 0, 0]), shell as isize);
}
