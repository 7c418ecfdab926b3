use crate::syscall::handle_syscall;
use kestrel_core::{Kernel, TaskState, TrapFrame};

/// `int 0x80`
pub const SYSCALL_VECTOR: u32 = 0x80;

/// Entry from the trap stub for a trap taken in user mode.
///
/// Runs the system call if it is one, then delivers pending signals. Returns
/// whether the current task goes back to user mode with `tf`; `false` means
/// it exited or stopped and the caller must schedule something else.
pub fn handle_user_trap(kernel: &Kernel, tf: &mut TrapFrame) -> bool {
    let tid = kernel.current_tid();
    if tf.trapno == SYSCALL_VECTOR {
        handle_syscall(kernel, tf);
    }
    if !is_runnable(kernel.task_state(tid)) {
        return false;
    }
    kernel.process_signals(tf);
    let runnable = is_runnable(kernel.task_state(tid));
    if !runnable {
        debug!("[trap] task {} does not return to user mode", tid);
    }
    runnable
}

fn is_runnable(state: Option<TaskState>) -> bool {
    matches!(state, Some(TaskState::Ready | TaskState::Running))
}
