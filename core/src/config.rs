//! Kernel limits and defaults.

/// Capacity of the process table, idle process included.
pub const MAX_PROCESSES: usize = 64;
/// Capacity of the task table, bootstrap and idle tasks included.
pub const MAX_TASKS: usize = 256;
/// Kernel stack size of each task.
pub const KERNEL_STACK_SIZE: usize = 0x4000;
/// User stack size of a task created inside an existing process.
pub const USER_STACK_SIZE: usize = 0x1_0000;
/// Scheduling priority of tasks that inherit none.
pub const DEFAULT_PRIORITY: u8 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelConfig {
    pub max_processes: usize,
    pub max_tasks: usize,
    pub kernel_stack_size: usize,
    pub user_stack_size: usize,
    pub default_priority: u8,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            max_processes: MAX_PROCESSES,
            max_tasks: MAX_TASKS,
            kernel_stack_size: KERNEL_STACK_SIZE,
            user_stack_size: USER_STACK_SIZE,
            default_priority: DEFAULT_PRIORITY,
        }
    }
}
