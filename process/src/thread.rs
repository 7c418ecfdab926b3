use crate::table::ProcessTable;
use crate::{Pid, Tid};
use axerrno::{LinuxError, LinuxResult};

pub struct Thread<T> {
    tid: Tid,
    pid: Pid,
    /// Kernel data bound to this thread.
    pub data: T,
}

impl<T> Thread<T> {
    pub(crate) fn new(tid: Tid, pid: Pid, data: T) -> Self {
        Self { tid, pid, data }
    }

    pub fn get_tid(&self) -> Tid {
        self.tid
    }

    /// Id of the owning process.
    pub fn get_pid(&self) -> Pid {
        self.pid
    }
}

impl<P, T> ProcessTable<P, T> {
    /// Add a thread to a live process.
    pub fn create_thread(&mut self, pid: Pid, data: T) -> LinuxResult<Tid> {
        match self.process(pid) {
            Some(p) if !p.is_zombie() => {}
            _ => return Err(LinuxError::ESRCH),
        }
        if !self.has_thread_slot() {
            warn!("[process] thread table full, cannot add to {}", pid);
            return Err(LinuxError::EAGAIN);
        }
        let tid = self.take_tid();
        self.threads.insert(tid, Thread::new(tid, pid, data));
        self.expect_process_mut(pid).threads.insert(tid);
        debug!("[process] thread {} created in {}", tid, pid);
        Ok(tid)
    }

    /// Remove a thread from the tables.
    ///
    /// Returns the thread and whether it was the last one of its process; in
    /// that case the caller must follow up with [`ProcessTable::exit`].
    pub fn remove_thread(&mut self, tid: Tid) -> Option<(Thread<T>, bool)> {
        let thread = self.threads.remove(&tid)?;
        let process = self.expect_process_mut(thread.pid);
        process.threads.remove(&tid);
        let last = process.threads.is_empty();
        Some((thread, last))
    }
}

#[cfg(test)]
mod tests {
    use crate::ProcessTable;
    use axerrno::LinuxError;

    #[test]
    fn thread_ids_do_not_consume_pids() {
        let mut t: ProcessTable<(), ()> = ProcessTable::new(8, 8, (), (), ());
        let (init, main) = t.fork(0, (), ()).unwrap();
        assert_eq!(main, 2);
        let extra = t.create_thread(init, ()).unwrap();
        assert_eq!(extra, 3);
        let (next, _) = t.fork(init, (), ()).unwrap();
        assert_eq!(next, 2);
        assert_eq!(t.thread_ids(init), [2, 3]);
        assert_eq!(t.thread(extra).unwrap().get_pid(), init);
    }

    #[test]
    fn last_thread_is_reported() {
        let mut t: ProcessTable<(), ()> = ProcessTable::new(8, 8, (), (), ());
        let (init, main) = t.fork(0, (), ()).unwrap();
        let extra = t.create_thread(init, ()).unwrap();
        assert!(!t.remove_thread(main).unwrap().1);
        assert!(t.remove_thread(extra).unwrap().1);
        assert!(t.remove_thread(extra).is_none());
        assert_eq!(t.create_thread(42, ()), Err(LinuxError::ESRCH));
    }

    #[test]
    fn thread_table_capacity() {
        let mut t: ProcessTable<(), ()> = ProcessTable::new(8, 3, (), (), ());
        let (init, _) = t.fork(0, (), ()).unwrap();
        assert_eq!(t.create_thread(init, ()), Err(LinuxError::EAGAIN));
        assert_eq!(t.peek_next_tid(), 3);
    }
}
