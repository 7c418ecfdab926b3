use crate::types::{NSIG, SignalSet, Signo};
use bitflags::bitflags;
use core::ops::{Index, IndexMut};
use linux_raw_sys::general::{SA_NOCLDSTOP, SA_NODEFER, SA_RESETHAND, SA_RESTORER};
use memory_addr::VirtAddr;

bitflags! {
    /// `sa_flags` bits the kernel honours. Unknown bits are dropped.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct SignalActionFlags: u32 {
        /// For `SIGCHLD`: do not notify the parent when a child stops or
        /// continues.
        const NOCLDSTOP = SA_NOCLDSTOP;
        /// Do not add the signal itself to the mask while its handler runs.
        const NODEFER = SA_NODEFER;
        /// Restore the default disposition once the handler is entered.
        const RESETHAND = SA_RESETHAND;
        /// `sa_restorer` holds the address the handler returns to.
        const RESTORER = SA_RESTORER;
    }
}

/// What a signal does when its disposition is [`SignalDisposition::Default`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultAction {
    Terminate,
    /// Terminate; no core image is written.
    CoreDump,
    Ignore,
    Stop,
    Continue,
}

impl Signo {
    pub fn default_action(self) -> DefaultAction {
        match self {
            Signo::SIGQUIT
            | Signo::SIGILL
            | Signo::SIGTRAP
            | Signo::SIGABRT
            | Signo::SIGBUS
            | Signo::SIGFPE
            | Signo::SIGSEGV
            | Signo::SIGXCPU
            | Signo::SIGXFSZ
            | Signo::SIGSYS => DefaultAction::CoreDump,
            Signo::SIGCHLD | Signo::SIGURG | Signo::SIGWINCH => DefaultAction::Ignore,
            Signo::SIGSTOP | Signo::SIGTSTP | Signo::SIGTTIN | Signo::SIGTTOU => {
                DefaultAction::Stop
            }
            Signo::SIGCONT => DefaultAction::Continue,
            _ => DefaultAction::Terminate,
        }
    }
}

/// A user-space signal handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandlerRef {
    pub entry: VirtAddr,
    /// Where the handler returns to; the kernel trampoline when `None`.
    pub restorer: Option<VirtAddr>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SignalDisposition {
    #[default]
    Default,
    Ignore,
    Handler(HandlerRef),
}

/// One slot of the disposition table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SignalAction {
    pub disposition: SignalDisposition,
    /// Extra signals blocked while the handler runs.
    pub mask: SignalSet,
    pub flags: SignalActionFlags,
}

impl SignalAction {
    pub fn ignore() -> Self {
        Self {
            disposition: SignalDisposition::Ignore,
            ..Default::default()
        }
    }

    pub fn handler(entry: VirtAddr) -> Self {
        Self {
            disposition: SignalDisposition::Handler(HandlerRef {
                entry,
                restorer: None,
            }),
            ..Default::default()
        }
    }

    /// Whether `signo` is discarded under this action, explicitly or because
    /// its default action is to ignore it.
    pub fn is_ignored(&self, signo: Signo) -> bool {
        match self.disposition {
            SignalDisposition::Ignore => true,
            SignalDisposition::Default => signo.default_action() == DefaultAction::Ignore,
            SignalDisposition::Handler(_) => false,
        }
    }
}

/// The per-process disposition table, indexed by [`Signo`].
#[derive(Debug, Clone)]
pub struct SignalActions([SignalAction; NSIG]);

impl Default for SignalActions {
    fn default() -> Self {
        Self([SignalAction::default(); NSIG])
    }
}

impl SignalActions {
    /// Caught signals go back to default across `execve`; ignored ones stay
    /// ignored.
    pub fn reset_handlers(&mut self) {
        for action in self.0.iter_mut() {
            if matches!(action.disposition, SignalDisposition::Handler(_)) {
                *action = SignalAction::default();
            }
        }
    }
}

impl Index<Signo> for SignalActions {
    type Output = SignalAction;
    fn index(&self, signo: Signo) -> &SignalAction {
        &self.0[signo as usize - 1]
    }
}

impl IndexMut<Signo> for SignalActions {
    fn index_mut(&mut self, signo: Signo) -> &mut SignalAction {
        &mut self.0[signo as usize - 1]
    }
}
