use crate::action::{
    DefaultAction, HandlerRef, SignalAction, SignalActionFlags, SignalActions, SignalDisposition,
};
use crate::types::{SignalSet, Signo};
use axerrno::{LinuxError, LinuxResult};
use linux_raw_sys::general::{SIG_BLOCK, SIG_SETMASK, SIG_UNBLOCK};
use num_enum::TryFromPrimitive;

/// `how` argument of `sigprocmask`.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
pub enum SigmaskHow {
    Block = SIG_BLOCK,
    Unblock = SIG_UNBLOCK,
    SetMask = SIG_SETMASK,
}

impl SigmaskHow {
    pub fn from_raw(how: u32) -> LinuxResult<Self> {
        Self::try_from(how).map_err(|_| LinuxError::EINVAL)
    }
}

/// Outcome of [`ProcessSignals::raise`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RaiseEffect {
    /// The signal is pending now (or already was).
    Pending,
    /// The signal cancelled pending signals of the opposite job-control kind
    /// and was dropped itself.
    Cancelled,
}

/// What the return-to-user path has to do with one dequeued signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Discarded.
    Ignore(Signo),
    /// Run a user handler. `action` is the action as it was when the signal
    /// was taken; a `RESETHAND` action has already been reset in the table.
    Handler {
        signo: Signo,
        handler: HandlerRef,
        action: SignalAction,
    },
    Stop(Signo),
    Continue(Signo),
    /// Terminate the whole process. Covers the core-dump class too.
    Terminate(Signo),
}

/// Process-wide signal state: the pending set and the disposition table.
#[derive(Debug, Clone, Default)]
pub struct ProcessSignals {
    pending: SignalSet,
    actions: SignalActions,
}

impl ProcessSignals {
    pub fn new() -> Self {
        Self::default()
    }

    /// State for a forked child: same dispositions, nothing pending.
    pub fn inherit(&self) -> Self {
        Self {
            pending: SignalSet::empty(),
            actions: self.actions.clone(),
        }
    }

    pub fn pending(&self) -> SignalSet {
        self.pending
    }

    pub fn action(&self, signo: Signo) -> &SignalAction {
        &self.actions[signo]
    }

    pub fn is_ignored(&self, signo: Signo) -> bool {
        self.actions[signo].is_ignored(signo)
    }

    /// Record a raised signal.
    ///
    /// Stop-class and continue signals annihilate: whichever arrives second
    /// clears the pending ones of the other kind and is not recorded.
    /// `SIGKILL` clears pending stops.
    pub fn raise(&mut self, signo: Signo) -> RaiseEffect {
        let stops = SignalSet::stop_signals();
        if signo.is_stop() && self.pending.has(Signo::SIGCONT) {
            self.pending.remove(Signo::SIGCONT);
            trace!("[signal] {} cancels pending SIGCONT", signo);
            return RaiseEffect::Cancelled;
        }
        if signo == Signo::SIGCONT && !(self.pending & stops).is_empty() {
            self.pending &= !stops;
            trace!("[signal] SIGCONT cancels pending stops");
            return RaiseEffect::Cancelled;
        }
        if signo == Signo::SIGKILL {
            self.pending &= !stops;
        }
        self.pending.add(signo);
        RaiseEffect::Pending
    }

    /// Drop a pending signal; returns whether it was pending.
    pub fn clear(&mut self, signo: Signo) -> bool {
        self.pending.remove(signo)
    }

    /// Install a new action for `signo` and return the previous one.
    ///
    /// Dispositions are otherwise evaluated only at delivery time. The one
    /// exception is here: switching a signal to ignored discards it if it is
    /// already pending.
    pub fn set_action(&mut self, signo: Signo, action: SignalAction) -> LinuxResult<SignalAction> {
        if signo.is_unmaskable() {
            return Err(LinuxError::EINVAL);
        }
        let action = SignalAction {
            mask: action.mask.sanitized(),
            ..action
        };
        let old = core::mem::replace(&mut self.actions[signo], action);
        if action.is_ignored(signo) && self.pending.remove(signo) {
            trace!("[signal] pending {} discarded by ignore", signo);
        }
        Ok(old)
    }

    /// Pending signals not blocked by `blocked`.
    pub fn deliverable(&self, blocked: SignalSet) -> SignalSet {
        self.pending & !blocked.sanitized()
    }

    /// Whether some deliverable signal would actually do something, i.e.
    /// should interrupt a blocking call.
    pub fn has_interrupting(&self, blocked: SignalSet) -> bool {
        self.deliverable(blocked)
            .iter()
            .any(|signo| !self.is_ignored(signo))
    }

    /// Take the lowest deliverable signal and decide what it does.
    pub fn dequeue(&mut self, blocked: SignalSet) -> Option<Delivery> {
        let signo = self.deliverable(blocked).first()?;
        self.pending.remove(signo);
        let action = self.actions[signo];
        let delivery = match action.disposition {
            SignalDisposition::Ignore => Delivery::Ignore(signo),
            SignalDisposition::Handler(handler) => {
                if action.flags.contains(SignalActionFlags::RESETHAND) {
                    self.actions[signo] = SignalAction::default();
                }
                Delivery::Handler {
                    signo,
                    handler,
                    action,
                }
            }
            SignalDisposition::Default => match signo.default_action() {
                DefaultAction::Ignore => Delivery::Ignore(signo),
                DefaultAction::Stop => Delivery::Stop(signo),
                DefaultAction::Continue => Delivery::Continue(signo),
                DefaultAction::Terminate | DefaultAction::CoreDump => Delivery::Terminate(signo),
            },
        };
        Some(delivery)
    }

    /// Caught signals revert to default when the image is replaced.
    pub fn reset_on_exec(&mut self) {
        self.actions.reset_handlers();
    }
}

/// Per-thread signal state.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSignals {
    blocked: SignalSet,
    /// Mask to put back once a `sigsuspend` ends.
    saved: Option<SignalSet>,
}

impl ThreadSignals {
    pub fn with_blocked(blocked: SignalSet) -> Self {
        Self {
            blocked: blocked.sanitized(),
            saved: None,
        }
    }

    pub fn blocked(&self) -> SignalSet {
        self.blocked
    }

    /// `sigprocmask`. Returns the previous mask.
    pub fn set_mask(&mut self, how: SigmaskHow, set: SignalSet) -> SignalSet {
        let old = self.blocked;
        let new = match how {
            SigmaskHow::Block => old | set,
            SigmaskHow::Unblock => old & !set,
            SigmaskHow::SetMask => set,
        };
        self.blocked = new.sanitized();
        old
    }

    /// Replace the mask for the duration of a `sigsuspend`.
    pub fn suspend(&mut self, mask: SignalSet) {
        if self.saved.is_none() {
            self.saved = Some(self.blocked);
        }
        self.blocked = mask.sanitized();
    }

    pub fn is_suspended(&self) -> bool {
        self.saved.is_some()
    }

    /// Switch to the handler mask for `signo`. Returns the mask the handler
    /// frame must restore on return.
    pub fn enter_handler(&mut self, signo: Signo, action: &SignalAction) -> SignalSet {
        let restore = self.saved.take().unwrap_or(self.blocked);
        let mut blocked = self.blocked | action.mask;
        if !action.flags.contains(SignalActionFlags::NODEFER) {
            blocked.add(signo);
        }
        self.blocked = blocked.sanitized();
        restore
    }

    /// Restore the mask saved in a handler frame.
    pub fn restore(&mut self, mask: SignalSet) {
        self.blocked = mask.sanitized();
    }

    /// End of a delivery pass that entered no handler: a pending `sigsuspend`
    /// mask is put back.
    pub fn finish_pass(&mut self) {
        if let Some(saved) = self.saved.take() {
            self.blocked = saved;
        }
    }
}
