//! Signal bookkeeping for the kestrel kernel.
//!
//! Signal numbers and sets, the per-process disposition table, process-wide
//! pending state and per-thread blocked masks. Nothing here touches the
//! scheduler or user memory; the kernel core turns the [`RaiseEffect`]s and
//! [`Delivery`] decisions produced here into actions.
#![cfg_attr(not(test), no_std)]

#[macro_use]
extern crate log;

mod action;
mod pending;
mod types;

pub use action::{
    DefaultAction, HandlerRef, SignalAction, SignalActionFlags, SignalActions, SignalDisposition,
};
pub use pending::{Delivery, ProcessSignals, RaiseEffect, SigmaskHow, ThreadSignals};
pub use types::{NSIG, SignalSet, Signo};
