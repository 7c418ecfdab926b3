use axerrno::{LinuxError, LinuxResult};
use kestrel_core::signal::SignalTarget;
use kestrel_core::{Kernel, TrapFrame};
use kestrel_signal::{
    HandlerRef, SigmaskHow, SignalAction, SignalActionFlags, SignalDisposition, SignalSet, Signo,
};
use macro_rules_attribute::apply;
use memory_addr::VirtAddr;
use syscall_trace::syscall_trace;

use crate::ptr::{UserConstPtr, UserPod, UserPtr};
use crate::syscall_instrument;

const SIG_DFL: u32 = 0;
const SIG_IGN: u32 = 1;

/// `struct sigaction` as `rt_sigaction` sees it on i386.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SigactionAbi {
    pub handler: u32,
    pub flags: u32,
    pub restorer: u32,
    pub mask: [u32; 2],
}

/// `struct old_sigaction` of the legacy `sigaction` call.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OldSigactionAbi {
    pub handler: u32,
    pub mask: u32,
    pub flags: u32,
    pub restorer: u32,
}

unsafe impl UserPod for SigactionAbi {}
unsafe impl UserPod for OldSigactionAbi {}

impl From<SigactionAbi> for SignalAction {
    fn from(abi: SigactionAbi) -> Self {
        let flags = SignalActionFlags::from_bits_truncate(abi.flags);
        let disposition = match abi.handler {
            SIG_DFL => SignalDisposition::Default,
            SIG_IGN => SignalDisposition::Ignore,
            entry => SignalDisposition::Handler(HandlerRef {
                entry: VirtAddr::from_usize(entry as usize),
                restorer: flags
                    .contains(SignalActionFlags::RESTORER)
                    .then(|| VirtAddr::from_usize(abi.restorer as usize)),
            }),
        };
        let mask = abi.mask[0] as u64 | (abi.mask[1] as u64) << 32;
        SignalAction {
            disposition,
            mask: SignalSet::from_bits(mask),
            flags,
        }
    }
}

impl From<SignalAction> for SigactionAbi {
    fn from(action: SignalAction) -> Self {
        let (handler, restorer) = match action.disposition {
            SignalDisposition::Default => (SIG_DFL, 0),
            SignalDisposition::Ignore => (SIG_IGN, 0),
            SignalDisposition::Handler(handler) => (
                handler.entry.as_usize() as u32,
                handler.restorer.map_or(0, |addr| addr.as_usize() as u32),
            ),
        };
        let mask = action.mask.bits();
        SigactionAbi {
            handler,
            flags: action.flags.bits(),
            restorer,
            mask: [mask as u32, (mask >> 32) as u32],
        }
    }
}

impl From<OldSigactionAbi> for SigactionAbi {
    fn from(old: OldSigactionAbi) -> Self {
        SigactionAbi {
            handler: old.handler,
            flags: old.flags,
            restorer: old.restorer,
            mask: [old.mask, 0],
        }
    }
}

impl From<SigactionAbi> for OldSigactionAbi {
    fn from(abi: SigactionAbi) -> Self {
        OldSigactionAbi {
            handler: abi.handler,
            mask: abi.mask[0],
            flags: abi.flags,
            restorer: abi.restorer,
        }
    }
}

fn check_sigset_size(size: usize) -> LinuxResult<()> {
    if size != size_of::<SignalSet>() {
        return Err(LinuxError::EINVAL);
    }
    Ok(())
}

fn parse_signo(signo: u32) -> LinuxResult<Signo> {
    Signo::from_raw(signo).ok_or(LinuxError::EINVAL)
}

/// Signal 0 only checks existence and permission.
fn parse_optional_signo(signo: u32) -> LinuxResult<Option<Signo>> {
    match signo {
        0 => Ok(None),
        signo => parse_signo(signo).map(Some),
    }
}

#[syscall_trace]
pub fn sys_kill(kernel: &Kernel, pid: i32, signo: u32) -> LinuxResult<isize> {
    let signo = parse_optional_signo(signo)?;
    kernel.kill(SignalTarget::from_raw(pid), signo)?;
    Ok(0)
}

#[syscall_trace]
pub fn sys_tkill(kernel: &Kernel, tid: i32, signo: u32) -> LinuxResult<isize> {
    let signo = parse_optional_signo(signo)?;
    let tid = u32::try_from(tid)
        .ok()
        .filter(|&tid| tid > 0)
        .ok_or(LinuxError::EINVAL)?;
    kernel.tkill(tid, signo)?;
    Ok(0)
}

fn do_sigaction(
    kernel: &Kernel,
    signo: u32,
    act: Option<SigactionAbi>,
) -> LinuxResult<SigactionAbi> {
    let signo = parse_signo(signo)?;
    let old = match act {
        Some(act) => kernel.set_action(signo, act.into())?,
        None => kernel.action(signo)?,
    };
    Ok(old.into())
}

#[syscall_trace]
pub fn sys_rt_sigaction(
    kernel: &Kernel,
    signo: u32,
    act: UserConstPtr<SigactionAbi>,
    oldact: UserPtr<SigactionAbi>,
    sigsetsize: usize,
) -> LinuxResult<isize> {
    check_sigset_size(sigsetsize)?;
    let old = do_sigaction(kernel, signo, act.read_nullable(kernel)?)?;
    oldact.write_nullable(kernel, old)?;
    Ok(0)
}

#[syscall_trace]
pub fn sys_sigaction(
    kernel: &Kernel,
    signo: u32,
    act: UserConstPtr<OldSigactionAbi>,
    oldact: UserPtr<OldSigactionAbi>,
) -> LinuxResult<isize> {
    let act = act.read_nullable(kernel)?.map(SigactionAbi::from);
    let old = do_sigaction(kernel, signo, act)?;
    oldact.write_nullable(kernel, old.into())?;
    Ok(0)
}

#[syscall_trace]
pub fn sys_rt_sigprocmask(
    kernel: &Kernel,
    how: u32,
    set: UserConstPtr<u64>,
    oldset: UserPtr<u64>,
    sigsetsize: usize,
) -> LinuxResult<isize> {
    check_sigset_size(sigsetsize)?;
    let old = match set.read_nullable(kernel)? {
        Some(set) => kernel.set_mask(SigmaskHow::from_raw(how)?, SignalSet::from_bits(set))?,
        None => kernel.blocked()?,
    };
    oldset.write_nullable(kernel, old.bits())?;
    Ok(0)
}

/// The legacy call sees only the first 32 signals; `SIG_SETMASK` leaves the
/// upper half of the mask alone.
#[syscall_trace]
pub fn sys_sigprocmask(
    kernel: &Kernel,
    how: u32,
    set: UserConstPtr<u32>,
    oldset: UserPtr<u32>,
) -> LinuxResult<isize> {
    let old = match set.read_nullable(kernel)? {
        Some(set) => {
            let how = SigmaskHow::from_raw(how)?;
            let set = match how {
                SigmaskHow::SetMask => {
                    (kernel.blocked()?.bits() & !(u32::MAX as u64)) | set as u64
                }
                _ => set as u64,
            };
            kernel.set_mask(how, SignalSet::from_bits(set))?
        }
        None => kernel.blocked()?,
    };
    oldset.write_nullable(kernel, old.bits() as u32)?;
    Ok(0)
}

#[syscall_trace]
pub fn sys_rt_sigpending(kernel: &Kernel, set: UserPtr<u64>, sigsetsize: usize) -> LinuxResult<isize> {
    check_sigset_size(sigsetsize)?;
    set.write(kernel, kernel.pending_signals()?.bits())?;
    Ok(0)
}

#[syscall_trace]
pub fn sys_sigpending(kernel: &Kernel, set: UserPtr<u32>) -> LinuxResult<isize> {
    set.write(kernel, kernel.pending_signals()?.bits() as u32)?;
    Ok(0)
}

#[syscall_trace]
pub fn sys_rt_sigsuspend(
    kernel: &Kernel,
    mask: UserConstPtr<u64>,
    sigsetsize: usize,
) -> LinuxResult<isize> {
    check_sigset_size(sigsetsize)?;
    let mask = mask.read(kernel)?;
    kernel.suspend(SignalSet::from_bits(mask))?;
    Ok(0)
}

/// The legacy call passes the mask itself in its third argument.
#[syscall_trace]
pub fn sys_sigsuspend(kernel: &Kernel, mask: u32) -> LinuxResult<isize> {
    kernel.suspend(SignalSet::from_bits(mask as u64))?;
    Ok(0)
}

#[apply(syscall_instrument)]
pub fn sys_sigreturn(kernel: &Kernel, tf: &mut TrapFrame) -> LinuxResult<isize> {
    kernel.sigreturn(tf)
}

#[apply(syscall_instrument)]
pub fn sys_rt_sigreturn(kernel: &Kernel, tf: &mut TrapFrame) -> LinuxResult<isize> {
    kernel.sigreturn(tf)
}
