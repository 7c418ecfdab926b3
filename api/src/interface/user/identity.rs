//! User ids. The plain calls are the legacy 16-bit ABI; the `*32` ones take
//! and return full ids.

use crate::ptr::UserPtr;
use axerrno::{LinuxError, LinuxResult};
use kestrel_core::Kernel;
use kestrel_core::cred::UNCHANGED;
use syscall_trace::syscall_trace;

/// Reported by the 16-bit calls for ids that do not fit.
const OVERFLOW_UID: u32 = 65534;

fn low_uid(uid: u32) -> isize {
    if uid > u16::MAX as u32 {
        OVERFLOW_UID as isize
    } else {
        uid as isize
    }
}

fn high_uid(uid: u32) -> u32 {
    match uid as u16 {
        u16::MAX => UNCHANGED,
        uid => uid as u32,
    }
}

fn check_uid(uid: u32) -> LinuxResult<u32> {
    if uid == UNCHANGED {
        return Err(LinuxError::EINVAL);
    }
    Ok(uid)
}

#[syscall_trace]
pub fn sys_getuid(kernel: &Kernel) -> LinuxResult<isize> {
    Ok(low_uid(kernel.getuid()?))
}

#[syscall_trace]
pub fn sys_geteuid(kernel: &Kernel) -> LinuxResult<isize> {
    Ok(low_uid(kernel.geteuid()?))
}

#[syscall_trace]
pub fn sys_setuid(kernel: &Kernel, uid: u32) -> LinuxResult<isize> {
    sys_setuid32(kernel, high_uid(uid))
}

#[syscall_trace]
pub fn sys_setreuid(kernel: &Kernel, ruid: u32, euid: u32) -> LinuxResult<isize> {
    sys_setreuid32(kernel, high_uid(ruid), high_uid(euid))
}

#[syscall_trace]
pub fn sys_getuid32(kernel: &Kernel) -> LinuxResult<isize> {
    Ok(kernel.getuid()? as isize)
}

#[syscall_trace]
pub fn sys_geteuid32(kernel: &Kernel) -> LinuxResult<isize> {
    Ok(kernel.geteuid()? as isize)
}

#[syscall_trace]
pub fn sys_setuid32(kernel: &Kernel, uid: u32) -> LinuxResult<isize> {
    kernel.setuid(check_uid(uid)?)?;
    Ok(0)
}

#[syscall_trace]
pub fn sys_setreuid32(kernel: &Kernel, ruid: u32, euid: u32) -> LinuxResult<isize> {
    kernel.setreuid(ruid, euid)?;
    Ok(0)
}

#[syscall_trace]
pub fn sys_setresuid(kernel: &Kernel, ruid: u32, euid: u32, suid: u32) -> LinuxResult<isize> {
    sys_setresuid32(kernel, high_uid(ruid), high_uid(euid), high_uid(suid))
}

#[syscall_trace]
pub fn sys_setresuid32(kernel: &Kernel, ruid: u32, euid: u32, suid: u32) -> LinuxResult<isize> {
    kernel.setresuid(ruid, euid, suid)?;
    Ok(0)
}

#[syscall_trace]
pub fn sys_getresuid(
    kernel: &Kernel,
    ruid: UserPtr<u16>,
    euid: UserPtr<u16>,
    suid: UserPtr<u16>,
) -> LinuxResult<isize> {
    let (r, e, s) = kernel.getresuid()?;
    ruid.write(kernel, low_uid(r) as u16)?;
    euid.write(kernel, low_uid(e) as u16)?;
    suid.write(kernel, low_uid(s) as u16)?;
    Ok(0)
}

#[syscall_trace]
pub fn sys_getresuid32(
    kernel: &Kernel,
    ruid: UserPtr<u32>,
    euid: UserPtr<u32>,
    suid: UserPtr<u32>,
) -> LinuxResult<isize> {
    let (r, e, s) = kernel.getresuid()?;
    ruid.write(kernel, r)?;
    euid.write(kernel, e)?;
    suid.write(kernel, s)?;
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kestrel_core::mock::{MockEnv, STACK_TOP};

    #[test]
    fn legacy_ids_are_sixteen_bits() {
        let env = MockEnv::boot();
        env.spawn_init();
        let kernel = &env.kernel;
        assert_eq!(sys_setuid32(kernel, 70000), Ok(0));
        assert_eq!(sys_getuid(kernel), Ok(OVERFLOW_UID as isize));
        assert_eq!(sys_getuid32(kernel), Ok(70000));
        assert_eq!(sys_setuid32(kernel, UNCHANGED), Err(LinuxError::EINVAL));
    }

    #[test]
    fn setreuid_swaps_and_keeps() {
        let env = MockEnv::boot();
        env.spawn_init();
        let kernel = &env.kernel;
        assert_eq!(sys_setreuid32(kernel, 1000, 2000), Ok(0));
        // 0xffff leaves the real id alone
        assert_eq!(sys_setreuid(kernel, 0xffff, 1000), Ok(0));
        assert_eq!(sys_getuid32(kernel), Ok(1000));
        assert_eq!(sys_geteuid(kernel), Ok(1000));
        assert_eq!(sys_setuid(kernel, 0), Err(LinuxError::EPERM));
    }

    #[test]
    fn resuid_calls() {
        let env = MockEnv::boot();
        let (init, _) = env.spawn_init();
        let kernel = &env.kernel;
        // what libc's seteuid issues
        assert_eq!(sys_setresuid32(kernel, UNCHANGED, 1000, UNCHANGED), Ok(0));
        let ids = STACK_TOP - 0x100;
        let ptr = |offset: usize| UserPtr::<u32>::from(ids + offset);
        assert_eq!(sys_getresuid32(kernel, ptr(0), ptr(4), ptr(8)), Ok(0));
        let read = |offset: usize| env.mm.read_u32(init, ids + offset);
        assert_eq!((read(0), read(4), read(8)), (Some(0), Some(1000), Some(0)));

        assert_eq!(sys_setresuid(kernel, 0xffff, 0, 0xffff), Ok(0));
        assert_eq!(sys_setresuid(kernel, 70, 80, 0xffff), Ok(0));
        let short = |offset: usize| UserPtr::<u16>::from(ids + offset);
        assert_eq!(sys_getresuid(kernel, short(0), short(2), short(4)), Ok(0));
        assert_eq!(read(0), Some(80 << 16 | 70));
        assert_eq!(read(4).map(|w| w as u16), Some(0));
        assert_eq!(
            sys_setresuid32(kernel, UNCHANGED, 5, UNCHANGED),
            Err(LinuxError::EPERM)
        );
        assert_eq!(
            sys_getresuid32(kernel, ptr(0), UserPtr::from(0), ptr(8)),
            Err(LinuxError::EFAULT)
        );
    }
}
