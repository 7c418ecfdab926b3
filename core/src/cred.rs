//! User identities.

use crate::kernel::Kernel;
use crate::process::Credentials;
use axerrno::{LinuxError, LinuxResult};

/// Argument value of `setreuid` and `setresuid` that leaves an id alone.
pub const UNCHANGED: u32 = u32::MAX;

/// Whether a process running as `sender` may signal one running as `target`.
pub fn may_signal(sender: &Credentials, target: &Credentials) -> bool {
    sender.is_root()
        || [sender.uid, sender.euid]
            .iter()
            .any(|id| *id == target.uid || *id == target.suid)
}

impl Credentials {
    fn set_uid(&mut self, uid: u32) -> LinuxResult<()> {
        if self.is_root() {
            *self = Credentials::user(uid);
        } else if uid == self.uid || uid == self.suid {
            self.euid = uid;
        } else {
            return Err(LinuxError::EPERM);
        }
        Ok(())
    }

    fn set_euid(&mut self, euid: u32) -> LinuxResult<()> {
        if !self.is_root() && euid != self.uid && euid != self.suid {
            return Err(LinuxError::EPERM);
        }
        self.euid = euid;
        Ok(())
    }

    fn set_reuid(&mut self, ruid: u32, euid: u32) -> LinuxResult<()> {
        let old = *self;
        let root = old.is_root();
        let mut new = old;
        if ruid != UNCHANGED {
            if !root && ruid != old.uid && ruid != old.euid {
                return Err(LinuxError::EPERM);
            }
            new.uid = ruid;
        }
        if euid != UNCHANGED {
            if !root && euid != old.uid && euid != old.euid && euid != old.suid {
                return Err(LinuxError::EPERM);
            }
            new.euid = euid;
        }
        if ruid != UNCHANGED || (euid != UNCHANGED && euid != old.uid) {
            new.suid = new.euid;
        }
        *self = new;
        Ok(())
    }

    /// All or nothing: an unprivileged caller may only pick among its
    /// current real, effective and saved ids.
    fn set_resuid(&mut self, ruid: u32, euid: u32, suid: u32) -> LinuxResult<()> {
        let old = *self;
        let allowed = |id: u32| {
            id == UNCHANGED || old.is_root() || [old.uid, old.euid, old.suid].contains(&id)
        };
        if ![ruid, euid, suid].into_iter().all(allowed) {
            return Err(LinuxError::EPERM);
        }
        let pick = |id: u32, current: u32| if id == UNCHANGED { current } else { id };
        *self = Credentials {
            uid: pick(ruid, old.uid),
            euid: pick(euid, old.euid),
            suid: pick(suid, old.suid),
        };
        Ok(())
    }
}

impl Kernel {
    /// Credentials of the current process.
    pub fn credentials(&self) -> LinuxResult<Credentials> {
        let table = self.lock();
        let (_, pid) = self.current_locked(&table)?;
        Ok(table.expect_process(pid).data.cred)
    }

    pub fn getuid(&self) -> LinuxResult<u32> {
        self.credentials().map(|c| c.uid)
    }

    pub fn geteuid(&self) -> LinuxResult<u32> {
        self.credentials().map(|c| c.euid)
    }

    /// `setuid`: root sets all three ids, anyone else only the effective id
    /// and only to its real or saved id.
    pub fn setuid(&self, uid: u32) -> LinuxResult<()> {
        self.update_credentials(|cred| cred.set_uid(uid))
    }

    pub fn seteuid(&self, euid: u32) -> LinuxResult<()> {
        self.update_credentials(|cred| cred.set_euid(euid))
    }

    /// `setreuid`; [`UNCHANGED`] keeps an id.
    pub fn setreuid(&self, ruid: u32, euid: u32) -> LinuxResult<()> {
        self.update_credentials(|cred| cred.set_reuid(ruid, euid))
    }

    /// `setresuid`; [`UNCHANGED`] keeps an id.
    pub fn setresuid(&self, ruid: u32, euid: u32, suid: u32) -> LinuxResult<()> {
        self.update_credentials(|cred| cred.set_resuid(ruid, euid, suid))
    }

    /// Real, effective and saved uid.
    pub fn getresuid(&self) -> LinuxResult<(u32, u32, u32)> {
        self.credentials().map(|c| (c.uid, c.euid, c.suid))
    }

    fn update_credentials<F>(&self, f: F) -> LinuxResult<()>
    where
        F: FnOnce(&mut Credentials) -> LinuxResult<()>,
    {
        let mut table = self.lock();
        let (_, pid) = self.current_locked(&table)?;
        let cred = &mut table.expect_process_mut(pid).data.cred;
        f(cred)?;
        debug!("[cred] {} now {:?}", pid, cred);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockEnv;

    fn user(uid: u32, euid: u32, suid: u32) -> Credentials {
        Credentials { uid, euid, suid }
    }

    #[test]
    fn root_setuid_drops_everything() {
        let mut cred = Credentials::root();
        cred.set_uid(1000).unwrap();
        assert_eq!(cred, Credentials::user(1000));
        assert_eq!(cred.set_uid(0), Err(LinuxError::EPERM));
    }

    #[test]
    fn setuid_binary_can_switch_back_and_forth() {
        // a set-user-id image owned by 0, run by 1000
        let mut cred = user(1000, 0, 0);
        cred.set_euid(1000).unwrap();
        assert_eq!(cred, user(1000, 1000, 0));
        cred.set_euid(0).unwrap();
        assert_eq!(cred, user(1000, 0, 0));
        cred.set_uid(1000).unwrap();
        assert_eq!(cred, Credentials::user(1000));
    }

    #[test]
    fn unprivileged_setuid_only_touches_euid() {
        let mut cred = user(1000, 2000, 3000);
        cred.set_uid(3000).unwrap();
        assert_eq!(cred, user(1000, 3000, 3000));
        assert_eq!(cred.set_uid(4000), Err(LinuxError::EPERM));
        assert_eq!(cred.set_euid(2000), Err(LinuxError::EPERM));
    }

    #[test]
    fn setreuid_rules() {
        let mut cred = user(1000, 2000, 3000);
        // swap real and effective
        cred.set_reuid(2000, 1000).unwrap();
        assert_eq!(cred, user(2000, 1000, 1000));

        let mut cred = user(1000, 2000, 3000);
        cred.set_reuid(UNCHANGED, 1000).unwrap();
        assert_eq!(cred, user(1000, 1000, 3000));
        cred.set_reuid(UNCHANGED, 3000).unwrap();
        assert_eq!(cred, user(1000, 3000, 3000));
        assert_eq!(cred.set_reuid(5, UNCHANGED), Err(LinuxError::EPERM));
        assert_eq!(cred.set_reuid(UNCHANGED, 5), Err(LinuxError::EPERM));
        cred.set_reuid(UNCHANGED, UNCHANGED).unwrap();
        assert_eq!(cred, user(1000, 3000, 3000));

        let mut cred = Credentials::root();
        cred.set_reuid(7, 8).unwrap();
        assert_eq!(cred, user(7, 8, 8));
    }

    #[test]
    fn setresuid_rules() {
        let mut cred = user(1000, 2000, 3000);
        cred.set_resuid(3000, 1000, 2000).unwrap();
        assert_eq!(cred, user(3000, 1000, 2000));
        cred.set_resuid(UNCHANGED, 3000, UNCHANGED).unwrap();
        assert_eq!(cred, user(3000, 3000, 2000));
        assert_eq!(cred.set_resuid(UNCHANGED, UNCHANGED, 7), Err(LinuxError::EPERM));
        // a refused change leaves every id alone
        assert_eq!(cred.set_resuid(2000, 7, UNCHANGED), Err(LinuxError::EPERM));
        assert_eq!(cred, user(3000, 3000, 2000));

        let mut cred = Credentials::root();
        cred.set_resuid(UNCHANGED, 500, UNCHANGED).unwrap();
        assert_eq!(cred, user(0, 500, 0));
        // no longer root, but 0 is still the real and saved id
        cred.set_resuid(UNCHANGED, 0, UNCHANGED).unwrap();
        assert_eq!(cred, Credentials::root());
        cred.set_resuid(1, 2, 3).unwrap();
        assert_eq!(cred, user(1, 2, 3));
    }

    #[test]
    fn signal_permission() {
        let root = Credentials::root();
        let alice = Credentials::user(1000);
        let bob = Credentials::user(1001);
        assert!(may_signal(&root, &bob));
        assert!(may_signal(&alice, &alice));
        assert!(!may_signal(&alice, &bob));
        assert!(!may_signal(&alice, &root));
        // a set-user-id program started by alice still belongs to her
        assert!(may_signal(&alice, &user(1000, 0, 0)));
        assert!(may_signal(&user(1001, 1000, 1000), &alice));
    }

    #[test]
    fn kernel_identity_calls() {
        let env = MockEnv::boot();
        env.spawn_init();
        let kernel = &env.kernel;
        assert_eq!(kernel.getuid(), Ok(0));
        kernel.setreuid(UNCHANGED, 500).unwrap();
        assert_eq!(kernel.geteuid(), Ok(500));
        assert_eq!(kernel.getuid(), Ok(0));
        assert_eq!(kernel.seteuid(42), Err(LinuxError::EPERM));
        kernel.seteuid(0).unwrap();
        kernel.setresuid(UNCHANGED, 600, UNCHANGED).unwrap();
        assert_eq!(kernel.getresuid(), Ok((0, 600, 0)));
        kernel.setresuid(UNCHANGED, 0, UNCHANGED).unwrap();
        kernel.setuid(100).unwrap();
        assert_eq!(kernel.credentials(), Ok(Credentials::user(100)));
        assert_eq!(kernel.getresuid(), Ok((100, 100, 100)));
    }
}
