use core::fmt;
use core::ops::{BitAnd, BitAndAssign, BitOr, BitOrAssign, Not};
use num_enum::TryFromPrimitive;

/// Number of signals, standard and real-time.
pub const NSIG: usize = 64;

/// Signal numbers, Linux i386 numbering.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, TryFromPrimitive)]
#[allow(clippy::upper_case_acronyms)]
pub enum Signo {
    SIGHUP = 1,
    SIGINT = 2,
    SIGQUIT = 3,
    SIGILL = 4,
    SIGTRAP = 5,
    SIGABRT = 6,
    SIGBUS = 7,
    SIGFPE = 8,
    SIGKILL = 9,
    SIGUSR1 = 10,
    SIGSEGV = 11,
    SIGUSR2 = 12,
    SIGPIPE = 13,
    SIGALRM = 14,
    SIGTERM = 15,
    SIGSTKFLT = 16,
    SIGCHLD = 17,
    SIGCONT = 18,
    SIGSTOP = 19,
    SIGTSTP = 20,
    SIGTTIN = 21,
    SIGTTOU = 22,
    SIGURG = 23,
    SIGXCPU = 24,
    SIGXFSZ = 25,
    SIGVTALRM = 26,
    SIGPROF = 27,
    SIGWINCH = 28,
    SIGIO = 29,
    SIGPWR = 30,
    SIGSYS = 31,
    SIGRTMIN = 32,
    SIGRT1 = 33,
    SIGRT2 = 34,
    SIGRT3 = 35,
    SIGRT4 = 36,
    SIGRT5 = 37,
    SIGRT6 = 38,
    SIGRT7 = 39,
    SIGRT8 = 40,
    SIGRT9 = 41,
    SIGRT10 = 42,
    SIGRT11 = 43,
    SIGRT12 = 44,
    SIGRT13 = 45,
    SIGRT14 = 46,
    SIGRT15 = 47,
    SIGRT16 = 48,
    SIGRT17 = 49,
    SIGRT18 = 50,
    SIGRT19 = 51,
    SIGRT20 = 52,
    SIGRT21 = 53,
    SIGRT22 = 54,
    SIGRT23 = 55,
    SIGRT24 = 56,
    SIGRT25 = 57,
    SIGRT26 = 58,
    SIGRT27 = 59,
    SIGRT28 = 60,
    SIGRT29 = 61,
    SIGRT30 = 62,
    SIGRT31 = 63,
    SIGRT32 = 64,
}

impl Signo {
    /// Parse a raw signal number; 0 and anything above [`NSIG`] are rejected.
    pub fn from_raw(signo: u32) -> Option<Self> {
        u8::try_from(signo)
            .ok()
            .and_then(|n| Self::try_from(n).ok())
    }

    pub fn raw(self) -> u8 {
        self as u8
    }

    pub fn is_realtime(self) -> bool {
        self >= Signo::SIGRTMIN
    }

    /// `SIGKILL` and `SIGSTOP` can be neither caught, blocked nor ignored.
    pub fn is_unmaskable(self) -> bool {
        matches!(self, Signo::SIGKILL | Signo::SIGSTOP)
    }

    /// Signals whose default action stops the process.
    pub fn is_stop(self) -> bool {
        matches!(
            self,
            Signo::SIGSTOP | Signo::SIGTSTP | Signo::SIGTTIN | Signo::SIGTTOU
        )
    }

    fn bit(self) -> u64 {
        1 << (self as u8 - 1)
    }
}

impl fmt::Display for Signo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self, *self as u8)
    }
}

/// A set of signals; bit `n - 1` stands for signal `n`.
#[repr(transparent)]
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct SignalSet(u64);

impl SignalSet {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u64 {
        self.0
    }

    /// `SIGKILL` and `SIGSTOP`.
    pub fn unmaskable() -> Self {
        Self(Signo::SIGKILL.bit() | Signo::SIGSTOP.bit())
    }

    /// The stop-class signals.
    pub fn stop_signals() -> Self {
        [Signo::SIGSTOP, Signo::SIGTSTP, Signo::SIGTTIN, Signo::SIGTTOU]
            .into_iter()
            .collect()
    }

    pub fn has(self, signo: Signo) -> bool {
        self.0 & signo.bit() != 0
    }

    /// Add a signal; returns whether it was absent.
    pub fn add(&mut self, signo: Signo) -> bool {
        let absent = !self.has(signo);
        self.0 |= signo.bit();
        absent
    }

    /// Remove a signal; returns whether it was present.
    pub fn remove(&mut self, signo: Signo) -> bool {
        let present = self.has(signo);
        self.0 &= !signo.bit();
        present
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// This set with `SIGKILL` and `SIGSTOP` forced out, as every blocked mask
    /// must be.
    pub fn sanitized(self) -> Self {
        self & !Self::unmaskable()
    }

    /// Lowest-numbered signal in the set.
    pub fn first(self) -> Option<Signo> {
        if self.0 == 0 {
            return None;
        }
        Signo::from_raw(self.0.trailing_zeros() + 1)
    }

    /// Signals in the set, lowest first.
    pub fn iter(self) -> impl Iterator<Item = Signo> {
        let mut rest = self;
        core::iter::from_fn(move || {
            let signo = rest.first()?;
            rest.remove(signo);
            Some(signo)
        })
    }
}

impl From<Signo> for SignalSet {
    fn from(signo: Signo) -> Self {
        Self(signo.bit())
    }
}

impl FromIterator<Signo> for SignalSet {
    fn from_iter<I: IntoIterator<Item = Signo>>(iter: I) -> Self {
        let mut set = Self::empty();
        for signo in iter {
            set.add(signo);
        }
        set
    }
}

impl BitOr for SignalSet {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for SignalSet {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for SignalSet {
    type Output = Self;
    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl BitAndAssign for SignalSet {
    fn bitand_assign(&mut self, rhs: Self) {
        self.0 &= rhs.0;
    }
}

impl Not for SignalSet {
    type Output = Self;
    fn not(self) -> Self {
        Self(!self.0)
    }
}

impl fmt::Debug for SignalSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_numbers_round_trip() {
        assert_eq!(Signo::from_raw(10), Some(Signo::SIGUSR1));
        assert_eq!(Signo::from_raw(64), Some(Signo::SIGRT32));
        assert_eq!(Signo::from_raw(0), None);
        assert_eq!(Signo::from_raw(65), None);
        assert_eq!(Signo::from_raw(265), None);
        assert!(Signo::SIGRTMIN.is_realtime());
        assert!(!Signo::SIGSYS.is_realtime());
    }

    #[test]
    fn bit_layout_follows_sigset_t() {
        let set = SignalSet::from(Signo::SIGHUP) | Signo::SIGUSR1.into();
        assert_eq!(set.bits(), 0b10_0000_0001);
    }

    #[test]
    fn first_and_iter_are_lowest_first() {
        let set: SignalSet = [Signo::SIGTERM, Signo::SIGINT, Signo::SIGRT32]
            .into_iter()
            .collect();
        assert_eq!(set.first(), Some(Signo::SIGINT));
        let all: Vec<Signo> = set.iter().collect();
        assert_eq!(all, [Signo::SIGINT, Signo::SIGTERM, Signo::SIGRT32]);
    }

    #[test]
    fn sanitized_drops_kill_and_stop() {
        let set = !SignalSet::empty();
        let clean = set.sanitized();
        assert!(!clean.has(Signo::SIGKILL));
        assert!(!clean.has(Signo::SIGSTOP));
        assert!(clean.has(Signo::SIGTSTP));
        assert_eq!(clean.bits().count_ones(), 62);
    }

    #[test]
    fn add_and_remove_report_changes() {
        let mut set = SignalSet::empty();
        assert!(set.add(Signo::SIGCHLD));
        assert!(!set.add(Signo::SIGCHLD));
        assert!(set.remove(Signo::SIGCHLD));
        assert!(!set.remove(Signo::SIGCHLD));
        assert!(set.is_empty());
    }
}
