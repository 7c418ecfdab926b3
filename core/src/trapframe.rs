//! The i386 register frame saved on trap entry, and the signal frame built
//! from it on the user stack.

use bitflags::bitflags;
use kestrel_signal::{SignalSet, Signo};
use memory_addr::VirtAddr;

/// User code segment selector (GDT entry 3, RPL 3).
pub const USER_CS: u32 = 0x1b;
/// User data segment selector (GDT entry 4, RPL 3).
pub const USER_DS: u32 = 0x23;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct EFlags: u32 {
        const CF = 1 << 0;
        const RESERVED = 1 << 1;
        const PF = 1 << 2;
        const AF = 1 << 4;
        const ZF = 1 << 6;
        const SF = 1 << 7;
        const TF = 1 << 8;
        const IF = 1 << 9;
        const DF = 1 << 10;
        const OF = 1 << 11;
        const NT = 1 << 14;
        const RF = 1 << 16;
        const AC = 1 << 18;
    }
}

impl EFlags {
    /// Bits user code may change through `sigreturn`.
    pub const USER_MODIFIABLE: Self = Self::CF
        .union(Self::PF)
        .union(Self::AF)
        .union(Self::ZF)
        .union(Self::SF)
        .union(Self::TF)
        .union(Self::DF)
        .union(Self::OF)
        .union(Self::NT)
        .union(Self::RF)
        .union(Self::AC);
}

/// Number of 32-bit words in a [`TrapFrame`].
const FRAME_WORDS: usize = 19;

/// Registers pushed by the trap entry stub, lowest address first.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TrapFrame {
    pub edi: u32,
    pub esi: u32,
    pub ebp: u32,
    /// Kernel `esp` as saved by `pushal`; ignored on return.
    pub esp: u32,
    pub ebx: u32,
    pub edx: u32,
    pub ecx: u32,
    pub eax: u32,
    pub gs: u32,
    pub fs: u32,
    pub es: u32,
    pub ds: u32,
    pub trapno: u32,
    pub err: u32,
    pub eip: u32,
    pub cs: u32,
    pub eflags: u32,
    pub user_esp: u32,
    pub ss: u32,
}

impl TrapFrame {
    /// A fresh user-mode frame entering at `entry` with stack `sp`.
    pub fn new_user(entry: VirtAddr, sp: VirtAddr) -> Self {
        Self {
            gs: USER_DS,
            fs: USER_DS,
            es: USER_DS,
            ds: USER_DS,
            eip: entry.as_usize() as u32,
            cs: USER_CS,
            eflags: (EFlags::IF | EFlags::RESERVED).bits(),
            user_esp: sp.as_usize() as u32,
            ss: USER_DS,
            ..Default::default()
        }
    }

    pub fn ip(&self) -> usize {
        self.eip as usize
    }

    pub fn set_ip(&mut self, ip: usize) {
        self.eip = ip as u32;
    }

    /// The user stack pointer.
    pub fn sp(&self) -> usize {
        self.user_esp as usize
    }

    pub fn set_sp(&mut self, sp: usize) {
        self.user_esp = sp as u32;
    }

    /// The system call number on entry.
    pub fn syscall_num(&self) -> usize {
        self.eax as usize
    }

    pub fn retval(&self) -> isize {
        self.eax as i32 as isize
    }

    pub fn set_retval(&mut self, value: isize) {
        self.eax = value as i32 as u32;
    }

    pub fn arg0(&self) -> usize {
        self.ebx as usize
    }

    pub fn arg1(&self) -> usize {
        self.ecx as usize
    }

    pub fn arg2(&self) -> usize {
        self.edx as usize
    }

    pub fn arg3(&self) -> usize {
        self.esi as usize
    }

    pub fn arg4(&self) -> usize {
        self.edi as usize
    }

    pub fn arg5(&self) -> usize {
        self.ebp as usize
    }

    fn to_words(self) -> [u32; FRAME_WORDS] {
        [
            self.edi,
            self.esi,
            self.ebp,
            self.esp,
            self.ebx,
            self.edx,
            self.ecx,
            self.eax,
            self.gs,
            self.fs,
            self.es,
            self.ds,
            self.trapno,
            self.err,
            self.eip,
            self.cs,
            self.eflags,
            self.user_esp,
            self.ss,
        ]
    }

    fn from_words(w: &[u32]) -> Self {
        Self {
            edi: w[0],
            esi: w[1],
            ebp: w[2],
            esp: w[3],
            ebx: w[4],
            edx: w[5],
            ecx: w[6],
            eax: w[7],
            gs: w[8],
            fs: w[9],
            es: w[10],
            ds: w[11],
            trapno: w[12],
            err: w[13],
            eip: w[14],
            cs: w[15],
            eflags: w[16],
            user_esp: w[17],
            ss: w[18],
        }
    }

    /// Take the registers user code may legitimately have changed from
    /// `saved`. Segments stay as they are; of `eflags` only the
    /// [`EFlags::USER_MODIFIABLE`] bits are taken.
    pub fn restore_user(&mut self, saved: &TrapFrame) {
        let keep = self.eflags & !EFlags::USER_MODIFIABLE.bits();
        let user = saved.eflags & EFlags::USER_MODIFIABLE.bits();
        *self = TrapFrame {
            edi: saved.edi,
            esi: saved.esi,
            ebp: saved.ebp,
            ebx: saved.ebx,
            edx: saved.edx,
            ecx: saved.ecx,
            eax: saved.eax,
            eip: saved.eip,
            eflags: keep | user,
            user_esp: saved.user_esp,
            ..*self
        };
    }
}

/// What the kernel pushes on the user stack to run a signal handler.
///
/// The handler is entered with `esp` pointing at `ret_addr`, so it sees
/// `signo` as its only argument. On return it lands in the trampoline, which
/// pops `signo` and issues `sigreturn`; the frame then starts 8 bytes below
/// the stack pointer of that call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalFrame {
    pub ret_addr: u32,
    pub signo: u32,
    pub regs: TrapFrame,
    /// The blocked mask to reinstate on `sigreturn`.
    pub mask: SignalSet,
}

impl SignalFrame {
    pub const SIZE: usize = (2 + FRAME_WORDS + 2) * 4;
    /// Distance from the `sigreturn` stack pointer back to the frame.
    pub const SIGRETURN_OFFSET: usize = 8;

    pub fn new(ret_addr: VirtAddr, signo: Signo, regs: TrapFrame, mask: SignalSet) -> Self {
        Self {
            ret_addr: ret_addr.as_usize() as u32,
            signo: signo.raw() as u32,
            regs,
            mask,
        }
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mask = self.mask.bits();
        let mut words = [0u32; 2 + FRAME_WORDS + 2];
        words[0] = self.ret_addr;
        words[1] = self.signo;
        words[2..2 + FRAME_WORDS].copy_from_slice(&self.regs.to_words());
        words[2 + FRAME_WORDS] = mask as u32;
        words[3 + FRAME_WORDS] = (mask >> 32) as u32;
        let mut bytes = [0u8; Self::SIZE];
        for (chunk, word) in bytes.chunks_exact_mut(4).zip(words) {
            chunk.copy_from_slice(&word.to_le_bytes());
        }
        bytes
    }

    pub fn from_bytes(bytes: &[u8; Self::SIZE]) -> Self {
        let mut words = [0u32; 2 + FRAME_WORDS + 2];
        for (word, chunk) in words.iter_mut().zip(bytes.chunks_exact(4)) {
            *word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        let mask = words[2 + FRAME_WORDS] as u64 | (words[3 + FRAME_WORDS] as u64) << 32;
        Self {
            ret_addr: words[0],
            signo: words[1],
            regs: TrapFrame::from_words(&words[2..2 + FRAME_WORDS]),
            mask: SignalSet::from_bits(mask),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn syscall_args_follow_i386_abi() {
        let tf = TrapFrame {
            eax: 37,
            ebx: 1,
            ecx: 2,
            edx: 3,
            esi: 4,
            edi: 5,
            ebp: 6,
            ..Default::default()
        };
        assert_eq!(tf.syscall_num(), 37);
        assert_eq!(
            [tf.arg0(), tf.arg1(), tf.arg2(), tf.arg3(), tf.arg4(), tf.arg5()],
            [1, 2, 3, 4, 5, 6]
        );
    }

    #[test]
    fn negative_retval_is_sign_extended() {
        let mut tf = TrapFrame::default();
        tf.set_retval(-4);
        assert_eq!(tf.eax, 0xffff_fffc);
        assert_eq!(tf.retval(), -4);
    }

    #[test]
    fn frame_layout() {
        let regs = TrapFrame {
            eip: 0x0804_8000,
            user_esp: 0xbfff_f000,
            ..Default::default()
        };
        let mask = SignalSet::from(Signo::SIGUSR1) | Signo::SIGRT32.into();
        let frame = SignalFrame::new(VirtAddr::from_usize(0x1000), Signo::SIGINT, regs, mask);
        let bytes = frame.to_bytes();
        assert_eq!(&bytes[0..4], &0x1000u32.to_le_bytes());
        assert_eq!(&bytes[4..8], &2u32.to_le_bytes());
        // eip is word 14 of the register block
        assert_eq!(&bytes[8 + 14 * 4..8 + 15 * 4], &0x0804_8000u32.to_le_bytes());
        assert_eq!(SignalFrame::from_bytes(&bytes), frame);
    }

    #[test]
    fn restore_keeps_privileged_state() {
        let mut live = TrapFrame::new_user(VirtAddr::from_usize(0x1000), VirtAddr::from_usize(0x2000));
        let mut saved = live;
        saved.eip = 0x3000;
        saved.eax = 7;
        saved.cs = 0x08;
        saved.eflags = 0xffff_ffff;
        live.restore_user(&saved);
        assert_eq!(live.eip, 0x3000);
        assert_eq!(live.eax, 7);
        assert_eq!(live.cs, USER_CS);
        assert!(live.eflags & EFlags::IF.bits() != 0);
        assert_eq!(
            live.eflags,
            (EFlags::IF | EFlags::RESERVED | EFlags::USER_MODIFIABLE).bits()
        );
    }
}
