//! Typed addresses in the calling process's address space.
//!
//! Nothing here dereferences user memory directly: every access is a copy
//! through the memory manager, so a bad address is an `EFAULT`, never a fault
//! in the kernel.

use alloc::string::String;
use alloc::vec::Vec;
use axerrno::{LinuxError, LinuxResult};
use core::ffi::c_char;
use core::fmt;
use core::marker::PhantomData;
use kestrel_core::Kernel;
use memory_addr::VirtAddr;

/// Longest path `execve` accepts, terminator included.
pub const PATH_MAX: usize = 4096;
/// Most entries an `argv` or `envp` array may have.
pub const ARG_MAX: usize = 1024;

/// Plain data that may be copied to and from user memory byte for byte.
///
/// # Safety
///
/// The type must have no padding and every bit pattern must be a valid value.
pub unsafe trait UserPod: Copy + Default {}

unsafe impl UserPod for i8 {}
unsafe impl UserPod for u8 {}
unsafe impl UserPod for u16 {}
unsafe impl UserPod for i32 {}
unsafe impl UserPod for u32 {}
unsafe impl UserPod for u64 {}

fn bytes_of<T: UserPod>(value: &T) -> &[u8] {
    // SAFETY: `T: UserPod` has no padding.
    unsafe { core::slice::from_raw_parts(value as *const T as *const u8, size_of::<T>()) }
}

fn bytes_of_mut<T: UserPod>(value: &mut T) -> &mut [u8] {
    // SAFETY: `T: UserPod` accepts any bit pattern.
    unsafe { core::slice::from_raw_parts_mut(value as *mut T as *mut u8, size_of::<T>()) }
}

pub trait PtrWrapper<T>: Sized {
    fn address(&self) -> VirtAddr;

    fn is_null(&self) -> bool {
        self.address().as_usize() == 0
    }

    /// `None` for a null pointer.
    fn nullable(self) -> Option<Self> {
        (!self.is_null()).then_some(self)
    }
}

macro_rules! user_ptr {
    ($(#[$attr:meta])* $name:ident) => {
        $(#[$attr])*
        pub struct $name<T> {
            addr: VirtAddr,
            _phantom: PhantomData<T>,
        }

        impl<T> Clone for $name<T> {
            fn clone(&self) -> Self {
                *self
            }
        }

        impl<T> Copy for $name<T> {}

        impl<T> From<usize> for $name<T> {
            fn from(value: usize) -> Self {
                Self {
                    addr: VirtAddr::from_usize(value),
                    _phantom: PhantomData,
                }
            }
        }

        impl<T> PtrWrapper<T> for $name<T> {
            fn address(&self) -> VirtAddr {
                self.addr
            }
        }

        impl<T> fmt::Debug for $name<T> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{:#x}", self.addr.as_usize())
            }
        }
    };
}

user_ptr!(
    /// A user pointer the kernel writes through.
    UserPtr
);
user_ptr!(
    /// A user pointer the kernel only reads.
    UserConstPtr
);

fn check_null(addr: VirtAddr) -> LinuxResult<VirtAddr> {
    if addr.as_usize() == 0 {
        return Err(LinuxError::EFAULT);
    }
    Ok(addr)
}

fn read_at<T: UserPod>(kernel: &Kernel, addr: VirtAddr) -> LinuxResult<T> {
    let pid = kernel.current_pid()?;
    let mut value = T::default();
    kernel
        .collaborators()
        .mm
        .copy_from_user(pid, check_null(addr)?, bytes_of_mut(&mut value))?;
    Ok(value)
}

impl<T: UserPod> UserPtr<T> {
    pub fn write(&self, kernel: &Kernel, value: T) -> LinuxResult<()> {
        let pid = kernel.current_pid()?;
        kernel
            .collaborators()
            .mm
            .copy_to_user(pid, check_null(self.addr)?, bytes_of(&value))
    }

    /// Write unless the pointer is null.
    pub fn write_nullable(&self, kernel: &Kernel, value: T) -> LinuxResult<()> {
        match self.nullable() {
            Some(ptr) => ptr.write(kernel, value),
            None => Ok(()),
        }
    }

    pub fn read(&self, kernel: &Kernel) -> LinuxResult<T> {
        read_at(kernel, self.addr)
    }
}

impl<T: UserPod> UserConstPtr<T> {
    pub fn read(&self, kernel: &Kernel) -> LinuxResult<T> {
        read_at(kernel, self.addr)
    }

    /// Read unless the pointer is null.
    pub fn read_nullable(&self, kernel: &Kernel) -> LinuxResult<Option<T>> {
        self.nullable().map(|ptr| ptr.read(kernel)).transpose()
    }

    fn offset(&self, count: usize) -> LinuxResult<VirtAddr> {
        count
            .checked_mul(size_of::<T>())
            .and_then(|off| self.addr.as_usize().checked_add(off))
            .map(VirtAddr::from_usize)
            .ok_or(LinuxError::EFAULT)
    }

    /// Values up to (not including) the first default one, at most `max`.
    pub fn read_until_default(&self, kernel: &Kernel, max: usize) -> LinuxResult<Vec<T>>
    where
        T: PartialEq,
    {
        let mut values = Vec::new();
        for i in 0..max {
            let value: T = read_at(kernel, self.offset(i)?)?;
            if value == T::default() {
                return Ok(values);
            }
            values.push(value);
        }
        Err(LinuxError::E2BIG)
    }
}

impl UserConstPtr<c_char> {
    /// A NUL-terminated UTF-8 string.
    pub fn read_str(&self, kernel: &Kernel) -> LinuxResult<String> {
        let bytes = self
            .read_until_default(kernel, PATH_MAX)
            .map_err(|err| match err {
                LinuxError::E2BIG => LinuxError::ENAMETOOLONG,
                other => other,
            })?;
        let bytes: Vec<u8> = bytes.into_iter().map(|c| c as u8).collect();
        String::from_utf8(bytes).map_err(|_| LinuxError::EINVAL)
    }
}

impl UserConstPtr<u32> {
    /// A null-terminated array of string pointers, as `argv` and `envp` are.
    pub fn read_str_array(&self, kernel: &Kernel) -> LinuxResult<Vec<String>> {
        self.read_until_default(kernel, ARG_MAX)?
            .into_iter()
            .map(|ptr| UserConstPtr::<c_char>::from(ptr as usize).read_str(kernel))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kestrel_core::collab::MemoryManager;
    use kestrel_core::mock::{MockEnv, STACK_TOP};

    const BUF: usize = STACK_TOP - 0x1000;

    fn put(env: &MockEnv, pid: u32, addr: usize, bytes: &[u8]) {
        env.mm
            .copy_to_user(pid, VirtAddr::from_usize(addr), bytes)
            .unwrap();
    }

    #[test]
    fn null_and_unmapped_fault() {
        let env = MockEnv::boot();
        env.spawn_init();
        let kernel = &env.kernel;
        assert_eq!(UserConstPtr::<u32>::from(0).read(kernel), Err(LinuxError::EFAULT));
        assert_eq!(UserConstPtr::<u32>::from(0).read_nullable(kernel), Ok(None));
        assert_eq!(UserPtr::<u32>::from(0).write_nullable(kernel, 1), Ok(()));
        assert_eq!(UserPtr::<u32>::from(0x10).write(kernel, 1), Err(LinuxError::EFAULT));
    }

    #[test]
    fn strings_and_arrays() {
        let env = MockEnv::boot();
        let (init, _) = env.spawn_init();
        let kernel = &env.kernel;
        put(&env, init, BUF, b"sh\0-c\0");
        let argv = [BUF as u32, BUF as u32 + 3, 0];
        for (i, ptr) in argv.iter().enumerate() {
            put(&env, init, BUF + 0x100 + i * 4, &ptr.to_le_bytes());
        }
        let array = UserConstPtr::<u32>::from(BUF + 0x100);
        assert_eq!(array.read_str_array(kernel), Ok(vec![String::from("sh"), String::from("-c")]));

        // runs into the unmapped page above the stack
        put(&env, init, STACK_TOP - 16, &[b'a'; 16]);
        let unterminated = UserConstPtr::<c_char>::from(STACK_TOP - 16);
        assert_eq!(unterminated.read_str(kernel), Err(LinuxError::EFAULT));
    }

    #[test]
    fn write_then_read_back() {
        let env = MockEnv::boot();
        env.spawn_init();
        let kernel = &env.kernel;
        let ptr = UserPtr::<u64>::from(BUF);
        ptr.write(kernel, 0x1122_3344_5566_7788).unwrap();
        assert_eq!(UserConstPtr::<u32>::from(BUF + 4).read(kernel), Ok(0x1122_3344));
        assert_eq!(format!("{:?}", ptr), format!("{:#x}", BUF));
    }
}
