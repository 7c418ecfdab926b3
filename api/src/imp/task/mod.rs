mod clone;
mod execve;
mod exit;
pub mod signal;
mod thread;
mod tty;
mod wait;

pub use self::clone::*;
pub use self::execve::*;
pub use self::exit::*;
pub use self::thread::*;
pub use self::tty::*;
pub use self::wait::*;
