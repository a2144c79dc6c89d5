pub mod breakpoints;
pub mod charset;
pub mod history;
pub mod runner;
pub mod watches;

pub use crate::breakpoints::{Breakpoint, BreakpointHandle, BreakpointObserver, BreakpointSet, ChangeWidth};
pub use crate::history::{ExecutedInstruction, ExecutionHistory};
pub use crate::runner::{Runner, StopReason};
pub use crate::watches::{CharacterEncoding, DisplayBase, IntegerWidth, MemoryWatch, WatchByteOrder, WatchHandle, WatchSet};

/// Errors reported to the host for debugger construction mistakes.  The
/// execution path itself never fails; see the error-handling rules in the
/// CPU crate.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DebuggerError {
    #[error("watched range of {size} bytes at {address:#06x} runs past the end of addressable memory")]
    InvalidAddress { address: u16, size: usize },
}
