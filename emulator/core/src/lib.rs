pub mod memory;
pub mod signal;

pub use crate::memory::{Memory, ADDRESSABLE_SIZE, read_beu16, read_leu16, write_beu16, write_leu16};
pub use crate::signal::{EdgeSignal, Signal};
