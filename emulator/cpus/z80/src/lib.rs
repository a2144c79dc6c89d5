pub mod assembly;
pub mod decode;
pub mod execute;
pub mod instructions;
pub mod interrupts;
pub mod port;
pub mod state;
pub mod timing;

pub use crate::decode::Z80Decoder;
pub use crate::instructions::InterruptMode;
pub use crate::port::{wrap_port_device, PortBus, PortDevice, PortDeviceBox};
pub use crate::state::{Flags, Z80, Z80State, DEFAULT_FREQUENCY};
