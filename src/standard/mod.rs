//! `kiln` standard types.

mod buffer;
mod device;
mod kernel;
mod ndrange;
mod program;
mod queue;

pub use self::buffer::{Buffer, BUFFER_ALIGNMENT};
pub use self::device::Device;
pub use self::kernel::{Argument, HostScalar, Kernel, KernelBuilder};
pub use self::ndrange::{Extent, NdRange};
pub use self::program::Program;
pub use self::queue::{CommandType, Queue};
