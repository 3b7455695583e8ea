//! A minimal, portable compute runtime.
//!
//! `kiln` drives a device capable of executing binary kernels over an
//! N-dimensional index space. The device itself sits behind the hardware
//! abstraction layer contract defined in the [`kiln-hal`] crate; the
//! runtime layers an object model (devices, programs, kernels, buffers)
//! and an in-order command queue on top of it.
//!
//! Two surfaces are exposed over the same substrate:
//!
//! * a **synchronous** surface, where each call blocks until the device
//!   has finished the requested work
//!   ([`Device::write_buffer`], [`Device::read_buffer`],
//!   [`Device::copy_buffer`], [`Program::run_kernel`]), and
//! * an **asynchronous** surface, where commands are enqueued onto the
//!   device's [`Queue`], started as a batch with [`Queue::dispatch`], and
//!   awaited with [`Queue::wait`].
//!
//! ## Example
//!
//! ```
//! use kiln::{Argument, Device, Kernel, NdRange};
//!
//! fn main() -> kiln::Result<()> {
//!     let device = Device::new()?;
//!     let buffer = device.create_buffer(1024 * 4)?;
//!     // The mock device resolves kernels from a manifest of names.
//!     let program = device.create_program(b"vector_add")?;
//!     let kernel = Kernel::builder(&program, "vector_add")
//!         .range(NdRange::new(1024, 16))
//!         .arg(&buffer)
//!         .arg(Argument::scalar(2.5f32))
//!         .build()?;
//!
//!     let queue = device.queue();
//!     queue.enqueue_write_buffer(&buffer, 0, &[0u8; 4096])?;
//!     queue.enqueue_kernel(&kernel)?;
//!     queue.dispatch();
//!     queue.wait()?;
//!     Ok(())
//! }
//! ```
//!
//! [`kiln-hal`]: ../kiln_hal/index.html

pub extern crate kiln_hal as hal;

#[cfg(test)]
mod tests;
mod standard;
pub mod error;

pub use self::standard::{
    Argument, Buffer, CommandType, Device, Extent, HostScalar, Kernel, KernelBuilder, NdRange,
    Program, Queue, BUFFER_ALIGNMENT,
};
pub use crate::error::{Error, Result};
#[doc(no_inline)]
pub use crate::hal::{DeviceAddr, Hal, HalDevice};
