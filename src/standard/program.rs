//! A device program.

use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::hal::ProgramHandle;

use super::device::DeviceShared;
use super::kernel::{self, Argument};
use super::NdRange;

struct ProgramShared {
    device: Arc<DeviceShared>,
    handle: ProgramHandle,
}

impl Drop for ProgramShared {
    fn drop(&mut self) {
        self.device.hal_device.program_free(self.handle);
    }
}

/// A program loaded on a device, from which kernels can be created.
///
/// The kernel binary is consumed by the device at creation; the runtime
/// retains no reference into the caller's memory. Destruction is handled
/// automatically; clones share one device-side program.
#[derive(Clone)]
pub struct Program {
    shared: Arc<ProgramShared>,
}

impl Program {
    pub(crate) fn new(device: Arc<DeviceShared>, binary: &[u8]) -> Result<Program> {
        let handle = device
            .hal_device
            .program_load(binary)
            .ok_or(Error::ProgramLoadFailed)?;
        Ok(Program {
            shared: Arc::new(ProgramShared { device, handle }),
        })
    }

    pub(crate) fn device(&self) -> &Arc<DeviceShared> {
        &self.shared.device
    }

    pub(crate) fn handle(&self) -> ProgramHandle {
        self.shared.handle
    }

    /// Resolves a kernel by name and executes it over the given range on
    /// the caller's thread, blocking until the device has finished.
    pub fn run_kernel(&self, name: &str, range: &NdRange, args: &[Argument]) -> Result<()> {
        let device = &self.shared.device;
        let entry = device
            .hal_device
            .find_kernel(self.handle(), name)
            .ok_or_else(|| Error::KernelNotFound {
                name: name.to_string(),
            })?;
        kernel::execute_on_device(&*device.hal_device, self.handle(), entry, range, args)
    }
}

impl fmt::Debug for Program {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Program")
            .field("handle", &self.shared.handle)
            .finish()
    }
}
