//! A buffer in device memory.

use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::hal::DeviceAddr;

use super::device::DeviceShared;

/// Alignment, in bytes, of every device allocation made for a buffer.
pub const BUFFER_ALIGNMENT: u64 = 4096;

struct BufferShared {
    device: Arc<DeviceShared>,
    addr: DeviceAddr,
    size: u64,
}

impl Drop for BufferShared {
    fn drop(&mut self) {
        self.device.hal_device.mem_free(self.addr);
    }
}

/// A handle to a range of device memory.
///
/// Destruction is handled automatically; clones share one allocation, and
/// a command referencing a buffer keeps it alive until the command has
/// executed.
#[derive(Clone)]
pub struct Buffer {
    shared: Arc<BufferShared>,
}

impl Buffer {
    pub(crate) fn new(device: Arc<DeviceShared>, size: u64) -> Result<Buffer> {
        let addr = device
            .hal_device
            .mem_alloc(size, BUFFER_ALIGNMENT)
            .ok_or(Error::AllocationFailed { size })?;
        Ok(Buffer {
            shared: Arc::new(BufferShared { device, addr, size }),
        })
    }

    /// Returns the size of the buffer in bytes.
    pub fn size(&self) -> u64 {
        self.shared.size
    }

    pub(crate) fn device_addr(&self) -> DeviceAddr {
        self.shared.addr
    }

    // Every access referencing (offset, size) must stay within the buffer.
    pub(crate) fn check_access(&self, offset: u64, size: u64) -> Result<()> {
        match offset.checked_add(size) {
            Some(end) if end <= self.shared.size => Ok(()),
            _ => Err(Error::OutOfBounds {
                offset,
                size,
                len: self.shared.size,
            }),
        }
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("addr", &self.shared.addr)
            .field("size", &self.shared.size)
            .finish()
    }
}
