//! A compute device.

use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use crate::error::{Error, Result};
use crate::hal::loader;
use crate::hal::{Hal, HalDevice, Info};

use super::queue::{self, CommandType, Queue, QueueState};
use super::{Buffer, Program};

/// State shared between a device's handles, its child objects, and its
/// queue worker thread.
///
/// The mutex protects the command-queue bookkeeping only. Calls into the
/// HAL are made with the mutex released; the [`HalDevice`] contract makes
/// the device responsible for its own synchronization.
pub(crate) struct DeviceShared {
    pub(crate) hal: Box<dyn Hal>,
    pub(crate) hal_device: Box<dyn HalDevice>,
    pub(crate) platform_name: String,
    pub(crate) state: Mutex<QueueState>,
    pub(crate) dispatched: Condvar,
    pub(crate) executed: Condvar,
}

impl DeviceShared {
    pub(crate) fn lock_state(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn wait_dispatched<'a>(
        &self,
        guard: MutexGuard<'a, QueueState>,
    ) -> MutexGuard<'a, QueueState> {
        self.dispatched
            .wait(guard)
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn wait_executed<'a>(
        &self,
        guard: MutexGuard<'a, QueueState>,
    ) -> MutexGuard<'a, QueueState> {
        self.executed
            .wait(guard)
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// A handle to a compute device.
///
/// A `Device` owns the HAL device it was created from, one command queue,
/// and the worker thread that executes dispatched commands. Dropping it
/// dispatches any residual work, drains the queue, joins the worker, and
/// releases the HAL device.
///
/// Buffer and kernel-execution operations are available both synchronously
/// (the methods on this type and [`Program::run_kernel`], which block until
/// the device has finished) and asynchronously through [`Device::queue`].
pub struct Device {
    shared: Arc<DeviceShared>,
    queue: Queue,
    worker: Option<JoinHandle<()>>,
}

impl Device {
    /// Creates a device using the HAL selected by the loader.
    ///
    /// The HAL is chosen by the `KILN_HAL_DEVICE` environment variable,
    /// falling back to the registered default.
    pub fn new() -> Result<Device> {
        let hal = loader::load_default()?;
        Device::with_hal(hal)
    }

    /// Creates a device from an already-loaded HAL.
    ///
    /// Requires the HAL to report at least one device; device 0 is used.
    pub fn with_hal(hal: Box<dyn Hal>) -> Result<Device> {
        let info = hal.info();
        if info.num_devices == 0 {
            return Err(Error::NoDevices {
                platform: info.platform_name,
            });
        }
        let hal_device = match hal.device_create(0) {
            Some(device) => device,
            None => {
                return Err(Error::DeviceCreation {
                    platform: info.platform_name,
                })
            }
        };
        log::info!("using device '{}'", info.platform_name);

        let shared = Arc::new(DeviceShared {
            hal,
            hal_device,
            platform_name: info.platform_name,
            state: Mutex::new(QueueState::new()),
            dispatched: Condvar::new(),
            executed: Condvar::new(),
        });
        let worker = {
            let shared = Arc::clone(&shared);
            thread::Builder::new()
                .name("kiln-queue".to_string())
                .spawn(move || queue::run_worker(shared))?
        };
        Ok(Device {
            queue: Queue::new(Arc::clone(&shared)),
            shared,
            worker: Some(worker),
        })
    }

    /// Returns the device's command queue.
    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    /// Returns the name of the platform behind this device.
    pub fn platform_name(&self) -> &str {
        &self.shared.platform_name
    }

    /// Returns discovery information reported by the device's HAL.
    pub fn info(&self) -> Info {
        self.shared.hal.info()
    }

    /// Creates a program from a kernel binary.
    pub fn create_program(&self, binary: &[u8]) -> Result<Program> {
        Program::new(Arc::clone(&self.shared), binary)
    }

    /// Creates a buffer of `size` bytes in device memory.
    pub fn create_buffer(&self, size: u64) -> Result<Buffer> {
        Buffer::new(Arc::clone(&self.shared), size)
    }

    /// Reads `dst.len()` bytes from a buffer into host memory, blocking
    /// until the device has finished.
    pub fn read_buffer(&self, dst: &mut [u8], src: &Buffer, src_offset: u64) -> Result<()> {
        src.check_access(src_offset, dst.len() as u64)?;
        if self
            .shared
            .hal_device
            .mem_read(dst, src.device_addr() + src_offset)
        {
            Ok(())
        } else {
            Err(Error::CommandFailed {
                command: CommandType::ReadBuffer,
            })
        }
    }

    /// Writes `src.len()` bytes of host memory into a buffer, blocking
    /// until the device has finished.
    pub fn write_buffer(&self, dst: &Buffer, dst_offset: u64, src: &[u8]) -> Result<()> {
        dst.check_access(dst_offset, src.len() as u64)?;
        if self
            .shared
            .hal_device
            .mem_write(dst.device_addr() + dst_offset, src)
        {
            Ok(())
        } else {
            Err(Error::CommandFailed {
                command: CommandType::WriteBuffer,
            })
        }
    }

    /// Copies `size` bytes between two buffers, blocking until the device
    /// has finished.
    pub fn copy_buffer(
        &self,
        dst: &Buffer,
        dst_offset: u64,
        src: &Buffer,
        src_offset: u64,
        size: u64,
    ) -> Result<()> {
        dst.check_access(dst_offset, size)?;
        src.check_access(src_offset, size)?;
        if self.shared.hal_device.mem_copy(
            dst.device_addr() + dst_offset,
            src.device_addr() + src_offset,
            size,
        ) {
            Ok(())
        } else {
            Err(Error::CommandFailed {
                command: CommandType::CopyBuffer,
            })
        }
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        // Residual enqueued work is dispatched so shutdown drains it.
        self.queue.dispatch();
        {
            let mut state = self.shared.lock_state();
            state.shutting_down = true;
            self.shared.dispatched.notify_all();
        }
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        // Commands that were never dispatched still hold object handles,
        // which in turn hold the shared device state; clear them so the
        // Arc chain unwinds.
        self.shared.lock_state().commands.clear();
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Device")
            .field("platform", &self.shared.platform_name)
            .finish()
    }
}
