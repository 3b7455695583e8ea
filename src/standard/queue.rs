//! An in-order command queue.
//!
//! Commands are enqueued with a monotonic timestamp, made eligible for
//! execution by [`Queue::dispatch`], executed in FIFO order by a dedicated
//! worker thread, and awaited with [`Queue::wait`]. Three watermarks drive
//! the engine:
//!
//! * `next_timestamp`: the timestamp the next enqueued command receives;
//! * `dispatched_timestamp`: the largest timestamp eligible to execute;
//! * `executed_timestamp`: the largest timestamp known to have completed.
//!
//! At all times `0 <= executed <= dispatched < next`. The worker owns the
//! interval `(executed, dispatched]` and drops the queue lock around every
//! device call so callers can keep enqueueing while the device is busy.

use std::collections::VecDeque;
use std::fmt;
use std::slice;
use std::sync::Arc;

use crate::error::{Error, Result};

use super::device::DeviceShared;
use super::{Buffer, Kernel};

/// Identifies the kind of a queued command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandType {
    ReadBuffer,
    WriteBuffer,
    CopyBuffer,
    RunKernel,
}

impl fmt::Display for CommandType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match *self {
            CommandType::ReadBuffer => "read buffer",
            CommandType::WriteBuffer => "write buffer",
            CommandType::CopyBuffer => "copy buffer",
            CommandType::RunKernel => "run kernel",
        };
        f.write_str(name)
    }
}

// A mutable span of host memory lent to the queue until the command that
// writes it has executed. The contract is upheld by the caller of
// `Queue::enqueue_read_buffer`.
#[derive(Debug)]
pub(crate) struct HostSlice {
    ptr: *mut u8,
    len: usize,
}

unsafe impl Send for HostSlice {}
unsafe impl Sync for HostSlice {}

impl HostSlice {
    fn new(slice: &mut [u8]) -> HostSlice {
        HostSlice {
            ptr: slice.as_mut_ptr(),
            len: slice.len(),
        }
    }

    unsafe fn as_slice(&self) -> &mut [u8] {
        slice::from_raw_parts_mut(self.ptr, self.len)
    }
}

#[derive(Debug)]
pub(crate) enum CommandKind {
    ReadBuffer {
        buffer: Buffer,
        offset: u64,
        dst: HostSlice,
    },
    WriteBuffer {
        buffer: Buffer,
        offset: u64,
        data: Vec<u8>,
    },
    CopyBuffer {
        dst: Buffer,
        dst_offset: u64,
        src: Buffer,
        src_offset: u64,
        size: u64,
    },
    RunKernel {
        kernel: Kernel,
    },
}

impl CommandKind {
    fn command_type(&self) -> CommandType {
        match *self {
            CommandKind::ReadBuffer { .. } => CommandType::ReadBuffer,
            CommandKind::WriteBuffer { .. } => CommandType::WriteBuffer,
            CommandKind::CopyBuffer { .. } => CommandType::CopyBuffer,
            CommandKind::RunKernel { .. } => CommandType::RunKernel,
        }
    }

    // Performs the device work for this command. Must be called without
    // the queue lock held.
    fn execute(&self, shared: &DeviceShared) -> Result<()> {
        let hal_device = &*shared.hal_device;
        let failure = Error::CommandFailed {
            command: self.command_type(),
        };
        match *self {
            CommandKind::ReadBuffer {
                ref buffer,
                offset,
                ref dst,
            } => {
                let dst = unsafe { dst.as_slice() };
                if hal_device.mem_read(dst, buffer.device_addr() + offset) {
                    Ok(())
                } else {
                    Err(failure)
                }
            }
            CommandKind::WriteBuffer {
                ref buffer,
                offset,
                ref data,
            } => {
                if hal_device.mem_write(buffer.device_addr() + offset, data) {
                    Ok(())
                } else {
                    Err(failure)
                }
            }
            CommandKind::CopyBuffer {
                ref dst,
                dst_offset,
                ref src,
                src_offset,
                size,
            } => {
                if hal_device.mem_copy(
                    dst.device_addr() + dst_offset,
                    src.device_addr() + src_offset,
                    size,
                ) {
                    Ok(())
                } else {
                    Err(failure)
                }
            }
            CommandKind::RunKernel { ref kernel } => kernel.execute(hal_device),
        }
    }
}

// One unit of device-side work, stamped at enqueue time. Commands enqueued
// earlier always carry a strictly smaller timestamp.
#[derive(Debug)]
pub(crate) struct Command {
    pub(crate) timestamp: u64,
    pub(crate) kind: CommandKind,
}

pub(crate) struct QueueState {
    pub(crate) commands: VecDeque<Command>,
    pub(crate) next_timestamp: u64,
    pub(crate) dispatched_timestamp: u64,
    pub(crate) executed_timestamp: u64,
    pub(crate) shutting_down: bool,
    // First failure observed by the worker since the last wait.
    pub(crate) last_error: Option<Error>,
}

impl QueueState {
    pub(crate) fn new() -> QueueState {
        QueueState {
            commands: VecDeque::new(),
            next_timestamp: 1,
            dispatched_timestamp: 0,
            executed_timestamp: 0,
            shutting_down: false,
            last_error: None,
        }
    }
}

/// A device's in-order command queue.
///
/// Enqueued commands do not start executing until [`dispatch`] is called;
/// [`wait`] blocks until every command dispatched before it was called has
/// executed. Clones share the same queue.
///
/// [`dispatch`]: Queue::dispatch
/// [`wait`]: Queue::wait
#[derive(Clone)]
pub struct Queue {
    shared: Arc<DeviceShared>,
}

impl Queue {
    pub(crate) fn new(shared: Arc<DeviceShared>) -> Queue {
        Queue { shared }
    }

    /// Enqueues a command to read from device memory into `dst`.
    ///
    /// `dst.len()` bytes are read starting `src_offset` bytes into the
    /// buffer.
    ///
    /// # Safety
    ///
    /// The command writes `dst` from the queue's worker thread at some
    /// point between the next [`dispatch`] and the completion of the wait
    /// that covers it. The caller must keep the memory behind `dst` alive
    /// and must not access it until [`wait`] has returned (or the owning
    /// device has been dropped).
    ///
    /// [`dispatch`]: Queue::dispatch
    /// [`wait`]: Queue::wait
    pub unsafe fn enqueue_read_buffer(
        &self,
        dst: &mut [u8],
        src: &Buffer,
        src_offset: u64,
    ) -> Result<()> {
        src.check_access(src_offset, dst.len() as u64)?;
        self.push(CommandKind::ReadBuffer {
            buffer: src.clone(),
            offset: src_offset,
            dst: HostSlice::new(dst),
        })
    }

    /// Enqueues a command to write `src` into device memory.
    ///
    /// The bytes are copied into the command; `src` may be reused as soon
    /// as this returns.
    pub fn enqueue_write_buffer(&self, dst: &Buffer, dst_offset: u64, src: &[u8]) -> Result<()> {
        dst.check_access(dst_offset, src.len() as u64)?;
        self.push(CommandKind::WriteBuffer {
            buffer: dst.clone(),
            offset: dst_offset,
            data: src.to_vec(),
        })
    }

    /// Enqueues a command to copy `size` bytes from one buffer to another.
    pub fn enqueue_copy_buffer(
        &self,
        dst: &Buffer,
        dst_offset: u64,
        src: &Buffer,
        src_offset: u64,
        size: u64,
    ) -> Result<()> {
        dst.check_access(dst_offset, size)?;
        src.check_access(src_offset, size)?;
        self.push(CommandKind::CopyBuffer {
            dst: dst.clone(),
            dst_offset,
            src: src.clone(),
            src_offset,
            size,
        })
    }

    /// Enqueues a command to execute a kernel.
    ///
    /// The kernel handle is cloned; the command keeps the kernel, its
    /// program, and every buffer it references alive until it has executed.
    pub fn enqueue_kernel(&self, kernel: &Kernel) -> Result<()> {
        self.push(CommandKind::RunKernel {
            kernel: kernel.clone(),
        })
    }

    fn push(&self, kind: CommandKind) -> Result<()> {
        let mut state = self.shared.lock_state();
        if state.shutting_down {
            return Err(Error::ShuttingDown);
        }
        let timestamp = state.next_timestamp;
        state.next_timestamp += 1;
        state.commands.push_back(Command { timestamp, kind });
        Ok(())
    }

    /// Starts executing every command enqueued so far.
    ///
    /// Returns `true` if any commands were newly made eligible by this
    /// call, `false` when there was nothing left to dispatch.
    pub fn dispatch(&self) -> bool {
        let mut state = self.shared.lock_state();
        let newest = state
            .commands
            .iter()
            .map(|cmd| cmd.timestamp)
            .max()
            .unwrap_or(0);
        if newest <= state.dispatched_timestamp {
            return false;
        }
        state.dispatched_timestamp = newest;
        self.shared.dispatched.notify_all();
        true
    }

    /// Blocks until every command dispatched before this call has executed.
    ///
    /// Returns immediately when nothing has been dispatched. If any covered
    /// command failed on the device, the first such failure is returned
    /// (the queue itself stays live and later commands still execute).
    pub fn wait(&self) -> Result<()> {
        let mut state = self.shared.lock_state();
        let current = state.dispatched_timestamp;
        while state.executed_timestamp < current {
            state = self.shared.wait_executed(state);
        }
        match state.last_error.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    #[cfg(test)]
    pub(crate) fn timestamps(&self) -> (u64, u64, u64) {
        let state = self.shared.lock_state();
        (
            state.next_timestamp,
            state.dispatched_timestamp,
            state.executed_timestamp,
        )
    }

    #[cfg(test)]
    pub(crate) fn queued_timestamps(&self) -> Vec<u64> {
        let state = self.shared.lock_state();
        state.commands.iter().map(|cmd| cmd.timestamp).collect()
    }
}

impl fmt::Debug for Queue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let state = self.shared.lock_state();
        f.debug_struct("Queue")
            .field("pending", &state.commands.len())
            .field("next_timestamp", &state.next_timestamp)
            .field("dispatched_timestamp", &state.dispatched_timestamp)
            .field("executed_timestamp", &state.executed_timestamp)
            .finish()
    }
}

// Entry point for the queue's worker thread. Executes dispatched commands
// in FIFO order, then parks on the `dispatched` condition variable until
// more work arrives or the queue shuts down.
pub(crate) fn run_worker(shared: Arc<DeviceShared>) {
    let mut state = shared.lock_state();
    loop {
        let previous = state.executed_timestamp;
        let current = state.dispatched_timestamp;
        loop {
            // Commands past the dispatch watermark have not been started.
            let ready = matches!(
                state.commands.front(),
                Some(cmd) if cmd.timestamp <= current
            );
            if !ready {
                break;
            }
            let cmd = match state.commands.pop_front() {
                Some(cmd) => cmd,
                None => break,
            };

            // Execute without the lock held so callers can keep enqueueing
            // while the device is busy.
            drop(state);
            let result = cmd.kind.execute(&shared);
            state = shared.lock_state();

            // The queue is FIFO, so this only ever increases.
            state.executed_timestamp = cmd.timestamp;
            if let Err(err) = result {
                log::error!(
                    "{} command (timestamp {}) failed: {}",
                    cmd.kind.command_type(),
                    cmd.timestamp,
                    err
                );
                if state.last_error.is_none() {
                    state.last_error = Some(err);
                }
            }
        }

        if state.executed_timestamp > previous {
            shared.executed.notify_all();
        }

        // Shutdown is honored only once drained to the dispatch watermark,
        // so releasing a device never abandons dispatched work.
        if state.shutting_down {
            break;
        }
        state = shared.wait_dispatched(state);
    }
}
