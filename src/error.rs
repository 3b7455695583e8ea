//! Standard error type for kiln.

use crate::standard::CommandType;
use kiln_hal::loader::LoadError;

/// Kiln error result type.
pub type Result<T> = std::result::Result<T, Error>;

/// An error produced by the runtime.
///
/// Creation paths release any partially-constructed object before
/// returning one of these. Enqueue paths never partially commit: on error
/// nothing is queued and no timestamp is consumed.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A read, write, or copy referenced a range outside its buffer.
    #[error("access of {size} bytes at offset {offset} overruns a buffer of {len} bytes")]
    OutOfBounds { offset: u64, size: u64, len: u64 },
    /// An N-D range with a zero-sized work-group reached execution.
    #[error("the N-D range work-group size is zero")]
    ZeroWorkGroup,
    /// The device could not satisfy an allocation request.
    #[error("device allocation of {size} bytes failed")]
    AllocationFailed { size: u64 },
    /// A kernel name did not resolve within its program.
    #[error("no kernel named '{name}' in the program")]
    KernelNotFound { name: String },
    /// A kernel was built without an N-D range.
    #[error("no N-D range was specified for the kernel")]
    MissingRange,
    /// The device rejected a kernel binary.
    #[error("the device rejected the program binary")]
    ProgramLoadFailed,
    /// An enqueue was attempted on a queue that is shutting down.
    #[error("the command queue is shutting down")]
    ShuttingDown,
    /// A device operation reported failure mid-execution. The `command`
    /// field carries the kind of command that failed.
    #[error("the device reported failure")]
    CommandFailed { command: CommandType },
    /// No HAL could be loaded.
    #[error("{0}")]
    Loader(#[from] LoadError),
    /// The loaded HAL reports no devices.
    #[error("platform '{platform}' reports no devices")]
    NoDevices { platform: String },
    /// The loaded HAL refused to instantiate its first device.
    #[error("platform '{platform}' could not create device 0")]
    DeviceCreation { platform: String },
    #[error("{0}")]
    Io(#[from] std::io::Error),
}
