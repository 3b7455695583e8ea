//! A device kernel and its arguments.

use std::fmt;
use std::mem;
use std::ptr;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::hal::{self, EntryPoint, HalDevice, ProgramHandle};

use super::queue::CommandType;
use super::{Buffer, NdRange, Program};

/// Types which can be passed to a kernel by value.
///
/// Implementors must be plain-old-data: the scalar's native byte
/// representation is copied into the argument and handed to the device
/// verbatim.
pub trait HostScalar:
    fmt::Debug + Clone + Copy + Default + PartialEq + Send + Sync + 'static
{
}

macro_rules! impl_host_scalar {
    ($($ty:ty),* $(,)?) => {
        $(impl HostScalar for $ty {})*
    };
}

impl_host_scalar!(u8, i8, u16, i16, u32, i32, u64, i64, usize, isize, f32, f64);

// Returns the native byte representation of a host scalar.
fn into_bytes<T: HostScalar>(val: T) -> Vec<u8> {
    let size = mem::size_of::<T>();
    let mut bytes = vec![0u8; size];
    unsafe {
        ptr::copy_nonoverlapping(&val as *const T as *const u8, bytes.as_mut_ptr(), size);
    }
    bytes
}

/// A value passed to a kernel as one of its parameters.
///
/// Arguments own what they reference: a buffer argument keeps its buffer
/// alive, and a scalar argument carries a copy of the value's bytes. An
/// argument vector therefore remains valid for as long as the kernel that
/// holds it, wherever the kernel is executed.
#[derive(Clone, Debug)]
pub enum Argument {
    /// A device buffer, passed to the kernel as a global pointer.
    Buffer(Buffer),
    /// A plain-old-data value, passed to the kernel by value.
    Scalar(Vec<u8>),
    /// A chunk of shared memory of the given size in bytes, allocated
    /// per work-group and passed to the kernel as a local pointer.
    Local(u64),
}

impl Argument {
    /// Returns a buffer argument.
    pub fn buffer(buffer: &Buffer) -> Argument {
        Argument::Buffer(buffer.clone())
    }

    /// Returns a by-value scalar argument.
    pub fn scalar<T: HostScalar>(val: T) -> Argument {
        Argument::Scalar(into_bytes(val))
    }

    /// Returns a shared-local-memory argument of `size` bytes.
    pub fn local(size: u64) -> Argument {
        Argument::Local(size)
    }
}

impl From<&Buffer> for Argument {
    fn from(buffer: &Buffer) -> Argument {
        Argument::buffer(buffer)
    }
}

impl From<Buffer> for Argument {
    fn from(buffer: Buffer) -> Argument {
        Argument::Buffer(buffer)
    }
}

struct KernelShared {
    program: Program,
    name: String,
    entry: EntryPoint,
    range: NdRange,
    args: Vec<Argument>,
}

/// A kernel ready to be executed over an N-D range.
///
/// Holds the program it was created from, the resolved entry point, a copy
/// of its N-D range, and an owned argument vector. Clones share one set of
/// state; enqueueing a kernel clones the handle, so a pending command keeps
/// everything the kernel references alive.
#[derive(Clone)]
pub struct Kernel {
    shared: Arc<KernelShared>,
}

impl Kernel {
    /// Returns a new [`KernelBuilder`] for the named kernel.
    pub fn builder<'b>(program: &'b Program, name: &str) -> KernelBuilder<'b> {
        KernelBuilder {
            program,
            name: name.to_string(),
            range: None,
            args: Vec::new(),
        }
    }

    /// Creates a kernel directly from its parts.
    ///
    /// Fails with [`Error::KernelNotFound`] when `name` does not resolve
    /// within the program.
    pub fn new(
        program: &Program,
        name: &str,
        range: NdRange,
        args: Vec<Argument>,
    ) -> Result<Kernel> {
        let entry = program
            .device()
            .hal_device
            .find_kernel(program.handle(), name)
            .ok_or_else(|| Error::KernelNotFound {
                name: name.to_string(),
            })?;
        Ok(Kernel {
            shared: Arc::new(KernelShared {
                program: program.clone(),
                name: name.to_string(),
                entry,
                range,
                args,
            }),
        })
    }

    /// Returns the name of the kernel's entry point.
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Returns the N-D range the kernel executes over.
    pub fn range(&self) -> &NdRange {
        &self.shared.range
    }

    pub(crate) fn execute(&self, hal_device: &dyn HalDevice) -> Result<()> {
        execute_on_device(
            hal_device,
            self.shared.program.handle(),
            self.shared.entry,
            &self.shared.range,
            &self.shared.args,
        )
    }
}

impl fmt::Debug for Kernel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Kernel")
            .field("name", &self.shared.name)
            .field("range", &self.shared.range)
            .field("args", &self.shared.args.len())
            .finish()
    }
}

/// Builds a [`Kernel`] from a program, an entry-point name, an N-D range,
/// and a list of arguments.
///
/// ```no_run
/// # fn main() -> kiln::Result<()> {
/// # let device = kiln::Device::new()?;
/// # let program = device.create_program(b"scale")?;
/// # let values = device.create_buffer(4096)?;
/// use kiln::{Argument, Kernel, NdRange};
///
/// let kernel = Kernel::builder(&program, "scale")
///     .range(NdRange::new(1024, 16))
///     .arg(&values)
///     .arg(Argument::scalar(0.5f32))
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[must_use = "kernel builders do nothing unless built"]
pub struct KernelBuilder<'b> {
    program: &'b Program,
    name: String,
    range: Option<NdRange>,
    args: Vec<Argument>,
}

impl<'b> KernelBuilder<'b> {
    /// Specifies the N-D range to execute over.
    pub fn range(mut self, range: NdRange) -> KernelBuilder<'b> {
        self.range = Some(range);
        self
    }

    /// Appends one argument. Arguments are passed to the kernel in the
    /// order they were added.
    pub fn arg<A: Into<Argument>>(mut self, arg: A) -> KernelBuilder<'b> {
        self.args.push(arg.into());
        self
    }

    /// Resolves the entry point and returns the finished kernel.
    pub fn build(self) -> Result<Kernel> {
        let range = self.range.ok_or(Error::MissingRange)?;
        Kernel::new(self.program, &self.name, range, self.args)
    }
}

// Lowers the range and arguments to their HAL form and executes the kernel.
// Used by both the queue worker and the blocking surface.
pub(crate) fn execute_on_device(
    hal_device: &dyn HalDevice,
    program: ProgramHandle,
    entry: EntryPoint,
    range: &NdRange,
    args: &[Argument],
) -> Result<()> {
    let hal_range = range.to_hal();
    let work_group_size: u64 = hal_range.local.iter().product();
    if work_group_size == 0 {
        // A local size of zero in any dimension dispatches no work.
        return Err(Error::ZeroWorkGroup);
    }

    let hal_args: Vec<hal::Arg> = args
        .iter()
        .map(|arg| match arg {
            Argument::Buffer(buffer) => hal::Arg::Buffer(buffer.device_addr()),
            Argument::Scalar(bytes) => hal::Arg::Value(bytes),
            Argument::Local(size) => hal::Arg::Local(*size),
        })
        .collect();

    if hal_device.kernel_exec(program, entry, &hal_range, &hal_args, range.dims()) {
        Ok(())
    } else {
        Err(Error::CommandFailed {
            command: CommandType::RunKernel,
        })
    }
}
