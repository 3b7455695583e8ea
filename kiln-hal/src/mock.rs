//! An in-memory device.
//!
//! The mock keeps "device" memory in host vectors and treats a program
//! binary as a UTF-8 manifest with one kernel name per line. Executing a
//! kernel performs no computation; the call is validated and recorded.
//! Every memory and execution operation is appended to an operation log so
//! tests can observe the order in which work reached the device.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::{Arg, DeviceAddr, EntryPoint, Hal, HalDevice, Info, NdRange, ProgramHandle};

/// Largest single allocation the mock will grant, in bytes.
pub const MAX_ALLOC: u64 = 1 << 30;

const PLATFORM_NAME: &str = "kiln mock platform";

/// A HAL exposing a single [`MockDevice`].
pub struct MockHal {
    device: MockDevice,
}

impl MockHal {
    pub fn new() -> MockHal {
        MockHal {
            device: MockDevice::new(),
        }
    }

    /// Returns a handle to the device this HAL hands out, letting a test
    /// keep the operation log while the runtime owns the device.
    pub fn device(&self) -> MockDevice {
        self.device.clone()
    }
}

impl Default for MockHal {
    fn default() -> MockHal {
        MockHal::new()
    }
}

impl Hal for MockHal {
    fn info(&self) -> Info {
        Info {
            platform_name: PLATFORM_NAME.to_string(),
            num_devices: 1,
        }
    }

    fn device_create(&self, index: u32) -> Option<Box<dyn HalDevice>> {
        if index != 0 {
            return None;
        }
        Some(Box::new(self.device.clone()))
    }
}

/// One recorded device operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Op {
    MemRead {
        src: DeviceAddr,
        size: u64,
    },
    MemWrite {
        dst: DeviceAddr,
        size: u64,
    },
    MemCopy {
        dst: DeviceAddr,
        src: DeviceAddr,
        size: u64,
    },
    KernelExec {
        program: ProgramHandle,
        entry: EntryPoint,
        range: NdRange,
        args: Vec<ArgRecord>,
        dims: u32,
    },
}

/// Owned copy of a kernel argument as it crossed the HAL boundary.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ArgRecord {
    Buffer(DeviceAddr),
    Value(Vec<u8>),
    Local(u64),
}

impl<'a> From<&Arg<'a>> for ArgRecord {
    fn from(arg: &Arg<'a>) -> ArgRecord {
        match *arg {
            Arg::Buffer(addr) => ArgRecord::Buffer(addr),
            Arg::Value(bytes) => ArgRecord::Value(bytes.to_vec()),
            Arg::Local(size) => ArgRecord::Local(size),
        }
    }
}

struct MockState {
    blocks: BTreeMap<DeviceAddr, Vec<u8>>,
    next_addr: DeviceAddr,
    programs: HashMap<u64, Vec<String>>,
    next_program: u64,
    ops: Vec<Op>,
}

impl MockState {
    // Resolves an address range to a slice of the containing allocation,
    // or `None` when any part of the range falls outside one.
    fn block_mut(&mut self, addr: DeviceAddr, len: u64) -> Option<&mut [u8]> {
        let (&base, block) = self.blocks.range_mut(..=addr).next_back()?;
        let offset = addr - base;
        let end = offset.checked_add(len)?;
        if end > block.len() as u64 {
            return None;
        }
        Some(&mut block[offset as usize..end as usize])
    }
}

/// An in-memory device. Cloning returns a handle to the same device state.
#[derive(Clone)]
pub struct MockDevice {
    state: Arc<Mutex<MockState>>,
}

impl MockDevice {
    pub fn new() -> MockDevice {
        MockDevice {
            state: Arc::new(Mutex::new(MockState {
                blocks: BTreeMap::new(),
                // Keep allocations clear of the null sentinel.
                next_addr: 0x1000,
                programs: HashMap::new(),
                next_program: 1,
                ops: Vec::new(),
            })),
        }
    }

    /// Returns a copy of the operations executed so far, in order.
    pub fn ops(&self) -> Vec<Op> {
        self.lock().ops.clone()
    }

    /// Discards the operation log.
    pub fn clear_ops(&self) {
        self.lock().ops.clear();
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for MockDevice {
    fn default() -> MockDevice {
        MockDevice::new()
    }
}

impl HalDevice for MockDevice {
    fn program_load(&self, binary: &[u8]) -> Option<ProgramHandle> {
        let manifest = std::str::from_utf8(binary).ok()?;
        let kernels: Vec<String> = manifest
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        let mut state = self.lock();
        let raw = state.next_program;
        state.next_program += 1;
        state.programs.insert(raw, kernels);
        Some(ProgramHandle::from_raw(raw))
    }

    fn program_free(&self, program: ProgramHandle) {
        self.lock().programs.remove(&program.as_raw());
    }

    fn find_kernel(&self, program: ProgramHandle, name: &str) -> Option<EntryPoint> {
        let state = self.lock();
        let kernels = state.programs.get(&program.as_raw())?;
        let index = kernels.iter().position(|kernel| kernel == name)?;
        Some(EntryPoint::from_raw(index as u64 + 1))
    }

    fn mem_alloc(&self, size: u64, alignment: u64) -> Option<DeviceAddr> {
        if size > MAX_ALLOC {
            return None;
        }
        let alignment = alignment.max(1);
        let mut state = self.lock();
        let base = ((state.next_addr + alignment - 1) / alignment) * alignment;
        state.blocks.insert(base, vec![0u8; size as usize]);
        // Zero-size allocations still get a distinct address.
        state.next_addr = base + size.max(1);
        Some(base)
    }

    fn mem_free(&self, addr: DeviceAddr) {
        self.lock().blocks.remove(&addr);
    }

    fn mem_read(&self, dst: &mut [u8], src: DeviceAddr) -> bool {
        let mut state = self.lock();
        let block = match state.block_mut(src, dst.len() as u64) {
            Some(block) => block,
            None => return false,
        };
        dst.copy_from_slice(block);
        state.ops.push(Op::MemRead {
            src,
            size: dst.len() as u64,
        });
        true
    }

    fn mem_write(&self, dst: DeviceAddr, src: &[u8]) -> bool {
        let mut state = self.lock();
        let block = match state.block_mut(dst, src.len() as u64) {
            Some(block) => block,
            None => return false,
        };
        block.copy_from_slice(src);
        state.ops.push(Op::MemWrite {
            dst,
            size: src.len() as u64,
        });
        true
    }

    fn mem_copy(&self, dst: DeviceAddr, src: DeviceAddr, size: u64) -> bool {
        let mut state = self.lock();
        let data = match state.block_mut(src, size) {
            Some(block) => block.to_vec(),
            None => return false,
        };
        let block = match state.block_mut(dst, size) {
            Some(block) => block,
            None => return false,
        };
        block.copy_from_slice(&data);
        state.ops.push(Op::MemCopy { dst, src, size });
        true
    }

    fn kernel_exec(
        &self,
        program: ProgramHandle,
        entry: EntryPoint,
        range: &NdRange,
        args: &[Arg],
        dims: u32,
    ) -> bool {
        let mut state = self.lock();
        let kernels = match state.programs.get(&program.as_raw()) {
            Some(kernels) => kernels,
            None => return false,
        };
        if entry.as_raw() == 0 || entry.as_raw() > kernels.len() as u64 {
            return false;
        }
        state.ops.push(Op::KernelExec {
            program,
            entry,
            range: *range,
            args: args.iter().map(ArgRecord::from).collect(),
            dims,
        });
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_honors_alignment() {
        let device = MockDevice::new();
        let addr = device.mem_alloc(100, 4096).unwrap();
        assert_eq!(addr % 4096, 0);
        let next = device.mem_alloc(100, 4096).unwrap();
        assert_ne!(addr, next);
        assert_eq!(next % 4096, 0);
    }

    #[test]
    fn oversized_alloc_is_refused() {
        let device = MockDevice::new();
        assert!(device.mem_alloc(MAX_ALLOC + 1, 4096).is_none());
    }

    #[test]
    fn reads_and_writes_respect_block_bounds() {
        let device = MockDevice::new();
        let addr = device.mem_alloc(16, 64).unwrap();
        assert!(device.mem_write(addr, &[7u8; 16]));
        assert!(!device.mem_write(addr + 8, &[0u8; 9]));
        let mut out = [0u8; 16];
        assert!(device.mem_read(&mut out, addr));
        assert_eq!(out, [7u8; 16]);
        assert!(!device.mem_read(&mut out, addr + 1));
    }

    #[test]
    fn copy_moves_bytes_between_allocations() {
        let device = MockDevice::new();
        let src = device.mem_alloc(8, 64).unwrap();
        let dst = device.mem_alloc(8, 64).unwrap();
        assert!(device.mem_write(src, &[1, 2, 3, 4, 5, 6, 7, 8]));
        assert!(device.mem_copy(dst, src, 8));
        let mut out = [0u8; 8];
        assert!(device.mem_read(&mut out, dst));
        assert_eq!(out, [1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn program_manifest_resolves_kernels() {
        let device = MockDevice::new();
        let program = device.program_load(b"vector_add\nvector_mul\n").unwrap();
        assert!(device.find_kernel(program, "vector_add").is_some());
        assert!(device.find_kernel(program, "vector_mul").is_some());
        assert!(device.find_kernel(program, "missing").is_none());
        assert!(device.program_load(&[0xff, 0xfe, 0x00]).is_none());
    }
}
