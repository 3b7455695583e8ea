//! Tests drive the runtime against the in-memory mock device from
//! `kiln-hal`. The mock records every operation that reaches the device,
//! which makes FIFO ordering and shutdown draining observable from here.

pub mod buffer_copy;
pub mod kernel_arg;
pub mod lifecycle;

use crate::hal::mock::{MockDevice, MockHal};
use crate::Device;

// A binary the mock device accepts: a manifest of kernel names.
pub const TEST_PROGRAM: &[u8] = b"vector_add\nscale\n";

pub fn mock_device() -> (Device, MockDevice) {
    let _ = env_logger::builder().is_test(true).try_init();
    let hal = MockHal::new();
    let mock = hal.device();
    let device = Device::with_hal(Box::new(hal)).expect("failed to create a mock device");
    (device, mock)
}
