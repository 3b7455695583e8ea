use super::{mock_device, TEST_PROGRAM};
use crate::error::Error;
use crate::hal::mock::{MockHal, MAX_ALLOC};
use crate::hal::{Hal, HalDevice, Info};
use crate::Device;

// A platform that reports no devices at all.
struct EmptyPlatform;

impl Hal for EmptyPlatform {
    fn info(&self) -> Info {
        Info {
            platform_name: "empty".to_string(),
            num_devices: 0,
        }
    }

    fn device_create(&self, _index: u32) -> Option<Box<dyn HalDevice>> {
        None
    }
}

// A platform that advertises a device but refuses to instantiate it.
struct RefusingPlatform;

impl Hal for RefusingPlatform {
    fn info(&self) -> Info {
        Info {
            platform_name: "refusing".to_string(),
            num_devices: 1,
        }
    }

    fn device_create(&self, _index: u32) -> Option<Box<dyn HalDevice>> {
        None
    }
}

#[test]
fn device_creation_requires_a_device() {
    assert!(matches!(
        Device::with_hal(Box::new(EmptyPlatform)),
        Err(Error::NoDevices { ref platform }) if platform == "empty"
    ));
    assert!(matches!(
        Device::with_hal(Box::new(RefusingPlatform)),
        Err(Error::DeviceCreation { ref platform }) if platform == "refusing"
    ));
}

#[test]
fn device_reports_its_platform() {
    let (device, _mock) = mock_device();
    assert_eq!(device.platform_name(), device.info().platform_name);
    assert_eq!(device.info().num_devices, 1);
}

#[test]
fn default_loader_produces_a_working_device() {
    let _ = env_logger::builder().is_test(true).try_init();
    // KILN_HAL_DEVICE is unset in the test environment, so this resolves
    // to the registered default.
    let device = Device::new().unwrap();
    let buffer = device.create_buffer(32).unwrap();
    device.write_buffer(&buffer, 0, &[1u8; 32]).unwrap();
}

#[test]
fn oversized_allocation_fails_cleanly() {
    let (device, _mock) = mock_device();
    assert!(matches!(
        device.create_buffer(MAX_ALLOC + 1),
        Err(Error::AllocationFailed { size }) if size == MAX_ALLOC + 1
    ));
    // The device remains usable.
    assert!(device.create_buffer(64).is_ok());
}

#[test]
fn rejected_binary_fails_program_creation() {
    let (device, _mock) = mock_device();
    assert!(matches!(
        device.create_program(&[0xff, 0xfe, 0x00]),
        Err(Error::ProgramLoadFailed)
    ));
    assert!(device.create_program(TEST_PROGRAM).is_ok());
}

#[test]
fn program_survives_device_handle_reordering() {
    // Handles hold the device state alive, so a program or buffer may
    // safely outlive the `Device` value that created it (its queue shuts
    // down, but the HAL stays up until the last handle is gone).
    let hal = MockHal::new();
    let mock = hal.device();
    let device = Device::with_hal(Box::new(hal)).unwrap();
    let program = device.create_program(TEST_PROGRAM).unwrap();
    let buffer = device.create_buffer(64).unwrap();
    drop(device);

    drop(program);
    drop(buffer);
    assert!(mock.ops().is_empty());
}
