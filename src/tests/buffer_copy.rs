use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::mock_device;
use crate::error::Error;

const DATASET_LEN: u32 = 1024;
const DATASET_SIZE: u64 = DATASET_LEN as u64 * 4;

fn dataset() -> Vec<u8> {
    (0..DATASET_LEN).flat_map(u32::to_ne_bytes).collect()
}

#[test]
fn copy_buffer_sync() {
    let (device, _mock) = mock_device();
    let src = device.create_buffer(DATASET_SIZE).unwrap();
    let dst = device.create_buffer(DATASET_SIZE).unwrap();
    let data = dataset();

    device.write_buffer(&src, 0, &data).unwrap();
    device.copy_buffer(&dst, 0, &src, 0, DATASET_SIZE).unwrap();
    let mut out = vec![0u8; data.len()];
    device.read_buffer(&mut out, &dst, 0).unwrap();

    assert_eq!(out, data);
}

#[test]
fn copy_buffer_async() {
    let (device, _mock) = mock_device();
    let src = device.create_buffer(DATASET_SIZE).unwrap();
    let dst = device.create_buffer(DATASET_SIZE).unwrap();
    let data = dataset();
    let mut out = vec![0u8; data.len()];

    let queue = device.queue();
    queue.enqueue_write_buffer(&src, 0, &data).unwrap();
    queue.enqueue_copy_buffer(&dst, 0, &src, 0, DATASET_SIZE).unwrap();
    unsafe {
        queue.enqueue_read_buffer(&mut out, &dst, 0).unwrap();
    }

    // Nothing may execute before dispatch.
    assert_eq!(queue.timestamps(), (4, 0, 0));

    assert!(queue.dispatch());
    queue.wait().unwrap();
    assert_eq!(out, data);
}

#[test]
fn write_read_round_trip() {
    let (device, _mock) = mock_device();
    let buffer = device.create_buffer(512).unwrap();
    let mut rng = StdRng::seed_from_u64(0x1f2e_3d4c);
    let data: Vec<u8> = (0..512).map(|_| rng.gen()).collect();

    device.write_buffer(&buffer, 0, &data).unwrap();
    let mut out = vec![0u8; 512];
    device.read_buffer(&mut out, &buffer, 0).unwrap();
    assert_eq!(out, data);
}

#[test]
fn offsets_address_into_the_buffer() {
    let (device, _mock) = mock_device();
    let buffer = device.create_buffer(64).unwrap();

    device.write_buffer(&buffer, 16, &[9u8; 16]).unwrap();
    let mut out = [0u8; 8];
    device.read_buffer(&mut out, &buffer, 20).unwrap();
    assert_eq!(out, [9u8; 8]);

    // Untouched bytes stay zero.
    device.read_buffer(&mut out, &buffer, 0).unwrap();
    assert_eq!(out, [0u8; 8]);
}

#[test]
fn sync_surface_checks_bounds() {
    let (device, _mock) = mock_device();
    let small = device.create_buffer(16).unwrap();
    let large = device.create_buffer(64).unwrap();

    assert!(matches!(
        device.write_buffer(&small, 10, &[0u8; 10]),
        Err(Error::OutOfBounds { offset: 10, size: 10, len: 16 })
    ));
    let mut out = [0u8; 10];
    assert!(matches!(
        device.read_buffer(&mut out, &small, 10),
        Err(Error::OutOfBounds { .. })
    ));
    assert!(matches!(
        device.copy_buffer(&small, 0, &large, 0, 32),
        Err(Error::OutOfBounds { .. })
    ));
    assert!(matches!(
        device.copy_buffer(&large, 0, &small, 8, 16),
        Err(Error::OutOfBounds { .. })
    ));
    // Offsets that would overflow are out of bounds, not wrapped.
    assert!(matches!(
        device.write_buffer(&small, u64::MAX, &[0u8; 4]),
        Err(Error::OutOfBounds { .. })
    ));
}
