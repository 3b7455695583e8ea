use super::{mock_device, TEST_PROGRAM};
use crate::error::Error;
use crate::hal::mock::{ArgRecord, Op};
use crate::{Argument, Kernel, NdRange};

#[test]
fn kernel_not_found() {
    let (device, _mock) = mock_device();
    let program = device.create_program(TEST_PROGRAM).unwrap();

    let result = Kernel::builder(&program, "missing")
        .range(NdRange::new(16, 4))
        .build();
    assert!(matches!(
        result,
        Err(Error::KernelNotFound { ref name }) if name == "missing"
    ));
}

#[test]
fn builder_requires_a_range() {
    let (device, _mock) = mock_device();
    let program = device.create_program(TEST_PROGRAM).unwrap();
    assert!(matches!(
        Kernel::builder(&program, "vector_add").build(),
        Err(Error::MissingRange)
    ));
}

#[test]
fn arguments_reach_the_device_in_order() {
    let (device, mock) = mock_device();
    let program = device.create_program(TEST_PROGRAM).unwrap();
    let buffer = device.create_buffer(4096).unwrap();

    let kernel = Kernel::builder(&program, "vector_add")
        .range(NdRange::new(1024, 16))
        .arg(&buffer)
        .arg(Argument::scalar(7u32))
        .arg(Argument::local(256))
        .build()
        .unwrap();

    let queue = device.queue();
    queue.enqueue_kernel(&kernel).unwrap();
    assert!(queue.dispatch());
    queue.wait().unwrap();

    let ops = mock.ops();
    let (range, args, dims) = match &ops[..] {
        [Op::KernelExec {
            range, args, dims, ..
        }] => (range, args, *dims),
        other => panic!("expected a single kernel execution, got {:?}", other),
    };
    assert_eq!(dims, 1);
    assert_eq!(range.offset, [0, 0, 0]);
    assert_eq!(range.global, [1024, 1, 1]);
    assert_eq!(range.local, [16, 1, 1]);
    assert_eq!(
        *args,
        vec![
            ArgRecord::Buffer(buffer.device_addr()),
            ArgRecord::Value(7u32.to_ne_bytes().to_vec()),
            ArgRecord::Local(256),
        ]
    );
}

#[test]
fn run_kernel_blocks_on_the_calling_thread() {
    let (device, mock) = mock_device();
    let program = device.create_program(TEST_PROGRAM).unwrap();

    program
        .run_kernel("scale", &NdRange::new((8, 8), (2, 2)), &[Argument::scalar(0.5f32)])
        .unwrap();

    let ops = mock.ops();
    assert!(matches!(
        &ops[..],
        [Op::KernelExec { dims: 2, .. }]
    ));

    assert!(matches!(
        program.run_kernel("missing", &NdRange::new(8, 2), &[]),
        Err(Error::KernelNotFound { .. })
    ));
}

#[test]
fn zero_local_size_fails_at_execution_time() {
    let (device, mock) = mock_device();
    let program = device.create_program(TEST_PROGRAM).unwrap();

    let kernel = Kernel::builder(&program, "vector_add")
        .range(NdRange::new(16, 0))
        .build()
        .unwrap();
    let queue = device.queue();
    queue.enqueue_kernel(&kernel).unwrap();
    assert!(queue.dispatch());
    assert!(matches!(queue.wait(), Err(Error::ZeroWorkGroup)));

    // The failed command was dequeued and never reached the device.
    assert!(queue.queued_timestamps().is_empty());
    assert!(!mock.ops().iter().any(|op| matches!(op, Op::KernelExec { .. })));

    // The queue stays live for subsequent work.
    let buffer = device.create_buffer(16).unwrap();
    queue.enqueue_write_buffer(&buffer, 0, &[1u8; 4]).unwrap();
    assert!(queue.dispatch());
    queue.wait().unwrap();
    assert!(mock.ops().iter().any(|op| matches!(op, Op::MemWrite { .. })));
}

#[test]
fn zero_local_size_fails_synchronously_too() {
    let (device, mock) = mock_device();
    let program = device.create_program(TEST_PROGRAM).unwrap();
    assert!(matches!(
        program.run_kernel("scale", &NdRange::new((4, 4), (4, 0)), &[]),
        Err(Error::ZeroWorkGroup)
    ));
    assert!(mock.ops().is_empty());
}
