//! Device-requiring integration tests.
//!
//! Every test degrades to a skip (with a note on stdout) when no OpenCL
//! platform or device is available, so the suite stays green on bare CI
//! hosts.

use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use cl_sys::{self as ffi, c_void};
use rand::Rng;

use crate::prof::{ExportOptions, Profile, RecordSort, SortOrder};
use crate::standard::{Arg, Buffer, Context, Device, DeviceContainer, EventList,
    Platform, Program, Queue};
use crate::types::{CommandQueueProperties, MemFlags};

macro_rules! harness_or_skip {
    () => {
        match harness() {
            Some(h) => h,
            None => {
                println!("skipping: no usable OpenCL platform/device");
                return;
            },
        }
    };
}

fn harness() -> Option<(Context, Device, Queue)> {
    let platform = Platform::list().ok()?.into_iter().next()?;
    let device = platform.devices().ok()?.into_iter().next()?;
    let context = Context::from_devices(None, &[device.clone()]).ok()?;
    let queue = Queue::new(&context, &device, None).ok()?;
    Some((context, device, queue))
}

#[test]
fn trivial_buffer_copy() {
    let (context, _device, queue) = harness_or_skip!();

    let host: Vec<u32> = (0..512).collect();
    let buffer = Buffer::new(&context, MemFlags::READ_WRITE, host.len(),
        Some(&host)).unwrap();

    let mut out = vec![0u32; host.len()];
    buffer.read(&queue, 0, &mut out, None).unwrap();
    for (i, &v) in out.iter().enumerate() {
        assert_eq!(v as usize, i);
    }
}

#[test]
fn sub_buffer_window() {
    let (context, _device, queue) = harness_or_skip!();

    let mut rng = rand::thread_rng();
    let host: Vec<u8> = (0..2048).map(|_| rng.gen()).collect();
    let buffer = Buffer::new(&context, MemFlags::READ_WRITE, host.len(),
        Some(&host)).unwrap();

    let sub = match buffer.create_sub_buffer(MemFlags::READ_WRITE, 512, 512) {
        Ok(sub) => sub,
        // Sub-buffer origins must respect the device's base alignment;
        // 512 bytes may fall short of it on exotic devices.
        Err(err) => {
            println!("skipping: sub-buffer creation refused ({})", err);
            return;
        },
    };
    assert_eq!(sub.len(), 512);

    let mut out = vec![0u8; 512];
    sub.read(&queue, 0, &mut out, None).unwrap();
    assert_eq!(&out[..], &host[512..1024]);
}

#[test]
fn host_backed_buffer_round_trip() {
    let (context, _device, queue) = harness_or_skip!();

    let host: Vec<u32> = (0..256).map(|i| i * 7).collect();
    let buffer = unsafe {
        Buffer::new_use_host_ptr(&context, MemFlags::READ_WRITE, &host).unwrap()
    };
    assert_eq!(buffer.len(), host.len());

    let mut out = vec![0u32; host.len()];
    buffer.read(&queue, 0, &mut out, None).unwrap();
    queue.finish().unwrap();
    assert_eq!(out, host);

    // The host allocation must outlive the buffer.
    drop(buffer);
    drop(host);
}

#[test]
fn wait_list_dependencies() {
    let (context, device, _queue) = harness_or_skip!();

    let props = CommandQueueProperties::new().out_of_order();
    let queue = match Queue::new(&context, &device, Some(props)) {
        Ok(q) => q,
        Err(err) => {
            println!("skipping: no out-of-order queue support ({})", err);
            return;
        },
    };

    let host1: Vec<u32> = (0..256).map(|i| i * 2).collect();
    let host2: Vec<u32> = (0..256).map(|i| i * 3).collect();
    let buf1 = Buffer::<u32>::new(&context, MemFlags::READ_WRITE, 256, None).unwrap();
    let buf2 = Buffer::<u32>::new(&context, MemFlags::READ_WRITE, 256, None).unwrap();

    let mut deps1 = EventList::new();
    let mut deps2 = EventList::new();
    unsafe {
        deps1.push(buf1.enqueue_write(&queue, 0, &host1, None).unwrap());
        deps2.push(buf2.enqueue_write(&queue, 0, &host2, None).unwrap());
    }

    let mut out1 = vec![0u32; 256];
    let mut out2 = vec![0u32; 256];
    buf1.read(&queue, 0, &mut out1, Some(&mut deps1)).unwrap();
    buf2.read(&queue, 0, &mut out2, Some(&mut deps2)).unwrap();

    // Both wait lists were consumed by their enqueues.
    assert!(deps1.is_empty());
    assert!(deps2.is_empty());
    assert_eq!(out1, host1);
    assert_eq!(out2, host2);

    queue.finish().unwrap();
}

static KERNEL_SRC: &str = r#"
    __kernel void offset_add(__global uint* buf, __local uint* scratch,
            float val) {
        uint gid = get_global_id(0);
        uint lid = get_local_id(0);
        scratch[lid] = buf[gid];
        buf[gid] = scratch[lid] + (uint)val;
    }
"#;

#[test]
fn kernel_arg_skip_persistence() {
    let (context, device, queue) = harness_or_skip!();

    let program = Program::with_source(&context, &[KERNEL_SRC]).unwrap();
    program.build(&[device.clone()], None).unwrap();
    let kernel = program.create_kernel("offset_add").unwrap();
    assert_eq!(kernel.name().unwrap(), "offset_add");
    assert_eq!(kernel.num_args().unwrap(), 3);

    let host: Vec<u32> = (0..256).collect();
    let buffer = Buffer::new(&context, MemFlags::READ_WRITE, host.len(),
        Some(&host)).unwrap();

    kernel.set_args(vec![
        Arg::buffer(&buffer),
        Arg::local::<u32>(16),
        Arg::scalar(3.0f32),
    ]);
    kernel.enqueue(&queue, &[256], Some(&[16]), None, None).unwrap();

    // The buffer argument at index 0 persists natively through the skip.
    kernel.set_args(vec![
        Arg::skip(),
        Arg::local::<u32>(16),
        Arg::scalar(2.0f32),
    ]);
    kernel.enqueue(&queue, &[256], Some(&[16]), None, None).unwrap();
    queue.finish().unwrap();

    let mut out = vec![0u32; host.len()];
    buffer.read(&queue, 0, &mut out, None).unwrap();
    for (i, &v) in out.iter().enumerate() {
        assert_eq!(v as usize, i + 5);
    }
}

#[test]
fn suggested_worksizes_on_device() {
    let (context, device, _queue) = harness_or_skip!();

    let program = Program::with_source(&context, &[KERNEL_SRC]).unwrap();
    program.build(&[device.clone()], None).unwrap();
    let kernel = program.create_kernel("offset_add").unwrap();

    let mut gws = [0usize];
    let mut lws = [0usize];
    kernel.suggest_worksizes(&device, &[1000], Some(&mut gws), &mut lws).unwrap();
    assert!(lws[0] >= 1);
    assert!(lws[0] <= device.max_work_group_size().unwrap());
    assert!(gws[0] >= 1000);
    assert_eq!(gws[0] % lws[0], 0);
}

#[test]
fn profiler_end_to_end() {
    let (context, device, _queue) = harness_or_skip!();

    let props = CommandQueueProperties::new().profiling();
    let queue = Queue::new(&context, &device, Some(props)).unwrap();

    let mut prof = Profile::new();
    prof.start();
    prof.add_queue("main", &queue).unwrap();

    let host: Vec<u32> = (0..(1 << 18)).collect();
    let buffer = Buffer::<u32>::new(&context, MemFlags::READ_WRITE, host.len(),
        None).unwrap();
    let mut out = vec![0u32; host.len()];

    buffer.write(&queue, 0, &host, None).unwrap();
    buffer.read(&queue, 0, &mut out, None).unwrap();
    queue.finish().unwrap();
    assert!(queue.num_events() >= 2);

    prof.stop();
    prof.calc().unwrap();

    // calc() collects the queue's retained events.
    assert_eq!(queue.num_events(), 0);
    assert!(!prof.records().is_empty());
    assert!(prof.summary().unwrap().contains("Total events time"));

    let commands: Vec<&str> = prof.records().iter().map(|r| r.command).collect();
    assert!(commands.contains(&"WRITE_BUFFER"));
    assert!(commands.contains(&"READ_BUFFER"));

    let mut exported = Vec::new();
    prof.export_info(&mut exported, &ExportOptions::default()).unwrap();
    let text = String::from_utf8(exported).unwrap();
    assert_eq!(text.lines().count(), prof.records().len());

    let starts: Vec<u64> = prof.records_sorted(RecordSort::Started, SortOrder::Asc)
        .iter().map(|r| r.start).collect();
    let mut sorted = starts.clone();
    sorted.sort_unstable();
    assert_eq!(starts, sorted);
}

#[test]
fn registry_reuse_across_contexts() {
    let (_context, device, _queue) = harness_or_skip!();

    let ctx1 = Context::from_devices(None, &[device.clone()]).unwrap();
    let ctx2 = Context::from_devices(None, &[device.clone()]).unwrap();

    let d1 = ctx1.device(0).unwrap();
    let d2 = ctx2.device(0).unwrap();
    assert_eq!(d1, d2);

    let refs_before = d1.ref_count();
    drop(ctx1);
    // The device stays usable through the other context.
    assert!(d2.name().is_ok());
    assert!(d2.ref_count() <= refs_before);
}

#[cfg(feature = "opencl_version_1_2")]
#[test]
fn image_round_trip() {
    use crate::standard::{Image, ImageDescriptor, ImageFormat};

    let (context, _device, queue) = harness_or_skip!();

    let (width, height) = (64usize, 32usize);
    let host: Vec<u8> = (0..width * height).map(|i| (i % 251) as u8).collect();

    let format = ImageFormat::r_u8();
    let desc = ImageDescriptor::new_2d(width, height);
    let img1 = match Image::new(&context, MemFlags::READ_WRITE, format, desc,
            Some(&host)) {
        Ok(img) => img,
        Err(err) => {
            println!("skipping: image format unsupported ({})", err);
            return;
        },
    };
    let img2 = Image::new::<u8>(&context, MemFlags::READ_WRITE, format, desc,
        None).unwrap();

    let region = [width, height, 1];
    let staging = Buffer::<u8>::new(&context, MemFlags::READ_WRITE,
        width * height, None).unwrap();

    img1.copy_to_buffer(&queue, [0, 0, 0], region, &staging, 0, None).unwrap();
    img2.copy_from_buffer(&queue, &staging, 0, [0, 0, 0], region, None).unwrap();

    let mut out = vec![0u8; width * height];
    img2.read(&queue, [0, 0, 0], region, &mut out, None).unwrap();
    assert_eq!(out, host);
}

static CALLBACK_HITS: AtomicUsize = AtomicUsize::new(0);
static CALLBACK_STATUS: AtomicI32 = AtomicI32::new(i32::MIN);

extern "C" fn note_completion(_event: ffi::cl_event, status: i32,
        _user_data: *mut c_void) {
    CALLBACK_STATUS.store(status, Ordering::SeqCst);
    CALLBACK_HITS.fetch_add(1, Ordering::SeqCst);
}

#[cfg(feature = "opencl_version_1_1")]
#[test]
fn user_event_callback() {
    use crate::standard::Event;

    let (context, _device, _queue) = harness_or_skip!();

    let event = Event::user(&context).unwrap();
    unsafe {
        event.set_callback(note_completion, ::std::ptr::null_mut()).unwrap();
    }
    event.set_complete().unwrap();
    event.wait().unwrap();

    // Callbacks may fire from a driver thread; give it a moment.
    for _ in 0..100 {
        if CALLBACK_HITS.load(Ordering::SeqCst) > 0 {
            break;
        }
        thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(CALLBACK_HITS.load(Ordering::SeqCst), 1);
    assert_eq!(CALLBACK_STATUS.load(Ordering::SeqCst), ffi::CL_COMPLETE as i32);
}
