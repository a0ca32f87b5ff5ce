//! Thin and safe OpenCL API function wrappers.
//!
//! Every native call funnels through [`eval_errcode`] so failures surface
//! uniformly as [`ApiError`]s carrying the status code and function name.
//! Handles cross this boundary as plain integers; the wrapper layer above
//! owns their lifetimes.

use std::ffi::CString;
use std::os::raw::c_char;
use std::ptr;

use cl_sys::{self as ffi, cl_bool, cl_event, cl_int, cl_uint, c_void, size_t};

use crate::error::{ApiError, Error, Result};

pub type UserDataPtr = *mut c_void;
pub type EventCallbackFn = extern "C" fn(event: ffi::cl_event,
    event_command_exec_status: i32, user_data: *mut c_void);
pub type CreateContextCallbackFn = extern "C" fn(errinfo: *const c_char,
    private_info: *const c_void, cb: size_t, user_data: *mut c_void);

/// Evaluates `errcode` and returns an `Err` if it is not `CL_SUCCESS`.
#[inline]
pub(crate) fn eval_errcode<T, S>(errcode: cl_int, result: T, fn_name: &'static str,
        fn_info: Option<S>) -> Result<T>
        where S: Into<String> {
    if errcode == ffi::CL_SUCCESS {
        Ok(result)
    } else {
        Err(ApiError::new(errcode, fn_name, fn_info).into())
    }
}

fn to_bool(b: bool) -> cl_bool {
    if b { ffi::CL_TRUE } else { ffi::CL_FALSE }
}

/// Maps a wait list of raw event handles to a (count, pointer) pair. An
/// empty list maps to (0, null) as the API requires.
fn wait_list_ptrs(wait: &[usize]) -> (cl_uint, *const cl_event) {
    if wait.is_empty() {
        (0, ptr::null())
    } else {
        (wait.len() as cl_uint, wait.as_ptr() as *const cl_event)
    }
}

//============================================================================
//============================= Platform API =================================
//============================================================================

pub fn get_platform_ids() -> Result<Vec<usize>> {
    let mut num_platforms = 0 as cl_uint;

    let errcode = unsafe {
        ffi::clGetPlatformIDs(0, ptr::null_mut(), &mut num_platforms)
    };
    eval_errcode(errcode, (), "clGetPlatformIDs", None::<String>)?;

    if num_platforms == 0 {
        return Ok(vec![]);
    }

    let mut ids = vec![0usize; num_platforms as usize];
    let errcode = unsafe {
        ffi::clGetPlatformIDs(num_platforms,
            ids.as_mut_ptr() as *mut ffi::cl_platform_id, ptr::null_mut())
    };
    eval_errcode(errcode, ids, "clGetPlatformIDs", None::<String>)
}

//============================================================================
//============================= Device APIs ==================================
//============================================================================

pub fn get_device_ids(platform: usize, device_type: u64) -> Result<Vec<usize>> {
    let mut num_devices = 0 as cl_uint;

    let errcode = unsafe {
        ffi::clGetDeviceIDs(platform as ffi::cl_platform_id,
            device_type as ffi::cl_device_type, 0, ptr::null_mut(),
            &mut num_devices)
    };
    if errcode == ffi::CL_DEVICE_NOT_FOUND {
        return Err(Error::DeviceNotFound(
            format!("no devices of type {:#x} on platform {:#x}", device_type, platform)));
    }
    eval_errcode(errcode, (), "clGetDeviceIDs", None::<String>)?;

    if num_devices == 0 {
        return Ok(vec![]);
    }

    let mut ids = vec![0usize; num_devices as usize];
    let errcode = unsafe {
        ffi::clGetDeviceIDs(platform as ffi::cl_platform_id,
            device_type as ffi::cl_device_type, num_devices,
            ids.as_mut_ptr() as *mut ffi::cl_device_id, ptr::null_mut())
    };
    eval_errcode(errcode, ids, "clGetDeviceIDs", None::<String>)
}

#[cfg(feature = "opencl_version_1_2")]
pub fn create_sub_devices(device: usize, properties: &[isize]) -> Result<Vec<usize>> {
    let mut num_devices = 0 as cl_uint;

    let errcode = unsafe {
        ffi::clCreateSubDevices(device as ffi::cl_device_id,
            properties.as_ptr() as *const ffi::cl_device_partition_property,
            0, ptr::null_mut(), &mut num_devices)
    };
    eval_errcode(errcode, (), "clCreateSubDevices", None::<String>)?;

    let mut ids = vec![0usize; num_devices as usize];
    let errcode = unsafe {
        ffi::clCreateSubDevices(device as ffi::cl_device_id,
            properties.as_ptr() as *const ffi::cl_device_partition_property,
            num_devices, ids.as_mut_ptr() as *mut ffi::cl_device_id,
            ptr::null_mut())
    };
    eval_errcode(errcode, ids, "clCreateSubDevices", None::<String>)
}

//============================================================================
//============================= Context APIs =================================
//============================================================================

pub fn create_context(properties: &[isize], devices: &[usize],
        pfn_notify: Option<CreateContextCallbackFn>, user_data: Option<UserDataPtr>)
        -> Result<usize> {
    if devices.is_empty() {
        return Err(Error::InvalidArgument("no devices specified".into()));
    }

    let properties_ptr = if properties.is_empty() {
        ptr::null()
    } else {
        properties.as_ptr() as *const ffi::cl_context_properties
    };

    let mut errcode: cl_int = 0;
    let context = unsafe {
        ffi::clCreateContext(properties_ptr, devices.len() as cl_uint,
            devices.as_ptr() as *const ffi::cl_device_id, pfn_notify,
            user_data.unwrap_or(ptr::null_mut()), &mut errcode)
    };
    eval_errcode(errcode, context as usize, "clCreateContext", None::<String>)
}

//============================================================================
//========================== Command Queue APIs ==============================
//============================================================================

pub fn create_command_queue(context: usize, device: usize, properties: u64)
        -> Result<usize> {
    let mut errcode: cl_int = 0;
    let queue = unsafe {
        ffi::clCreateCommandQueue(context as ffi::cl_context,
            device as ffi::cl_device_id,
            properties as ffi::cl_command_queue_properties, &mut errcode)
    };
    eval_errcode(errcode, queue as usize, "clCreateCommandQueue", None::<String>)
}

/// Creates a queue via the extended zero-terminated property-list entry
/// point (OpenCL 2.0+).
#[cfg(feature = "opencl_version_2_0")]
pub fn create_command_queue_with_properties(context: usize, device: usize,
        properties: &[u64]) -> Result<usize> {
    let properties_ptr = if properties.is_empty() {
        ptr::null()
    } else {
        properties.as_ptr() as *const ffi::cl_queue_properties
    };

    let mut errcode: cl_int = 0;
    let queue = unsafe {
        ffi::clCreateCommandQueueWithProperties(context as ffi::cl_context,
            device as ffi::cl_device_id, properties_ptr, &mut errcode)
    };
    eval_errcode(errcode, queue as usize, "clCreateCommandQueueWithProperties",
        None::<String>)
}

pub fn flush(queue: usize) -> Result<()> {
    let errcode = unsafe { ffi::clFlush(queue as ffi::cl_command_queue) };
    eval_errcode(errcode, (), "clFlush", None::<String>)
}

pub fn finish(queue: usize) -> Result<()> {
    let errcode = unsafe { ffi::clFinish(queue as ffi::cl_command_queue) };
    eval_errcode(errcode, (), "clFinish", None::<String>)
}

//============================================================================
//========================== Memory Object APIs ==============================
//============================================================================

/// ## Safety
///
/// If `host_ptr` is non-null it must point to at least `size` readable
/// bytes (and writable, for `USE_HOST_PTR`).
pub unsafe fn create_buffer(context: usize, flags: u64, size: usize,
        host_ptr: *mut c_void) -> Result<usize> {
    let mut errcode: cl_int = 0;
    let buf = ffi::clCreateBuffer(context as ffi::cl_context,
        flags as ffi::cl_mem_flags, size as size_t, host_ptr, &mut errcode);
    eval_errcode(errcode, buf as usize, "clCreateBuffer", None::<String>)
}

pub fn create_sub_buffer(buffer: usize, flags: u64, origin: usize, size: usize)
        -> Result<usize> {
    let region = ffi::cl_buffer_region {
        origin: origin as size_t,
        size: size as size_t,
    };

    let mut errcode: cl_int = 0;
    let sub = unsafe {
        ffi::clCreateSubBuffer(buffer as ffi::cl_mem,
            flags as ffi::cl_mem_flags,
            ffi::CL_BUFFER_CREATE_TYPE_REGION,
            &region as *const _ as *const c_void, &mut errcode)
    };
    eval_errcode(errcode, sub as usize, "clCreateSubBuffer", None::<String>)
}

#[cfg(feature = "opencl_version_1_2")]
pub unsafe fn create_image(context: usize, flags: u64,
        format: &ffi::cl_image_format, desc: &ffi::cl_image_desc,
        host_ptr: *mut c_void) -> Result<usize> {
    let mut errcode: cl_int = 0;
    let image = ffi::clCreateImage(context as ffi::cl_context,
        flags as ffi::cl_mem_flags, format as *const ffi::cl_image_format,
        desc as *const ffi::cl_image_desc, host_ptr, &mut errcode);
    eval_errcode(errcode, image as usize, "clCreateImage", None::<String>)
}

//============================================================================
//============================= Sampler APIs =================================
//============================================================================

pub fn create_sampler(context: usize, normalized_coords: bool,
        addressing_mode: u32, filter_mode: u32) -> Result<usize> {
    let mut errcode: cl_int = 0;
    let sampler = unsafe {
        ffi::clCreateSampler(context as ffi::cl_context,
            to_bool(normalized_coords),
            addressing_mode as ffi::cl_addressing_mode,
            filter_mode as ffi::cl_filter_mode, &mut errcode)
    };
    eval_errcode(errcode, sampler as usize, "clCreateSampler", None::<String>)
}

//============================================================================
//============================= Program APIs =================================
//============================================================================

pub fn create_program_with_source(context: usize, sources: &[&str]) -> Result<usize> {
    let strings = sources.iter()
        .map(|s| CString::new(*s))
        .collect::<::std::result::Result<Vec<_>, _>>()
        .map_err(|err| Error::InvalidArgument(
            format!("program source contains a NUL byte: {}", err)))?;
    let ptrs: Vec<*const c_char> = strings.iter().map(|s| s.as_ptr()).collect();

    let mut errcode: cl_int = 0;
    let program = unsafe {
        ffi::clCreateProgramWithSource(context as ffi::cl_context,
            ptrs.len() as cl_uint, ptrs.as_ptr() as *const *const c_char,
            ptr::null(), &mut errcode)
    };
    eval_errcode(errcode, program as usize, "clCreateProgramWithSource",
        None::<String>)
}

pub fn build_program(program: usize, devices: &[usize], options: Option<&str>)
        -> Result<()> {
    let options = CString::new(options.unwrap_or(""))
        .map_err(|err| Error::InvalidArgument(
            format!("build options contain a NUL byte: {}", err)))?;

    let (num_devices, devices_ptr) = if devices.is_empty() {
        (0, ptr::null())
    } else {
        (devices.len() as cl_uint, devices.as_ptr() as *const ffi::cl_device_id)
    };

    let errcode = unsafe {
        ffi::clBuildProgram(program as ffi::cl_program, num_devices,
            devices_ptr, options.as_ptr(), None, ptr::null_mut())
    };
    eval_errcode(errcode, (), "clBuildProgram", None::<String>)
}

//============================================================================
//============================= Kernel APIs ==================================
//============================================================================

pub fn create_kernel(program: usize, name: &str) -> Result<usize> {
    let c_name = CString::new(name)
        .map_err(|err| Error::InvalidArgument(
            format!("kernel name contains a NUL byte: {}", err)))?;

    let mut errcode: cl_int = 0;
    let kernel = unsafe {
        ffi::clCreateKernel(program as ffi::cl_program, c_name.as_ptr(),
            &mut errcode)
    };
    eval_errcode(errcode, kernel as usize, "clCreateKernel", Some(name))
}

/// ## Safety
///
/// `value` must point to `size` readable bytes, or be null for local
/// memory arguments.
pub unsafe fn set_kernel_arg(kernel: usize, index: u32, size: usize,
        value: *const c_void) -> Result<()> {
    let errcode = ffi::clSetKernelArg(kernel as ffi::cl_kernel,
        index as cl_uint, size as size_t, value);
    eval_errcode(errcode, (), "clSetKernelArg", Some(format!("index: {}", index)))
}

//============================================================================
//============================== Event APIs ==================================
//============================================================================

pub fn create_user_event(context: usize) -> Result<usize> {
    let mut errcode: cl_int = 0;
    let event = unsafe {
        ffi::clCreateUserEvent(context as ffi::cl_context, &mut errcode)
    };
    eval_errcode(errcode, event as usize, "clCreateUserEvent", None::<String>)
}

pub fn set_user_event_status(event: usize, status: i32) -> Result<()> {
    let errcode = unsafe {
        ffi::clSetUserEventStatus(event as ffi::cl_event, status as cl_int)
    };
    eval_errcode(errcode, (), "clSetUserEventStatus", None::<String>)
}

/// ## Safety
///
/// `user_data` must remain valid until the callback has run.
pub unsafe fn set_event_callback(event: usize, callback_trigger: i32,
        callback: EventCallbackFn, user_data: *mut c_void) -> Result<()> {
    let errcode = ffi::clSetEventCallback(event as ffi::cl_event,
        callback_trigger as cl_int, Some(callback), user_data);
    eval_errcode(errcode, (), "clSetEventCallback", None::<String>)
}

pub fn wait_for_events(events: &[usize]) -> Result<()> {
    if events.is_empty() {
        return Ok(());
    }
    let errcode = unsafe {
        ffi::clWaitForEvents(events.len() as cl_uint,
            events.as_ptr() as *const cl_event)
    };
    eval_errcode(errcode, (), "clWaitForEvents", None::<String>)
}

//============================================================================
//============================= Enqueue APIs =================================
//============================================================================
//
// Every enqueue wrapper requests the output event unconditionally (the
// queue wrapper retains it for profiling) and returns its raw handle.

pub unsafe fn enqueue_read_buffer(queue: usize, buffer: usize, blocking: bool,
        offset: usize, size: usize, host_ptr: *mut c_void, wait: &[usize])
        -> Result<usize> {
    let (num_wait, wait_ptr) = wait_list_ptrs(wait);
    let mut event: cl_event = ptr::null_mut();
    let errcode = ffi::clEnqueueReadBuffer(queue as ffi::cl_command_queue,
        buffer as ffi::cl_mem, to_bool(blocking), offset as size_t,
        size as size_t, host_ptr, num_wait, wait_ptr, &mut event);
    eval_errcode(errcode, event as usize, "clEnqueueReadBuffer", None::<String>)
}

pub unsafe fn enqueue_write_buffer(queue: usize, buffer: usize, blocking: bool,
        offset: usize, size: usize, host_ptr: *const c_void, wait: &[usize])
        -> Result<usize> {
    let (num_wait, wait_ptr) = wait_list_ptrs(wait);
    let mut event: cl_event = ptr::null_mut();
    let errcode = ffi::clEnqueueWriteBuffer(queue as ffi::cl_command_queue,
        buffer as ffi::cl_mem, to_bool(blocking), offset as size_t,
        size as size_t, host_ptr, num_wait, wait_ptr, &mut event);
    eval_errcode(errcode, event as usize, "clEnqueueWriteBuffer", None::<String>)
}

pub fn enqueue_copy_buffer(queue: usize, src: usize, dst: usize,
        src_offset: usize, dst_offset: usize, size: usize, wait: &[usize])
        -> Result<usize> {
    let (num_wait, wait_ptr) = wait_list_ptrs(wait);
    let mut event: cl_event = ptr::null_mut();
    let errcode = unsafe {
        ffi::clEnqueueCopyBuffer(queue as ffi::cl_command_queue,
            src as ffi::cl_mem, dst as ffi::cl_mem, src_offset as size_t,
            dst_offset as size_t, size as size_t, num_wait, wait_ptr, &mut event)
    };
    eval_errcode(errcode, event as usize, "clEnqueueCopyBuffer", None::<String>)
}

pub unsafe fn enqueue_read_image(queue: usize, image: usize, blocking: bool,
        origin: [usize; 3], region: [usize; 3], row_pitch: usize,
        slice_pitch: usize, host_ptr: *mut c_void, wait: &[usize])
        -> Result<usize> {
    let (num_wait, wait_ptr) = wait_list_ptrs(wait);
    let mut event: cl_event = ptr::null_mut();
    let errcode = ffi::clEnqueueReadImage(queue as ffi::cl_command_queue,
        image as ffi::cl_mem, to_bool(blocking),
        origin.as_ptr() as *const size_t, region.as_ptr() as *const size_t,
        row_pitch as size_t, slice_pitch as size_t, host_ptr, num_wait,
        wait_ptr, &mut event);
    eval_errcode(errcode, event as usize, "clEnqueueReadImage", None::<String>)
}

pub unsafe fn enqueue_write_image(queue: usize, image: usize, blocking: bool,
        origin: [usize; 3], region: [usize; 3], row_pitch: usize,
        slice_pitch: usize, host_ptr: *const c_void, wait: &[usize])
        -> Result<usize> {
    let (num_wait, wait_ptr) = wait_list_ptrs(wait);
    let mut event: cl_event = ptr::null_mut();
    let errcode = ffi::clEnqueueWriteImage(queue as ffi::cl_command_queue,
        image as ffi::cl_mem, to_bool(blocking),
        origin.as_ptr() as *const size_t, region.as_ptr() as *const size_t,
        row_pitch as size_t, slice_pitch as size_t, host_ptr, num_wait,
        wait_ptr, &mut event);
    eval_errcode(errcode, event as usize, "clEnqueueWriteImage", None::<String>)
}

pub fn enqueue_copy_image(queue: usize, src: usize, dst: usize,
        src_origin: [usize; 3], dst_origin: [usize; 3], region: [usize; 3],
        wait: &[usize]) -> Result<usize> {
    let (num_wait, wait_ptr) = wait_list_ptrs(wait);
    let mut event: cl_event = ptr::null_mut();
    let errcode = unsafe {
        ffi::clEnqueueCopyImage(queue as ffi::cl_command_queue,
            src as ffi::cl_mem, dst as ffi::cl_mem,
            src_origin.as_ptr() as *const size_t,
            dst_origin.as_ptr() as *const size_t,
            region.as_ptr() as *const size_t, num_wait, wait_ptr, &mut event)
    };
    eval_errcode(errcode, event as usize, "clEnqueueCopyImage", None::<String>)
}

pub fn enqueue_copy_image_to_buffer(queue: usize, src_image: usize,
        dst_buffer: usize, src_origin: [usize; 3], region: [usize; 3],
        dst_offset: usize, wait: &[usize]) -> Result<usize> {
    let (num_wait, wait_ptr) = wait_list_ptrs(wait);
    let mut event: cl_event = ptr::null_mut();
    let errcode = unsafe {
        ffi::clEnqueueCopyImageToBuffer(queue as ffi::cl_command_queue,
            src_image as ffi::cl_mem, dst_buffer as ffi::cl_mem,
            src_origin.as_ptr() as *const size_t,
            region.as_ptr() as *const size_t, dst_offset as size_t,
            num_wait, wait_ptr, &mut event)
    };
    eval_errcode(errcode, event as usize, "clEnqueueCopyImageToBuffer",
        None::<String>)
}

pub fn enqueue_copy_buffer_to_image(queue: usize, src_buffer: usize,
        dst_image: usize, src_offset: usize, dst_origin: [usize; 3],
        region: [usize; 3], wait: &[usize]) -> Result<usize> {
    let (num_wait, wait_ptr) = wait_list_ptrs(wait);
    let mut event: cl_event = ptr::null_mut();
    let errcode = unsafe {
        ffi::clEnqueueCopyBufferToImage(queue as ffi::cl_command_queue,
            src_buffer as ffi::cl_mem, dst_image as ffi::cl_mem,
            src_offset as size_t, dst_origin.as_ptr() as *const size_t,
            region.as_ptr() as *const size_t, num_wait, wait_ptr, &mut event)
    };
    eval_errcode(errcode, event as usize, "clEnqueueCopyBufferToImage",
        None::<String>)
}

pub fn enqueue_ndrange_kernel(queue: usize, kernel: usize, dims: u32,
        global_work_offset: Option<&[usize]>, global_work_size: &[usize],
        local_work_size: Option<&[usize]>, wait: &[usize]) -> Result<usize> {
    let (num_wait, wait_ptr) = wait_list_ptrs(wait);
    let gwo_ptr = global_work_offset
        .map_or(ptr::null(), |o| o.as_ptr() as *const size_t);
    let lws_ptr = local_work_size
        .map_or(ptr::null(), |l| l.as_ptr() as *const size_t);

    let mut event: cl_event = ptr::null_mut();
    let errcode = unsafe {
        ffi::clEnqueueNDRangeKernel(queue as ffi::cl_command_queue,
            kernel as ffi::cl_kernel, dims as cl_uint, gwo_ptr,
            global_work_size.as_ptr() as *const size_t, lws_ptr,
            num_wait, wait_ptr, &mut event)
    };
    eval_errcode(errcode, event as usize, "clEnqueueNDRangeKernel", None::<String>)
}

#[cfg(feature = "opencl_version_1_2")]
pub fn enqueue_marker_with_wait_list(queue: usize, wait: &[usize]) -> Result<usize> {
    let (num_wait, wait_ptr) = wait_list_ptrs(wait);
    let mut event: cl_event = ptr::null_mut();
    let errcode = unsafe {
        ffi::clEnqueueMarkerWithWaitList(queue as ffi::cl_command_queue,
            num_wait, wait_ptr, &mut event)
    };
    eval_errcode(errcode, event as usize, "clEnqueueMarkerWithWaitList",
        None::<String>)
}

#[cfg(feature = "opencl_version_1_2")]
pub fn enqueue_barrier_with_wait_list(queue: usize, wait: &[usize]) -> Result<usize> {
    let (num_wait, wait_ptr) = wait_list_ptrs(wait);
    let mut event: cl_event = ptr::null_mut();
    let errcode = unsafe {
        ffi::clEnqueueBarrierWithWaitList(queue as ffi::cl_command_queue,
            num_wait, wait_ptr, &mut event)
    };
    eval_errcode(errcode, event as usize, "clEnqueueBarrierWithWaitList",
        None::<String>)
}
