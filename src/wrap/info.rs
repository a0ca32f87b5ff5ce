//! Cached information queries.
//!
//! Every wrapper owns an info table mapping a query id to the most recent
//! [`InfoRecord`] for that id. Records are immutable and shared: a re-query
//! displaces the cached record but callers holding an earlier one keep
//! reading valid bytes for as long as they like.

use std::collections::HashMap;
use std::mem;
use std::ptr;
use std::sync::{Arc, Mutex};

use cl_sys::{self as ffi, cl_int, cl_uint, c_void, size_t};

use crate::error::{Error, Result};
use crate::functions::eval_errcode;
use super::{lock, Obj};


/// Selects which native query function an info request dispatches to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InfoKind {
    Platform,
    Device,
    Context,
    Queue,
    MemObject,
    Image,
    Sampler,
    Program,
    ProgramBuild,
    Kernel,
    KernelArg,
    KernelWorkGroup,
    KernelSubGroup,
    Event,
    EventProfiling,
    Pipe,
}

impl InfoKind {
    pub fn fn_name(self) -> &'static str {
        match self {
            InfoKind::Platform => "clGetPlatformInfo",
            InfoKind::Device => "clGetDeviceInfo",
            InfoKind::Context => "clGetContextInfo",
            InfoKind::Queue => "clGetCommandQueueInfo",
            InfoKind::MemObject => "clGetMemObjectInfo",
            InfoKind::Image => "clGetImageInfo",
            InfoKind::Sampler => "clGetSamplerInfo",
            InfoKind::Program => "clGetProgramInfo",
            InfoKind::ProgramBuild => "clGetProgramBuildInfo",
            InfoKind::Kernel => "clGetKernelInfo",
            InfoKind::KernelArg => "clGetKernelArgInfo",
            InfoKind::KernelWorkGroup => "clGetKernelWorkGroupInfo",
            InfoKind::KernelSubGroup => "clGetKernelSubGroupInfo",
            InfoKind::Event => "clGetEventInfo",
            InfoKind::EventProfiling => "clGetEventProfilingInfo",
            InfoKind::Pipe => "clGetPipeInfo",
        }
    }

    /// Dispatches to the native query function for this kind. `secondary`
    /// is the device (or similar) handle for the two-handle kinds and is
    /// ignored otherwise.
    unsafe fn query(self, primary: usize, secondary: usize, param: cl_uint,
            size: size_t, value: *mut c_void, size_ret: *mut size_t) -> cl_int {
        match self {
            InfoKind::Platform => ffi::clGetPlatformInfo(
                primary as ffi::cl_platform_id, param, size, value, size_ret),
            InfoKind::Device => ffi::clGetDeviceInfo(
                primary as ffi::cl_device_id, param, size, value, size_ret),
            InfoKind::Context => ffi::clGetContextInfo(
                primary as ffi::cl_context, param, size, value, size_ret),
            InfoKind::Queue => ffi::clGetCommandQueueInfo(
                primary as ffi::cl_command_queue, param, size, value, size_ret),
            InfoKind::MemObject => ffi::clGetMemObjectInfo(
                primary as ffi::cl_mem, param, size, value, size_ret),
            InfoKind::Image => ffi::clGetImageInfo(
                primary as ffi::cl_mem, param, size, value, size_ret),
            InfoKind::Sampler => ffi::clGetSamplerInfo(
                primary as ffi::cl_sampler, param, size, value, size_ret),
            InfoKind::Program => ffi::clGetProgramInfo(
                primary as ffi::cl_program, param, size, value, size_ret),
            InfoKind::ProgramBuild => ffi::clGetProgramBuildInfo(
                primary as ffi::cl_program, secondary as ffi::cl_device_id,
                param, size, value, size_ret),
            InfoKind::Kernel => ffi::clGetKernelInfo(
                primary as ffi::cl_kernel, param, size, value, size_ret),
            InfoKind::KernelWorkGroup => ffi::clGetKernelWorkGroupInfo(
                primary as ffi::cl_kernel, secondary as ffi::cl_device_id,
                param, size, value, size_ret),
            InfoKind::Event => ffi::clGetEventInfo(
                primary as ffi::cl_event, param, size, value, size_ret),
            InfoKind::EventProfiling => ffi::clGetEventProfilingInfo(
                primary as ffi::cl_event, param, size, value, size_ret),
            InfoKind::KernelArg => {
                #[cfg(feature = "opencl_version_1_2")]
                {
                    ffi::clGetKernelArgInfo(primary as ffi::cl_kernel,
                        secondary as cl_uint, param, size, value, size_ret)
                }
                #[cfg(not(feature = "opencl_version_1_2"))]
                {
                    let _ = (primary, secondary, param, size, value, size_ret);
                    ffi::CL_INVALID_OPERATION
                }
            },
            InfoKind::KernelSubGroup => {
                #[cfg(feature = "opencl_version_2_1")]
                {
                    ffi::clGetKernelSubGroupInfo(primary as ffi::cl_kernel,
                        secondary as ffi::cl_device_id, param,
                        0, ptr::null(), size, value, size_ret)
                }
                #[cfg(not(feature = "opencl_version_2_1"))]
                {
                    let _ = (primary, secondary, param, size, value, size_ret);
                    ffi::CL_INVALID_OPERATION
                }
            },
            InfoKind::Pipe => {
                #[cfg(feature = "opencl_version_2_0")]
                {
                    ffi::clGetPipeInfo(primary as ffi::cl_mem, param, size,
                        value, size_ret)
                }
                #[cfg(not(feature = "opencl_version_2_0"))]
                {
                    let _ = (primary, secondary, param, size, value, size_ret);
                    ffi::CL_INVALID_OPERATION
                }
            },
        }
    }
}


/// An opaque query result: a shared, immutable byte sequence plus typed
/// readers.
#[derive(Clone, Debug)]
pub struct InfoRecord {
    bytes: Arc<Vec<u8>>,
}

impl InfoRecord {
    pub(crate) fn new(bytes: Vec<u8>) -> InfoRecord {
        InfoRecord { bytes: Arc::new(bytes) }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// `true` if both records share the same backing allocation (i.e. one
    /// is a cache hit for the other).
    pub fn same_record(&self, other: &InfoRecord) -> bool {
        Arc::ptr_eq(&self.bytes, &other.bytes)
    }

    /// Reads a fixed-width scalar from the start of the record. Short
    /// records zero-fill the remainder, so a fallback record of zeroes reads
    /// as the scalar's zero value.
    pub fn scalar<T: Copy + Default>(&self) -> T {
        let mut out = T::default();
        let n = self.bytes.len().min(mem::size_of::<T>());
        unsafe {
            ptr::copy_nonoverlapping(self.bytes.as_ptr(),
                &mut out as *mut T as *mut u8, n);
        }
        out
    }

    /// Interprets the record as a NUL-terminated string.
    pub fn string(&self) -> String {
        let end = self.bytes.iter().position(|&b| b == 0).unwrap_or(self.bytes.len());
        String::from_utf8_lossy(&self.bytes[..end]).into_owned()
    }

    /// Interprets the record as an array of `size_t`.
    pub fn sizes(&self) -> Vec<usize> {
        self.words()
    }

    /// Interprets the record as an array of native handles.
    pub fn handles(&self) -> Vec<usize> {
        self.words()
    }

    fn words(&self) -> Vec<usize> {
        let word = mem::size_of::<usize>();
        self.bytes.chunks_exact(word)
            .map(|chunk| {
                let mut out = 0usize;
                unsafe {
                    ptr::copy_nonoverlapping(chunk.as_ptr(),
                        &mut out as *mut usize as *mut u8, word);
                }
                out
            })
            .collect()
    }
}


/// The per-wrapper info table.
#[derive(Debug, Default)]
pub(crate) struct InfoCache {
    map: Mutex<HashMap<(u32, usize), InfoRecord>>,
}

impl InfoCache {
    pub(crate) fn new() -> InfoCache {
        InfoCache { map: Mutex::new(HashMap::new()) }
    }

    fn lookup(&self, param: u32, secondary: usize) -> Option<InfoRecord> {
        lock(&self.map).get(&(param, secondary)).cloned()
    }

    fn insert(&self, param: u32, secondary: usize, record: InfoRecord) {
        lock(&self.map).insert((param, secondary), record);
    }
}


/// Runs an info query per the uniform algorithm: optional cache hit, probe
/// for size, allocate, query, cache.
///
/// `min_fallback > 0` converts a failed query into a zero-filled record of
/// that size, so fixed-width scalar readers never see garbage.
pub(crate) fn get_info(obj: &Obj, kind: InfoKind, secondary: usize, param: u32,
        min_fallback: usize, use_cache: bool) -> Result<InfoRecord> {
    if use_cache {
        if let Some(record) = obj.info_cache().lookup(param, secondary) {
            return Ok(record);
        }
    }

    match query_native(obj.as_raw(), kind, secondary, param) {
        Ok(record) => {
            obj.info_cache().insert(param, secondary, record.clone());
            Ok(record)
        },
        Err(err) => {
            if min_fallback > 0 {
                let record = InfoRecord::new(vec![0u8; min_fallback]);
                obj.info_cache().insert(param, secondary, record.clone());
                Ok(record)
            } else {
                Err(err)
            }
        },
    }
}

fn query_native(handle: usize, kind: InfoKind, secondary: usize, param: u32)
        -> Result<InfoRecord> {
    let mut size: size_t = 0;

    let mut errcode = unsafe {
        kind.query(handle, secondary, param, 0, ptr::null_mut(), &mut size)
    };

    // One vendor's event-profiling probe reports a spurious
    // CL_INVALID_VALUE; coerce it to an empty result.
    if kind == InfoKind::EventProfiling && errcode == ffi::CL_INVALID_VALUE {
        size = 0;
        errcode = ffi::CL_SUCCESS;
    }

    eval_errcode(errcode, (), kind.fn_name(), None::<String>)?;

    if size == 0 {
        return Err(Error::InfoUnavailable(kind.fn_name()));
    }

    let mut bytes = vec![0u8; size];

    let errcode = unsafe {
        kind.query(handle, secondary, param, size,
            bytes.as_mut_ptr() as *mut c_void, ptr::null_mut())
    };

    eval_errcode(errcode, (), kind.fn_name(), None::<String>)?;
    Ok(InfoRecord::new(bytes))
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_reads() {
        let rec = InfoRecord::new(123456u32.to_ne_bytes().to_vec());
        assert_eq!(rec.scalar::<u32>(), 123456);
    }

    #[test]
    fn scalar_from_zero_fallback() {
        let rec = InfoRecord::new(vec![0u8; 8]);
        assert_eq!(rec.scalar::<u64>(), 0);
        assert_eq!(rec.scalar::<usize>(), 0);
    }

    #[test]
    fn string_trims_nul() {
        let rec = InfoRecord::new(b"OpenCL 1.2\0".to_vec());
        assert_eq!(rec.string(), "OpenCL 1.2");
    }

    #[test]
    fn word_arrays() {
        let mut bytes = Vec::new();
        for v in &[3usize, 7, 11] {
            bytes.extend_from_slice(&v.to_ne_bytes());
        }
        let rec = InfoRecord::new(bytes);
        assert_eq!(rec.sizes(), vec![3, 7, 11]);
    }

    #[test]
    fn cache_hit_is_same_record() {
        let cache = InfoCache::new();
        let rec = InfoRecord::new(vec![1, 2, 3]);
        cache.insert(0x1000, 0, rec.clone());
        let hit = cache.lookup(0x1000, 0).unwrap();
        assert!(hit.same_record(&rec));
        assert!(cache.lookup(0x1001, 0).is_none());
    }

    #[test]
    fn displaced_record_remains_valid() {
        let cache = InfoCache::new();
        let first = InfoRecord::new(vec![9; 4]);
        cache.insert(0x1000, 0, first.clone());
        cache.insert(0x1000, 0, InfoRecord::new(vec![5; 4]));

        // The displaced record's bytes are still readable and unchanged.
        assert_eq!(first.bytes(), &[9, 9, 9, 9]);
        let current = cache.lookup(0x1000, 0).unwrap();
        assert!(!current.same_record(&first));
    }
}
