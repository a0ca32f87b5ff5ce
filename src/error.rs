//! Standard error and result types.
//!
//! Every fallible operation in this crate returns [`Result`]. Native API
//! failures surface as [`Error::Api`] carrying the raw status code and the
//! name of the offending function.

use std::fmt;
use std::path::PathBuf;

use crate::types::OpenclVersion;

/// Crate-wide result type.
pub type Result<T> = ::std::result::Result<T, Error>;


/// An OpenCL status code.
///
/// Codes not present in this enumeration (vendor extensions and the like)
/// are carried through [`ApiError`] as raw integers rather than causing a
/// panic.
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Status {
    CL_SUCCESS = 0,
    CL_DEVICE_NOT_FOUND = -1,
    CL_DEVICE_NOT_AVAILABLE = -2,
    CL_COMPILER_NOT_AVAILABLE = -3,
    CL_MEM_OBJECT_ALLOCATION_FAILURE = -4,
    CL_OUT_OF_RESOURCES = -5,
    CL_OUT_OF_HOST_MEMORY = -6,
    CL_PROFILING_INFO_NOT_AVAILABLE = -7,
    CL_MEM_COPY_OVERLAP = -8,
    CL_IMAGE_FORMAT_MISMATCH = -9,
    CL_IMAGE_FORMAT_NOT_SUPPORTED = -10,
    CL_BUILD_PROGRAM_FAILURE = -11,
    CL_MAP_FAILURE = -12,
    CL_MISALIGNED_SUB_BUFFER_OFFSET = -13,
    CL_EXEC_STATUS_ERROR_FOR_EVENTS_IN_WAIT_LIST = -14,
    CL_COMPILE_PROGRAM_FAILURE = -15,
    CL_LINKER_NOT_AVAILABLE = -16,
    CL_LINK_PROGRAM_FAILURE = -17,
    CL_DEVICE_PARTITION_FAILED = -18,
    CL_KERNEL_ARG_INFO_NOT_AVAILABLE = -19,
    CL_INVALID_VALUE = -30,
    CL_INVALID_DEVICE_TYPE = -31,
    CL_INVALID_PLATFORM = -32,
    CL_INVALID_DEVICE = -33,
    CL_INVALID_CONTEXT = -34,
    CL_INVALID_QUEUE_PROPERTIES = -35,
    CL_INVALID_COMMAND_QUEUE = -36,
    CL_INVALID_HOST_PTR = -37,
    CL_INVALID_MEM_OBJECT = -38,
    CL_INVALID_IMAGE_FORMAT_DESCRIPTOR = -39,
    CL_INVALID_IMAGE_SIZE = -40,
    CL_INVALID_SAMPLER = -41,
    CL_INVALID_BINARY = -42,
    CL_INVALID_BUILD_OPTIONS = -43,
    CL_INVALID_PROGRAM = -44,
    CL_INVALID_PROGRAM_EXECUTABLE = -45,
    CL_INVALID_KERNEL_NAME = -46,
    CL_INVALID_KERNEL_DEFINITION = -47,
    CL_INVALID_KERNEL = -48,
    CL_INVALID_ARG_INDEX = -49,
    CL_INVALID_ARG_VALUE = -50,
    CL_INVALID_ARG_SIZE = -51,
    CL_INVALID_KERNEL_ARGS = -52,
    CL_INVALID_WORK_DIMENSION = -53,
    CL_INVALID_WORK_GROUP_SIZE = -54,
    CL_INVALID_WORK_ITEM_SIZE = -55,
    CL_INVALID_GLOBAL_OFFSET = -56,
    CL_INVALID_EVENT_WAIT_LIST = -57,
    CL_INVALID_EVENT = -58,
    CL_INVALID_OPERATION = -59,
    CL_INVALID_GL_OBJECT = -60,
    CL_INVALID_BUFFER_SIZE = -61,
    CL_INVALID_MIP_LEVEL = -62,
    CL_INVALID_GLOBAL_WORK_SIZE = -63,
    CL_INVALID_PROPERTY = -64,
    CL_INVALID_IMAGE_DESCRIPTOR = -65,
    CL_INVALID_COMPILER_OPTIONS = -66,
    CL_INVALID_LINKER_OPTIONS = -67,
    CL_INVALID_DEVICE_PARTITION_COUNT = -68,
    CL_INVALID_PIPE_SIZE = -69,
    CL_INVALID_DEVICE_QUEUE = -70,
    CL_PLATFORM_NOT_FOUND_KHR = -1001,
}

impl Status {
    /// Converts a raw status code. Returns `None` for codes outside the
    /// standard set.
    pub fn from_i32(code: i32) -> Option<Status> {
        let status = match code {
            0 => Status::CL_SUCCESS,
            -1 => Status::CL_DEVICE_NOT_FOUND,
            -2 => Status::CL_DEVICE_NOT_AVAILABLE,
            -3 => Status::CL_COMPILER_NOT_AVAILABLE,
            -4 => Status::CL_MEM_OBJECT_ALLOCATION_FAILURE,
            -5 => Status::CL_OUT_OF_RESOURCES,
            -6 => Status::CL_OUT_OF_HOST_MEMORY,
            -7 => Status::CL_PROFILING_INFO_NOT_AVAILABLE,
            -8 => Status::CL_MEM_COPY_OVERLAP,
            -9 => Status::CL_IMAGE_FORMAT_MISMATCH,
            -10 => Status::CL_IMAGE_FORMAT_NOT_SUPPORTED,
            -11 => Status::CL_BUILD_PROGRAM_FAILURE,
            -12 => Status::CL_MAP_FAILURE,
            -13 => Status::CL_MISALIGNED_SUB_BUFFER_OFFSET,
            -14 => Status::CL_EXEC_STATUS_ERROR_FOR_EVENTS_IN_WAIT_LIST,
            -15 => Status::CL_COMPILE_PROGRAM_FAILURE,
            -16 => Status::CL_LINKER_NOT_AVAILABLE,
            -17 => Status::CL_LINK_PROGRAM_FAILURE,
            -18 => Status::CL_DEVICE_PARTITION_FAILED,
            -19 => Status::CL_KERNEL_ARG_INFO_NOT_AVAILABLE,
            -30 => Status::CL_INVALID_VALUE,
            -31 => Status::CL_INVALID_DEVICE_TYPE,
            -32 => Status::CL_INVALID_PLATFORM,
            -33 => Status::CL_INVALID_DEVICE,
            -34 => Status::CL_INVALID_CONTEXT,
            -35 => Status::CL_INVALID_QUEUE_PROPERTIES,
            -36 => Status::CL_INVALID_COMMAND_QUEUE,
            -37 => Status::CL_INVALID_HOST_PTR,
            -38 => Status::CL_INVALID_MEM_OBJECT,
            -39 => Status::CL_INVALID_IMAGE_FORMAT_DESCRIPTOR,
            -40 => Status::CL_INVALID_IMAGE_SIZE,
            -41 => Status::CL_INVALID_SAMPLER,
            -42 => Status::CL_INVALID_BINARY,
            -43 => Status::CL_INVALID_BUILD_OPTIONS,
            -44 => Status::CL_INVALID_PROGRAM,
            -45 => Status::CL_INVALID_PROGRAM_EXECUTABLE,
            -46 => Status::CL_INVALID_KERNEL_NAME,
            -47 => Status::CL_INVALID_KERNEL_DEFINITION,
            -48 => Status::CL_INVALID_KERNEL,
            -49 => Status::CL_INVALID_ARG_INDEX,
            -50 => Status::CL_INVALID_ARG_VALUE,
            -51 => Status::CL_INVALID_ARG_SIZE,
            -52 => Status::CL_INVALID_KERNEL_ARGS,
            -53 => Status::CL_INVALID_WORK_DIMENSION,
            -54 => Status::CL_INVALID_WORK_GROUP_SIZE,
            -55 => Status::CL_INVALID_WORK_ITEM_SIZE,
            -56 => Status::CL_INVALID_GLOBAL_OFFSET,
            -57 => Status::CL_INVALID_EVENT_WAIT_LIST,
            -58 => Status::CL_INVALID_EVENT,
            -59 => Status::CL_INVALID_OPERATION,
            -60 => Status::CL_INVALID_GL_OBJECT,
            -61 => Status::CL_INVALID_BUFFER_SIZE,
            -62 => Status::CL_INVALID_MIP_LEVEL,
            -63 => Status::CL_INVALID_GLOBAL_WORK_SIZE,
            -64 => Status::CL_INVALID_PROPERTY,
            -65 => Status::CL_INVALID_IMAGE_DESCRIPTOR,
            -66 => Status::CL_INVALID_COMPILER_OPTIONS,
            -67 => Status::CL_INVALID_LINKER_OPTIONS,
            -68 => Status::CL_INVALID_DEVICE_PARTITION_COUNT,
            -69 => Status::CL_INVALID_PIPE_SIZE,
            -70 => Status::CL_INVALID_DEVICE_QUEUE,
            -1001 => Status::CL_PLATFORM_NOT_FOUND_KHR,
            _ => return None,
        };
        Some(status)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}


/// An OpenCL API error: a non-success status code returned by a native
/// function call.
#[derive(Clone)]
pub struct ApiError {
    errcode: i32,
    fn_name: &'static str,
    fn_info: Option<String>,
}

impl ApiError {
    pub fn new<S: Into<String>>(errcode: i32, fn_name: &'static str, fn_info: Option<S>)
            -> ApiError {
        ApiError { errcode, fn_name, fn_info: fn_info.map(|s| s.into()) }
    }

    /// The raw status code returned by the native function.
    pub fn errcode(&self) -> i32 {
        self.errcode
    }

    /// The status code, if it belongs to the standard set.
    pub fn status(&self) -> Option<Status> {
        Status::from_i32(self.errcode)
    }

    /// The name of the native function which failed.
    pub fn fn_name(&self) -> &'static str {
        self.fn_name
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "error executing function: {}", self.fn_name)?;
        if let Some(ref info) = self.fn_info {
            write!(f, " (\"{}\")", info)?;
        }
        match self.status() {
            Some(status) => write!(f, " [{} ({})]", status, self.errcode),
            None => write!(f, " [unknown status code ({})]", self.errcode),
        }
    }
}

impl fmt::Debug for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl ::std::error::Error for ApiError {}


/// A version too low error.
#[derive(Debug, Clone, thiserror::Error)]
#[error("OpenCL version too low to use {function} (detected: {detected}, required: {required})")]
pub struct VersionLowError {
    pub detected: OpenclVersion,
    pub required: OpenclVersion,
    pub function: &'static str,
}


/// An enum with a variant for each kind of error surfaced by this crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("device not found: {0}")]
    DeviceNotFound(String),
    #[error("{0}")]
    VersionLow(#[from] VersionLowError),
    #[error("information unavailable from the OpenCL API ({0})")]
    InfoUnavailable(&'static str),
    #[error("{0}")]
    Api(#[from] ApiError),
    #[error("stream write error: {0}")]
    Io(#[from] ::std::io::Error),
    #[error("unable to open file '{}': {source}", path.display())]
    FileOpen { path: PathBuf, source: ::std::io::Error },
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Returns the raw status code for `Api` variants.
    pub fn api_errcode(&self) -> Option<i32> {
        match *self {
            Error::Api(ref err) => Some(err.errcode()),
            _ => None,
        }
    }

    /// Returns the error status for `Api` variants.
    pub fn api_status(&self) -> Option<Status> {
        match *self {
            Error::Api(ref err) => err.status(),
            _ => None,
        }
    }
}

impl From<String> for Error {
    fn from(desc: String) -> Self {
        Error::Other(desc)
    }
}

impl<'a> From<&'a str> for Error {
    fn from(desc: &'a str) -> Self {
        Error::Other(String::from(desc))
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trip() {
        assert_eq!(Status::from_i32(-30), Some(Status::CL_INVALID_VALUE));
        assert_eq!(Status::from_i32(-7), Some(Status::CL_PROFILING_INFO_NOT_AVAILABLE));
        assert_eq!(Status::from_i32(-9999), None);
    }

    #[test]
    fn api_error_display() {
        let err = ApiError::new(-54, "clEnqueueNDRangeKernel", None::<String>);
        let msg = format!("{}", err);
        assert!(msg.contains("clEnqueueNDRangeKernel"));
        assert!(msg.contains("CL_INVALID_WORK_GROUP_SIZE"));
        assert_eq!(err.status(), Some(Status::CL_INVALID_WORK_GROUP_SIZE));
    }

    #[test]
    fn api_status_accessor() {
        let err: Error = ApiError::new(-5, "clFinish", None::<String>).into();
        assert_eq!(err.api_status(), Some(Status::CL_OUT_OF_RESOURCES));
        assert_eq!(Error::from("whoops").api_status(), None);
    }
}
