//! Assorted value types shared across the crate: version numbers, bitfield
//! parameters, and the host-side scalar marker trait.

use std::fmt;

use bitflags::bitflags;
use cl_sys::{self as ffi, cl_command_type};

use crate::error::{Error, Result};


/// A parsed OpenCL version, such as `1.2` or `2.0`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OpenclVersion {
    ver: [u16; 2],
}

impl OpenclVersion {
    pub fn new(major: u16, minor: u16) -> OpenclVersion {
        OpenclVersion { ver: [major, minor] }
    }

    pub fn major(&self) -> u16 {
        self.ver[0]
    }

    pub fn minor(&self) -> u16 {
        self.ver[1]
    }

    /// Packed numeric form: `major * 100 + minor * 10` (`1.2` -> `120`).
    pub fn to_raw(&self) -> u32 {
        self.ver[0] as u32 * 100 + self.ver[1] as u32 * 10
    }

    /// Parses a version from an info string of the form
    /// `"OpenCL <major>.<minor> <platform-specific>"`.
    pub fn from_info_str(src: &str) -> Result<OpenclVersion> {
        let malformed = || Error::Other(
            format!("unable to parse OpenCL version from '{}'", src));

        let numeric = src.split_whitespace().nth(1).ok_or_else(malformed)?;
        let mut parts = numeric.split('.');
        let major = parts.next()
            .and_then(|s| s.parse::<u16>().ok())
            .ok_or_else(malformed)?;
        let minor = parts.next()
            .and_then(|s| s.trim_matches(|c: char| !c.is_ascii_digit()).parse::<u16>().ok())
            .ok_or_else(malformed)?;

        Ok(OpenclVersion::new(major, minor))
    }
}

impl From<[u16; 2]> for OpenclVersion {
    fn from(ver: [u16; 2]) -> OpenclVersion {
        OpenclVersion { ver }
    }
}

impl fmt::Display for OpenclVersion {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{}", self.ver[0], self.ver[1])
    }
}


bitflags! {
    /// cl_device_type - bitfield
    pub struct DeviceType: u64 {
        const DEFAULT = 1;
        const CPU = 1 << 1;
        const GPU = 1 << 2;
        const ACCELERATOR = 1 << 3;
        const CUSTOM = 1 << 4;
        const ALL = 0xFFFF_FFFF;
    }
}

impl Default for DeviceType {
    fn default() -> DeviceType {
        DeviceType::ALL
    }
}

bitflags! {
    /// cl_command_queue_properties - bitfield
    pub struct CommandQueueProperties: u64 {
        const OUT_OF_ORDER_EXEC_MODE_ENABLE = 1;
        const PROFILING_ENABLE = 1 << 1;
        const ON_DEVICE = 1 << 2;
        const ON_DEVICE_DEFAULT = 1 << 3;
    }
}

impl CommandQueueProperties {
    pub fn new() -> CommandQueueProperties {
        CommandQueueProperties::empty()
    }

    pub fn out_of_order(self) -> CommandQueueProperties {
        self | CommandQueueProperties::OUT_OF_ORDER_EXEC_MODE_ENABLE
    }

    pub fn profiling(self) -> CommandQueueProperties {
        self | CommandQueueProperties::PROFILING_ENABLE
    }
}

impl Default for CommandQueueProperties {
    fn default() -> CommandQueueProperties {
        CommandQueueProperties::empty()
    }
}

bitflags! {
    /// cl_mem_flags - bitfield
    pub struct MemFlags: u64 {
        const READ_WRITE = 1;
        const WRITE_ONLY = 1 << 1;
        const READ_ONLY = 1 << 2;
        const USE_HOST_PTR = 1 << 3;
        const ALLOC_HOST_PTR = 1 << 4;
        const COPY_HOST_PTR = 1 << 5;
        const HOST_WRITE_ONLY = 1 << 7;
        const HOST_READ_ONLY = 1 << 8;
        const HOST_NO_ACCESS = 1 << 9;
    }
}

impl Default for MemFlags {
    fn default() -> MemFlags {
        MemFlags::READ_WRITE
    }
}


/// Types which may live in device memory and be transparently transferred
/// between host and device buffers.
///
/// ## Safety
///
/// Implementors must be plain-old-data: any bit pattern must represent a
/// valid value and the type must carry no pointers or padding-sensitive
/// invariants.
pub unsafe trait OclPrm: Copy + Default + PartialEq + fmt::Debug + Send + Sync + 'static {}

unsafe impl OclPrm for u8 {}
unsafe impl OclPrm for i8 {}
unsafe impl OclPrm for u16 {}
unsafe impl OclPrm for i16 {}
unsafe impl OclPrm for u32 {}
unsafe impl OclPrm for i32 {}
unsafe impl OclPrm for u64 {}
unsafe impl OclPrm for i64 {}
unsafe impl OclPrm for f32 {}
unsafe impl OclPrm for f64 {}
unsafe impl OclPrm for usize {}
unsafe impl OclPrm for isize {}


/// Returns a short display name for a native command type code, used as the
/// default event name during profiling.
pub fn command_type_name(command_type: cl_command_type) -> &'static str {
    match command_type {
        ffi::CL_COMMAND_NDRANGE_KERNEL => "NDRANGE_KERNEL",
        ffi::CL_COMMAND_TASK => "TASK",
        ffi::CL_COMMAND_NATIVE_KERNEL => "NATIVE_KERNEL",
        ffi::CL_COMMAND_READ_BUFFER => "READ_BUFFER",
        ffi::CL_COMMAND_WRITE_BUFFER => "WRITE_BUFFER",
        ffi::CL_COMMAND_COPY_BUFFER => "COPY_BUFFER",
        ffi::CL_COMMAND_READ_IMAGE => "READ_IMAGE",
        ffi::CL_COMMAND_WRITE_IMAGE => "WRITE_IMAGE",
        ffi::CL_COMMAND_COPY_IMAGE => "COPY_IMAGE",
        ffi::CL_COMMAND_COPY_IMAGE_TO_BUFFER => "COPY_IMAGE_TO_BUFFER",
        ffi::CL_COMMAND_COPY_BUFFER_TO_IMAGE => "COPY_BUFFER_TO_IMAGE",
        ffi::CL_COMMAND_MAP_BUFFER => "MAP_BUFFER",
        ffi::CL_COMMAND_MAP_IMAGE => "MAP_IMAGE",
        ffi::CL_COMMAND_UNMAP_MEM_OBJECT => "UNMAP_MEM_OBJECT",
        ffi::CL_COMMAND_MARKER => "MARKER",
        ffi::CL_COMMAND_ACQUIRE_GL_OBJECTS => "ACQUIRE_GL_OBJECTS",
        ffi::CL_COMMAND_RELEASE_GL_OBJECTS => "RELEASE_GL_OBJECTS",
        ffi::CL_COMMAND_READ_BUFFER_RECT => "READ_BUFFER_RECT",
        ffi::CL_COMMAND_WRITE_BUFFER_RECT => "WRITE_BUFFER_RECT",
        ffi::CL_COMMAND_COPY_BUFFER_RECT => "COPY_BUFFER_RECT",
        ffi::CL_COMMAND_USER => "USER",
        ffi::CL_COMMAND_BARRIER => "BARRIER",
        ffi::CL_COMMAND_MIGRATE_MEM_OBJECTS => "MIGRATE_MEM_OBJECTS",
        ffi::CL_COMMAND_FILL_BUFFER => "FILL_BUFFER",
        ffi::CL_COMMAND_FILL_IMAGE => "FILL_IMAGE",
        _ => "UNKNOWN",
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_parse() {
        let v = OpenclVersion::from_info_str("OpenCL 1.2 CUDA 11.4.112").unwrap();
        assert_eq!(v, OpenclVersion::new(1, 2));
        assert_eq!(v.to_raw(), 120);

        let v = OpenclVersion::from_info_str("OpenCL 2.0 ").unwrap();
        assert_eq!(v.to_raw(), 200);

        assert!(OpenclVersion::from_info_str("OpenCL").is_err());
        assert!(OpenclVersion::from_info_str("bogus x.y").is_err());
    }

    #[test]
    fn version_ordering() {
        assert!(OpenclVersion::new(1, 1) < OpenclVersion::new(1, 2));
        assert!(OpenclVersion::new(1, 2) < OpenclVersion::new(2, 0));
        assert_eq!(format!("{}", OpenclVersion::new(2, 1)), "2.1");
    }

    #[test]
    fn queue_properties_builder() {
        let props = CommandQueueProperties::new().profiling().out_of_order();
        assert!(props.contains(CommandQueueProperties::PROFILING_ENABLE));
        assert!(props.contains(CommandQueueProperties::OUT_OF_ORDER_EXEC_MODE_ENABLE));
        assert_eq!(props.bits(), 3);
    }

    #[test]
    fn command_names() {
        assert_eq!(command_type_name(cl_sys::CL_COMMAND_NDRANGE_KERNEL), "NDRANGE_KERNEL");
        assert_eq!(command_type_name(0xDEAD), "UNKNOWN");
    }
}
