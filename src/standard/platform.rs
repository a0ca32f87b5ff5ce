//! The platform wrapper.

use std::fmt;

use cl_sys as ffi;

use crate::error::{Error, Result};
use crate::functions;
use crate::types::{DeviceType, OpenclVersion};
use crate::wrap::{Class, Obj};
use super::{impl_wrapper_common, Device, DeviceContainer};


/// A platform. Platforms have no native retain or release; the wrapper
/// exists for uniform info caching and registry identity.
#[derive(Clone)]
pub struct Platform {
    obj: Obj,
}

impl_wrapper_common!(Platform);

impl Platform {
    /// All available platforms.
    pub fn list() -> Result<Vec<Platform>> {
        functions::get_platform_ids()?
            .into_iter()
            .map(Platform::from_raw)
            .collect()
    }

    /// The first available platform.
    pub fn first() -> Result<Platform> {
        Platform::list()?
            .into_iter()
            .next()
            .ok_or_else(|| Error::DeviceNotFound("no OpenCL platforms available".into()))
    }

    /// The platform which owns `device`.
    pub fn from_device(device: &Device) -> Result<Platform> {
        device.platform()
    }

    pub(crate) fn from_raw(handle: usize) -> Result<Platform> {
        Ok(Platform { obj: Obj::from_borrowed(Class::Platform, handle)? })
    }

    pub fn profile(&self) -> Result<String> {
        Ok(self.info(ffi::CL_PLATFORM_PROFILE)?.string())
    }

    /// The platform version, parsed from the native `"OpenCL X.Y ..."`
    /// version string.
    pub fn version(&self) -> Result<OpenclVersion> {
        OpenclVersion::from_info_str(&self.info(ffi::CL_PLATFORM_VERSION)?.string())
    }

    pub fn name(&self) -> Result<String> {
        Ok(self.info(ffi::CL_PLATFORM_NAME)?.string())
    }

    pub fn vendor(&self) -> Result<String> {
        Ok(self.info(ffi::CL_PLATFORM_VENDOR)?.string())
    }

    pub fn extensions(&self) -> Result<String> {
        Ok(self.info(ffi::CL_PLATFORM_EXTENSIONS)?.string())
    }
}

impl DeviceContainer for Platform {
    fn as_obj(&self) -> &Obj {
        &self.obj
    }

    fn list_device_handles(&self) -> Result<Vec<usize>> {
        functions::get_device_ids(self.as_raw(), DeviceType::ALL.bits())
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.name() {
            Ok(name) => f.write_str(&name),
            Err(_) => write!(f, "Platform({:#x})", self.as_raw()),
        }
    }
}
