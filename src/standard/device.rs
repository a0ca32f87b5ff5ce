//! The device wrapper.
//!
//! Root devices are not reference-counted by the native API; their wrappers
//! carry no release function. Sub-devices (OpenCL 1.2+) are, and their
//! wrappers release natively on final drop. Both follow the uniform logical
//! reference count of the wrapper layer.

use std::fmt;

use cl_sys as ffi;

use crate::error::Result;
use crate::types::OpenclVersion;
use crate::wrap::{Class, Obj};
use super::{impl_wrapper_common, Platform};

#[cfg(feature = "opencl_version_1_2")]
use crate::error::VersionLowError;
#[cfg(feature = "opencl_version_1_2")]
use crate::functions;
#[cfg(feature = "opencl_version_1_2")]
use crate::wrap::{lock, release_device_fn};


#[derive(Clone)]
pub struct Device {
    obj: Obj,
}

impl_wrapper_common!(Device);

impl Device {
    pub(crate) fn from_raw(handle: usize) -> Result<Device> {
        Ok(Device { obj: Obj::from_borrowed(Class::Device, handle)? })
    }

    pub fn name(&self) -> Result<String> {
        Ok(self.info(ffi::CL_DEVICE_NAME)?.string())
    }

    pub fn vendor(&self) -> Result<String> {
        Ok(self.info(ffi::CL_DEVICE_VENDOR)?.string())
    }

    /// The device's supported OpenCL version.
    pub fn version(&self) -> Result<OpenclVersion> {
        OpenclVersion::from_info_str(&self.info(ffi::CL_DEVICE_VERSION)?.string())
    }

    pub fn max_work_group_size(&self) -> Result<usize> {
        Ok(self.info(ffi::CL_DEVICE_MAX_WORK_GROUP_SIZE)?.scalar::<usize>())
    }

    pub fn max_work_item_dimensions(&self) -> Result<u32> {
        Ok(self.info(ffi::CL_DEVICE_MAX_WORK_ITEM_DIMENSIONS)?.scalar::<u32>())
    }

    pub fn max_work_item_sizes(&self) -> Result<Vec<usize>> {
        Ok(self.info(ffi::CL_DEVICE_MAX_WORK_ITEM_SIZES)?.sizes())
    }

    /// The platform which owns this device.
    pub fn platform(&self) -> Result<Platform> {
        let handle = self.info(ffi::CL_DEVICE_PLATFORM)?.scalar::<usize>();
        Platform::from_raw(handle)
    }

    /// Partitions this device into sub-devices (OpenCL 1.2+). The returned
    /// wrappers release natively on final drop; this device also retains
    /// them so they outlive caller drops until the parent goes away.
    #[cfg(feature = "opencl_version_1_2")]
    pub fn create_sub_devices(&self, properties: &[isize]) -> Result<Vec<Device>> {
        let detected = self.version()?;
        let required = OpenclVersion::new(1, 2);
        if detected < required {
            return Err(VersionLowError {
                detected,
                required,
                function: "clCreateSubDevices",
            }.into());
        }

        let handles = functions::create_sub_devices(self.as_raw(), properties)?;
        let mut subs = Vec::with_capacity(handles.len());
        for handle in handles {
            subs.push(Device {
                obj: Obj::from_created_with(Class::Device, handle, release_device_fn()),
            });
        }

        lock(self.obj.device_sub_devices()).extend(subs.iter().cloned());
        Ok(subs)
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.name() {
            Ok(name) => f.write_str(&name),
            Err(_) => write!(f, "Device({:#x})", self.as_raw()),
        }
    }
}
