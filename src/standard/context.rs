//! The context wrapper.

use std::fmt;

use cl_sys as ffi;

use crate::error::{Error, Result};
use crate::functions;
use crate::types::DeviceType;
use crate::wrap::{lock, Class, Obj};
use super::{impl_wrapper_common, Device, DeviceContainer, Platform};


#[derive(Clone)]
pub struct Context {
    obj: Obj,
}

impl_wrapper_common!(Context);

impl Context {
    /// Creates a context over `devices`.
    ///
    /// When `properties` is absent a default property list naming the first
    /// device's platform is synthesized.
    pub fn from_devices(properties: Option<&[isize]>, devices: &[Device])
            -> Result<Context> {
        let first = devices.first().ok_or_else(|| Error::InvalidArgument(
            "no devices specified for context creation".into()))?;

        let default_props;
        let props = match properties {
            Some(props) => props,
            None => {
                default_props = [
                    ffi::CL_CONTEXT_PLATFORM as isize,
                    first.platform()?.as_raw() as isize,
                    0,
                ];
                &default_props[..]
            },
        };

        let handles: Vec<usize> = devices.iter().map(|d| d.as_raw()).collect();
        let handle = functions::create_context(props, &handles, None, None)?;
        let context = Context { obj: Obj::from_created(Class::Context, handle) };

        // Prime the device cache; the handles are already wrapped.
        let mut cache = lock(context.obj.container_devices());
        if cache.is_none() {
            *cache = Some(devices.to_vec());
        }
        drop(cache);

        Ok(context)
    }

    /// Creates a context over every device of the given type on the first
    /// platform exposing one.
    pub fn from_device_type(device_type: DeviceType) -> Result<Context> {
        for platform in Platform::list()? {
            let devices = match functions::get_device_ids(platform.as_raw(),
                    device_type.bits()) {
                Ok(handles) if !handles.is_empty() => {
                    let mut devices = Vec::with_capacity(handles.len());
                    for handle in handles {
                        devices.push(Device::from_raw(handle)?);
                    }
                    devices
                },
                _ => continue,
            };
            return Context::from_devices(None, &devices);
        }
        Err(Error::DeviceNotFound(
            format!("no devices of type {:?} on any platform", device_type)))
    }

    pub(crate) fn from_raw(handle: usize) -> Result<Context> {
        Ok(Context { obj: Obj::from_borrowed(Class::Context, handle)? })
    }

    /// A context around a fake handle with no native release, for tests
    /// which never reach a native call.
    #[cfg(test)]
    pub(crate) fn synthetic(handle: usize) -> Context {
        Context { obj: Obj::from_created_with(Class::Context, handle, None) }
    }

    /// The platform associated with this context, cached after the first
    /// call.
    pub fn platform(&self) -> Result<Platform> {
        {
            let guard = lock(self.obj.context_platform());
            if let Some(ref platform) = *guard {
                return Ok(platform.clone());
            }
        }

        let platform = self.device(0)?.platform()?;
        let mut guard = lock(self.obj.context_platform());
        if guard.is_none() {
            *guard = Some(platform.clone());
        }
        Ok(platform)
    }

    pub fn reference_count(&self) -> Result<u32> {
        Ok(self.obj.info_uncached(ffi::CL_CONTEXT_REFERENCE_COUNT)?.scalar::<u32>())
    }
}

impl DeviceContainer for Context {
    fn as_obj(&self) -> &Obj {
        &self.obj
    }

    fn list_device_handles(&self) -> Result<Vec<usize>> {
        Ok(self.info(ffi::CL_CONTEXT_DEVICES)?.handles())
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Context({:#x})", self.as_raw())
    }
}
