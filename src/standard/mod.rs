//! Concrete wrapper classes, one file per class.

pub mod platform;
pub mod device;
pub mod context;
pub mod queue;
pub mod program;
pub mod kernel;
pub mod buffer;
pub mod image;
pub mod sampler;
pub mod event;

pub use self::platform::Platform;
pub use self::device::Device;
pub use self::context::Context;
pub use self::queue::Queue;
pub use self::program::Program;
pub use self::kernel::{Arg, Kernel};
pub use self::buffer::Buffer;
pub use self::image::{Image, ImageDescriptor, ImageFormat};
pub use self::sampler::Sampler;
pub use self::event::{Event, EventList};

use crate::error::{Error, Result};
use crate::wrap::{lock, Obj};

/// Classes which hold a lazily-initialized list of associated devices
/// (platforms, contexts and programs).
pub trait DeviceContainer {
    /// The underlying wrapper.
    fn as_obj(&self) -> &Obj;

    /// Queries the native API for this container's device handles.
    fn list_device_handles(&self) -> Result<Vec<usize>>;

    /// All associated devices. Queried once and cached on the shared
    /// wrapper core, so every clone sees the same list.
    fn devices(&self) -> Result<Vec<Device>> {
        let cache = self.as_obj().container_devices();
        let mut guard = lock(cache);

        if let Some(ref list) = *guard {
            return Ok(list.clone());
        }

        let handles = self.list_device_handles()?;
        let mut list = Vec::with_capacity(handles.len());
        for handle in handles {
            list.push(Device::from_raw(handle)?);
        }
        *guard = Some(list.clone());
        Ok(list)
    }

    fn num_devices(&self) -> Result<usize> {
        Ok(self.devices()?.len())
    }

    fn device(&self, index: usize) -> Result<Device> {
        let devices = self.devices()?;
        let len = devices.len();
        devices.into_iter().nth(index).ok_or_else(|| Error::InvalidArgument(
            format!("device index {} out of range (container has {})", index, len)))
    }
}

/// Implements the handle accessors and identity comparisons shared by
/// every concrete wrapper.
macro_rules! impl_wrapper_common {
    ($ty:ident) => {
        impl $ty {
            /// The raw native handle.
            pub fn as_raw(&self) -> usize {
                self.obj.as_raw()
            }

            /// The raw native handle as a pointer.
            pub fn as_ptr(&self) -> *mut cl_sys::c_void {
                self.obj.as_ptr()
            }

            /// The current logical reference count.
            pub fn ref_count(&self) -> usize {
                self.obj.ref_count()
            }

            /// Runs a cached info query against this wrapper.
            pub fn info(&self, param: u32) -> crate::error::Result<crate::wrap::info::InfoRecord> {
                self.obj.info(param)
            }

            pub(crate) fn obj(&self) -> &crate::wrap::Obj {
                &self.obj
            }
        }

        impl ::std::fmt::Debug for $ty {
            fn fmt(&self, f: &mut ::std::fmt::Formatter) -> ::std::fmt::Result {
                write!(f, "{}({:#x})", stringify!($ty), self.obj.as_raw())
            }
        }

        impl PartialEq for $ty {
            fn eq(&self, other: &$ty) -> bool {
                self.obj.ptr_eq(&other.obj)
            }
        }
    };
}

pub(crate) use impl_wrapper_common;
