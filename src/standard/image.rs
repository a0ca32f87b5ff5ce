//! The image wrapper.

use std::fmt;
use std::mem;
use std::ptr;

use cl_sys::{self as ffi, c_void};

use crate::error::{Error, Result};
use crate::functions;
use crate::types::{MemFlags, OclPrm};
use crate::wrap::{lock, Class, Obj};
use super::event::{consume_wait_list, wait_handles, EventList};
use super::{impl_wrapper_common, Buffer, Context, Event, Queue};


/// A pixel channel layout and data type pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImageFormat {
    pub channel_order: u32,
    pub channel_data_type: u32,
}

impl ImageFormat {
    pub fn new(channel_order: u32, channel_data_type: u32) -> ImageFormat {
        ImageFormat { channel_order, channel_data_type }
    }

    /// Single-channel unsigned 8-bit pixels.
    pub fn r_u8() -> ImageFormat {
        ImageFormat::new(ffi::CL_R, ffi::CL_UNSIGNED_INT8)
    }

    /// Four-channel unsigned 8-bit pixels.
    pub fn rgba_u8() -> ImageFormat {
        ImageFormat::new(ffi::CL_RGBA, ffi::CL_UNSIGNED_INT8)
    }

    /// The pixel size in bytes, when the format alone determines it.
    pub fn pixel_bytes(&self) -> Option<usize> {
        let per_channel = match self.channel_data_type {
            ffi::CL_UNORM_SHORT_565 | ffi::CL_UNORM_SHORT_555 => return Some(2),
            ffi::CL_UNORM_INT_101010 => return Some(4),
            ffi::CL_SNORM_INT8 | ffi::CL_UNORM_INT8
                | ffi::CL_SIGNED_INT8 | ffi::CL_UNSIGNED_INT8 => 1,
            ffi::CL_SNORM_INT16 | ffi::CL_UNORM_INT16
                | ffi::CL_SIGNED_INT16 | ffi::CL_UNSIGNED_INT16
                | ffi::CL_HALF_FLOAT => 2,
            ffi::CL_SIGNED_INT32 | ffi::CL_UNSIGNED_INT32 | ffi::CL_FLOAT => 4,
            _ => return None,
        };
        let channels = match self.channel_order {
            ffi::CL_R | ffi::CL_A | ffi::CL_INTENSITY | ffi::CL_LUMINANCE => 1,
            ffi::CL_RG | ffi::CL_RA | ffi::CL_Rx => 2,
            ffi::CL_RGB | ffi::CL_RGx => 3,
            ffi::CL_RGBA | ffi::CL_BGRA | ffi::CL_ARGB | ffi::CL_RGBx => 4,
            _ => return None,
        };
        Some(per_channel * channels)
    }

    fn to_raw(&self) -> ffi::cl_image_format {
        ffi::cl_image_format {
            image_channel_order: self.channel_order,
            image_channel_data_type: self.channel_data_type,
        }
    }
}


/// Image geometry. Unset dimensions stay at their defaults (a 2D image
/// leaves `depth` at 1, pitches at 0 for tight packing).
#[derive(Clone, Copy, Debug)]
pub struct ImageDescriptor {
    pub image_type: u32,
    pub width: usize,
    pub height: usize,
    pub depth: usize,
    pub array_size: usize,
    pub row_pitch: usize,
    pub slice_pitch: usize,
}

impl ImageDescriptor {
    pub fn new_2d(width: usize, height: usize) -> ImageDescriptor {
        ImageDescriptor {
            image_type: ffi::CL_MEM_OBJECT_IMAGE2D,
            width,
            height,
            depth: 1,
            array_size: 1,
            row_pitch: 0,
            slice_pitch: 0,
        }
    }

    pub fn new_3d(width: usize, height: usize, depth: usize) -> ImageDescriptor {
        ImageDescriptor {
            image_type: ffi::CL_MEM_OBJECT_IMAGE3D,
            width,
            height,
            depth,
            array_size: 1,
            row_pitch: 0,
            slice_pitch: 0,
        }
    }

    #[cfg(feature = "opencl_version_1_2")]
    fn pixel_count(&self) -> Result<usize> {
        self.width
            .checked_mul(self.height.max(1))
            .and_then(|n| n.checked_mul(self.depth.max(1)))
            .and_then(|n| n.checked_mul(self.array_size.max(1)))
            .ok_or_else(|| Error::InvalidArgument("image dimensions overflow".into()))
    }

    fn to_raw(&self) -> ffi::cl_image_desc {
        ffi::cl_image_desc {
            image_type: self.image_type,
            image_width: self.width,
            image_height: self.height,
            image_depth: self.depth,
            image_array_size: self.array_size,
            image_row_pitch: self.row_pitch,
            image_slice_pitch: self.slice_pitch,
            num_mip_levels: 0,
            num_samples: 0,
            buffer: ptr::null_mut(),
        }
    }
}


#[derive(Clone)]
pub struct Image {
    obj: Obj,
}

impl_wrapper_common!(Image);

impl Image {
    /// Creates an image (OpenCL 1.2+). When `host_data` is given and the
    /// flags name no host-pointer mode, `COPY_HOST_PTR` is implied; the
    /// slice must cover the whole image for tightly-packed formats.
    ///
    /// `USE_HOST_PTR` is rejected here: the device would keep reading the
    /// borrowed slice after this call returns. Use [`new_use_host_ptr`] for
    /// host-backed images.
    ///
    /// [`new_use_host_ptr`]: Image::new_use_host_ptr
    #[cfg(feature = "opencl_version_1_2")]
    pub fn new<T: OclPrm>(context: &Context, flags: MemFlags, format: ImageFormat,
            desc: ImageDescriptor, host_data: Option<&[T]>) -> Result<Image> {
        if flags.contains(MemFlags::USE_HOST_PTR) {
            return Err(Error::InvalidArgument(
                "USE_HOST_PTR images must be created with new_use_host_ptr".into()));
        }

        let mut flags = flags;
        let host_ptr = match host_data {
            Some(data) => {
                Image::check_host_data::<T>(&format, &desc, data.len())?;
                if !flags.contains(MemFlags::COPY_HOST_PTR) {
                    flags |= MemFlags::COPY_HOST_PTR;
                }
                data.as_ptr() as *mut c_void
            },
            None => ptr::null_mut(),
        };

        unsafe { Image::create(context, flags, format, desc, host_ptr) }
    }

    /// Creates an image backed by `host_data`'s allocation
    /// (`USE_HOST_PTR`, OpenCL 1.2+).
    ///
    /// ## Safety
    ///
    /// `host_data` must stay valid and un-moved until the image, every
    /// clone of it, and every command enqueued against it are done. The
    /// slice must also not be read or written by the host while a kernel or
    /// transfer may be accessing it.
    #[cfg(feature = "opencl_version_1_2")]
    pub unsafe fn new_use_host_ptr<T: OclPrm>(context: &Context, flags: MemFlags,
            format: ImageFormat, desc: ImageDescriptor, host_data: &[T])
            -> Result<Image> {
        Image::check_host_data::<T>(&format, &desc, host_data.len())?;
        let flags = flags | MemFlags::USE_HOST_PTR;
        Image::create(context, flags, format, desc,
            host_data.as_ptr() as *mut c_void)
    }

    #[cfg(feature = "opencl_version_1_2")]
    unsafe fn create(context: &Context, flags: MemFlags, format: ImageFormat,
            desc: ImageDescriptor, host_ptr: *mut c_void) -> Result<Image> {
        let raw_format = format.to_raw();
        let raw_desc = desc.to_raw();
        let handle = functions::create_image(context.as_raw(), flags.bits(),
            &raw_format, &raw_desc, host_ptr)?;
        let obj = Obj::from_created(Class::Image, handle);

        let mut keep_alive = lock(obj.mem_context());
        if keep_alive.is_none() {
            *keep_alive = Some(context.clone());
        }
        drop(keep_alive);

        Ok(Image { obj })
    }

    /// The slice length check runs before the native call; formats whose
    /// pixel size the host cannot derive are left to the driver.
    #[cfg(feature = "opencl_version_1_2")]
    fn check_host_data<T: OclPrm>(format: &ImageFormat, desc: &ImageDescriptor,
            len: usize) -> Result<()> {
        let pixel_bytes = match format.pixel_bytes() {
            Some(bytes) => bytes,
            None => return Ok(()),
        };
        let needed = desc.pixel_count()?
            .checked_mul(pixel_bytes)
            .ok_or_else(|| Error::InvalidArgument("image size overflows".into()))?;
        if len * mem::size_of::<T>() < needed {
            return Err(Error::InvalidArgument(format!(
                "host data covers {} bytes but the image needs {}",
                len * mem::size_of::<T>(), needed)));
        }
        Ok(())
    }

    pub fn context(&self) -> Result<Context> {
        if let Some(ref context) = *lock(self.obj.mem_context()) {
            return Ok(context.clone());
        }
        let handle = self.obj.info(ffi::CL_MEM_CONTEXT)?.scalar::<usize>();
        Context::from_raw(handle)
    }

    /// The pixel size in bytes.
    pub fn element_size(&self) -> Result<usize> {
        self.obj.info_with(crate::wrap::info::InfoKind::Image, 0,
            ffi::CL_IMAGE_ELEMENT_SIZE, 0)
            .map(|rec| rec.scalar::<usize>())
    }

    pub fn width(&self) -> Result<usize> {
        self.image_info(ffi::CL_IMAGE_WIDTH)
    }

    pub fn height(&self) -> Result<usize> {
        self.image_info(ffi::CL_IMAGE_HEIGHT)
    }

    fn image_info(&self, param: u32) -> Result<usize> {
        self.obj.info_with(crate::wrap::info::InfoKind::Image, 0, param, 0)
            .map(|rec| rec.scalar::<usize>())
    }

    fn check_host_slice<T>(&self, region: [usize; 3], len: usize) -> Result<()> {
        let pixels = region[0]
            .checked_mul(region[1])
            .and_then(|n| n.checked_mul(region[2]))
            .ok_or_else(|| Error::InvalidArgument("image region overflows".into()))?;
        let needed = pixels * self.element_size()?;
        if len * mem::size_of::<T>() < needed {
            return Err(Error::InvalidArgument(format!(
                "host slice covers {} bytes but the region needs {}",
                len * mem::size_of::<T>(), needed)));
        }
        Ok(())
    }

    /// Blocking read of a tightly-packed region into `data`.
    pub fn read<T: OclPrm>(&self, queue: &Queue, origin: [usize; 3],
            region: [usize; 3], data: &mut [T], mut wait: Option<&mut EventList>)
            -> Result<Event> {
        self.check_host_slice::<T>(region, data.len())?;
        let handles = wait_handles(&wait);
        let event = unsafe {
            functions::enqueue_read_image(queue.as_raw(), self.as_raw(), true,
                origin, region, 0, 0, data.as_mut_ptr() as *mut c_void, &handles)?
        };
        consume_wait_list(wait.take());
        Ok(queue.register_event(event))
    }

    /// Blocking write of a tightly-packed region from `data`.
    pub fn write<T: OclPrm>(&self, queue: &Queue, origin: [usize; 3],
            region: [usize; 3], data: &[T], mut wait: Option<&mut EventList>)
            -> Result<Event> {
        self.check_host_slice::<T>(region, data.len())?;
        let handles = wait_handles(&wait);
        let event = unsafe {
            functions::enqueue_write_image(queue.as_raw(), self.as_raw(), true,
                origin, region, 0, 0, data.as_ptr() as *const c_void, &handles)?
        };
        consume_wait_list(wait.take());
        Ok(queue.register_event(event))
    }

    /// Copies a region of this image into `dst` device-side.
    pub fn copy(&self, queue: &Queue, src_origin: [usize; 3], dst: &Image,
            dst_origin: [usize; 3], region: [usize; 3],
            mut wait: Option<&mut EventList>) -> Result<Event> {
        let handles = wait_handles(&wait);
        let event = functions::enqueue_copy_image(queue.as_raw(), self.as_raw(),
            dst.as_raw(), src_origin, dst_origin, region, &handles)?;
        consume_wait_list(wait.take());
        Ok(queue.register_event(event))
    }

    /// Copies a region of this image into a buffer at `dst_offset` bytes.
    pub fn copy_to_buffer<T: OclPrm>(&self, queue: &Queue, src_origin: [usize; 3],
            region: [usize; 3], dst: &Buffer<T>, dst_offset: usize,
            mut wait: Option<&mut EventList>) -> Result<Event> {
        let handles = wait_handles(&wait);
        let event = functions::enqueue_copy_image_to_buffer(queue.as_raw(),
            self.as_raw(), dst.as_raw(), src_origin, region,
            dst_offset * mem::size_of::<T>(), &handles)?;
        consume_wait_list(wait.take());
        Ok(queue.register_event(event))
    }

    /// Fills a region of this image from a buffer at `src_offset` bytes.
    pub fn copy_from_buffer<T: OclPrm>(&self, queue: &Queue, src: &Buffer<T>,
            src_offset: usize, dst_origin: [usize; 3], region: [usize; 3],
            mut wait: Option<&mut EventList>) -> Result<Event> {
        let handles = wait_handles(&wait);
        let event = functions::enqueue_copy_buffer_to_image(queue.as_raw(),
            src.as_raw(), self.as_raw(), src_offset * mem::size_of::<T>(),
            dst_origin, region, &handles)?;
        consume_wait_list(wait.take());
        Ok(queue.register_event(event))
    }
}

impl fmt::Display for Image {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Image({:#x})", self.as_raw())
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pixel_bytes_for_common_formats() {
        assert_eq!(ImageFormat::r_u8().pixel_bytes(), Some(1));
        assert_eq!(ImageFormat::rgba_u8().pixel_bytes(), Some(4));
        assert_eq!(ImageFormat::new(ffi::CL_RGBA, ffi::CL_FLOAT).pixel_bytes(),
            Some(16));
        assert_eq!(ImageFormat::new(ffi::CL_RGB, ffi::CL_UNORM_SHORT_565)
            .pixel_bytes(), Some(2));
    }

    // These paths fail validation before any native call, so a fake
    // context handle suffices.

    #[cfg(feature = "opencl_version_1_2")]
    #[test]
    fn use_host_ptr_requires_dedicated_constructor() {
        let context = Context::synthetic(0xC001);
        let host = vec![0u8; 64];
        let desc = ImageDescriptor::new_2d(8, 8);
        assert!(Image::new(&context, MemFlags::USE_HOST_PTR, ImageFormat::r_u8(),
            desc, Some(&host)).is_err());
    }

    #[cfg(feature = "opencl_version_1_2")]
    #[test]
    fn short_host_data_rejected() {
        let context = Context::synthetic(0xC002);
        let host = vec![0u8; 16];
        let desc = ImageDescriptor::new_2d(8, 8);
        assert!(Image::new(&context, MemFlags::READ_WRITE, ImageFormat::r_u8(),
            desc, Some(&host)).is_err());

        let exact = vec![0u8; 64];
        let err = Image::new(&context, MemFlags::READ_WRITE,
            ImageFormat::new(ffi::CL_RGBA, ffi::CL_FLOAT),
            ImageDescriptor::new_2d(8, 8), Some(&exact));
        assert!(err.is_err());
    }
}
