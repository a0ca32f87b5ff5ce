//! The buffer wrapper.

use std::fmt;
use std::marker::PhantomData;
use std::mem;
use std::ptr;

use cl_sys::{self as ffi, c_void};

use crate::error::{Error, Result};
use crate::functions;
use crate::types::{MemFlags, OclPrm};
use crate::wrap::{lock, Class, Obj};
use super::event::{consume_wait_list, wait_handles, EventList};
use super::{Context, Event, Queue};


/// A buffer of `len` elements of `T` in device memory.
///
/// The buffer holds its creating context alive for as long as any clone of
/// the wrapper exists.
#[derive(Clone)]
pub struct Buffer<T: OclPrm> {
    obj: Obj,
    len: usize,
    _pd: PhantomData<T>,
}

impl<T: OclPrm> Buffer<T> {
    /// Allocates a buffer of `len` elements. When `host_data` is given and
    /// the flags name no host-pointer mode, `COPY_HOST_PTR` is implied.
    ///
    /// `USE_HOST_PTR` is rejected here: the device would keep reading the
    /// borrowed slice after this call returns. Use [`new_use_host_ptr`] for
    /// host-backed buffers.
    ///
    /// [`new_use_host_ptr`]: Buffer::new_use_host_ptr
    pub fn new(context: &Context, flags: MemFlags, len: usize,
            host_data: Option<&[T]>) -> Result<Buffer<T>> {
        if len == 0 {
            return Err(Error::InvalidArgument("buffer length must be non-zero".into()));
        }
        if flags.contains(MemFlags::USE_HOST_PTR) {
            return Err(Error::InvalidArgument(
                "USE_HOST_PTR buffers must be created with new_use_host_ptr".into()));
        }

        let mut flags = flags;
        let host_ptr = match host_data {
            Some(data) => {
                if data.len() != len {
                    return Err(Error::InvalidArgument(format!(
                        "host data length ({}) does not match buffer length ({})",
                        data.len(), len)));
                }
                if !flags.contains(MemFlags::COPY_HOST_PTR) {
                    flags |= MemFlags::COPY_HOST_PTR;
                }
                data.as_ptr() as *mut c_void
            },
            None => ptr::null_mut(),
        };

        let size = len * mem::size_of::<T>();
        let handle = unsafe {
            functions::create_buffer(context.as_raw(), flags.bits(), size, host_ptr)?
        };
        Ok(Buffer::from_handle(handle, context, len))
    }

    /// Allocates a buffer backed by `host_data`'s allocation
    /// (`USE_HOST_PTR`).
    ///
    /// ## Safety
    ///
    /// `host_data` must stay valid and un-moved until the buffer, every
    /// clone of it, and every command enqueued against it are done. The
    /// slice must also not be read or written by the host while a kernel or
    /// transfer may be accessing it.
    pub unsafe fn new_use_host_ptr(context: &Context, flags: MemFlags,
            host_data: &[T]) -> Result<Buffer<T>> {
        if host_data.is_empty() {
            return Err(Error::InvalidArgument("buffer length must be non-zero".into()));
        }
        let flags = flags | MemFlags::USE_HOST_PTR;
        let size = host_data.len() * mem::size_of::<T>();
        let handle = functions::create_buffer(context.as_raw(), flags.bits(),
            size, host_data.as_ptr() as *mut c_void)?;
        Ok(Buffer::from_handle(handle, context, host_data.len()))
    }

    fn from_handle(handle: usize, context: &Context, len: usize) -> Buffer<T> {
        let obj = Obj::from_created(Class::Buffer, handle);

        let mut keep_alive = lock(obj.mem_context());
        if keep_alive.is_none() {
            *keep_alive = Some(context.clone());
        }
        drop(keep_alive);

        Buffer { obj, len, _pd: PhantomData }
    }

    /// The number of elements.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The allocation size in bytes.
    pub fn size_bytes(&self) -> usize {
        self.len * mem::size_of::<T>()
    }

    pub fn as_raw(&self) -> usize {
        self.obj.as_raw()
    }

    pub fn as_ptr(&self) -> *mut c_void {
        self.obj.as_ptr()
    }

    pub fn ref_count(&self) -> usize {
        self.obj.ref_count()
    }

    pub fn context(&self) -> Result<Context> {
        if let Some(ref context) = *lock(self.obj.mem_context()) {
            return Ok(context.clone());
        }
        let handle = self.obj.info(ffi::CL_MEM_CONTEXT)?.scalar::<usize>();
        Context::from_raw(handle)
    }

    pub fn flags(&self) -> Result<MemFlags> {
        let bits = self.obj.info(ffi::CL_MEM_FLAGS)?.scalar::<u64>();
        Ok(MemFlags::from_bits_truncate(bits))
    }

    pub(crate) fn obj(&self) -> &Obj {
        &self.obj
    }

    fn check_range(&self, offset: usize, len: usize) -> Result<()> {
        if offset.checked_add(len).map_or(true, |end| end > self.len) {
            return Err(Error::InvalidArgument(format!(
                "range at offset {} of length {} exceeds buffer length {}",
                offset, len, self.len)));
        }
        Ok(())
    }

    /// Blocking read of `data.len()` elements starting at `offset`.
    pub fn read(&self, queue: &Queue, offset: usize, data: &mut [T],
            mut wait: Option<&mut EventList>) -> Result<Event> {
        self.check_range(offset, data.len())?;
        let handles = wait_handles(&wait);
        let event = unsafe {
            functions::enqueue_read_buffer(queue.as_raw(), self.as_raw(), true,
                offset * mem::size_of::<T>(), data.len() * mem::size_of::<T>(),
                data.as_mut_ptr() as *mut c_void, &handles)?
        };
        consume_wait_list(wait.take());
        Ok(queue.register_event(event))
    }

    /// Blocking write of `data` starting at `offset`.
    pub fn write(&self, queue: &Queue, offset: usize, data: &[T],
            mut wait: Option<&mut EventList>) -> Result<Event> {
        self.check_range(offset, data.len())?;
        let handles = wait_handles(&wait);
        let event = unsafe {
            functions::enqueue_write_buffer(queue.as_raw(), self.as_raw(), true,
                offset * mem::size_of::<T>(), data.len() * mem::size_of::<T>(),
                data.as_ptr() as *const c_void, &handles)?
        };
        consume_wait_list(wait.take());
        Ok(queue.register_event(event))
    }

    /// Non-blocking read.
    ///
    /// ## Safety
    ///
    /// `data` must outlive the returned event's completion and must not be
    /// read until then.
    pub unsafe fn enqueue_read(&self, queue: &Queue, offset: usize,
            data: &mut [T], mut wait: Option<&mut EventList>) -> Result<Event> {
        self.check_range(offset, data.len())?;
        let handles = wait_handles(&wait);
        let event = functions::enqueue_read_buffer(queue.as_raw(), self.as_raw(),
            false, offset * mem::size_of::<T>(), data.len() * mem::size_of::<T>(),
            data.as_mut_ptr() as *mut c_void, &handles)?;
        consume_wait_list(wait.take());
        Ok(queue.register_event(event))
    }

    /// Non-blocking write.
    ///
    /// ## Safety
    ///
    /// `data` must outlive the returned event's completion and must not be
    /// mutated until then.
    pub unsafe fn enqueue_write(&self, queue: &Queue, offset: usize,
            data: &[T], mut wait: Option<&mut EventList>) -> Result<Event> {
        self.check_range(offset, data.len())?;
        let handles = wait_handles(&wait);
        let event = functions::enqueue_write_buffer(queue.as_raw(), self.as_raw(),
            false, offset * mem::size_of::<T>(), data.len() * mem::size_of::<T>(),
            data.as_ptr() as *const c_void, &handles)?;
        consume_wait_list(wait.take());
        Ok(queue.register_event(event))
    }

    /// Copies `len` elements from this buffer into `dst` device-side.
    pub fn copy(&self, queue: &Queue, src_offset: usize, dst: &Buffer<T>,
            dst_offset: usize, len: usize, mut wait: Option<&mut EventList>)
            -> Result<Event> {
        self.check_range(src_offset, len)?;
        dst.check_range(dst_offset, len)?;
        let handles = wait_handles(&wait);
        let event = functions::enqueue_copy_buffer(queue.as_raw(), self.as_raw(),
            dst.as_raw(), src_offset * mem::size_of::<T>(),
            dst_offset * mem::size_of::<T>(), len * mem::size_of::<T>(),
            &handles)?;
        consume_wait_list(wait.take());
        Ok(queue.register_event(event))
    }

    /// Creates a sub-buffer windowing `len` elements starting at `origin`.
    /// The sub-buffer wrapper shares this buffer's context keep-alive.
    pub fn create_sub_buffer(&self, flags: MemFlags, origin: usize, len: usize)
            -> Result<Buffer<T>> {
        self.check_range(origin, len)?;
        let handle = functions::create_sub_buffer(self.as_raw(), flags.bits(),
            origin * mem::size_of::<T>(), len * mem::size_of::<T>())?;
        let obj = Obj::from_created(Class::Buffer, handle);

        let mut keep_alive = lock(obj.mem_context());
        if keep_alive.is_none() {
            *keep_alive = lock(self.obj.mem_context()).clone();
        }
        drop(keep_alive);

        Ok(Buffer { obj, len, _pd: PhantomData })
    }
}

impl<T: OclPrm> fmt::Debug for Buffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Buffer({:#x}, len: {})", self.obj.as_raw(), self.len)
    }
}

impl<T: OclPrm> PartialEq for Buffer<T> {
    fn eq(&self, other: &Buffer<T>) -> bool {
        self.obj.ptr_eq(&other.obj)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    // These paths fail validation before any native call, so a fake
    // context handle suffices.

    #[test]
    fn use_host_ptr_requires_dedicated_constructor() {
        let context = Context::synthetic(0xB001);
        let host = vec![0u32; 16];
        assert!(Buffer::new(&context, MemFlags::USE_HOST_PTR, 16, Some(&host)).is_err());
        assert!(Buffer::<u32>::new(&context,
            MemFlags::READ_WRITE | MemFlags::USE_HOST_PTR, 16, None).is_err());
    }

    #[test]
    fn host_data_length_must_match() {
        let context = Context::synthetic(0xB002);
        let host = vec![0u32; 8];
        assert!(Buffer::new(&context, MemFlags::READ_WRITE, 16, Some(&host)).is_err());
    }

    #[test]
    fn zero_length_rejected() {
        let context = Context::synthetic(0xB003);
        assert!(Buffer::<u32>::new(&context, MemFlags::READ_WRITE, 0, None).is_err());
    }
}
