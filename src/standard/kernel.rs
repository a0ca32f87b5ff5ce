//! The kernel wrapper and its argument machinery.
//!
//! Arguments are staged in a per-kernel map and pushed to the native API
//! just before enqueue; each staged entry is removed once its native
//! set-arg call succeeds. A kernel wrapper is intended for one thread at a
//! time; concurrent invocation wants one wrapper per thread built from the
//! same program.

use std::fmt;
use std::mem;
use std::ptr;

use cl_sys::{self as ffi, c_void};

use crate::error::{Error, Result};
use crate::functions;
use crate::types::{OclPrm, OpenclVersion};
use crate::wrap::info::InfoKind;
use crate::wrap::{lock, Class, Obj};
use super::event::{consume_wait_list, wait_handles, EventList};
use super::{impl_wrapper_common, Buffer, Device, Event, Image, Program, Queue, Sampler};


/// A kernel argument value.
///
/// Wrapper-backed variants hold their wrapper alive until the argument is
/// flushed to the native API; inline variants own a copy of the bytes.
#[derive(Clone, Debug)]
pub enum Arg {
    /// A buffer or image handle.
    Mem(Obj),
    Sampler(Sampler),
    /// An inline by-value argument.
    Scalar(Vec<u8>),
    /// A local-memory allocation of the given byte size.
    Local(usize),
    /// Leaves the argument at this index unchanged in [`Kernel::set_args`].
    Skip,
}

impl Arg {
    pub fn buffer<T: OclPrm>(buffer: &Buffer<T>) -> Arg {
        Arg::Mem(buffer.obj().clone())
    }

    pub fn image(image: &Image) -> Arg {
        Arg::Mem(image.obj().clone())
    }

    pub fn sampler(sampler: &Sampler) -> Arg {
        Arg::Sampler(sampler.clone())
    }

    pub fn scalar<T: OclPrm>(value: T) -> Arg {
        let mut bytes = vec![0u8; mem::size_of::<T>()];
        unsafe {
            ptr::copy_nonoverlapping(&value as *const T as *const u8,
                bytes.as_mut_ptr(), bytes.len());
        }
        Arg::Scalar(bytes)
    }

    /// Local memory for `len` elements of `T`.
    pub fn local<T: OclPrm>(len: usize) -> Arg {
        Arg::Local(len * mem::size_of::<T>())
    }

    pub fn skip() -> Arg {
        Arg::Skip
    }
}


#[derive(Clone)]
pub struct Kernel {
    obj: Obj,
}

impl_wrapper_common!(Kernel);

impl Kernel {
    pub(crate) fn new(program: &Program, name: &str) -> Result<Kernel> {
        let handle = functions::create_kernel(program.as_raw(), name)?;
        Ok(Kernel { obj: Obj::from_created(Class::Kernel, handle) })
    }

    pub fn name(&self) -> Result<String> {
        Ok(self.info(ffi::CL_KERNEL_FUNCTION_NAME)?.string())
    }

    pub fn num_args(&self) -> Result<u32> {
        Ok(self.info(ffi::CL_KERNEL_NUM_ARGS)?.scalar::<u32>())
    }

    /// The program this kernel was created from.
    pub fn program(&self) -> Result<Program> {
        let handle = self.info(ffi::CL_KERNEL_PROGRAM)?.scalar::<usize>();
        Program::from_raw(handle)
    }

    /// Stages `arg` at `index`, replacing any prior binding there.
    /// `Arg::Skip` leaves the existing binding untouched.
    pub fn set_arg(&self, index: u32, arg: Arg) {
        if let Arg::Skip = arg {
            return;
        }
        lock(self.obj.kernel_args()).insert(index, arg);
    }

    /// Stages arguments by position, honoring `Arg::Skip` entries.
    pub fn set_args(&self, args: Vec<Arg>) {
        for (index, arg) in args.into_iter().enumerate() {
            self.set_arg(index as u32, arg);
        }
    }

    pub fn num_staged_args(&self) -> usize {
        lock(self.obj.kernel_args()).len()
    }

    /// Pushes every staged argument to the native API, removing each entry
    /// once its set-arg call succeeds. A failed entry stays staged.
    pub(crate) fn flush_args(&self) -> Result<()> {
        let indices: Vec<u32> = lock(self.obj.kernel_args()).keys().cloned().collect();
        for index in indices {
            let arg = lock(self.obj.kernel_args()).get(&index).cloned();
            if let Some(arg) = arg {
                self.set_native_arg(index, &arg)?;
                lock(self.obj.kernel_args()).remove(&index);
            }
        }
        Ok(())
    }

    fn set_native_arg(&self, index: u32, arg: &Arg) -> Result<()> {
        match *arg {
            Arg::Mem(ref obj) => {
                let handle = obj.as_ptr();
                unsafe {
                    functions::set_kernel_arg(self.as_raw(), index,
                        mem::size_of::<*mut c_void>(),
                        &handle as *const *mut c_void as *const c_void)
                }
            },
            Arg::Sampler(ref sampler) => {
                let handle = sampler.as_ptr();
                unsafe {
                    functions::set_kernel_arg(self.as_raw(), index,
                        mem::size_of::<*mut c_void>(),
                        &handle as *const *mut c_void as *const c_void)
                }
            },
            Arg::Scalar(ref bytes) => unsafe {
                functions::set_kernel_arg(self.as_raw(), index, bytes.len(),
                    bytes.as_ptr() as *const c_void)
            },
            Arg::Local(size) => unsafe {
                functions::set_kernel_arg(self.as_raw(), index, size, ptr::null())
            },
            Arg::Skip => Ok(()),
        }
    }

    /// Flushes staged arguments and enqueues the kernel over `gws` global
    /// work items. Returns the produced event, also retained by `queue`.
    pub fn enqueue(&self, queue: &Queue, gws: &[usize], lws: Option<&[usize]>,
            offset: Option<&[usize]>, mut wait: Option<&mut EventList>)
            -> Result<Event> {
        if gws.is_empty() || gws.len() > 3 {
            return Err(Error::InvalidArgument(
                format!("global work size must have 1-3 dimensions, got {}", gws.len())));
        }

        self.flush_args()?;
        let handles = wait_handles(&wait);
        let event = functions::enqueue_ndrange_kernel(queue.as_raw(), self.as_raw(),
            gws.len() as u32, offset, gws, lws, &handles)?;
        consume_wait_list(wait.take());
        Ok(queue.register_event(event))
    }

    /// The maximum work group size for this kernel on `device`. Reads as
    /// zero when the query is unavailable.
    pub fn work_group_size(&self, device: &Device) -> Result<usize> {
        Ok(self.obj.info_with(InfoKind::KernelWorkGroup, device.as_raw(),
            ffi::CL_KERNEL_WORK_GROUP_SIZE, mem::size_of::<usize>())?
            .scalar::<usize>())
    }

    /// The preferred work group size multiple for this kernel on `device`
    /// (OpenCL 1.1+ query). Reads as zero when unavailable.
    pub fn preferred_work_group_size_multiple(&self, device: &Device) -> Result<usize> {
        Ok(self.obj.info_with(InfoKind::KernelWorkGroup, device.as_raw(),
            ffi::CL_KERNEL_PREFERRED_WORK_GROUP_SIZE_MULTIPLE,
            mem::size_of::<usize>())?
            .scalar::<usize>())
    }

    /// See [`suggest_worksizes`].
    pub fn suggest_worksizes(&self, device: &Device, real_worksize: &[usize],
            gws: Option<&mut [usize]>, lws: &mut [usize]) -> Result<()> {
        suggest_worksizes(Some(self), device, real_worksize, gws, lws)
    }
}

impl fmt::Display for Kernel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.name() {
            Ok(name) => write!(f, "Kernel({})", name),
            Err(_) => write!(f, "Kernel({:#x})", self.as_raw()),
        }
    }
}


/// Computes device-friendly local (and optionally global) work sizes for
/// `real_worksize` work items.
///
/// Pre-populated non-zero `lws` entries act as per-dimension maxima. When
/// `gws` is supplied, each global size is `real_worksize[i]` rounded up to a
/// multiple of the chosen `lws[i]`; when absent, the chosen local sizes
/// evenly divide `real_worksize`.
pub fn suggest_worksizes(kernel: Option<&Kernel>, device: &Device,
        real_worksize: &[usize], gws: Option<&mut [usize]>, lws: &mut [usize])
        -> Result<()> {
    let dims = real_worksize.len();
    let max_dims = device.max_work_item_dimensions()? as usize;
    if dims == 0 || dims > max_dims {
        return Err(Error::InvalidArgument(
            format!("work size has {} dimensions, device supports 1-{}", dims, max_dims)));
    }
    if lws.len() < dims || gws.as_ref().map_or(false, |g| g.len() < dims) {
        return Err(Error::InvalidArgument(
            "output work size slices shorter than the requested dimensions".into()));
    }

    let mut max_wi_sizes = device.max_work_item_sizes()?;
    if max_wi_sizes.len() < dims {
        return Err(Error::InfoUnavailable("clGetDeviceInfo"));
    }
    max_wi_sizes.truncate(dims);

    // Caller-set entries clamp the device per-dimension maxima.
    for (max, &cap) in max_wi_sizes.iter_mut().zip(lws.iter()) {
        if cap > 0 && cap < *max {
            *max = cap;
        }
    }

    let (wg_size_max, wg_size_mult) = match kernel {
        Some(kernel) => {
            let mut max = kernel.work_group_size(device)?;
            if max == 0 {
                max = device.max_work_group_size()?;
            }
            let mut mult = if device.version()? >= OpenclVersion::new(1, 1) {
                kernel.preferred_work_group_size_multiple(device)?
            } else {
                0
            };
            if mult == 0 {
                mult = max;
            }
            (max, mult)
        },
        None => {
            let max = device.max_work_group_size()?;
            (max, max)
        },
    };

    calc_worksizes(real_worksize, &max_wi_sizes, wg_size_max, wg_size_mult,
        gws, lws)
}

/// The size computation proper, with all device and kernel limits already
/// resolved.
fn calc_worksizes(real_worksize: &[usize], max_wi_sizes: &[usize],
        wg_size_max: usize, wg_size_mult: usize, gws: Option<&mut [usize]>,
        lws: &mut [usize]) -> Result<()> {
    let dims = real_worksize.len();
    if real_worksize.iter().any(|&s| s == 0) {
        return Err(Error::InvalidArgument(
            "real work size must be non-zero in every dimension".into()));
    }

    for i in 0..dims {
        lws[i] = wg_size_mult.max(1).min(max_wi_sizes[i].max(1));
        while lws[i] > real_worksize[i] {
            lws[i] /= 2;
        }
    }
    let mut wg_size: usize = lws[..dims].iter().product();

    while wg_size > wg_size_max {
        let before = wg_size;
        for i in (0..dims).rev() {
            if lws[i] > 1 {
                lws[i] /= 2;
                wg_size = lws[..dims].iter().product();
                if wg_size <= wg_size_max {
                    break;
                }
            }
        }
        if wg_size == before {
            return Err(Error::Other(format!(
                "cannot find a local work size within the maximum of {}", wg_size_max)));
        }
    }

    match gws {
        Some(gws) => {
            for i in 0..dims {
                gws[i] = (real_worksize[i] + lws[i] - 1) / lws[i] * lws[i];
            }
        },
        None => {
            if (0..dims).any(|i| real_worksize[i] % lws[i] != 0) {
                // The global size is fixed, so each local size must divide
                // it exactly; take the largest per-dimension divisor within
                // the limits.
                let mut product = 1usize;
                for i in 0..dims {
                    let ceiling = (real_worksize[i] / 2)
                        .min(max_wi_sizes[i])
                        .min(wg_size_max / product)
                        .max(1);
                    let mut chosen = 1;
                    for cand in (1..=ceiling).rev() {
                        if real_worksize[i] % cand == 0 {
                            chosen = cand;
                            break;
                        }
                    }
                    lws[i] = chosen;
                    product *= chosen;
                }
            }
        },
    }
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;

    fn synthetic_kernel(handle: usize) -> Kernel {
        Kernel { obj: Obj::from_created_with(Class::Kernel, handle, None) }
    }

    #[test]
    fn set_args_honors_skip() {
        let kernel = synthetic_kernel(0xA001);
        kernel.set_args(vec![Arg::scalar(1u32), Arg::scalar(2u32), Arg::scalar(3u32)]);
        assert_eq!(kernel.num_staged_args(), 3);

        // Index 0 keeps its original binding through the skip.
        kernel.set_args(vec![Arg::skip(), Arg::scalar(20u32), Arg::scalar(30u32)]);
        let args = lock(kernel.obj.kernel_args());
        match args.get(&0) {
            Some(Arg::Scalar(bytes)) => assert_eq!(bytes, &1u32.to_ne_bytes().to_vec()),
            other => panic!("unexpected arg at 0: {:?}", other),
        }
        match args.get(&1) {
            Some(Arg::Scalar(bytes)) => assert_eq!(bytes, &20u32.to_ne_bytes().to_vec()),
            other => panic!("unexpected arg at 1: {:?}", other),
        }
    }

    #[test]
    fn set_arg_replaces() {
        let kernel = synthetic_kernel(0xA002);
        kernel.set_arg(4, Arg::local::<f32>(16));
        kernel.set_arg(4, Arg::scalar(9u64));
        assert_eq!(kernel.num_staged_args(), 1);
        match lock(kernel.obj.kernel_args()).get(&4) {
            Some(Arg::Scalar(bytes)) => assert_eq!(bytes.len(), 8),
            other => panic!("unexpected arg: {:?}", other),
        };
    }

    #[test]
    fn local_arg_size() {
        match Arg::local::<i32>(16) {
            Arg::Local(size) => assert_eq!(size, 64),
            other => panic!("unexpected arg: {:?}", other),
        }
    }

    #[test]
    fn worksizes_unit_real_size() {
        let mut lws = [0usize; 2];
        let mut gws = [0usize; 2];
        calc_worksizes(&[1, 1], &[256, 256], 1024, 32, Some(&mut gws), &mut lws)
            .unwrap();
        assert_eq!(lws, [1, 1]);
        assert_eq!(gws, [1, 1]);
    }

    #[test]
    fn worksizes_round_up_global() {
        let mut lws = [0usize; 1];
        let mut gws = [0usize; 1];
        calc_worksizes(&[1000], &[256], 256, 32, Some(&mut gws), &mut lws)
            .unwrap();
        assert_eq!(lws, [32]);
        assert_eq!(gws, [1024]);
        assert_eq!(gws[0] % lws[0], 0);
    }

    #[test]
    fn worksizes_exact_divisor_when_global_fixed() {
        let mut lws = [0usize; 1];
        calc_worksizes(&[100], &[256], 256, 32, None, &mut lws).unwrap();
        assert_eq!(100 % lws[0], 0);
        assert_eq!(lws, [50]);
    }

    #[test]
    fn worksizes_respect_wg_size_max() {
        let mut lws = [0usize; 2];
        let mut gws = [0usize; 2];
        calc_worksizes(&[512, 512], &[256, 256], 64, 64, Some(&mut gws), &mut lws)
            .unwrap();
        assert!(lws[0] * lws[1] <= 64);
        assert_eq!(gws[0] % lws[0], 0);
        assert_eq!(gws[1] % lws[1], 0);
    }

    #[test]
    fn worksizes_caller_caps_local_dims() {
        let mut lws = [8usize, 0];
        let mut max_wi = vec![256usize, 256];
        // The cap applies before the computation; emulate the clamp the
        // public wrapper performs.
        for (max, &cap) in max_wi.iter_mut().zip(lws.iter()) {
            if cap > 0 && cap < *max {
                *max = cap;
            }
        }
        let mut gws = [0usize; 2];
        calc_worksizes(&[512, 512], &max_wi, 1024, 32, Some(&mut gws), &mut lws)
            .unwrap();
        assert!(lws[0] <= 8);
    }

    #[test]
    fn worksizes_impossible_max_errors() {
        let mut lws = [0usize; 1];
        let mut gws = [0usize; 1];
        let res = calc_worksizes(&[64], &[64], 0, 16, Some(&mut gws), &mut lws);
        assert!(res.is_err());
    }

    #[test]
    fn worksizes_zero_real_size_rejected() {
        let mut lws = [0usize; 1];
        assert!(calc_worksizes(&[0], &[64], 64, 16, None, &mut lws).is_err());
    }
}
