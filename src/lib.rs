//! Object wrappers for OpenCL with uniform lifecycles, cached introspection
//! and queue profiling.
//!
//! Every native OpenCL object is held by a wrapper registered in a
//! process-wide registry, so wrapping the same handle twice yields the same
//! wrapper instance and the native object is released exactly once, when
//! the last clone drops. Info queries are cached per wrapper. Queues retain
//! the events their enqueue calls produce, which feeds the [`Profile`]
//! session: per-name aggregate times, cross-queue overlaps, a textual
//! summary and timeline export.
//!
//! ## Example
//!
//! ```no_run
//! use clobj::{Buffer, Context, DeviceContainer, MemFlags, Queue};
//!
//! fn main() -> clobj::Result<()> {
//!     let context = Context::from_device_type(Default::default())?;
//!     let device = context.device(0)?;
//!     let queue = Queue::new(&context, &device, None)?;
//!
//!     let host: Vec<u32> = (0..512).collect();
//!     let buffer = Buffer::new(&context, MemFlags::READ_WRITE, host.len(),
//!         Some(&host))?;
//!
//!     let mut out = vec![0u32; host.len()];
//!     buffer.read(&queue, 0, &mut out, None)?;
//!     assert_eq!(host, out);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature flags
//!
//! The `opencl_version_1_1`, `opencl_version_1_2`, `opencl_version_2_0` and
//! `opencl_version_2_1` features (default: 1.1 and 1.2) gate the native
//! entry points of the corresponding OpenCL versions, passed through to
//! `cl-sys`. `opencl_vendor_mesa` links against Mesa's loader.

pub mod error;
pub mod types;
pub mod functions;
pub mod wrap;
pub mod standard;
pub mod prof;

#[cfg(test)]
mod tests;

pub use crate::error::{ApiError, Error, Result, Status};
pub use crate::types::{CommandQueueProperties, DeviceType, MemFlags, OclPrm,
    OpenclVersion};
pub use crate::wrap::{memcheck, memcheck_log, Class};
pub use crate::wrap::info::InfoRecord;
pub use crate::standard::{Arg, Buffer, Context, Device, DeviceContainer, Event,
    EventList, Image, ImageDescriptor, ImageFormat, Kernel, Platform, Program,
    Queue, Sampler};
pub use crate::standard::kernel::suggest_worksizes;
pub use crate::standard::sampler::{AddressingMode, FilterMode};
pub use crate::prof::{Aggregate, AggSort, ExportOptions, InstantKind,
    InstantSort, Overlap, OverlapSort, ProfInstant, Profile, ProfRecord,
    RecordSort, SortOrder};
