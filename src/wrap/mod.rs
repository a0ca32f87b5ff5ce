//! The wrapper base shared by every concrete class, and the process-wide
//! registry which guarantees that a native handle is wrapped by at most one
//! logical wrapper instance at a time.
//!
//! A wrapper is an [`Obj`]: a cheaply clonable reference to a shared
//! [`ObjCore`] holding the native handle, the cached info table and any
//! class-specific payload. Cloning an `Obj` *is* the reference increment;
//! dropping the last clone releases the native handle and removes the
//! registry entry.

pub mod info;

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use cl_sys::{self as ffi, cl_int, c_void};

use crate::error::{ApiError, Result};
use crate::standard::{Context, Device, Event, Platform};
use crate::standard::kernel::Arg;
use self::info::{InfoCache, InfoKind, InfoRecord};


/// The class of object a wrapper wraps.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Class {
    Buffer,
    Context,
    Device,
    Event,
    Image,
    Kernel,
    Platform,
    Program,
    Sampler,
    Queue,
    None,
}

impl Class {
    pub fn name(self) -> &'static str {
        match self {
            Class::Buffer => "Buffer",
            Class::Context => "Context",
            Class::Device => "Device",
            Class::Event => "Event",
            Class::Image => "Image",
            Class::Kernel => "Kernel",
            Class::Platform => "Platform",
            Class::Program => "Program",
            Class::Sampler => "Sampler",
            Class::Queue => "Queue",
            Class::None => "None",
        }
    }

    /// The info kind used for this class's default info queries.
    pub(crate) fn info_kind(self) -> InfoKind {
        match self {
            Class::Buffer => InfoKind::MemObject,
            Class::Context => InfoKind::Context,
            Class::Device => InfoKind::Device,
            Class::Event => InfoKind::Event,
            Class::Image => InfoKind::Image,
            Class::Kernel => InfoKind::Kernel,
            Class::Platform => InfoKind::Platform,
            Class::Program => InfoKind::Program,
            Class::Sampler => InfoKind::Sampler,
            Class::Queue => InfoKind::Queue,
            Class::None => InfoKind::MemObject,
        }
    }

    fn release_fn(self) -> Option<NativeFn> {
        match self {
            Class::Buffer | Class::Image => Some(shims::release_mem_object),
            Class::Context => Some(shims::release_context),
            Class::Event => Some(shims::release_event),
            Class::Kernel => Some(shims::release_kernel),
            Class::Program => Some(shims::release_program),
            Class::Sampler => Some(shims::release_sampler),
            Class::Queue => Some(shims::release_command_queue),
            // Platforms and root devices have no release function. Devices
            // which are sub-devices are wrapped with an explicit release.
            Class::Platform | Class::Device | Class::None => None,
        }
    }

    fn retain_fn(self) -> Option<(NativeFn, &'static str)> {
        match self {
            Class::Buffer | Class::Image => Some((shims::retain_mem_object, "clRetainMemObject")),
            Class::Context => Some((shims::retain_context, "clRetainContext")),
            Class::Event => Some((shims::retain_event, "clRetainEvent")),
            Class::Kernel => Some((shims::retain_kernel, "clRetainKernel")),
            Class::Program => Some((shims::retain_program, "clRetainProgram")),
            Class::Sampler => Some((shims::retain_sampler, "clRetainSampler")),
            Class::Queue => Some((shims::retain_command_queue, "clRetainCommandQueue")),
            Class::Platform | Class::Device | Class::None => None,
        }
    }
}

impl fmt::Display for Class {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}


/// A native retain or release entry point, shimmed to a plain fn taking the
/// handle as an integer.
pub(crate) type NativeFn = fn(usize) -> cl_int;

mod shims {
    use cl_sys::{self as ffi, cl_int};

    pub fn release_context(h: usize) -> cl_int {
        unsafe { ffi::clReleaseContext(h as ffi::cl_context) }
    }
    pub fn retain_context(h: usize) -> cl_int {
        unsafe { ffi::clRetainContext(h as ffi::cl_context) }
    }
    pub fn release_command_queue(h: usize) -> cl_int {
        unsafe { ffi::clReleaseCommandQueue(h as ffi::cl_command_queue) }
    }
    pub fn retain_command_queue(h: usize) -> cl_int {
        unsafe { ffi::clRetainCommandQueue(h as ffi::cl_command_queue) }
    }
    pub fn release_mem_object(h: usize) -> cl_int {
        unsafe { ffi::clReleaseMemObject(h as ffi::cl_mem) }
    }
    pub fn retain_mem_object(h: usize) -> cl_int {
        unsafe { ffi::clRetainMemObject(h as ffi::cl_mem) }
    }
    pub fn release_sampler(h: usize) -> cl_int {
        unsafe { ffi::clReleaseSampler(h as ffi::cl_sampler) }
    }
    pub fn retain_sampler(h: usize) -> cl_int {
        unsafe { ffi::clRetainSampler(h as ffi::cl_sampler) }
    }
    pub fn release_program(h: usize) -> cl_int {
        unsafe { ffi::clReleaseProgram(h as ffi::cl_program) }
    }
    pub fn retain_program(h: usize) -> cl_int {
        unsafe { ffi::clRetainProgram(h as ffi::cl_program) }
    }
    pub fn release_kernel(h: usize) -> cl_int {
        unsafe { ffi::clReleaseKernel(h as ffi::cl_kernel) }
    }
    pub fn retain_kernel(h: usize) -> cl_int {
        unsafe { ffi::clRetainKernel(h as ffi::cl_kernel) }
    }
    pub fn release_event(h: usize) -> cl_int {
        unsafe { ffi::clReleaseEvent(h as ffi::cl_event) }
    }
    pub fn retain_event(h: usize) -> cl_int {
        unsafe { ffi::clRetainEvent(h as ffi::cl_event) }
    }
    #[cfg(feature = "opencl_version_1_2")]
    pub fn release_device(h: usize) -> cl_int {
        unsafe { ffi::clReleaseDevice(h as ffi::cl_device_id) }
    }
}

#[cfg(feature = "opencl_version_1_2")]
pub(crate) fn release_device_fn() -> Option<NativeFn> {
    Some(shims::release_device)
}


/// Class-specific wrapper state, shared between every clone of a wrapper so
/// that registry reuse converges on one copy of it.
pub(crate) enum Payload {
    None,
    /// Lazily-initialized device list (platform, program).
    Container {
        devices: Mutex<Option<Vec<Device>>>,
    },
    /// Device list plus lazily-cached platform.
    Context {
        devices: Mutex<Option<Vec<Device>>>,
        platform: Mutex<Option<Platform>>,
    },
    /// Sub-devices created from (and owned by) this device.
    Device {
        sub_devices: Mutex<Vec<Device>>,
    },
    /// Events produced by enqueue calls on this queue.
    Queue {
        events: Mutex<Vec<Event>>,
    },
    /// Not-yet-flushed kernel argument bindings.
    Kernel {
        args: Mutex<BTreeMap<u32, Arg>>,
    },
    /// Optional user-assigned profiling name.
    Event {
        name: Mutex<Option<String>>,
    },
    /// The context which must outlive this memory object.
    Mem {
        context: Mutex<Option<Context>>,
    },
}

impl Payload {
    fn for_class(class: Class) -> Payload {
        match class {
            Class::Platform | Class::Program => Payload::Container {
                devices: Mutex::new(None),
            },
            Class::Context => Payload::Context {
                devices: Mutex::new(None),
                platform: Mutex::new(None),
            },
            Class::Device => Payload::Device {
                sub_devices: Mutex::new(Vec::new()),
            },
            Class::Queue => Payload::Queue {
                events: Mutex::new(Vec::new()),
            },
            Class::Kernel => Payload::Kernel {
                args: Mutex::new(BTreeMap::new()),
            },
            Class::Event => Payload::Event {
                name: Mutex::new(None),
            },
            Class::Buffer | Class::Image => Payload::Mem {
                context: Mutex::new(None),
            },
            Class::Sampler | Class::None => Payload::None,
        }
    }
}


/// The shared portion of a wrapper.
pub struct ObjCore {
    class: Class,
    handle: usize,
    info: InfoCache,
    payload: Payload,
    release: Option<NativeFn>,
}

impl fmt::Debug for ObjCore {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ObjCore")
            .field("class", &self.class)
            .field("handle", &format_args!("{:#x}", self.handle))
            .finish()
    }
}

impl Drop for ObjCore {
    // Release order is fixed: native release first (the payload, including
    // any parent references, is still intact), then the registry entry,
    // then the payload (struct drop).
    fn drop(&mut self) {
        if let Some(release) = self.release {
            let errcode = release(self.handle);
            if errcode != ffi::CL_SUCCESS {
                log::warn!("error releasing native {} object at {:#x}: code {}",
                    self.class, self.handle, errcode);
            }
        }
        registry_remove(self.handle);
    }
}


type Registry = HashMap<usize, Weak<ObjCore>>;

static REGISTRY: Mutex<Option<Registry>> = Mutex::new(None);

fn registry_lock() -> MutexGuard<'static, Option<Registry>> {
    REGISTRY.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn registry_remove(handle: usize) {
    let mut guard = registry_lock();
    if let Some(ref mut map) = *guard {
        // Only remove a dead entry: a new wrapper may already have claimed
        // this handle between our refcount reaching zero and this call.
        let dead = map.get(&handle).map_or(false, |w| w.upgrade().is_none());
        if dead {
            map.remove(&handle);
        }
        if map.is_empty() {
            *guard = None;
        }
    }
}

/// Returns `true` if every wrapper has been destroyed (the registry is
/// absent).
pub fn memcheck() -> bool {
    registry_lock().is_none()
}

/// Logs each surviving wrapper at debug level. A teardown diagnostic.
pub fn memcheck_log() {
    let guard = registry_lock();
    if let Some(ref map) = *guard {
        for (handle, weak) in map.iter() {
            if let Some(core) = weak.upgrade() {
                log::debug!("surviving wrapper: {} at {:#x} (refs: {})",
                    core.class, handle, Arc::strong_count(&core).saturating_sub(1));
            }
        }
    }
}


/// A wrapper over a native OpenCL object.
///
/// `Clone` increments the logical reference count; dropping the final clone
/// releases the native object.
#[derive(Clone)]
pub struct Obj {
    core: Arc<ObjCore>,
}

impl Obj {
    /// Wraps a handle returned by a native create function. The new wrapper
    /// owns the native reference the create call produced.
    ///
    /// If the handle is already wrapped, the extra native reference is
    /// released and the existing wrapper is returned (its class wins).
    pub(crate) fn from_created(class: Class, handle: usize) -> Obj {
        Obj::from_created_with(class, handle, class.release_fn())
    }

    pub(crate) fn from_created_with(class: Class, handle: usize,
            release: Option<NativeFn>) -> Obj {
        let mut guard = registry_lock();
        let map = guard.get_or_insert_with(HashMap::new);

        if let Some(existing) = map.get(&handle).and_then(Weak::upgrade) {
            if let Some(release) = release {
                let errcode = release(handle);
                if errcode != ffi::CL_SUCCESS {
                    log::warn!("error releasing duplicate native reference at {:#x}: code {}",
                        handle, errcode);
                }
            }
            return Obj { core: existing };
        }

        let core = Arc::new(ObjCore {
            class,
            handle,
            info: InfoCache::new(),
            payload: Payload::for_class(class),
            release,
        });
        map.insert(handle, Arc::downgrade(&core));
        Obj { core }
    }

    /// Wraps a handle obtained from a query (not owned by the caller). If a
    /// fresh wrapper must be created, the native object is retained first so
    /// the eventual release is balanced.
    pub(crate) fn from_borrowed(class: Class, handle: usize) -> Result<Obj> {
        let mut guard = registry_lock();
        let map = guard.get_or_insert_with(HashMap::new);

        if let Some(existing) = map.get(&handle).and_then(Weak::upgrade) {
            return Ok(Obj { core: existing });
        }

        if let Some((retain, fn_name)) = class.retain_fn() {
            let errcode = retain(handle);
            if errcode != ffi::CL_SUCCESS {
                return Err(ApiError::new(errcode, fn_name,
                    Some(format!("handle: {:#x}", handle))).into());
            }
        }

        let core = Arc::new(ObjCore {
            class,
            handle,
            info: InfoCache::new(),
            payload: Payload::for_class(class),
            release: class.release_fn(),
        });
        map.insert(handle, Arc::downgrade(&core));
        Ok(Obj { core: core })
    }

    pub fn class(&self) -> Class {
        self.core.class
    }

    pub fn as_raw(&self) -> usize {
        self.core.handle
    }

    pub fn as_ptr(&self) -> *mut c_void {
        self.core.handle as *mut c_void
    }

    /// The current logical reference count.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.core)
    }

    /// `true` if both wrappers are the same instance.
    pub fn ptr_eq(&self, other: &Obj) -> bool {
        Arc::ptr_eq(&self.core, &other.core)
    }

    pub(crate) fn info_cache(&self) -> &InfoCache {
        &self.core.info
    }

    /// Runs a cached info query against this wrapper's default info kind.
    pub fn info(&self, param: u32) -> Result<InfoRecord> {
        info::get_info(self, self.core.class.info_kind(), 0, param, 0, true)
    }

    /// Runs an info query bypassing the cache for the lookup (the fresh
    /// record still lands in the cache, displacing any prior one).
    pub fn info_uncached(&self, param: u32) -> Result<InfoRecord> {
        info::get_info(self, self.core.class.info_kind(), 0, param, 0, false)
    }

    /// Runs a cached info query with an explicit kind and optional secondary
    /// handle (program-build, kernel-work-group and kernel-arg queries).
    pub(crate) fn info_with(&self, kind: InfoKind, secondary: usize, param: u32,
            min_fallback: usize) -> Result<InfoRecord> {
        info::get_info(self, kind, secondary, param, min_fallback, true)
    }

    /// As [`info_with`], bypassing the cache lookup (build logs and other
    /// queries whose results change behind the wrapper's back).
    pub(crate) fn info_with_uncached(&self, kind: InfoKind, secondary: usize,
            param: u32) -> Result<InfoRecord> {
        info::get_info(self, kind, secondary, param, 0, false)
    }

    // Payload accessors. The class fixes the payload variant; a mismatch is
    // unreachable.

    pub(crate) fn container_devices(&self) -> &Mutex<Option<Vec<Device>>> {
        match self.core.payload {
            Payload::Container { ref devices } => devices,
            Payload::Context { ref devices, .. } => devices,
            _ => unreachable!("{}: not a device container", self.core.class),
        }
    }

    pub(crate) fn context_platform(&self) -> &Mutex<Option<Platform>> {
        match self.core.payload {
            Payload::Context { ref platform, .. } => platform,
            _ => unreachable!("{}: not a context", self.core.class),
        }
    }

    pub(crate) fn device_sub_devices(&self) -> &Mutex<Vec<Device>> {
        match self.core.payload {
            Payload::Device { ref sub_devices } => sub_devices,
            _ => unreachable!("{}: not a device", self.core.class),
        }
    }

    pub(crate) fn queue_events(&self) -> &Mutex<Vec<Event>> {
        match self.core.payload {
            Payload::Queue { ref events } => events,
            _ => unreachable!("{}: not a queue", self.core.class),
        }
    }

    pub(crate) fn kernel_args(&self) -> &Mutex<BTreeMap<u32, Arg>> {
        match self.core.payload {
            Payload::Kernel { ref args } => args,
            _ => unreachable!("{}: not a kernel", self.core.class),
        }
    }

    pub(crate) fn event_name(&self) -> &Mutex<Option<String>> {
        match self.core.payload {
            Payload::Event { ref name } => name,
            _ => unreachable!("{}: not an event", self.core.class),
        }
    }

    pub(crate) fn mem_context(&self) -> &Mutex<Option<Context>> {
        match self.core.payload {
            Payload::Mem { ref context } => context,
            _ => unreachable!("{}: not a memory object", self.core.class),
        }
    }
}

impl fmt::Debug for Obj {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}({:#x})", self.core.class, self.core.handle)
    }
}

impl PartialEq for Obj {
    fn eq(&self, other: &Obj) -> bool {
        self.ptr_eq(other)
    }
}


pub(crate) fn lock<'a, T>(mutex: &'a Mutex<T>) -> MutexGuard<'a, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}


#[cfg(test)]
mod tests {
    use super::*;

    // Synthetic handles: wrapped with no retain/release so no native calls
    // occur. `Class::None` maps to an empty payload.
    fn wrap_synthetic(handle: usize) -> Obj {
        Obj::from_created_with(Class::None, handle, None)
    }

    #[test]
    fn registry_reuses_wrappers() {
        let a = wrap_synthetic(0x7001);
        let count_before = a.ref_count();
        let b = wrap_synthetic(0x7001);
        let c = Obj::from_borrowed(Class::None, 0x7001).unwrap();

        assert!(a.ptr_eq(&b));
        assert!(a.ptr_eq(&c));
        assert_eq!(a.ref_count(), count_before + 2);
    }

    #[test]
    fn registry_distinguishes_handles() {
        let a = wrap_synthetic(0x7010);
        let b = wrap_synthetic(0x7011);
        assert!(!a.ptr_eq(&b));
    }

    #[test]
    fn registry_entry_removed_on_last_drop() {
        let handle = 0x7020;
        let a = wrap_synthetic(handle);
        let b = a.clone();
        drop(a);

        // Still registered: a fresh wrap converges on the same instance.
        let c = wrap_synthetic(handle);
        assert!(b.ptr_eq(&c));
        drop(b);
        drop(c);

        // Entry is gone: a fresh wrap is a distinct instance.
        let d = wrap_synthetic(handle);
        assert_eq!(d.ref_count(), 1);
    }

    #[test]
    fn memcheck_after_teardown() {
        // Serialized against other tests only by luck of unique handles;
        // memcheck() is global, so just exercise the non-empty branch here.
        let a = wrap_synthetic(0x7030);
        assert!(!memcheck());
        memcheck_log();
        drop(a);
    }
}
