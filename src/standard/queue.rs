//! The command queue wrapper.
//!
//! Each successful enqueue call wraps the native event it produced and
//! appends it to the queue's owned-event list, making events available to
//! the profiler long after the caller has moved on. Collection is explicit:
//! [`Queue::gc`] drops the owned references (the registry decides whether
//! the events are actually destroyed); `flush` and `finish` never collect.

use std::fmt;

use cl_sys as ffi;

use crate::error::Result;
use crate::functions;
use crate::types::CommandQueueProperties;
use crate::wrap::{lock, Class, Obj};
use super::{impl_wrapper_common, Context, Device, Event};

#[cfg(feature = "opencl_version_1_2")]
use super::event::{consume_wait_list, wait_handles, EventList};

#[cfg(feature = "opencl_version_2_0")]
use crate::types::OpenclVersion;


#[derive(Clone)]
pub struct Queue {
    obj: Obj,
}

impl_wrapper_common!(Queue);

impl Queue {
    /// Creates a command queue on `device` within `context`.
    ///
    /// The native constructor is chosen by device version: 2.0+ devices go
    /// through the extended property-list entry point when the crate is
    /// built with the `opencl_version_2_0` feature.
    pub fn new(context: &Context, device: &Device,
            properties: Option<CommandQueueProperties>) -> Result<Queue> {
        let props = properties.unwrap_or_default();

        #[cfg(feature = "opencl_version_2_0")]
        {
            if device.version()? >= OpenclVersion::new(2, 0) {
                let prop_list = [
                    ffi::CL_QUEUE_PROPERTIES as u64,
                    props.bits(),
                    0,
                ];
                let handle = functions::create_command_queue_with_properties(
                    context.as_raw(), device.as_raw(), &prop_list)?;
                return Ok(Queue { obj: Obj::from_created(Class::Queue, handle) });
            }
        }

        let handle = functions::create_command_queue(context.as_raw(),
            device.as_raw(), props.bits())?;
        Ok(Queue { obj: Obj::from_created(Class::Queue, handle) })
    }

    pub(crate) fn from_raw(handle: usize) -> Result<Queue> {
        Ok(Queue { obj: Obj::from_borrowed(Class::Queue, handle)? })
    }

    pub fn context(&self) -> Result<Context> {
        let handle = self.info(ffi::CL_QUEUE_CONTEXT)?.scalar::<usize>();
        Context::from_raw(handle)
    }

    pub fn device(&self) -> Result<Device> {
        let handle = self.info(ffi::CL_QUEUE_DEVICE)?.scalar::<usize>();
        Device::from_raw(handle)
    }

    /// The properties the queue was created with.
    pub fn properties(&self) -> Result<CommandQueueProperties> {
        let bits = self.info(ffi::CL_QUEUE_PROPERTIES)?.scalar::<u64>();
        Ok(CommandQueueProperties::from_bits_truncate(bits))
    }

    /// Issues all previously queued commands to the device. Does not
    /// collect owned events.
    pub fn flush(&self) -> Result<()> {
        functions::flush(self.as_raw())
    }

    /// Blocks until all previously queued commands have completed. Does
    /// not collect owned events.
    pub fn finish(&self) -> Result<()> {
        functions::finish(self.as_raw())
    }

    /// Wraps an enqueue-produced event handle and retains it in the
    /// owned-event list.
    pub(crate) fn register_event(&self, handle: usize) -> Event {
        let event = Event::from_created(handle);
        lock(self.obj.queue_events()).push(event.clone());
        event
    }

    /// A snapshot of the owned events, oldest first.
    pub fn events(&self) -> Vec<Event> {
        lock(self.obj.queue_events()).clone()
    }

    pub fn num_events(&self) -> usize {
        lock(self.obj.queue_events()).len()
    }

    /// Drops every owned event reference. Events the caller still holds
    /// survive; the rest are released through the registry.
    pub fn gc(&self) {
        lock(self.obj.queue_events()).clear();
    }

    /// Enqueues a marker which completes when the listed events (or, with
    /// an empty list, all prior commands) have completed.
    #[cfg(feature = "opencl_version_1_2")]
    pub fn enqueue_marker(&self, mut wait: Option<&mut EventList>) -> Result<Event> {
        let handles = wait_handles(&wait);
        let event = functions::enqueue_marker_with_wait_list(self.as_raw(), &handles)?;
        consume_wait_list(wait.take());
        Ok(self.register_event(event))
    }

    /// Enqueues a barrier: commands enqueued afterwards do not begin until
    /// the listed events (or all prior commands) have completed.
    #[cfg(feature = "opencl_version_1_2")]
    pub fn enqueue_barrier(&self, mut wait: Option<&mut EventList>) -> Result<Event> {
        let handles = wait_handles(&wait);
        let event = functions::enqueue_barrier_with_wait_list(self.as_raw(), &handles)?;
        consume_wait_list(wait.take());
        Ok(self.register_event(event))
    }
}

impl fmt::Display for Queue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Queue({:#x})", self.as_raw())
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owned_events_and_gc() {
        // Synthetic queue and event handles: no native calls occur.
        let queue = Queue { obj: Obj::from_created_with(Class::Queue, 0x9001, None) };
        assert_eq!(queue.num_events(), 0);

        let e1 = Event::synthetic(0x9101);
        let e2 = Event::synthetic(0x9102);
        lock(queue.obj.queue_events()).push(e1.clone());
        lock(queue.obj.queue_events()).push(e2);
        assert_eq!(queue.num_events(), 2);

        let kept = queue.events();
        assert!(kept[0].obj().ptr_eq(e1.obj()));

        queue.gc();
        assert_eq!(queue.num_events(), 0);

        // Caller-held references survive collection.
        assert_eq!(e1.as_raw(), 0x9101);
    }
}
