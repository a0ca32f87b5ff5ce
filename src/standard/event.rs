//! Event wrappers and reusable wait lists.

use std::fmt;

use cl_sys as ffi;

use crate::error::Result;
use crate::functions;
use crate::types::command_type_name;
use crate::wrap::info::InfoKind;
use crate::wrap::{lock, Class, Obj};
use super::{impl_wrapper_common, Context};


#[derive(Clone)]
pub struct Event {
    obj: Obj,
}

impl_wrapper_common!(Event);

impl Event {
    /// Wraps the event handle produced by an enqueue call.
    pub(crate) fn from_created(handle: usize) -> Event {
        Event { obj: Obj::from_created(Class::Event, handle) }
    }

    /// Creates a user event on `context`. Its status starts as submitted
    /// and is completed (or failed) by [`set_status`].
    ///
    /// [`set_status`]: Event::set_status
    pub fn user(context: &Context) -> Result<Event> {
        let handle = functions::create_user_event(context.as_raw())?;
        Ok(Event::from_created(handle))
    }

    /// Sets a user event's execution status (`CL_COMPLETE` or a negative
    /// error code).
    pub fn set_status(&self, status: i32) -> Result<()> {
        functions::set_user_event_status(self.as_raw(), status)
    }

    /// Marks a user event complete.
    pub fn set_complete(&self) -> Result<()> {
        self.set_status(ffi::CL_COMPLETE as i32)
    }

    /// The command type which produced this event.
    pub fn command_type(&self) -> Result<ffi::cl_command_type> {
        Ok(self.info(ffi::CL_EVENT_COMMAND_TYPE)?.scalar::<ffi::cl_command_type>())
    }

    /// The current execution status. Never cached.
    pub fn status(&self) -> Result<i32> {
        Ok(self.obj.info_uncached(ffi::CL_EVENT_COMMAND_EXECUTION_STATUS)?
            .scalar::<i32>())
    }

    /// A profiling instant in device nanoseconds. `param` is one of the
    /// `CL_PROFILING_COMMAND_*` ids.
    pub fn profiling_info(&self, param: u32) -> Result<u64> {
        Ok(self.obj.info_with(InfoKind::EventProfiling, 0, param, 0)?
            .scalar::<u64>())
    }

    /// Assigns a profiling name. Shared by every clone of this event.
    pub fn set_name<S: Into<String>>(&self, name: S) {
        *lock(self.obj.event_name()) = Some(name.into());
    }

    /// The profiling name: the assigned one, or the command type's display
    /// name when none was assigned.
    pub fn name(&self) -> String {
        if let Some(ref name) = *lock(self.obj.event_name()) {
            return name.clone();
        }
        match self.command_type() {
            Ok(ct) => command_type_name(ct).to_owned(),
            Err(_) => "UNKNOWN".to_owned(),
        }
    }

    /// Registers a completion callback (OpenCL 1.1+).
    ///
    /// ## Safety
    ///
    /// `user_data` must remain valid until the callback has run.
    #[cfg(feature = "opencl_version_1_1")]
    pub unsafe fn set_callback(&self, callback: functions::EventCallbackFn,
            user_data: *mut ffi::c_void) -> Result<()> {
        functions::set_event_callback(self.as_raw(), ffi::CL_COMPLETE as i32,
            callback, user_data)
    }

    /// Blocks until this event completes.
    pub fn wait(&self) -> Result<()> {
        functions::wait_for_events(&[self.as_raw()])
    }

    /// Wraps a handle with no native retain/release attached.
    #[cfg(test)]
    pub(crate) fn synthetic(handle: usize) -> Event {
        Event { obj: Obj::from_created_with(Class::Event, handle, None) }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Event({:#x})", self.as_raw())
    }
}


/// A reusable wait list.
///
/// Enqueue calls taking `Option<&mut EventList>` read the listed events as
/// their dependencies and clear the list on success, so the same variable
/// chains through consecutive calls without manual bookkeeping.
#[derive(Clone, Debug, Default)]
pub struct EventList {
    events: Vec<Event>,
}

impl EventList {
    pub fn new() -> EventList {
        EventList { events: Vec::new() }
    }

    /// Builder-style append.
    pub fn with(mut self, event: Event) -> EventList {
        self.events.push(event);
        self
    }

    pub fn with_events(mut self, events: &[Event]) -> EventList {
        self.events.extend(events.iter().cloned());
        self
    }

    pub fn push(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Blocks until every listed event completes, then clears the list.
    pub fn wait(&mut self) -> Result<()> {
        functions::wait_for_events(&self.as_raw_handles())?;
        self.clear();
        Ok(())
    }

    pub(crate) fn as_raw_handles(&self) -> Vec<usize> {
        self.events.iter().map(|e| e.as_raw()).collect()
    }
}

impl From<Event> for EventList {
    fn from(event: Event) -> EventList {
        EventList::new().with(event)
    }
}


/// Reads the raw dependency handles out of an optional wait list.
pub(crate) fn wait_handles(wait: &Option<&mut EventList>) -> Vec<usize> {
    wait.as_ref().map_or(Vec::new(), |w| w.as_raw_handles())
}

/// Clears an optional wait list after a successful enqueue.
pub(crate) fn consume_wait_list(wait: Option<&mut EventList>) {
    if let Some(list) = wait {
        list.clear();
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn synthetic_event(handle: usize) -> Event {
        Event::synthetic(handle)
    }

    #[test]
    fn wait_list_builder() {
        let a = synthetic_event(0x8001);
        let b = synthetic_event(0x8002);
        let list = EventList::new().with(a.clone()).with_events(&[b.clone()]);
        assert_eq!(list.len(), 2);
        assert_eq!(list.as_raw_handles(), vec![0x8001, 0x8002]);
    }

    #[test]
    fn wait_list_consumed_on_success() {
        let a = synthetic_event(0x8010);
        let mut list = EventList::from(a);
        assert!(!list.is_empty());

        let handles = wait_handles(&Some(&mut list));
        assert_eq!(handles, vec![0x8010]);
        consume_wait_list(Some(&mut list));
        assert!(list.is_empty());

        // Absent list: no handles, nothing to consume.
        assert!(wait_handles(&None).is_empty());
        consume_wait_list(None);
    }

    #[test]
    fn event_name_shared_across_clones() {
        let a = synthetic_event(0x8020);
        let b = a.clone();
        a.set_name("transfer");
        assert_eq!(b.name(), "transfer");
    }
}
