//! The program wrapper.

use std::fmt;

use cl_sys as ffi;

use crate::error::{Result, Status};
use crate::functions;
use crate::wrap::info::InfoKind;
use crate::wrap::{Class, Obj};
use super::{impl_wrapper_common, Context, Device, DeviceContainer, Kernel};


#[derive(Clone)]
pub struct Program {
    obj: Obj,
}

impl_wrapper_common!(Program);

impl Program {
    /// Creates a program from OpenCL C source strings.
    pub fn with_source(context: &Context, sources: &[&str]) -> Result<Program> {
        let handle = functions::create_program_with_source(context.as_raw(), sources)?;
        Ok(Program { obj: Obj::from_created(Class::Program, handle) })
    }

    pub(crate) fn from_raw(handle: usize) -> Result<Program> {
        Ok(Program { obj: Obj::from_borrowed(Class::Program, handle)? })
    }

    /// Builds the program for `devices` (every context device when empty).
    ///
    /// On a compilation failure the device build logs are folded into the
    /// returned error message.
    pub fn build(&self, devices: &[Device], options: Option<&str>) -> Result<()> {
        let handles: Vec<usize> = devices.iter().map(|d| d.as_raw()).collect();

        match functions::build_program(self.as_raw(), &handles, options) {
            Ok(()) => Ok(()),
            Err(err) => {
                if err.api_status() == Some(Status::CL_BUILD_PROGRAM_FAILURE) {
                    let mut msg = String::from("program build failure:");
                    let logged = if devices.is_empty() {
                        self.devices().unwrap_or_default()
                    } else {
                        devices.to_vec()
                    };
                    for device in &logged {
                        if let Ok(log) = self.build_log(device) {
                            let log = log.trim();
                            if !log.is_empty() {
                                msg.push('\n');
                                msg.push_str(log);
                            }
                        }
                    }
                    return Err(msg.into());
                }
                Err(err)
            },
        }
    }

    /// The build log for `device`. Never cached.
    pub fn build_log(&self, device: &Device) -> Result<String> {
        Ok(self.obj.info_with_uncached(InfoKind::ProgramBuild, device.as_raw(),
            ffi::CL_PROGRAM_BUILD_LOG)?.string())
    }

    /// Creates a kernel wrapper for the named kernel function.
    pub fn create_kernel(&self, name: &str) -> Result<Kernel> {
        Kernel::new(self, name)
    }

    pub fn context(&self) -> Result<Context> {
        let handle = self.info(ffi::CL_PROGRAM_CONTEXT)?.scalar::<usize>();
        Context::from_raw(handle)
    }

    pub fn source(&self) -> Result<String> {
        Ok(self.info(ffi::CL_PROGRAM_SOURCE)?.string())
    }
}

impl DeviceContainer for Program {
    fn as_obj(&self) -> &Obj {
        &self.obj
    }

    fn list_device_handles(&self) -> Result<Vec<usize>> {
        Ok(self.info(ffi::CL_PROGRAM_DEVICES)?.handles())
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Program({:#x})", self.as_raw())
    }
}
