//! The sampler wrapper.

use std::fmt;

use cl_sys as ffi;

use crate::error::Result;
use crate::functions;
use crate::wrap::{Class, Obj};
use super::{impl_wrapper_common, Context};


#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddressingMode {
    None,
    ClampToEdge,
    Clamp,
    Repeat,
    MirroredRepeat,
}

impl AddressingMode {
    fn to_raw(self) -> u32 {
        match self {
            AddressingMode::None => ffi::CL_ADDRESS_NONE,
            AddressingMode::ClampToEdge => ffi::CL_ADDRESS_CLAMP_TO_EDGE,
            AddressingMode::Clamp => ffi::CL_ADDRESS_CLAMP,
            AddressingMode::Repeat => ffi::CL_ADDRESS_REPEAT,
            AddressingMode::MirroredRepeat => ffi::CL_ADDRESS_MIRRORED_REPEAT,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterMode {
    Nearest,
    Linear,
}

impl FilterMode {
    fn to_raw(self) -> u32 {
        match self {
            FilterMode::Nearest => ffi::CL_FILTER_NEAREST,
            FilterMode::Linear => ffi::CL_FILTER_LINEAR,
        }
    }
}


#[derive(Clone)]
pub struct Sampler {
    obj: Obj,
}

impl_wrapper_common!(Sampler);

impl Sampler {
    pub fn new(context: &Context, normalized_coords: bool,
            addressing: AddressingMode, filter: FilterMode) -> Result<Sampler> {
        let handle = functions::create_sampler(context.as_raw(),
            normalized_coords, addressing.to_raw(), filter.to_raw())?;
        Ok(Sampler { obj: Obj::from_created(Class::Sampler, handle) })
    }

    pub fn context(&self) -> Result<Context> {
        let handle = self.info(ffi::CL_SAMPLER_CONTEXT)?.scalar::<usize>();
        Context::from_raw(handle)
    }
}

impl fmt::Display for Sampler {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Sampler({:#x})", self.as_raw())
    }
}
