//! Processing module catalog
//!
//! Module descriptors, dependency validation and execution ordering.

mod registry;

pub use registry::{
    builtin_modules, descriptor, ModuleDescriptor, ModuleRegistry, INSTRUMENTS, LEAD_BACKING,
    VOCAL_INSTRUMENTAL,
};
