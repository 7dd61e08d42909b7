//! Service layer for business logic

pub mod port_allocator;

pub use port_allocator::{LoopbackProbe, PortAllocatorService, PortMappingRequest, PortProbe};
