//! netcrawl-core: Shared device and topology types for netcrawl.
//!
//! This crate provides the data model shared by the crawler components:
//! - `Node`, the vertex of a discovered topology, with internally
//!   synchronised neighbor edges
//! - `DeviceRecord`, one parsed neighbor entry
//! - `InterfaceId`, the local interface an edge leaves through
//! - Validation errors for nodes

pub mod error;
pub mod types;

pub use error::NodeError;
pub use types::{DeviceRecord, InterfaceId, Node, ROOT_DEVICE_TYPE, UNKNOWN_DEVICE_TYPE};
