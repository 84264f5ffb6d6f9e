//! Read models for the query side of the allocation service.
//!
//! - [`Projection`] trait for turning allocation events into read models
//! - [`AllocationsView`]: which batch each order line landed in

pub mod projection;
pub mod views;

pub use projection::Projection;
pub use views::{AllocationRow, AllocationsView};
