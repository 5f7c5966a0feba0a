//! Resource models served by the sample shop.

pub mod bike;

pub use bike::Bike;
