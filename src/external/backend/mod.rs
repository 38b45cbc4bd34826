//! Display enumeration and brightness control

pub mod ddcutil;
pub mod interface;
pub mod mock;

pub use interface::*;
