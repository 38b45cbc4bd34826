//! A minimal actor toolkit: tasks owning their state, talked to through
//! request / response ports.

mod ports;

#[doc(inline)]
pub use ports::*;

#[cfg(test)]
mod test_ports;
