//! Front ends reading the synchronizer's state and feeding it input

pub mod console;
