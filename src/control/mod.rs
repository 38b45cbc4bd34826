//! The display state and the actor keeping it in sync with the backend

pub mod display_list;
pub mod display_synchronizer;
