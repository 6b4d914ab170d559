//! Application services: the tracker and the loop that feeds it.

pub mod error;
pub mod pipeline;
pub mod ports;
pub mod tracker;
