pub mod allocation;
pub mod course;
pub mod progress;
pub mod quiz;
pub mod shared;
