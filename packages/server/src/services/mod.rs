pub mod allocation;
pub mod content;
pub mod progress;
pub mod quiz;
