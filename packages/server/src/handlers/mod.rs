pub mod allocation;
pub mod course;
pub mod enrollment;
pub mod quiz;
