pub mod allocation;
pub mod answer;
pub mod completed_lecture;
pub mod course;
pub mod progress;
pub mod question;
pub mod quiz;
pub mod section;
pub mod sub_section;
pub mod user;
