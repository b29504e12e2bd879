pub mod access;
pub mod course_status;
pub mod progress;
pub mod quiz;
pub mod role;

pub use access::AccessStatus;
pub use course_status::CourseStatus;
pub use role::Role;
