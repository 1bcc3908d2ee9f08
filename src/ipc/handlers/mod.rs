pub mod core;
pub mod gpa;
pub mod marks;
pub mod scales;
pub mod setup;
