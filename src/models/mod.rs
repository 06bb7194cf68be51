pub mod organization;
pub mod project;
pub mod proposal;
pub mod subscription;
pub mod usage;
pub mod user;
