pub mod auth;
pub mod plan;
pub mod subscription;
