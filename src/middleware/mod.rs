pub mod admin_guard;
pub mod auth_guard;
pub mod paths;
