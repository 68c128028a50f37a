pub mod achievement;
pub mod api_router;
pub mod auth;
pub mod departments;
pub mod operational;
pub mod shared;
pub mod strategic;
pub mod users;
pub mod value_types;
