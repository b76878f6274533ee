pub mod error;
pub mod fallback;
pub mod health;
pub mod landing;
pub mod proxy;
