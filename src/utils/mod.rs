pub mod api;
pub mod logger;
pub mod signature;
pub mod spinner;
