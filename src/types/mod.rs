pub mod addon;
pub mod manifest;
