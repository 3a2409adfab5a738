pub mod install;
pub mod metadata;
pub mod resolve;

#[cfg(test)]
pub mod testing;
