pub mod assets;
mod not_found;

pub use not_found::{not_found as not_found_handler_for, not_found_handler};
