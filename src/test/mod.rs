pub mod utils;

mod cache;
mod sessions;
