pub mod hashmap;
pub mod blocking_queue;

pub use hashmap::*;
