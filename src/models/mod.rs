pub mod common;
pub mod domain;
pub mod order;
pub mod pool;
pub mod sync;
