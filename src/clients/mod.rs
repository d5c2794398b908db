pub mod elastic;
pub mod postgres;
pub mod redis;

pub use elastic::*;
pub use postgres::*;
pub use redis::*;
