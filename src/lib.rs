pub mod clients;
pub mod config;
pub mod load;
pub mod mapping;
pub mod models;
pub mod state;
pub mod sync;
pub mod transform;

// Convenient re-exports for tests and external callers
pub use clients::*;
pub use config::*;
pub use load::*;
pub use models::*;
pub use state::*;
pub use sync::*;
pub use transform::*;
