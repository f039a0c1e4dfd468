pub mod adapters;
pub mod router;
pub mod scheduler;
pub mod traits;
pub mod types;
