//! Long-running operation: schedule parsing, the scheduler loop and process
//! signal handling.

pub mod schedule;
pub mod scheduler;
pub mod shutdown;

pub use schedule::Schedule;
pub use shutdown::ShutdownCoordinator;
