//! Process lifecycle: background tasks are cancellable and stop on the
//! shutdown broadcast, never fire-and-forget.

pub mod shutdown;

pub use shutdown::Shutdown;
