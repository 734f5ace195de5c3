pub mod checks;
mod dispatch;
pub mod watch;

pub use dispatch::dispatch;
