pub mod coordinator;
pub mod debounce;
pub mod error;
pub mod notifier;
pub mod renderer;
pub mod worker;
