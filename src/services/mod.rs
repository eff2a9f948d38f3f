pub mod archive;
pub mod ballot;
pub mod billing;
pub mod clock;
pub mod health;
pub mod notifier;
pub mod orchestrator;
pub mod registry;
pub mod roster;
pub mod scheduler;
