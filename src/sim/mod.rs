pub mod event;
pub mod snapshot;
pub mod stage;
pub mod step;
pub mod world;
