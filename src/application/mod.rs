pub mod bootstrap;
pub mod loader;
pub mod planner;
