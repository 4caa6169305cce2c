pub mod behavior;
pub mod context;
pub mod flee;
pub mod harass;
pub mod priority;
pub mod squad;
pub mod threatmap;
