pub mod client;
pub mod errors;
pub mod events;
pub mod ids;
pub mod state;
