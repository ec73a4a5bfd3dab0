pub mod clock;
pub mod config;
pub mod control;
pub mod delay;
pub mod engine;
pub mod error;
pub mod keyboard;
pub mod model;
pub mod playback;
pub mod profile;
pub mod session;
pub mod sim;
pub mod sink;
pub mod trace;
pub mod typo;
