//! Test doubles for the host seams, with ready-made host scenarios.

mod command;
mod filesystem;
mod scenarios;

pub use command::MockCommand;
pub use filesystem::MockFs;
