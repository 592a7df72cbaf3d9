pub mod cli;
pub mod play;
