mod errors;
mod game_state;
mod message;
mod option;
mod phase;
mod turn;

pub use errors::*;
pub use game_state::*;
pub use message::*;
pub use option::*;
pub use phase::*;
pub use turn::*;
