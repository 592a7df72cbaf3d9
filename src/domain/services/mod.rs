mod prefetch;
mod session;

pub use prefetch::*;
pub use session::*;
