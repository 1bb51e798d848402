mod decode;
mod error;
mod model;
mod util;

pub use decode::*;
pub use error::*;
pub use model::config::*;
pub use model::event::*;
pub use model::score::*;
pub use model::time::*;
pub use util::*;
