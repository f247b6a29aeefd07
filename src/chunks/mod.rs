mod chunk;
mod enriched;
mod gorilla;
mod timeseries_chunk;
mod uncompressed;

pub use chunk::*;
pub use enriched::*;
pub use gorilla::*;
pub use timeseries_chunk::*;
pub use uncompressed::*;
