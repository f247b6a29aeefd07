mod bitstream;
mod dod;
mod gorilla_chunk;
mod iterator;
mod serialization;
mod xor;

pub use gorilla_chunk::*;
pub use iterator::*;
