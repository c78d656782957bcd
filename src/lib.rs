pub mod assign;
pub mod canon;
pub mod cli;
pub mod config;
pub mod fingerprint;
pub mod hamming;
pub mod index;
pub mod orb;
pub mod remap;
pub mod roles;
pub mod score;
pub mod utils;

pub use assign::{Assignment, Correspondence};
pub use canon::CanonPath;
pub use config::Opts;
pub use index::{CorpusInventory, HashIndex, OriginalTriplet};
