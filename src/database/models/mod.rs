pub mod archive;
pub mod ballot;
pub mod debt;
pub mod game;
pub mod player;
pub mod training;

pub use archive::*;
pub use ballot::*;
pub use debt::*;
pub use game::*;
pub use player::*;
pub use training::*;
