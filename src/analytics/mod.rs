pub mod atr;
pub mod context;
pub mod structure;
pub mod swings;
pub mod trend;
pub mod zones;

pub use atr::*;
pub use context::*;
pub use structure::*;
pub use swings::*;
pub use trend::*;
pub use zones::*;
