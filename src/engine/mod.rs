pub mod broker_sim;
pub mod live;
pub mod results;
pub mod scheduler;

pub use broker_sim::*;
pub use live::*;
pub use results::*;
pub use scheduler::*;
