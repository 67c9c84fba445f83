pub mod draft;
pub mod execution;
pub mod navigation;
pub mod state;
pub mod steps;
pub mod validation;

pub use draft::*;
pub use execution::*;
pub use navigation::*;
pub use state::*;
pub use steps::*;
pub use validation::*;
