pub mod params;
pub mod schema;
pub mod steps;

pub use params::{ParamDef, Params};
pub use schema::{BrowserConfig, Case, OnFailure, Suite, Viewport};
pub use steps::{PayloadExpectation, Step};
