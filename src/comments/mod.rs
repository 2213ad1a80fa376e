pub mod model;
pub mod ng;
pub mod corpus;

pub use model::*;
pub use ng::*;
pub use corpus::*;
