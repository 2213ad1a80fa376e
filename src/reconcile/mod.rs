pub mod engine;
pub mod locator;
pub mod watcher;
pub mod pipeline;

pub use engine::*;
pub use locator::*;
pub use watcher::*;
pub use pipeline::*;
