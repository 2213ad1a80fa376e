pub mod storage;
pub mod reader;

pub use storage::*;
pub use reader::*;
