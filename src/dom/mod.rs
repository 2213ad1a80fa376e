pub mod adapter;
pub mod web;

#[cfg(test)]
pub mod fixture;

pub use adapter::*;
pub use web::*;
