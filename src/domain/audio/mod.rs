pub mod allocation;
pub mod chunker;
pub mod error;
pub mod merger;
pub mod model;
pub mod orchestrator;
pub mod signing;

#[cfg(test)]
pub mod testing;
