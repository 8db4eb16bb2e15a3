// tests/integration/main.rs

mod config_graph;
mod error_handling;
mod fs_abstraction;
