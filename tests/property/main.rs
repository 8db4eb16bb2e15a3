// tests/property/main.rs

mod graph;
