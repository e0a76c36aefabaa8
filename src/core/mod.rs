pub mod builder;
pub mod config;
pub mod constants;
pub mod coords;
pub mod geo;
pub mod grid;
pub mod map;
