// src/core/mod.rs

pub mod controller;
pub mod state;
pub mod steps;
pub mod types;
