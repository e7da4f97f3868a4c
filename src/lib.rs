// src/lib.rs - Library root for DataPilot

pub mod cli;
pub mod core;
pub mod infra;
pub mod provider;
pub mod sandbox;
