#![recursion_limit = "256"]

//! Convolutional image classifier pipeline on Burn: a directory-per-class
//! data source, a validated sequential CNN stack, a train/validate loop
//! and model persistence.

pub mod application;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod infra;
pub mod ml;
