#![allow(dead_code)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod findnearest;
pub mod game;
pub mod logging;
pub mod military;
pub mod scenario;
pub mod search;
pub mod unit;
