pub mod cache;
pub mod catalog;
pub mod config;
pub mod curator;
pub mod display;
pub mod error;
pub mod events;
pub mod light;
pub mod platform;
pub mod processing;
pub mod schedule;
pub mod web;
pub mod tasks {
    pub mod control;
    pub mod prefetch;
    pub mod rotation;
}

pub use error::{Error, Result};
