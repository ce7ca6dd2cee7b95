//! Localizes App Store metadata with an AI translator and keeps App Store
//! Connect in step with the local content tree.

pub mod cli;
pub mod config;
pub mod error;
pub mod model;
pub mod services;
