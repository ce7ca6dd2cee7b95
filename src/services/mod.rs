pub mod ai;
pub mod ai_types;
pub mod auth;
pub mod engine;
pub mod fingerprint;
pub mod pipeline;
pub mod remote;
pub mod report;
pub mod retry;
pub mod urls;
