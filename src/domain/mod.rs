pub mod config;
pub mod notice;
pub mod pull_request;
pub mod review;
