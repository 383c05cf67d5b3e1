pub mod auth;
pub mod cloudfront;
pub mod config;
pub mod db;
pub mod http;
pub mod repositories;
pub mod tasks;
