//! newsdesk - content backend for a news portal
//!
//! Posts, categories, media collections and site documents for the
//! newsroom, with invitation-based staff accounts, reader self-signup,
//! ordered lists and hash-deduplicated uploads.

pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
