// server/src/lib.rs

//! HTTP server and admin tooling for the UrbanHerb storefront.

pub mod config;
pub mod db;
pub mod errors;
pub mod state;
pub mod telemetry;
pub mod web;
