pub mod auth;
pub mod configuration;
pub mod context;
pub mod domain;
pub mod error;
pub mod logger;
pub mod repository;
pub mod routes;
pub mod startup;
pub mod telemetry;
pub mod validators;
