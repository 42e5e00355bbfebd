pub mod annotation;
pub mod config;
pub mod domain;
pub mod entity;
pub mod equation;
pub mod error;
pub mod fetch;
pub mod kegg;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod record;
pub mod store;
