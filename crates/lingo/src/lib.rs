pub mod agents;
pub mod errors;
pub mod exercise;
pub mod generate;
pub mod models;
pub mod providers;
pub mod render;
pub mod schema;
pub mod session;
