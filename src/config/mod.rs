/// Database configuration and connection management
pub mod database;

/// Application settings loaded from planshare.toml
pub mod settings;
