// src/handlers/mod.rs

pub mod assessment;
pub mod health;
pub mod profile;
pub mod session;
pub mod topic;
