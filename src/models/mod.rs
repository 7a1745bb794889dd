// src/models/mod.rs

pub mod evaluation;
pub mod question;
pub mod session;
pub mod topic;
