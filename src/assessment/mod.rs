// src/assessment/mod.rs

pub mod engine;
pub mod mastery;
pub mod session;
pub mod store;
pub mod validator;

pub use engine::AssessmentEngine;
