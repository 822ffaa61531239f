// src/handlers/mod.rs

pub mod attempts;
pub mod auth;
pub mod certificates;
pub mod courses;
pub mod exams;
pub mod notifications;
