// src/models/mod.rs

pub mod attempt;
pub mod certificate;
pub mod course;
pub mod exam;
pub mod notification;
pub mod user;
