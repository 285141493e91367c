// src/engine/mod.rs

// Pure computation over the attempt aggregate. Nothing in here touches storage.

pub mod evaluation;
pub mod grading;
pub mod journal;
pub mod navigator;
pub mod randomize;
pub mod ranking;
pub mod scoring;
pub mod submission;
