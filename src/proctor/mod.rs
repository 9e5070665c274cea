pub mod calibration;
pub mod clock;
pub mod config;
pub mod detector;
pub mod engine;
pub mod features;
pub mod geometry;
pub mod report;
pub mod risk;
pub mod timers;
pub mod types;
