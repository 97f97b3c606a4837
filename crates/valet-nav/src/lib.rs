pub mod controller;
pub mod doctor;

pub use controller::{Decision, NavConfig, NavController, NavError, NavReport, NavState, Phase, Target};
