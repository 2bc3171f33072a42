pub mod task_controller;

pub use task_controller::{ControllerConfig, ControllerEvent, HeldFormats, TaskController};
