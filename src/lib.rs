pub mod anim;
pub mod app;
pub mod assets;
pub mod camera;
pub mod clock;
pub mod config;
pub mod controller;
pub mod error;
pub mod input;
pub mod keymap;
pub mod mesh;
pub mod physics;
pub mod render;
pub mod sim;

pub use app::run;
