pub mod input;
pub mod mesh;
pub mod services;
pub mod time;
