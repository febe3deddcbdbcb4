pub mod demo;
pub mod registry;
pub mod service;

pub use demo::{run_demo, DemoConfig, DemoFeed};
pub use registry::Registry;
pub use service::{spawn_service, ServiceHandle};
