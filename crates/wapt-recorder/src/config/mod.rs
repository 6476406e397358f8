#[cfg(not(target_arch = "wasm32"))]
pub mod loader;
pub mod schema;
