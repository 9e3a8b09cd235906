pub mod lance;

pub use lance::LanceStore;
