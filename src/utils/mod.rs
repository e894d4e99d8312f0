pub mod settings;

pub use settings::WorldConfig;
