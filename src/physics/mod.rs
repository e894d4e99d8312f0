pub mod collision;

pub use collision::{Aabb, is_solid, resolve};
