pub mod entity;
pub mod geometry;
pub mod physics;
