//! Scene content: mesh data and drawable object bundles

pub mod mesh;
pub mod object;
