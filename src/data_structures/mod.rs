//! Viewer data structures: scene graph, geometry, transforms and textures.
//!
//! - `scene_graph` holds the node tree the renderer draws
//! - `geometry` contains CPU vertex and index data
//! - `transform` holds node transforms and their GPU form
//! - `texture` contains GPU texture wrapper and creation utilities

pub mod geometry;
pub mod scene_graph;
pub mod texture;
pub mod transform;
