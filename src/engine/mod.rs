//! Drawable object model: objects, identity, paint ordering.

pub mod object;
mod registry;

pub use object::{Content, ContentSource, DrawObject, ObjectId, ObjectProps, RectSource};
pub use registry::ObjectRegistry;
