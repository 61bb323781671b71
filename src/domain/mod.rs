pub mod datatype;
pub mod entity;
pub mod service;
pub mod subtitle;
mod transform;
