pub mod media;
pub mod security;
