pub mod chunker;
pub mod divider;
pub mod generator;
pub mod matcher;
pub mod merger;
pub mod model;
pub mod pipeline;
pub mod post_process;
pub mod registry;
