pub mod collector;
pub mod pipeline;

pub use pipeline::PricePipeline;
