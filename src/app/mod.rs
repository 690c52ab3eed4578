pub mod samples;

pub use samples::SampleRunner;
