// Domain layer: Directory resource models and the seams (ports) the service talks through.

pub mod model;
pub mod ports;
