// Domain layer: records, policies and ports (interfaces) shared by every pipeline.

pub mod model;
pub mod policy;
pub mod ports;
