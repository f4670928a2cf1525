// Application layer: concrete pipelines wired from config, adapters and core.

pub mod pipelines;
