// Domain layer: filing/company/document models, ESG data and ports.

pub mod esg;
pub mod model;
pub mod ports;
