pub mod data_service;
pub mod mirror;
pub mod payment_lifecycle;

pub use data_service::DataService;
pub use mirror::{MirrorOp, MirrorWriter};
pub use payment_lifecycle::IntentStatus;
