pub mod appointment;
pub mod payment;
pub mod query;
pub mod user;

pub use appointment::*;
pub use payment::*;
pub use query::*;
pub use user::*;
