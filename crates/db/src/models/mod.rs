//! Entity models shared by the PostgreSQL repositories and the in-memory
//! ledger fallback.

pub mod license;
pub mod outcome;
pub mod setting;
pub mod template;
pub mod user;

pub use license::{License, NewLicense};
pub use outcome::{DispatchOutcome, NewOutcome, OutcomeStats};
pub use setting::Setting;
pub use template::{NewTemplate, Template, UpdateTemplate};
pub use user::{NewUser, User};
