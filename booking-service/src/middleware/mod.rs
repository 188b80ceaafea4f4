pub mod user;

pub use user::{UserContext, USER_ID_HEADER};
