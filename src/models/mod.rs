pub mod enums;
pub mod patient;
pub mod registration_token;
pub mod user;

pub use enums::*;
pub use patient::*;
pub use registration_token::*;
pub use user::*;
