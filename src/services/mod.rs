pub mod auth;
pub mod email;
pub mod password;
pub mod password_reset;
pub mod photo_store;
pub mod reset_token;
pub mod session;

pub use auth::AuthService;
pub use email::{LogMailer, Notifier};
pub use password::PasswordService;
pub use password_reset::PasswordResetService;
pub use photo_store::PhotoStore;
pub use reset_token::ResetTokenIssuer;
pub use session::SessionTokenService;
