mod middleware;
mod password;
mod token;

pub use middleware::{AuthError, RequireUser};
pub use password::{MAX_PASSWORD_LEN, MIN_PASSWORD_LEN, PasswordHashService, validate_password};
pub use token::{Claims, IssuedToken, TokenIssuer, generate_secret};
