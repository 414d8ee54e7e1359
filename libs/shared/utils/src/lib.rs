pub mod extractor;
pub mod jwt;
pub mod test_utils;
pub mod token;

pub use jwt::HmacTokenService;
pub use token::{TokenError, TokenService};
