//! Doctor token validators.
//!
//! Implementations of the `DoctorTokenValidator` port:
//!
//! - `static_tokens` - configured allow-list, compared in constant time
//! - `jwt` - HS256-signed tokens carrying `role = "doctor"`

mod jwt;
mod static_tokens;

pub use jwt::{DoctorClaims, JwtTokenValidator};
pub use static_tokens::StaticTokenValidator;
