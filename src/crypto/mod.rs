pub mod codec;
pub mod password;

pub use codec::KeyMaterialCodec;
pub use password::{resolve_password, PasswordRequest, PasswordSource, ResolvedPassword};
