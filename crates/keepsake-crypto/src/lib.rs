pub mod aead;
pub mod checksum;
pub mod keys;

pub use aead::VaultCipher;
pub use checksum::{canonical_json, checksum_hex, state_checksum};
pub use keys::load_or_generate_key;
