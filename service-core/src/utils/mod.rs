pub mod masking;
pub mod signature;

pub use masking::{mask_email, mask_order_id, mask_phone};
pub use signature::{digests_match, sha512_hex};
