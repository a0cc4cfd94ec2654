pub mod serde;
pub mod serial;
