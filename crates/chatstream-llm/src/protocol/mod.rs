//! Wire format types for vendor streaming protocols
//!
//! Each module contains pure serde structs matching the respective vendor's
//! JSON API format. These types are only used for serialization at the
//! boundary and are not used internally. Bedrock has no module here: its
//! types come from the AWS SDK.

pub mod anthropic;
pub mod openai;
pub mod responses;
