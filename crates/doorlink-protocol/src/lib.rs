pub mod binary;
pub mod codec;
pub mod frame;
pub mod message;
pub mod text;

pub use codec::TextCodec;
pub use frame::{BinaryFrame, BinaryPacket, TextFrame, xor_checksum};
pub use message::{Envelope, Message};
