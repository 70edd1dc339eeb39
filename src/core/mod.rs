//! # Core Protocol Components
//!
//! Frames, codecs and message marshalling.
//!
//! This module turns logical protocol messages into transport frames and back.
//! Nothing here knows about services or connections.
//!
//! ## Components
//! - **Frame**: discrete text/binary/close unit exchanged with a transport
//! - **Serialization**: JSON and CBOR codecs keyed by mime type
//! - **Marshaller**: header/payload split and per-format framing
//! - **Registry**: mime type to marshaller/unmarshaller pairs
//! - **Value**: the CBOR data model sessions and payloads are carried in
//!
//! ## Wire Format
//! ```text
//! JSON:  {"type": .., "session": .., "seq": .., .., "payload": ..}
//! CBOR:  [HeaderLen(4)] [Header(HeaderLen)] [Payload(N)]
//! ```

pub mod frame;
pub mod marshaller;
pub mod registry;
pub mod serialization;
pub mod value;
