//! The Baichuan message format is a 20 or 24 byte header followed by the
//! message body. The header length is selected by the `class` field: classes
//! `0x6514` and `0x6614` are 20 bytes, while `0x6414`, `0x0000` and `0x1464`
//! carry an extra word at the end which is the start offset of the payload
//! within the body.
//!
//! The word after the body length packs the channel, stream and handle of
//! the message. The same word doubles as the offset that keys the XOR
//! cipher used on control-plane XML before the AES key has been negotiated.
//!
//! # Payloads
//! Messages contain one-two payloads seperated by the payload_offset in the
//! header
//!
//! ## Extension Payload
//! The first payload prior to the payload_offset is the extension xml
//!
//! This contains meta data on the following payload such as whether it is
//! binary and how much of it is encrypted
//!
//! ## Payload
//! The second payload which is the primary payload coming after the payload
//! offset depends on the MsgID.
//!
//! It is usually XML except in the case of video MsgIDs which are binary
//! data in the bc media packet format

/// Contains the structure of the messages such as headers and payloads
pub mod model;

/// Contains code related to the deserialisation of the bc packets
pub mod de;
/// Contains code related to the serialisation of the bc packets
pub mod ser;
/// Contains the structs for the known xmls of payloads and extension
pub mod xml;

pub(crate) mod xml_crypto;
