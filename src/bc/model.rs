pub use super::xml::{BcPayloads, BcXml, Extension};
use std::collections::HashSet;

pub(super) const MAGIC_HEADER: u32 = 0x0abcdef0;

/// Login messages have this ID
pub const MSG_ID_LOGIN: u32 = 1;
/// Video and Audio Stream messages have this ID
pub const MSG_ID_VIDEO: u32 = 3;
/// ID used to stop the video stream
pub const MSG_ID_VIDEO_STOP: u32 = 4;

/// Sent as the response code of the legacy login frame to ask the camera
/// for an AES capable session. The camera answers with the `Encryption`
/// xml carrying the NONCE
pub const RESPONSE_CODE_REQUEST_AES: u16 = 0xdc12;

/// Top level bc message
#[derive(Debug, PartialEq)]
pub struct Bc {
    /// header part of the message
    pub meta: BcMeta,
    /// body part of the message
    pub body: BcBody,
}

/// Message bodies have two payloads split by the `payload_offset` in the
/// header
///
/// The first payload is the extension which describes the second payload.
/// If the `payload_offset` is `0` (or the class has no payload offset word)
/// there is no `extension` and it is `None`
///
/// The second payload contains the actual data of interest and is all bytes
/// after the `payload_offset` up to the `body_len`. If `payload_offset`
/// equals `body_len` then there is no payload and it is `None`
///
/// If both are `None` the message is header only. This usually occurs to
/// acknowledge receipt of a command. In such cases the header
/// `response_code` should be checked.
#[derive(Debug, Default, PartialEq)]
pub struct BcBody {
    /// Extension describes the following payload such as whether it is
    /// binary and how much of it is encrypted
    pub extension: Option<Extension>,
    /// Primary payload which is dependant on MsgID
    pub payload: Option<BcPayloads>,
}

#[derive(Debug, PartialEq, Eq)]
pub(super) struct BcHeader {
    pub body_len: u32,
    pub msg_id: u32,
    pub enc_offset: u32,
    pub response_code: u16,
    pub class: u16,
    pub payload_offset: Option<u32>,
}

/// The components of the Baichuan header that are not descriptions of the
/// Body (the application dictates these)
#[derive(Debug, PartialEq, Eq)]
pub struct BcMeta {
    /// Message ID dictates the major content of the message
    pub msg_id: u32,
    /// In most cases 0 but can be other values for NVRs
    pub channel_id: u8,
    /// `0` means the HD main stream and `1` the SD sub stream. Only
    /// meaningful during `MSG_ID_VIDEO` streams
    pub stream_type: u8,
    /// Distinguishes concurrent uses of the same message ID. The camera
    /// parrots it back on the stream it describes, `1` for the preview
    pub handle: u8,
    /// On replies this is the response code. When sending a command it is
    /// set to `0` (`RESPONSE_CODE_REQUEST_AES` on the nonce request). The
    /// reply from the camera can be
    /// - `200` for OK
    /// - `400` for bad request
    pub response_code: u16,
    /// The class dictates the size of the header. Known values are
    ///
    /// - 0x6514: "legacy" 20 bytes (login handshake)
    /// - 0x6614: "modern" 20 bytes (reply to the 0x6514 nonce request)
    /// - 0x6414: "modern" 24 bytes, has payload offset
    /// - 0x0000: "modern" 24 bytes (most messages)
    /// - 0x1464: "modern" 24 bytes
    pub class: u16,
}

/// These are the encryption modes supported by the camera
///
/// The mode is upgraded during login
#[derive(Debug, Clone)]
pub enum EncryptionProtocol {
    /// The handshake and its replies use BCEncrypt which is a simple XOr
    /// keyed by the header's enc_offset
    BCEncrypt,
    /// After login everything uses Aes with the key derived from the
    /// camera's password and the negotiated NONCE
    Aes([u8; 16]),
}

/// Per-session state needed to interpret the wire format: the negotiated
/// cipher and the set of message IDs whose payloads are binary rather
/// than xml
#[derive(Debug)]
pub struct BcContext {
    pub(crate) in_bin_mode: HashSet<u32>,
    encryption_protocol: EncryptionProtocol,
}

impl Bc {
    /// Constructs a xml payload only Bc message
    pub fn new_from_xml(meta: BcMeta, xml: BcXml) -> Bc {
        Self::new(meta, None, Some(BcPayloads::BcXml(xml)))
    }

    /// Constructs a header only Bc message
    pub fn new_from_meta(meta: BcMeta) -> Bc {
        Self::new(meta, None, None)
    }

    /// General method to construct a Bc message
    pub fn new(meta: BcMeta, extension: Option<Extension>, payload: Option<BcPayloads>) -> Bc {
        Bc {
            meta,
            body: BcBody { extension, payload },
        }
    }
}

impl BcContext {
    /// Creates a fresh context. Sessions start in BCEncrypt and upgrade
    /// themselves to Aes once the login has negotiated a key
    pub fn new() -> BcContext {
        BcContext {
            in_bin_mode: HashSet::new(),
            encryption_protocol: EncryptionProtocol::BCEncrypt,
        }
    }

    pub(crate) fn set_encrypted(&mut self, encryption_protocol: EncryptionProtocol) {
        self.encryption_protocol = encryption_protocol;
    }

    pub(crate) fn get_encrypted(&self) -> &EncryptionProtocol {
        &self.encryption_protocol
    }

    pub(crate) fn binary_on(&mut self, msg_id: u32) {
        self.in_bin_mode.insert(msg_id);
    }

    pub(crate) fn binary_off(&mut self, msg_id: u32) {
        self.in_bin_mode.remove(&msg_id);
    }
}

impl Default for BcContext {
    fn default() -> Self {
        Self::new()
    }
}

impl BcMeta {
    /// The packed word written after the body length. Its little endian
    /// bytes on the wire are `[channel][stream][0x00][handle]`. Besides
    /// addressing, the word keys the BCEncrypt cipher for this message
    pub fn enc_offset(&self) -> u32 {
        (self.channel_id as u32) | ((self.stream_type as u32) << 8) | ((self.handle as u32) << 24)
    }
}

impl BcHeader {
    /// Converts a header into a `BcMeta`, stripping the parts that only
    /// describe the wire format such as `body_len`
    pub fn to_meta(&self) -> BcMeta {
        let (channel_id, stream_type, handle) = split_enc_offset(self.enc_offset);
        BcMeta {
            msg_id: self.msg_id,
            channel_id,
            stream_type,
            handle,
            response_code: self.response_code,
            class: self.class,
        }
    }

    /// Construct a [`BcHeader`] from a [`BcMeta`]
    ///
    /// This requires the data known only after the body is serialized:
    /// the `body_len` (extension and payload) and the `payload_offset`
    /// where the extension ends
    pub fn from_meta(meta: &BcMeta, body_len: u32, payload_offset: Option<u32>) -> BcHeader {
        BcHeader {
            payload_offset,
            body_len,
            msg_id: meta.msg_id,
            enc_offset: meta.enc_offset(),
            response_code: meta.response_code,
            class: meta.class,
        }
    }
}

pub(super) fn split_enc_offset(enc_offset: u32) -> (u8, u8, u8) {
    // Byte 2 carries nothing; known firmwares always send zero there
    (
        enc_offset as u8,
        (enc_offset >> 8) as u8,
        (enc_offset >> 24) as u8,
    )
}

pub(super) fn has_payload_offset(class: u16) -> bool {
    matches!(class, 0x6414 | 0x0000 | 0x1464)
}

pub(super) fn is_known_class(class: u16) -> bool {
    matches!(class, 0x6514 | 0x6614 | 0x6414 | 0x0000 | 0x1464)
}
