// YaSerde currently macro-expands names like __type__value from type_
#![allow(non_snake_case)]

use std::io::{Read, Write};
// YaSerde is currently naming the traits and the derive macros identically
use yaserde::ser::Config;
use yaserde_derive::{YaDeserialize, YaSerialize};

#[cfg(test)]
use indoc::indoc;

/// There are two types of payloads xml and binary
#[derive(PartialEq, Debug)]
pub enum BcPayloads {
    /// XML payloads are the more common ones and carry the camera control
    /// documents
    BcXml(BcXml),
    /// Binary payloads are received from the camera for streams
    Binary(Vec<u8>),
}

/// The top level BC Xml
#[derive(PartialEq, Default, Debug, YaDeserialize, YaSerialize)]
#[yaserde(rename = "body")]
pub struct BcXml {
    /// Encryption xml is received during login and contains the NONCE
    #[yaserde(rename = "Encryption")]
    pub encryption: Option<Encryption>,
    /// LoginUser xml is used during modern login
    #[yaserde(rename = "LoginUser")]
    pub login_user: Option<LoginUser>,
    /// LoginNet xml is used during modern login
    #[yaserde(rename = "LoginNet")]
    pub login_net: Option<LoginNet>,
    /// The final part of a login sequence will return DeviceInfo xml
    #[yaserde(rename = "DeviceInfo")]
    pub device_info: Option<DeviceInfo>,
    /// The list of streams and their configuration, also returned on login
    #[yaserde(rename = "StreamInfoList")]
    pub stream_info_list: Option<StreamInfoList>,
    /// Preview xml is used as part of the stream request to set the stream
    /// quality and channel
    #[yaserde(rename = "Preview")]
    pub preview: Option<Preview>,
}

impl BcXml {
    pub(crate) fn try_parse(s: impl Read) -> Result<Self, String> {
        yaserde::de::from_reader(s)
    }
    pub(crate) fn serialize<W: Write>(&self, w: W) -> Result<W, String> {
        yaserde::ser::serialize_with_writer(self, w, &Config::default())
    }
}

impl Extension {
    pub(crate) fn try_parse(s: impl Read) -> Result<Self, String> {
        yaserde::de::from_reader(s)
    }
    pub(crate) fn serialize<W: Write>(&self, w: W) -> Result<W, String> {
        yaserde::ser::serialize_with_writer(self, w, &Config::default())
    }
}

/// Encryption xml
#[derive(PartialEq, Eq, Default, Debug, YaDeserialize, YaSerialize)]
pub struct Encryption {
    /// XML Version
    #[yaserde(attribute)]
    pub version: String,
    #[yaserde(rename = "type")]
    /// The hashing algorithm used. Only observed the value of "md5"
    pub type_: String,
    /// The nonce used to negotiate the login and to generate the AES key
    pub nonce: String,
}

/// LoginUser xml
#[derive(PartialEq, Eq, Default, Debug, YaDeserialize, YaSerialize)]
pub struct LoginUser {
    /// XML Version
    #[yaserde(attribute)]
    pub version: String,
    /// Username to login as. Sent as the 31 character MD5 digest of
    /// username + nonce
    #[yaserde(rename = "userName")]
    pub user_name: String,
    /// Password for login. Sent as the 31 character MD5 digest of
    /// password + nonce
    pub password: String,
    /// Unknown always `1`
    #[yaserde(rename = "userVer")]
    pub user_ver: u32,
}

/// LoginNet xml
#[derive(PartialEq, Eq, Debug, YaDeserialize, YaSerialize)]
pub struct LoginNet {
    /// XML Version
    #[yaserde(attribute)]
    pub version: String,
    /// Type of connection usually LAN (even on wifi)
    #[yaserde(rename = "type")]
    pub type_: String,
    /// The port for the udp will be `0` for tcp
    #[yaserde(rename = "udpPort")]
    pub udp_port: u16,
}

impl Default for LoginNet {
    fn default() -> Self {
        LoginNet {
            version: xml_ver(),
            type_: "LAN".to_string(),
            udp_port: 0,
        }
    }
}

/// DeviceInfo xml
///
/// There is more to this xml but we don't deserialize it all
#[derive(PartialEq, Eq, Default, Debug, YaDeserialize, YaSerialize)]
pub struct DeviceInfo {
    /// XML Version
    #[yaserde(attribute)]
    pub version: String,
    /// The firmware version string
    #[yaserde(rename = "firmVersion")]
    pub firm_version: String,
    /// Device type, observed value `"ipc"`
    #[yaserde(rename = "type")]
    pub type_: String,
    /// Number of channels, `1` except on NVRs
    #[yaserde(rename = "channelNum")]
    pub channel_num: u32,
    /// Number of audio tracks
    #[yaserde(rename = "audioNum")]
    pub audio_num: u32,
    /// The resolution xml block
    pub resolution: Resolution,
}

/// Resolution xml
#[derive(PartialEq, Eq, Default, Debug, YaDeserialize, YaSerialize)]
pub struct Resolution {
    /// Resolution name is in the format "width*height" i.e. "2304*1296"
    #[yaserde(rename = "resolutionName")]
    pub name: String,
    /// Width of the stream in pixels
    pub width: u32,
    /// Height of the stream in pixels
    pub height: u32,
}

/// The list of streams the camera offers and their configuration
#[derive(PartialEq, Eq, Default, Debug, YaDeserialize, YaSerialize)]
pub struct StreamInfoList {
    /// XML Version
    #[yaserde(attribute)]
    pub version: String,
    /// The stream infos. There is usually only one of these
    #[yaserde(rename = "StreamInfo")]
    pub stream_infos: Vec<StreamInfo>,
}

/// The individual reply about the stream info
#[derive(PartialEq, Eq, Default, Debug, YaDeserialize, YaSerialize)]
pub struct StreamInfo {
    /// Bits in the channel number. Observed values `1`
    #[yaserde(rename = "channelBits")]
    pub channel_bits: u32,
    /// List of encode tables. These hold the actual stream data
    #[yaserde(rename = "encodeTable")]
    pub encode_tables: Vec<EncodeTable>,
}

/// One configured stream of the camera
#[derive(PartialEq, Eq, Default, Debug, YaDeserialize, YaSerialize)]
pub struct EncodeTable {
    /// The internal name of the stream observed values `"mainStream"`,
    /// `"subStream"`
    #[yaserde(rename = "type")]
    pub name: String,
    /// The resolution of the stream
    pub resolution: StreamResolution,
    /// The video codec, observed values `"h264"` and `"h265"`
    #[yaserde(rename = "videoEncType")]
    pub video_enc_type: String,
    /// The default framerate. This is sometimes an index into a table
    #[yaserde(rename = "defaultFramerate")]
    pub default_framerate: u32,
    /// The default bitrate. This is sometimes an index into a table
    #[yaserde(rename = "defaultBitrate")]
    pub default_bitrate: u32,
}

/// The resolution of the stream
#[derive(PartialEq, Eq, Default, Debug, YaDeserialize, YaSerialize)]
pub struct StreamResolution {
    /// Width of the stream
    pub width: u32,
    /// Height of the stream
    pub height: u32,
}

/// Preview xml
///
/// This xml is used to request a stream to start and stop
#[derive(PartialEq, Eq, Default, Debug, YaDeserialize, YaSerialize)]
pub struct Preview {
    /// XML Version
    #[yaserde(attribute)]
    pub version: String,

    /// Channel id is usually zero unless using a NVR
    #[yaserde(rename = "channelId")]
    pub channel_id: u8,
    /// Handle is `1` for the preview stream
    pub handle: u32,
    /// Either `"mainStream"` or `"subStream"`. Omitted in the stop request
    #[yaserde(rename = "streamType")]
    pub stream_type: Option<String>,
}

/// Extension xml
///
/// This is used to describe the subsequent payload passed the
/// `payload_offset`
#[derive(PartialEq, Eq, Debug, YaDeserialize, YaSerialize)]
pub struct Extension {
    /// XML Version
    #[yaserde(attribute)]
    pub version: String,
    /// Set to `1` on the segment that starts a media frame, `0` on its
    /// continuations
    #[yaserde(rename = "binaryData")]
    pub binary_data: Option<u32>,
    /// How many bytes at the start of the payload are AES encrypted. `0`
    /// means the payload is plaintext
    #[yaserde(rename = "encryptLen")]
    pub encrypt_len: Option<u32>,
    /// Encrypted binary has this to verify successful decryption
    #[yaserde(rename = "checkPos")]
    pub check_pos: Option<u32>,
    /// Encrypted binary has this to verify successful decryption
    #[yaserde(rename = "checkValue")]
    pub check_value: Option<u32>,
}

impl Default for Extension {
    fn default() -> Extension {
        Extension {
            version: xml_ver(),
            binary_data: None,
            encrypt_len: None,
            check_pos: None,
            check_value: None,
        }
    }
}

/// Convience function to return the xml version used throughout the library
pub fn xml_ver() -> String {
    "1.1".to_string()
}

#[test]
fn test_encryption_deser() {
    let sample = indoc!(
        r#"
        <?xml version="1.0" encoding="UTF-8" ?>
        <body>
        <Encryption version="1.1">
        <type>md5</type>
        <nonce>9E6D1FCB9E69846D</nonce>
        </Encryption>
        </body>"#
    );
    let b: BcXml = yaserde::de::from_str(sample).unwrap();
    let enc = b.encryption.as_ref().unwrap();

    assert_eq!(enc.version, "1.1");
    assert_eq!(enc.nonce, "9E6D1FCB9E69846D");
    assert_eq!(enc.type_, "md5");

    let t = BcXml::try_parse(sample.as_bytes()).unwrap();
    match t {
        top_b if top_b == b => {}
        _ => panic!(),
    }
}

#[test]
fn test_login_roundtrip() {
    let sample = indoc!(
        r#"
        <?xml version="1.0" encoding="UTF-8" ?>
        <body>
        <LoginUser version="1.1">
        <userName>9F07915E819A076E2E14169830769D6</userName>
        <password>8EFECD610524A98390F118D2789BE3B</password>
        <userVer>1</userVer>
        </LoginUser>
        <LoginNet version="1.1">
        <type>LAN</type>
        <udpPort>0</udpPort>
        </LoginNet>
        </body>"#
    );

    let b = BcXml {
        login_user: Some(LoginUser {
            version: "1.1".to_string(),
            user_name: "9F07915E819A076E2E14169830769D6".to_string(),
            password: "8EFECD610524A98390F118D2789BE3B".to_string(),
            user_ver: 1,
        }),
        login_net: Some(LoginNet {
            version: "1.1".to_string(),
            type_: "LAN".to_string(),
            udp_port: 0,
        }),
        ..BcXml::default()
    };

    let b2 = BcXml::try_parse(sample.as_bytes()).unwrap();
    let b3 = BcXml::try_parse(b.serialize(vec![]).unwrap().as_slice()).unwrap();

    assert_eq!(b, b2);
    assert_eq!(b, b3);
    assert_eq!(b2, b3);
}

#[test]
fn test_extension_deser() {
    let sample = indoc!(
        r#"
        <?xml version="1.0" encoding="UTF-8" ?>
        <Extension version="1.1">
        <binaryData>1</binaryData>
        <encryptLen>32</encryptLen>
        <checkPos>0</checkPos>
        <checkValue>204</checkValue>
        </Extension>"#
    );
    let ext = Extension::try_parse(sample.as_bytes()).unwrap();
    assert_eq!(
        ext,
        Extension {
            version: "1.1".to_string(),
            binary_data: Some(1),
            encrypt_len: Some(32),
            check_pos: Some(0),
            check_value: Some(204),
        }
    );

    let ext2 = Extension::try_parse(ext.serialize(vec![]).unwrap().as_slice()).unwrap();
    assert_eq!(ext, ext2);
}

#[test]
fn test_preview_ser() {
    let start = Preview {
        version: xml_ver(),
        channel_id: 0,
        handle: 1,
        stream_type: Some("mainStream".to_string()),
    };
    let body = BcXml {
        preview: Some(start),
        ..BcXml::default()
    };
    let reparsed = BcXml::try_parse(body.serialize(vec![]).unwrap().as_slice()).unwrap();
    assert_eq!(body, reparsed);
}

#[test]
fn test_login_reply_partial_deser() {
    // Needs to ignore all the fields we don't model
    let sample = indoc!(
        r#"
        <?xml version="1.0" encoding="UTF-8" ?>
        <body>
        <DeviceInfo version="1.1">
        <firmVersion>v2.0.0.587_19110800</firmVersion>
        <IOInputPortNum>0</IOInputPortNum>
        <IOOutputPortNum>0</IOOutputPortNum>
        <diskNum>0</diskNum>
        <type>ipc</type>
        <channelNum>1</channelNum>
        <audioNum>1</audioNum>
        <resolution>
        <resolutionName>2304*1296</resolutionName>
        <width>2304</width>
        <height>1296</height>
        </resolution>
        <language>English</language>
        <sdCard>0</sdCard>
        </DeviceInfo>
        <StreamInfoList version="1.1">
        <StreamInfo>
        <channelBits>1</channelBits>
        <encodeTable>
        <type>mainStream</type>
        <resolution>
        <width>2304</width>
        <height>1296</height>
        </resolution>
        <videoEncType>h264</videoEncType>
        <defaultFramerate>30</defaultFramerate>
        <defaultBitrate>3072</defaultBitrate>
        </encodeTable>
        <encodeTable>
        <type>subStream</type>
        <resolution>
        <width>896</width>
        <height>512</height>
        </resolution>
        <videoEncType>h264</videoEncType>
        <defaultFramerate>15</defaultFramerate>
        <defaultBitrate>512</defaultBitrate>
        </encodeTable>
        </StreamInfo>
        </StreamInfoList>
        </body>"#
    );

    let b = BcXml::try_parse(sample.as_bytes()).unwrap();
    let info = b.device_info.as_ref().unwrap();
    assert_eq!(info.resolution.width, 2304);
    assert_eq!(info.resolution.height, 1296);
    assert_eq!(info.channel_num, 1);

    let streams = b.stream_info_list.as_ref().unwrap();
    let tables = &streams.stream_infos[0].encode_tables;
    assert_eq!(tables.len(), 2);
    assert_eq!(tables[0].name, "mainStream");
    assert_eq!(tables[0].video_enc_type, "h264");
    assert_eq!(tables[1].resolution.width, 896);
}
