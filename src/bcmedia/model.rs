/// Video streams encapsulate a stream of BcMedia
#[derive(Debug, Clone)]
pub enum BcMedia {
    /// Holds info on the stream
    InfoV2(BcMediaInfoV2),
    /// Holds an IFrame either H264 or H265
    Iframe(BcMediaIframe),
    /// Holds a PFrame either H264 or H265
    Pframe(BcMediaPframe),
    /// Holds AAC audio
    Aac(BcMediaAac),
    /// A sub packet whose magic or codec tag is not understood. Carried
    /// through raw rather than failing the stream
    Unknown(Vec<u8>),
}

pub(super) const MAGIC_HEADER_BCMEDIA_IFRAME: u32 = 0x63643030;
pub(super) const MAGIC_HEADER_BCMEDIA_PFRAME: u32 = 0x63643130;
pub(super) const MAGIC_HEADER_BCMEDIA_AAC: u32 = 0x62773530;
pub(super) const MAGIC_HEADER_BCMEDIA_INFO_V2: u32 = 0x32303031;

/// Video Types for I/PFrame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoType {
    /// H264 video data
    H264,
    /// H265 video data
    H265,
}

/// This is a BcMedia video IFrame.
#[derive(Clone)]
pub struct BcMediaIframe {
    /// "H264", or "H265"
    pub video_type: VideoType,
    /// Timestamp in microseconds
    pub microseconds: u32,
    /// POSIX time (seconds since 00:00:00 Jan 1 1970). Present when the
    /// auxiliary header is at least four bytes
    pub time: Option<u32>,
    /// Raw IFrame data
    pub data: Vec<u8>,
}

impl std::fmt::Debug for BcMediaIframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entry(&"video_type", &self.video_type)
            .entry(&"microseconds", &self.microseconds)
            .entry(&"time", &self.time)
            .entry(
                &"data[..20]",
                &self.data[0..std::cmp::min(20, self.data.len())].to_vec(),
            )
            .entry(&"data.len()", &self.data.len())
            .finish()
    }
}

/// This is a BcMedia video PFrame.
#[derive(Clone)]
pub struct BcMediaPframe {
    /// "H264", or "H265"
    pub video_type: VideoType,
    /// Timestamp in microseconds
    pub microseconds: u32,
    /// Raw PFrame data
    pub data: Vec<u8>,
}

impl std::fmt::Debug for BcMediaPframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entry(&"video_type", &self.video_type)
            .entry(&"microseconds", &self.microseconds)
            .entry(
                &"data[..20]",
                &self.data[0..std::cmp::min(20, self.data.len())].to_vec(),
            )
            .entry(&"data.len()", &self.data.len())
            .finish()
    }
}

/// This contains BcMedia audio data in AAC format
#[derive(Debug, Clone)]
pub struct BcMediaAac {
    /// Raw AAC data
    pub data: Vec<u8>,
}

/// The start of a BcMedia stream contains this message which describes the
/// data to follow
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BcMediaInfoV2 {
    /// Width of the video
    pub video_width: u32,
    /// Height of the video
    pub video_height: u32,
    /// Frames per second. On older cameras this seems to be an index of
    /// the FPS on a lookup table
    pub fps: u8,
    /// Start year of the stream
    pub start_year: u16,
    /// Start month of the stream
    pub start_month: u8,
    /// Start day of the stream
    pub start_day: u8,
    /// Start hour of the stream
    pub start_hour: u8,
    /// Start minute of the stream
    pub start_min: u8,
    /// Start seconds of the stream
    pub start_seconds: u8,
    /// End year of the video probably only useful for recorded files
    pub end_year: u16,
    /// End month of the video probably only useful for recorded files
    pub end_month: u8,
    /// End day of the video probably only useful for recorded files
    pub end_day: u8,
    /// End hour of the video probably only useful for recorded files
    pub end_hour: u8,
    /// End min of the video probably only useful for recorded files
    pub end_min: u8,
    /// End seconds of the video probably only useful for recorded files
    pub end_seconds: u8,
}
