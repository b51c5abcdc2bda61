use super::model::*;
use err_derive::Error;
use log::warn;
use nom::{bytes::streaming::take, error::context, number::streaming::*};

type IResult<I, O, E = nom::error::VerboseError<I>> = Result<(I, O), nom::Err<E>>;
type NomErrorType<'a> = crate::NomErrorType<'a>;

/// The error types used during deserialisation
#[derive(Debug, Error, Clone)]
pub enum Error {
    /// The buffer ends before the declared payload does. The frame
    /// continues in a later segment and the caller should accumulate
    /// more bytes and retry
    #[error(display = "Media packet needs more data")]
    Incomplete,
    /// A malformed packet
    #[error(display = "Parsing error: {}", _0)]
    NomError(String),
}

impl<'a> From<nom::Err<NomErrorType<'a>>> for Error {
    fn from(k: nom::Err<NomErrorType<'a>>) -> Self {
        let reason = match k {
            nom::Err::Error(e) => format!("Nom Error: {:x?}", e),
            nom::Err::Failure(e) => format!("Nom Error: {:x?}", e),
            _ => "Unknown Nom error".to_string(),
        };
        Error::NomError(reason)
    }
}

impl BcMedia {
    /// Try to parse one media sub packet from the given bytes
    ///
    /// Returns [`Error::Incomplete`] when the buffer holds less payload
    /// than the sub header declares
    pub fn parse(buf: &[u8]) -> Result<BcMedia, Error> {
        match bcmedia(buf) {
            Ok((_, media)) => Ok(media),
            Err(nom::Err::Incomplete(_)) => Err(Error::Incomplete),
            Err(e) => Err(e.into()),
        }
    }
}

fn bcmedia(full: &[u8]) -> IResult<&[u8], BcMedia> {
    let (buf, magic) = context("Media magic is missing", le_u32)(full)?;

    match magic {
        MAGIC_HEADER_BCMEDIA_IFRAME => bcmedia_iframe(full, buf),
        MAGIC_HEADER_BCMEDIA_PFRAME => bcmedia_pframe(full, buf),
        MAGIC_HEADER_BCMEDIA_AAC => bcmedia_aac(buf),
        MAGIC_HEADER_BCMEDIA_INFO_V2 => bcmedia_info_v2(buf),
        other => {
            warn!("Unrecognised media packet magic: {:08x}", other);
            Ok((&[][..], BcMedia::Unknown(full.to_vec())))
        }
    }
}

fn video_type(buf: &[u8]) -> IResult<&[u8], Option<VideoType>> {
    let (buf, tag) = context("Video codec tag is missing", take(4usize))(buf)?;
    let video_type = match tag {
        b"H264" => Some(VideoType::H264),
        b"H265" => Some(VideoType::H265),
        other => {
            warn!("Unrecognised video codec tag: {:x?}", other);
            None
        }
    };
    Ok((buf, video_type))
}

fn bcmedia_iframe<'a>(full: &'a [u8], buf: &'a [u8]) -> IResult<&'a [u8], BcMedia> {
    let (buf, video_type) = video_type(buf)?;
    let video_type = match video_type {
        Some(vt) => vt,
        None => return Ok((&[][..], BcMedia::Unknown(full.to_vec()))),
    };
    let (buf, payload_size) = le_u32(buf)?;
    let (buf, additional_header_size) = le_u32(buf)?;
    let (buf, microseconds) = le_u32(buf)?;
    let (buf, _unknown) = le_u32(buf)?;
    let (buf, time) = if additional_header_size >= 4 {
        let (buf, time_value) = le_u32(buf)?;
        (buf, Some(time_value))
    } else {
        (buf, None)
    };
    let (buf, _additional_remainder) = if additional_header_size > 4 {
        take(additional_header_size - 4)(buf)?
    } else {
        (buf, &[][..])
    };
    let (buf, data_slice) = take(payload_size)(buf)?;

    Ok((
        buf,
        BcMedia::Iframe(BcMediaIframe {
            video_type,
            microseconds,
            time,
            data: data_slice.to_vec(),
        }),
    ))
}

fn bcmedia_pframe<'a>(full: &'a [u8], buf: &'a [u8]) -> IResult<&'a [u8], BcMedia> {
    let (buf, video_type) = video_type(buf)?;
    let video_type = match video_type {
        Some(vt) => vt,
        None => return Ok((&[][..], BcMedia::Unknown(full.to_vec()))),
    };
    let (buf, payload_size) = le_u32(buf)?;
    let (buf, additional_header_size) = le_u32(buf)?;
    let (buf, microseconds) = le_u32(buf)?;
    let (buf, _unknown) = le_u32(buf)?;
    let (buf, _additional_header) = take(additional_header_size)(buf)?;
    let (buf, data_slice) = take(payload_size)(buf)?;

    Ok((
        buf,
        BcMedia::Pframe(BcMediaPframe {
            video_type,
            microseconds,
            data: data_slice.to_vec(),
        }),
    ))
}

fn bcmedia_aac(buf: &[u8]) -> IResult<&[u8], BcMedia> {
    let (buf, payload_size) = le_u16(buf)?;
    let (buf, _payload_size_b) = le_u16(buf)?;
    let (buf, data_slice) = take(payload_size)(buf)?;

    Ok((
        buf,
        BcMedia::Aac(BcMediaAac {
            data: data_slice.to_vec(),
        }),
    ))
}

fn bcmedia_info_v2(buf: &[u8]) -> IResult<&[u8], BcMedia> {
    let (buf, _header_size) = le_u32(buf)?;
    let (buf, video_width) = le_u32(buf)?;
    let (buf, video_height) = le_u32(buf)?;
    let (buf, _unknown) = le_u8(buf)?;
    let (buf, fps) = le_u8(buf)?;
    let (buf, start_year) = le_u8(buf)?;
    let (buf, start_month) = le_u8(buf)?;
    let (buf, start_day) = le_u8(buf)?;
    let (buf, start_hour) = le_u8(buf)?;
    let (buf, start_min) = le_u8(buf)?;
    let (buf, start_seconds) = le_u8(buf)?;
    let (buf, end_year) = le_u8(buf)?;
    let (buf, end_month) = le_u8(buf)?;
    let (buf, end_day) = le_u8(buf)?;
    let (buf, end_hour) = le_u8(buf)?;
    let (buf, end_min) = le_u8(buf)?;
    let (buf, end_seconds) = le_u8(buf)?;

    Ok((
        buf,
        BcMedia::InfoV2(BcMediaInfoV2 {
            video_width,
            video_height,
            fps,
            start_year: start_year as u16 + 1900,
            start_month,
            start_day,
            start_hour,
            start_min,
            start_seconds,
            end_year: end_year as u16 + 1900,
            end_month,
            end_day,
            end_hour,
            end_min,
            end_seconds,
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use env_logger::Env;

    fn init() {
        let _ = env_logger::Builder::from_env(Env::default().default_filter_or("info"))
            .is_test(true)
            .try_init();
    }

    fn build_iframe(codec: &[u8; 4], payload: &[u8], declared_size: u32) -> Vec<u8> {
        let mut buf = vec![0x30, 0x30, 0x64, 0x63];
        buf.extend_from_slice(codec);
        buf.extend_from_slice(&declared_size.to_le_bytes());
        buf.extend_from_slice(&4u32.to_le_bytes()); // additional header with time
        buf.extend_from_slice(&1000u32.to_le_bytes()); // microseconds
        buf.extend_from_slice(&0u32.to_le_bytes()); // unknown
        buf.extend_from_slice(&1628085232u32.to_le_bytes()); // time
        buf.extend_from_slice(payload);
        buf
    }

    fn build_pframe(payload: &[u8]) -> Vec<u8> {
        let mut buf = vec![0x30, 0x31, 0x64, 0x63];
        buf.extend_from_slice(b"H264");
        buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        buf.extend_from_slice(&0u32.to_le_bytes()); // no additional header
        buf.extend_from_slice(&2000u32.to_le_bytes());
        buf.extend_from_slice(&0u32.to_le_bytes());
        buf.extend_from_slice(payload);
        buf
    }

    #[test]
    fn test_iframe() {
        init();

        let payload: Vec<u8> = (0..100u8).collect();
        let buf = build_iframe(b"H264", &payload, 100);

        let media = BcMedia::parse(&buf).unwrap();
        match media {
            BcMedia::Iframe(BcMediaIframe {
                video_type: VideoType::H264,
                microseconds: 1000,
                time: Some(1628085232),
                data,
            }) => assert_eq!(data, payload),
            other => panic!("{:?}", other),
        }
    }

    #[test]
    fn test_iframe_short_payload_is_incomplete() {
        init();

        // Sub header declares 100 bytes but only 60 are present
        let payload: Vec<u8> = (0..60u8).collect();
        let buf = build_iframe(b"H264", &payload, 100);

        assert_matches!(BcMedia::parse(&buf), Err(Error::Incomplete));
    }

    #[test]
    fn test_iframe_extended_additional_header() {
        init();

        // Additional header of 12 bytes: time then 8 unknown bytes
        let payload = [0xaau8; 16];
        let mut buf = vec![0x30, 0x30, 0x64, 0x63];
        buf.extend_from_slice(b"H265");
        buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        buf.extend_from_slice(&12u32.to_le_bytes());
        buf.extend_from_slice(&1000u32.to_le_bytes());
        buf.extend_from_slice(&0u32.to_le_bytes());
        buf.extend_from_slice(&77u32.to_le_bytes()); // time
        buf.extend_from_slice(&[0u8; 8]); // rest of additional header
        buf.extend_from_slice(&payload);

        let media = BcMedia::parse(&buf).unwrap();
        match media {
            BcMedia::Iframe(BcMediaIframe {
                video_type: VideoType::H265,
                time: Some(77),
                data,
                ..
            }) => assert_eq!(data, payload),
            other => panic!("{:?}", other),
        }
    }

    #[test]
    fn test_pframe() {
        init();

        let payload = [0x5au8; 32];
        let buf = build_pframe(&payload);

        let media = BcMedia::parse(&buf).unwrap();
        match media {
            BcMedia::Pframe(BcMediaPframe {
                video_type: VideoType::H264,
                microseconds: 2000,
                data,
            }) => assert_eq!(data, payload),
            other => panic!("{:?}", other),
        }
    }

    #[test]
    fn test_aac() {
        init();

        let payload = [0x11u8; 48];
        let mut buf = vec![0x30, 0x35, 0x77, 0x62];
        buf.extend_from_slice(&(payload.len() as u16).to_le_bytes());
        buf.extend_from_slice(&(payload.len() as u16).to_le_bytes());
        buf.extend_from_slice(&payload);

        let media = BcMedia::parse(&buf).unwrap();
        match media {
            BcMedia::Aac(BcMediaAac { data }) => assert_eq!(data, payload),
            other => panic!("{:?}", other),
        }
    }

    #[test]
    fn test_info_v2() {
        init();

        let mut buf = vec![0x31, 0x30, 0x30, 0x32];
        buf.extend_from_slice(&32u32.to_le_bytes()); // header size
        buf.extend_from_slice(&2560u32.to_le_bytes());
        buf.extend_from_slice(&1440u32.to_le_bytes());
        buf.push(0); // unknown
        buf.push(30); // fps
        buf.extend_from_slice(&[121, 8, 4, 23, 23, 52]); // start
        buf.extend_from_slice(&[121, 8, 4, 23, 24, 52]); // end

        let media = BcMedia::parse(&buf).unwrap();
        match media {
            BcMedia::InfoV2(info) => {
                assert_eq!(info.video_width, 2560);
                assert_eq!(info.video_height, 1440);
                assert_eq!(info.fps, 30);
                assert_eq!(info.start_year, 2021);
                assert_eq!(info.start_month, 8);
                assert_eq!(info.end_year, 2021);
                assert_eq!(info.end_min, 24);
            }
            other => panic!("{:?}", other),
        }
    }

    #[test]
    fn test_unknown_magic_passes_through() {
        init();

        let buf = [0x99u8, 0x98, 0x97, 0x96, 1, 2, 3];
        let media = BcMedia::parse(&buf).unwrap();
        match media {
            BcMedia::Unknown(data) => assert_eq!(data, buf),
            other => panic!("{:?}", other),
        }
    }

    #[test]
    fn test_unknown_codec_tag_passes_through() {
        init();

        let payload = [0u8; 8];
        let mut buf = vec![0x30, 0x30, 0x64, 0x63];
        buf.extend_from_slice(b"H266");
        buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        buf.extend_from_slice(&0u32.to_le_bytes());
        buf.extend_from_slice(&0u32.to_le_bytes());
        buf.extend_from_slice(&0u32.to_le_bytes());
        buf.extend_from_slice(&payload);

        let media = BcMedia::parse(&buf).unwrap();
        match media {
            BcMedia::Unknown(data) => assert_eq!(data, buf),
            other => panic!("{:?}", other),
        }
    }

    #[test]
    fn test_truncated_magic_is_incomplete() {
        init();

        assert_matches!(BcMedia::parse(&[0x30, 0x30]), Err(Error::Incomplete));
    }
}
