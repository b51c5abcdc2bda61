use super::{BcSession, Result};
use crate::bcmedia::model::*;
use log::*;

/// How many packets to inspect before reporting what the stream carries
const PROBE_PACKETS: usize = 10;

/// Whether a probed media is a video or audio track
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    /// A video track
    Video,
    /// An audio track
    Audio,
}

/// One track the camera's stream was observed to carry
#[derive(Debug, Clone)]
pub struct Media {
    /// Video or audio
    pub kind: MediaKind,
    /// The codec tag as seen on the wire, `"H264"`, `"H265"` or `"AAC"`
    pub codec: String,
    /// For H264 video, the SDP fmtp attribute built from the in-band
    /// SPS/PPS parameter sets
    pub fmtp_line: Option<String>,
    /// For AAC audio, the first payload as sent by the camera; decoding
    /// the AudioSpecificConfig out of it is left to the consumer
    pub codec_config: Option<Vec<u8>>,
}

impl BcSession {
    /// Reads up to ten media packets off the stream and reports the set of
    /// tracks found in them along with their codec parameters
    pub fn probe(&mut self) -> Result<Vec<Media>> {
        let mut medias: Vec<Media> = Vec::new();
        let mut stream = self.stream()?;

        for _ in 0..PROBE_PACKETS {
            let packet = stream.next_packet()?;
            let (video_type, data) = match &packet {
                BcMedia::Iframe(BcMediaIframe {
                    video_type, data, ..
                }) => (Some(*video_type), data.as_slice()),
                BcMedia::Pframe(BcMediaPframe {
                    video_type, data, ..
                }) => (Some(*video_type), data.as_slice()),
                BcMedia::Aac(BcMediaAac { data }) => (None, data.as_slice()),
                _ => continue,
            };

            match video_type {
                Some(VideoType::H264) if !has_kind(&medias, MediaKind::Video) => {
                    medias.push(Media {
                        kind: MediaKind::Video,
                        codec: "H264".to_string(),
                        fmtp_line: h264_fmtp_line(data),
                        codec_config: None,
                    });
                }
                Some(VideoType::H265) if !has_kind(&medias, MediaKind::Video) => {
                    medias.push(Media {
                        kind: MediaKind::Video,
                        codec: "H265".to_string(),
                        fmtp_line: None,
                        codec_config: None,
                    });
                }
                None if !has_kind(&medias, MediaKind::Audio) => {
                    medias.push(Media {
                        kind: MediaKind::Audio,
                        codec: "AAC".to_string(),
                        fmtp_line: None,
                        codec_config: Some(data.to_vec()),
                    });
                }
                _ => {}
            }
        }

        debug!("Probe found {} media tracks", medias.len());
        Ok(medias)
    }
}

fn has_kind(medias: &[Media], kind: MediaKind) -> bool {
    medias.iter().any(|media| media.kind == kind)
}

/// Builds the SDP fmtp attribute for an H264 stream from the SPS and PPS
/// parameter sets found in an Annex B payload. Returns `None` when either
/// set is absent, which happens on any frame that is not a key frame
fn h264_fmtp_line(data: &[u8]) -> Option<String> {
    let mut sps: Option<&[u8]> = None;
    let mut pps: Option<&[u8]> = None;

    for nal in annexb_nal_units(data) {
        match nal.first().map(|b| b & 0x1f) {
            Some(7) if sps.is_none() => sps = Some(nal),
            Some(8) if pps.is_none() => pps = Some(nal),
            _ => {}
        }
    }

    let sps = sps?;
    let pps = pps?;
    if sps.len() < 4 {
        return None;
    }

    Some(format!(
        "packetization-mode=1;profile-level-id={:02X}{:02X}{:02X};sprop-parameter-sets={},{}",
        sps[1],
        sps[2],
        sps[3],
        base64::encode(sps),
        base64::encode(pps)
    ))
}

/// Splits an Annex B buffer on its 3 or 4 byte start codes
fn annexb_nal_units(data: &[u8]) -> Vec<&[u8]> {
    let mut units = Vec::new();
    let mut unit_start: Option<usize> = None;
    let mut i = 0;

    while i + 2 < data.len() {
        if data[i] == 0 && data[i + 1] == 0 && data[i + 2] == 1 {
            let code_start = if i > 0 && data[i - 1] == 0 { i - 1 } else { i };
            if let Some(start) = unit_start {
                units.push(&data[start..code_start]);
            }
            unit_start = Some(i + 3);
            i += 3;
        } else {
            i += 1;
        }
    }
    if let Some(start) = unit_start {
        units.push(&data[start..]);
    }

    units
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_annexb_split() {
        let data = [
            0, 0, 0, 1, 0x67, 1, 2, // four byte start code
            0, 0, 1, 0x68, 3, // three byte start code
            0, 0, 0, 1, 0x65, 4, 5, 6,
        ];
        let nals = annexb_nal_units(&data);
        assert_eq!(nals.len(), 3);
        assert_eq!(nals[0], &[0x67, 1, 2]);
        assert_eq!(nals[1], &[0x68, 3]);
        assert_eq!(nals[2], &[0x65, 4, 5, 6]);
    }

    #[test]
    fn test_h264_fmtp_line() {
        let sps = [0x67, 0x64, 0x00, 0x28, 0xac, 0xb4];
        let pps = [0x68, 0xee, 0x38, 0x80];
        let mut data = vec![0, 0, 0, 1];
        data.extend_from_slice(&sps);
        data.extend_from_slice(&[0, 0, 0, 1]);
        data.extend_from_slice(&pps);
        data.extend_from_slice(&[0, 0, 0, 1, 0x65, 0xaa, 0xbb]);

        let fmtp = h264_fmtp_line(&data).unwrap();
        assert_eq!(
            fmtp,
            "packetization-mode=1;profile-level-id=640028;\
             sprop-parameter-sets=Z2QAKKy0,aO44gA=="
        );
    }

    #[test]
    fn test_h264_fmtp_line_without_parameter_sets() {
        // A non key frame: single slice NAL, no SPS/PPS
        let data = [0u8, 0, 0, 1, 0x41, 0x9a, 0x00];
        assert!(h264_fmtp_line(&data).is_none());
    }
}
