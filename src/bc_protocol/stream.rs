use super::{BcSession, Result};
use crate::bc::{model::*, xml::*, xml_crypto};
use crate::bcmedia::{de::Error as MediaError, model::BcMedia};
use log::*;
use std::io::Read;

/// A handle on the currently streaming preview
///
/// Pulls complete media packets from the camera with [`BcStream::next_packet`]
/// or through the [`Iterator`] impl. A frame that was split over several
/// messages is reassembled before it is returned.
pub struct BcStream<'a> {
    context: &'a mut BcContext,
    reader: &'a mut dyn Read,
    current: Option<Vec<u8>>,
    done: bool,
}

impl BcSession {
    ///
    /// Starts the video stream and returns its demuxer
    ///
    /// The Preview request is sent once per session; calling this again
    /// returns a fresh demuxer over the already running stream.
    ///
    pub fn stream(&mut self) -> Result<BcStream<'_>> {
        if !self.streaming {
            let start_stream = Bc::new_from_xml(
                BcMeta {
                    msg_id: MSG_ID_VIDEO,
                    channel_id: self.channel_id,
                    stream_type: 0,
                    handle: 1,
                    response_code: 0,
                    class: 0x6414,
                },
                BcXml {
                    preview: Some(Preview {
                        version: xml_ver(),
                        channel_id: self.channel_id,
                        handle: 1,
                        stream_type: Some("mainStream".to_string()),
                    }),
                    ..Default::default()
                },
            );

            self.send(start_stream)?;
            // Anything that now arrives with the video msg id is media
            // data, not xml
            self.context.binary_on(MSG_ID_VIDEO);
            self.streaming = true;
        }

        Ok(BcStream {
            context: &mut self.context,
            reader: &mut self.reader,
            current: None,
            done: false,
        })
    }

    /// Asks the camera to stop sending stream data
    pub fn stop(&mut self) -> Result<()> {
        if !self.streaming {
            return Ok(());
        }

        let stop_stream = Bc::new_from_xml(
            BcMeta {
                msg_id: MSG_ID_VIDEO_STOP,
                channel_id: self.channel_id,
                stream_type: 0,
                handle: 1,
                response_code: 0,
                class: 0x6414,
            },
            BcXml {
                preview: Some(Preview {
                    version: xml_ver(),
                    channel_id: self.channel_id,
                    handle: 1,
                    stream_type: None,
                }),
                ..Default::default()
            },
        );

        self.send(stop_stream)?;
        self.context.binary_off(MSG_ID_VIDEO);
        self.streaming = false;
        Ok(())
    }
}

impl<'a> BcStream<'a> {
    /// Pull the next complete media packet, blocking until one has been
    /// reassembled.
    ///
    /// Messages that are not part of the stream (wrong id, handle or a
    /// non-200 status) are skipped. A segment that opens a new frame
    /// replaces any partial one; a continuation with no frame in progress
    /// is dropped.
    pub fn next_packet(&mut self) -> Result<BcMedia> {
        loop {
            let msg = Bc::deserialize(self.context, &mut self.reader)?;
            if msg.meta.response_code != 200
                || msg.meta.msg_id != MSG_ID_VIDEO
                || msg.meta.handle != 1
            {
                trace!("Ignoring non stream message id {}", msg.meta.msg_id);
                continue;
            }

            let enc_offset = msg.meta.enc_offset();
            let (extension, payload) = match msg.body {
                BcBody {
                    extension: Some(extension),
                    payload: Some(BcPayloads::Binary(payload)),
                } => (extension, payload),
                _ => continue,
            };

            // Only the first encrypt_len bytes of the payload are
            // ciphertext; zero means the payload arrived in the clear
            let segment = match extension.encrypt_len {
                Some(encrypt_len) if encrypt_len > 0 => {
                    let mut decrypted =
                        xml_crypto::decrypt(enc_offset, &payload, self.context.get_encrypted());
                    decrypted.truncate(encrypt_len as usize);
                    decrypted
                }
                _ => payload,
            };

            if extension.binary_data == Some(1) {
                // Head of a new frame. It supersedes whatever was being
                // reassembled
                match BcMedia::parse(&segment) {
                    Ok(packet) => {
                        self.current = None;
                        return Ok(packet);
                    }
                    Err(MediaError::Incomplete) => {
                        self.current = Some(segment);
                    }
                    Err(e) => {
                        debug!("Dropping undecodable head segment: {}", e);
                        self.current = None;
                    }
                }
            } else {
                // Continuation of the frame in progress, if any
                let buffer = match self.current.as_mut() {
                    Some(buffer) => buffer,
                    None => continue,
                };
                buffer.extend_from_slice(&segment);

                match BcMedia::parse(buffer) {
                    Ok(packet) => {
                        self.current = None;
                        return Ok(packet);
                    }
                    Err(MediaError::Incomplete) => {}
                    Err(e) => {
                        debug!("Dropping undecodable reassembled frame: {}", e);
                        self.current = None;
                    }
                }
            }
        }
    }
}

impl<'a> Iterator for BcStream<'a> {
    type Item = Result<BcMedia>;

    fn next(&mut self) -> Option<Result<BcMedia>> {
        if self.done {
            return None;
        }
        match self.next_packet() {
            Ok(packet) => Some(Ok(packet)),
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bcmedia::model::*;
    use assert_matches::assert_matches;
    use std::io::Cursor;

    const TEST_KEY: [u8; 16] = *b"57FACFDC1A4E1FA1";

    fn test_context() -> BcContext {
        let mut context = BcContext::new();
        context.set_encrypted(EncryptionProtocol::Aes(TEST_KEY));
        context.binary_on(MSG_ID_VIDEO);
        context
    }

    fn media_meta(response_code: u16) -> BcMeta {
        BcMeta {
            msg_id: MSG_ID_VIDEO,
            channel_id: 0,
            stream_type: 0,
            handle: 1,
            response_code,
            class: 0x0000,
        }
    }

    // One stream message carrying a raw (encrypt_len 0) media segment
    fn media_msg(context: &BcContext, binary_data: u32, segment: &[u8]) -> Vec<u8> {
        let bc = Bc::new(
            media_meta(200),
            Some(Extension {
                binary_data: Some(binary_data),
                encrypt_len: Some(0),
                ..Default::default()
            }),
            Some(BcPayloads::Binary(segment.to_vec())),
        );
        bc.serialize(vec![], context.get_encrypted()).unwrap()
    }

    fn iframe_segment(declared_size: u32, payload: &[u8]) -> Vec<u8> {
        let mut buf = vec![0x30, 0x30, 0x64, 0x63];
        buf.extend_from_slice(b"H264");
        buf.extend_from_slice(&declared_size.to_le_bytes());
        buf.extend_from_slice(&0u32.to_le_bytes()); // no additional header
        buf.extend_from_slice(&1000u32.to_le_bytes()); // microseconds
        buf.extend_from_slice(&0u32.to_le_bytes()); // unknown
        buf.extend_from_slice(payload);
        buf
    }

    fn run_demuxer(context: &mut BcContext, wire: Vec<u8>, expected: usize) -> Vec<BcMedia> {
        let mut cursor = Cursor::new(wire);
        let mut stream = BcStream {
            context,
            reader: &mut cursor,
            current: None,
            done: false,
        };
        (0..expected)
            .map(|_| stream.next_packet().unwrap())
            .collect()
    }

    #[test]
    fn test_reassembly_of_split_frame() {
        let mut context = test_context();

        let payload: Vec<u8> = (0..100u8).collect();
        let head = iframe_segment(100, &payload[..60]);
        let tail = &payload[60..];

        let mut wire = media_msg(&context, 1, &head);
        wire.extend(media_msg(&context, 0, tail));

        let packets = run_demuxer(&mut context, wire, 1);
        match &packets[0] {
            BcMedia::Iframe(BcMediaIframe {
                video_type: VideoType::H264,
                data,
                ..
            }) => assert_eq!(data, &payload),
            other => panic!("{:?}", other),
        }
    }

    #[test]
    fn test_new_head_supersedes_partial() {
        let mut context = test_context();

        let partial = iframe_segment(100, &[0u8; 10]);
        let complete_payload = [0x42u8; 8];
        let complete = iframe_segment(8, &complete_payload);

        let mut wire = media_msg(&context, 1, &partial);
        wire.extend(media_msg(&context, 1, &complete));

        let packets = run_demuxer(&mut context, wire, 1);
        match &packets[0] {
            BcMedia::Iframe(BcMediaIframe { data, .. }) => {
                assert_eq!(data.as_slice(), &complete_payload)
            }
            other => panic!("{:?}", other),
        }
    }

    #[test]
    fn test_stray_continuation_is_dropped() {
        let mut context = test_context();

        let complete_payload = [0x42u8; 8];
        let complete = iframe_segment(8, &complete_payload);

        let mut wire = media_msg(&context, 0, &[1, 2, 3, 4, 5, 6, 7, 8]);
        wire.extend(media_msg(&context, 1, &complete));

        let packets = run_demuxer(&mut context, wire, 1);
        match &packets[0] {
            BcMedia::Iframe(BcMediaIframe { data, .. }) => {
                assert_eq!(data.as_slice(), &complete_payload)
            }
            other => panic!("{:?}", other),
        }
    }

    #[test]
    fn test_non_200_status_does_not_break_reassembly() {
        let mut context = test_context();

        let payload: Vec<u8> = (0..100u8).collect();
        let head = iframe_segment(100, &payload[..60]);

        // An unrelated 500 reply lands between the two segments
        let unrelated = Bc::new(
            media_meta(500),
            Some(Extension {
                binary_data: Some(0),
                encrypt_len: Some(0),
                ..Default::default()
            }),
            Some(BcPayloads::Binary(vec![0xff; 16])),
        );

        let mut wire = media_msg(&context, 1, &head);
        wire.extend(unrelated.serialize(vec![], context.get_encrypted()).unwrap());
        wire.extend(media_msg(&context, 0, &payload[60..]));

        let packets = run_demuxer(&mut context, wire, 1);
        match &packets[0] {
            BcMedia::Iframe(BcMediaIframe { data, .. }) => assert_eq!(data, &payload),
            other => panic!("{:?}", other),
        }
    }

    #[test]
    fn test_wrong_handle_is_skipped() {
        let mut context = test_context();

        let complete = iframe_segment(4, &[9, 9, 9, 9]);

        // Same message id but handle 2: not our stream
        let other_handle = Bc::new(
            BcMeta {
                handle: 2,
                ..media_meta(200)
            },
            Some(Extension {
                binary_data: Some(1),
                encrypt_len: Some(0),
                ..Default::default()
            }),
            Some(BcPayloads::Binary(iframe_segment(4, &[1, 1, 1, 1]))),
        );

        let mut wire = other_handle
            .serialize(vec![], context.get_encrypted())
            .unwrap();
        wire.extend(media_msg(&context, 1, &complete));

        let packets = run_demuxer(&mut context, wire, 1);
        match &packets[0] {
            BcMedia::Iframe(BcMediaIframe { data, .. }) => assert_eq!(data.as_slice(), &[9, 9, 9, 9]),
            other => panic!("{:?}", other),
        }
    }

    #[test]
    fn test_encrypted_payload_prefix() {
        let mut context = test_context();

        let payload = [0x33u8; 24];
        let segment = iframe_segment(24, &payload);
        let ciphertext = xml_crypto::encrypt(0, &segment, context.get_encrypted());

        let bc = Bc::new(
            media_meta(200),
            Some(Extension {
                binary_data: Some(1),
                encrypt_len: Some(segment.len() as u32),
                ..Default::default()
            }),
            Some(BcPayloads::Binary(ciphertext)),
        );
        let wire = bc.serialize(vec![], context.get_encrypted()).unwrap();

        let packets = run_demuxer(&mut context, wire, 1);
        match &packets[0] {
            BcMedia::Iframe(BcMediaIframe { data, .. }) => assert_eq!(data.as_slice(), &payload),
            other => panic!("{:?}", other),
        }
    }

    #[test]
    fn test_transport_error_ends_stream() {
        let mut context = test_context();

        let mut cursor = Cursor::new(Vec::new());
        let mut stream = BcStream {
            context: &mut context,
            reader: &mut cursor,
            current: None,
            done: false,
        };

        assert_matches!(stream.next(), Some(Err(_)));
        assert_matches!(stream.next(), None);
    }
}
