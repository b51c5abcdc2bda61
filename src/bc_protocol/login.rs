use super::{make_aes_key, md5_string, BcSession, Error, Result};
use crate::bc::{model::*, xml::*};
use log::*;

impl BcSession {
    /// Log in to the camera
    ///
    /// The login is a strict two step exchange. A header-only legacy frame
    /// asks for an AES capable session; the camera answers with the
    /// `Encryption` xml carrying the NONCE. The login proper is then sent
    /// as a modern frame with the MD5 digests of username and password
    /// salted with that nonce. The reply to it is still XOred with the
    /// legacy cipher -- only after it parses does the session switch to
    /// AES for everything that follows.
    pub(super) fn login(&mut self) -> Result<()> {
        let legacy_login = Bc::new_from_meta(BcMeta {
            msg_id: MSG_ID_LOGIN,
            channel_id: self.channel_id,
            stream_type: 0,
            handle: 1,
            response_code: RESPONSE_CODE_REQUEST_AES,
            class: 0x6514,
        });

        self.send(legacy_login)?;

        let legacy_reply = self.recv()?;

        let nonce;
        match &legacy_reply.body {
            BcBody {
                payload:
                    Some(BcPayloads::BcXml(BcXml {
                        encryption: Some(encryption),
                        ..
                    })),
                ..
            } if !encryption.nonce.is_empty() => {
                nonce = encryption.nonce.clone();
            }
            _ => {
                return Err(Error::UnintelligibleReply {
                    reply: std::sync::Arc::new(Box::new(legacy_reply)),
                    why: "Expected an Encryption message with a nonce back",
                })
            }
        }

        // The username/password are concat'd with the camera's nonce
        // string, then MD5'd, then the hex of this MD5 is sent. This nonce
        // prevents replay attacks if the camera were to require the modern
        // flow, but not rainbow table attacks. The upshot is that you
        // should use a very strong random password.
        let md5_username = md5_string(&format!("{}{}", self.credentials.username, nonce));
        let md5_password = md5_string(&format!("{}{}", self.credentials.password, nonce));

        let modern_login = Bc::new_from_xml(
            BcMeta {
                msg_id: MSG_ID_LOGIN,
                channel_id: self.channel_id,
                stream_type: 0,
                handle: 1,
                response_code: 0,
                class: 0x6414,
            },
            BcXml {
                login_user: Some(LoginUser {
                    version: xml_ver(),
                    user_name: md5_username,
                    password: md5_password,
                    user_ver: 1,
                }),
                login_net: Some(LoginNet::default()),
                ..Default::default()
            },
        );

        self.send(modern_login)?;
        let modern_reply = self.recv()?;
        if modern_reply.meta.response_code != 200 {
            return Err(Error::AuthFailed);
        }

        match modern_reply.body {
            BcBody {
                payload:
                    Some(BcPayloads::BcXml(BcXml {
                        device_info: Some(device_info),
                        stream_info_list,
                        ..
                    })),
                ..
            } => {
                trace!("Login reply device info: {:?}", device_info);
                self.device_info = Some(device_info);
                self.stream_info = stream_info_list;
            }
            _ => {
                return Err(Error::UnintelligibleReply {
                    reply: std::sync::Arc::new(Box::new(modern_reply)),
                    why: "Expected a DeviceInfo message back from login",
                })
            }
        }

        // All subsequent traffic uses AES with the key derived from the
        // nonce and the password
        let full_key = make_aes_key(&nonce, &self.credentials.password);
        self.context.set_encrypted(EncryptionProtocol::Aes(full_key));
        self.nonce = Some(nonce);

        Ok(())
    }
}
