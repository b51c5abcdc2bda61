use super::model::*;
use super::xml::BcPayloads;
use super::xml_crypto;
use cookie_factory::bytes::*;
use cookie_factory::sequence::tuple;
use cookie_factory::{combinator::*, gen};
use cookie_factory::{GenError, SerializeFn, WriteContext};
use std::io::Write;

impl Bc {
    pub(crate) fn serialize<W: Write>(
        &self,
        buf: W,
        encryption_protocol: &EncryptionProtocol,
    ) -> Result<W, GenError> {
        // Ideally this would be a combinator, but we have to serialize the
        // XML to have the lengths needed to build the header
        let enc_offset = self.meta.enc_offset();

        // First serialize ext
        let (body_buf, ext_len) = gen(
            opt_ref(&self.body.extension, |ext| {
                bc_ext(enc_offset, ext, encryption_protocol)
            }),
            vec![],
        )?;

        // Now get the offset of the payload
        let payload_offset = if has_payload_offset(self.meta.class) {
            // If we're required to put the offset word, put 0 when there
            // is no extension
            Some(if self.body.extension.is_some() {
                ext_len as u32
            } else {
                0
            })
        } else {
            None
        };

        // Now add the payload part of the body to the ext buffer
        let (body_buf, _) = gen(
            opt_ref(&self.body.payload, |payload| {
                bc_payload(enc_offset, payload, encryption_protocol)
            }),
            body_buf,
        )?;

        // Now have enough info to create the header
        let header = BcHeader::from_meta(&self.meta, body_buf.len() as u32, payload_offset);

        let (buf, _n) = gen(tuple((bc_header(&header), slice(body_buf))), buf)?;

        Ok(buf)
    }
}

fn bc_ext<W: Write>(
    enc_offset: u32,
    xml: &Extension,
    encryption_protocol: &EncryptionProtocol,
) -> impl SerializeFn<W> {
    // Extension xml is schema bound; failure to serialize it is a
    // programmer error
    let xml_bytes = xml.serialize(vec![]).unwrap();
    let enc_bytes = xml_crypto::encrypt(enc_offset, &xml_bytes, encryption_protocol);
    slice(enc_bytes)
}

fn bc_payload<W: Write>(
    enc_offset: u32,
    payload: &BcPayloads,
    encryption_protocol: &EncryptionProtocol,
) -> impl SerializeFn<W> {
    let payload_bytes = match payload {
        BcPayloads::BcXml(x) => {
            let xml_bytes = x.serialize(vec![]).unwrap();
            xml_crypto::encrypt(enc_offset, &xml_bytes, encryption_protocol)
        }
        // Binary payloads go out as given; their encryption is described
        // by the extension and is applied by the sender
        BcPayloads::Binary(x) => x.to_owned(),
    };
    slice(payload_bytes)
}

fn bc_header<W: Write>(header: &BcHeader) -> impl SerializeFn<W> {
    tuple((
        le_u32(MAGIC_HEADER),
        le_u32(header.msg_id),
        le_u32(header.body_len),
        le_u32(header.enc_offset),
        le_u16(header.response_code),
        le_u16(header.class),
        opt(header.payload_offset, le_u32),
    ))
}

/// Applies the supplied serializer with the Option's interior data if present
fn opt<W, T, F>(opt: Option<T>, ser: impl Fn(T) -> F) -> impl SerializeFn<W>
where
    F: SerializeFn<W>,
    T: Copy,
    W: Write,
{
    move |buf: WriteContext<W>| {
        if let Some(val) = opt {
            ser(val)(buf)
        } else {
            do_nothing()(buf)
        }
    }
}

fn opt_ref<'a, W, T, F, S>(opt: &'a Option<T>, ser: S) -> impl SerializeFn<W> + 'a
where
    F: SerializeFn<W>,
    W: Write,
    S: Fn(&'a T) -> F + 'a,
{
    move |buf: WriteContext<W>| {
        if let Some(ref val) = opt {
            ser(val)(buf)
        } else {
            do_nothing()(buf)
        }
    }
}

/// A serializer combinator that does nothing with its input
fn do_nothing<W>() -> impl SerializeFn<W> {
    Ok
}
