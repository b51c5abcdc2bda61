use super::model::*;
use super::xml::{BcPayloads, BcXml, Extension};
use super::xml_crypto;
use crate::RX_TIMEOUT;
use err_derive::Error;
use nom::{
    bytes::streaming::take, combinator::*, error::context as error_context, number::streaming::*,
    sequence::*,
};
use std::io::Read;
use time::OffsetDateTime;

type IResult<I, O, E = nom::error::VerboseError<I>> = Result<(I, O), nom::Err<E>>;
type NomErrorType<'a> = crate::NomErrorType<'a>;

/// The error types used during deserialisation
#[derive(Debug, Error, Clone)]
pub enum Error {
    /// A Nom parsing error usually a malformed packet
    #[error(display = "Parsing error: {}", _0)]
    NomError(String),
    /// An IO error such as the stream being dropped
    #[error(display = "I/O error")]
    IoError(#[error(source)] std::sync::Arc<std::io::Error>),
}

impl<'a> From<nom::Err<NomErrorType<'a>>> for Error {
    fn from(k: nom::Err<NomErrorType<'a>>) -> Self {
        let reason = match k {
            nom::Err::Error(e) => format!("Nom Error: {:?}", e),
            nom::Err::Failure(e) => format!("Nom Error: {:?}", e),
            _ => "Unknown Nom error".to_string(),
        };
        Error::NomError(reason)
    }
}

impl From<std::io::Error> for Error {
    fn from(k: std::io::Error) -> Self {
        Error::IoError(std::sync::Arc::new(k))
    }
}

fn read_from_reader<P, O, E, R>(mut parser: P, mut rdr: R) -> Result<O, E>
where
    R: Read,
    E: for<'a> From<nom::Err<NomErrorType<'a>>> + From<std::io::Error>,
    P: FnMut(&[u8]) -> IResult<&[u8], O>,
{
    let mut input: Vec<u8> = Vec::new();
    loop {
        let to_read = match parser(&input) {
            Ok((_, parsed)) => return Ok(parsed),
            Err(nom::Err::Incomplete(needed)) => {
                match needed {
                    nom::Needed::Unknown => std::num::NonZeroUsize::new(1).unwrap(), // read one byte
                    nom::Needed::Size(len) => len,
                }
            }
            Err(e) => return Err(e.into()),
        };

        let start_time = OffsetDateTime::now_utc();
        loop {
            let filled = input.len();
            match (&mut rdr)
                .take(to_read.get() as u64)
                .read_to_end(&mut input)
            {
                Ok(0) => {
                    // A read of zero on a blocking socket means the peer
                    // hung up
                    return Err(std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        "Connection closed",
                    )
                    .into());
                }
                Ok(_) => break,
                Err(e)
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut =>
                {
                    // The socket timed out. If some bytes did arrive, let
                    // the parser recompute what it still needs
                    if input.len() > filled {
                        break;
                    }
                    if (OffsetDateTime::now_utc() - start_time) > RX_TIMEOUT {
                        return Err(std::io::Error::new(
                            std::io::ErrorKind::TimedOut,
                            "Read timed out",
                        )
                        .into());
                    }
                }
                Err(e) => {
                    return Err(e.into());
                }
            }
        }
    }
}

impl Bc {
    pub(crate) fn deserialize<R: Read>(context: &mut BcContext, r: R) -> Result<Bc, Error> {
        // Throw away the nom-specific return types
        read_from_reader(|reader| bc_msg(context, reader), r)
    }
}

fn bc_msg<'a>(context: &mut BcContext, buf: &'a [u8]) -> IResult<&'a [u8], Bc> {
    let (buf, header) = bc_header(buf)?;
    let (buf, body) = bc_body(context, &header, buf)?;

    let bc = Bc {
        meta: header.to_meta(),
        body,
    };

    Ok((buf, bc))
}

fn bc_body<'a>(
    context: &mut BcContext,
    header: &BcHeader,
    buf: &'a [u8],
) -> IResult<&'a [u8], BcBody> {
    use nom::{
        error::{ContextError, ErrorKind, ParseError},
        Err,
    };

    fn make_error<I, E: ParseError<I>>(input: I, ctx: &'static str, kind: ErrorKind) -> E
    where
        I: std::marker::Copy,
        E: ContextError<I>,
    {
        E::add_context(input, ctx, E::from_error_kind(input, kind))
    }

    // Classes without the payload offset word put everything in the payload
    let ext_len = header.payload_offset.unwrap_or(0);
    let payload_len = match header.body_len.checked_sub(ext_len) {
        Some(len) => len,
        None => {
            return Err(Err::Error(make_error(
                buf,
                "Payload offset longer than body",
                ErrorKind::Verify,
            )));
        }
    };

    let (buf, ext_buf) = take(ext_len)(buf)?;
    let (buf, payload_buf) = take(payload_len)(buf)?;

    let extension = if ext_len > 0 {
        let decrypted = xml_crypto::decrypt(header.enc_offset, ext_buf, context.get_encrypted());
        let parsed = Extension::try_parse(decrypted.as_slice()).map_err(|_| {
            Err::Error(make_error(
                buf,
                "Unable to parse Extension XML",
                ErrorKind::MapRes,
            ))
        })?;
        if let Extension {
            binary_data: Some(1),
            ..
        } = &parsed
        {
            context.binary_on(header.msg_id);
        }
        Some(parsed)
    } else {
        None
    };

    // The payload block is either xml or binary depending on what the
    // message id has negotiated. Binary payloads are returned raw; their
    // encryption is described by the extension and belongs to the
    // stream layer
    let payload;
    if payload_len > 0 {
        if context.in_bin_mode.contains(&header.msg_id) {
            payload = Some(BcPayloads::Binary(payload_buf.to_vec()));
        } else {
            let decrypted =
                xml_crypto::decrypt(header.enc_offset, payload_buf, context.get_encrypted());
            let xml = BcXml::try_parse(decrypted.as_slice()).map_err(|_| {
                Err::Error(make_error(
                    buf,
                    "Unable to parse Payload XML",
                    ErrorKind::MapRes,
                ))
            })?;
            payload = Some(BcPayloads::BcXml(xml));
        }
    } else {
        payload = None;
    }

    Ok((buf, BcBody { extension, payload }))
}

fn bc_header(buf: &[u8]) -> IResult<&[u8], BcHeader> {
    let (buf, _magic) =
        error_context("Magic invalid", verify(le_u32, |x| *x == MAGIC_HEADER))(buf)?;
    let (buf, (msg_id, body_len, enc_offset)) =
        error_context("Header is too short", tuple((le_u32, le_u32, le_u32)))(buf)?;
    let (buf, response_code) = error_context("ResponseCode missing", le_u16)(buf)?;
    let (buf, class) = error_context(
        "Unknown message class",
        verify(le_u16, |c| is_known_class(*c)),
    )(buf)?;

    let (buf, payload_offset) = error_context(
        "Payload offset is missing",
        cond(has_payload_offset(class), le_u32),
    )(buf)?;

    Ok((
        buf,
        BcHeader {
            body_len,
            msg_id,
            enc_offset,
            response_code,
            class,
            payload_offset,
        },
    ))
}
