#![forbid(unsafe_code)]

//! BER parsing of RFC 3161 timestamp tokens.
//!
//! Only the path to the TSTInfo is read: ContentInfo → SignedData →
//! encapContentInfo → eContent. The CMS signature itself is not checked.

use crate::report::{display, hex_bytes};
use lindholmen_core::{Error, Result};
use lindholmen_crypto::DigestMethod;
use serde::Serialize;
use yasna::models::ObjectIdentifier;
use yasna::{ASN1Error, ASN1ErrorKind, BERReader, Tag};

const OID_SIGNED_DATA: &[u64] = &[1, 2, 840, 113549, 1, 7, 2];
const OID_TST_INFO: &[u64] = &[1, 2, 840, 113549, 1, 9, 16, 1, 4];

fn oid(components: &[u64]) -> ObjectIdentifier {
    ObjectIdentifier::from_slice(components)
}

fn dotted(oid: &ObjectIdentifier) -> String {
    let arcs: Vec<String> = oid.components().iter().map(u64::to_string).collect();
    arcs.join(".")
}

/// The fields of a TSTInfo that validation needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TstInfo {
    pub policy: String,
    /// Dotted OID of the message imprint hash algorithm.
    pub digest_oid: String,
    #[serde(skip)]
    pub digest_method: Option<DigestMethod>,
    #[serde(serialize_with = "hex_bytes")]
    pub message_imprint: Vec<u8>,
    #[serde(serialize_with = "hex_bytes")]
    pub serial_number: Vec<u8>,
    #[serde(serialize_with = "display")]
    pub gen_time: der::DateTime,
}

/// Parse a DER/BER encoded timestamp token down to its TSTInfo.
pub fn parse_timestamp_token(token: &[u8]) -> Result<TstInfo> {
    let econtent = yasna::parse_ber(token, |r| {
        r.read_sequence(|r| {
            let content_type = r.next().read_oid()?;
            if content_type != oid(OID_SIGNED_DATA) {
                return Err(ASN1Error::new(ASN1ErrorKind::Invalid));
            }
            // [0] EXPLICIT SignedData
            r.next().read_tagged(Tag::context(0), parse_signed_data)
        })
    })
    .map_err(|e| Error::Asn1(format!("failed to parse timestamp token: {e}")))?;
    parse_tst_info(&econtent)
}

fn parse_signed_data(r: BERReader) -> std::result::Result<Vec<u8>, ASN1Error> {
    r.read_sequence(|r| {
        let _version = r.next().read_u32()?;
        let _digest_algorithms = r.next().read_der()?;
        let econtent = r.next().read_sequence(|r| {
            let econtent_type = r.next().read_oid()?;
            if econtent_type != oid(OID_TST_INFO) {
                return Err(ASN1Error::new(ASN1ErrorKind::Invalid));
            }
            r.next().read_tagged(Tag::context(0), |r| r.read_bytes())
        })?;
        // certificates, crls, signerInfos
        while r.read_optional(|r| r.read_der())?.is_some() {}
        Ok(econtent)
    })
}

fn parse_tst_info(data: &[u8]) -> Result<TstInfo> {
    let (policy, algorithm, message_imprint, serial, gen_time) = yasna::parse_ber(data, |r| {
        r.read_sequence(|r| {
            let _version = r.next().read_u32()?;
            let policy = r.next().read_oid()?;
            let (algorithm, imprint) = r.next().read_sequence(|r| {
                let algorithm = r.next().read_sequence(|r| {
                    let algorithm = r.next().read_oid()?;
                    r.read_optional(|r| r.read_null())?;
                    Ok(algorithm)
                })?;
                let imprint = r.next().read_bytes()?;
                Ok((algorithm, imprint))
            })?;
            let serial = r.next().read_der()?;
            let gen_time = r.next().read_der()?;
            // accuracy, ordering, nonce, tsa, extensions
            while r.read_optional(|r| r.read_der())?.is_some() {}
            Ok((policy, algorithm, imprint, serial, gen_time))
        })
    })
    .map_err(|e| Error::Asn1(format!("failed to parse TSTInfo: {e}")))?;

    Ok(TstInfo {
        policy: dotted(&policy),
        digest_oid: dotted(&algorithm),
        digest_method: DigestMethod::from_oid(algorithm.components()).ok(),
        message_imprint,
        serial_number: tlv_content(&serial)?.to_vec(),
        gen_time: parse_generalized_time(tlv_content(&gen_time)?)?,
    })
}

/// The content octets of a single definite-length TLV.
pub(crate) fn tlv_content(tlv: &[u8]) -> Result<&[u8]> {
    let truncated = || Error::Asn1("truncated DER element".into());
    let first = *tlv.get(1).ok_or_else(truncated)?;
    let start = if first < 0x80 {
        2
    } else {
        2 + usize::from(first & 0x7f)
    };
    tlv.get(start..).ok_or_else(truncated)
}

/// `YYYYMMDDHHMMSS[.fff]Z`; fractional seconds are dropped.
fn parse_generalized_time(content: &[u8]) -> Result<der::DateTime> {
    let invalid = || Error::Asn1(format!("invalid GeneralizedTime: {}", String::from_utf8_lossy(content)));
    let text = std::str::from_utf8(content).map_err(|_| invalid())?;
    let text = text.strip_suffix('Z').ok_or_else(invalid)?;
    let whole = text.split_once('.').map_or(text, |(whole, _)| whole);
    if whole.len() != 14 || !whole.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    let field = |from: usize, to: usize| whole[from..to].parse::<u16>().map_err(|_| invalid());
    let small = |from: usize, to: usize| field(from, to).map(|v| v as u8);
    der::DateTime::new(
        field(0, 4)?,
        small(4, 6)?,
        small(6, 8)?,
        small(8, 10)?,
        small(10, 12)?,
        small(12, 14)?,
    )
    .map_err(|e| Error::Asn1(format!("invalid GeneralizedTime: {e}")))
}
