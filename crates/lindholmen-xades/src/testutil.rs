#![forbid(unsafe_code)]

//! Hand-assembled DER fixtures for unit tests.

use lindholmen_crypto::encoding::encode_base64;
use lindholmen_crypto::DigestMethod;

pub(crate) fn sha256_b64(data: &[u8]) -> String {
    encode_base64(&DigestMethod::Sha256.digest(data).unwrap())
}

pub(crate) fn tlv(tag: u8, content: &[u8]) -> Vec<u8> {
    let mut out = vec![tag];
    let len = content.len();
    if len < 0x80 {
        out.push(len as u8);
    } else {
        let bytes: Vec<u8> = len.to_be_bytes().into_iter().skip_while(|b| *b == 0).collect();
        out.push(0x80 | bytes.len() as u8);
        out.extend(bytes);
    }
    out.extend_from_slice(content);
    out
}

pub(crate) fn seq(parts: &[Vec<u8>]) -> Vec<u8> {
    tlv(0x30, &parts.concat())
}

fn set(parts: &[Vec<u8>]) -> Vec<u8> {
    tlv(0x31, &parts.concat())
}

pub(crate) fn oid(arcs: &[u64]) -> Vec<u8> {
    let mut body = vec![(arcs[0] * 40 + arcs[1]) as u8];
    for &arc in &arcs[2..] {
        let mut chunk = vec![(arc & 0x7f) as u8];
        let mut rest = arc >> 7;
        while rest > 0 {
            chunk.push(0x80 | (rest & 0x7f) as u8);
            rest >>= 7;
        }
        chunk.reverse();
        body.extend(chunk);
    }
    tlv(0x06, &body)
}

fn null() -> Vec<u8> {
    vec![0x05, 0x00]
}

fn name(cn: &str) -> Vec<u8> {
    seq(&[set(&[seq(&[oid(&[2, 5, 4, 3]), tlv(0x0c, cn.as_bytes())])])])
}

/// A syntactically valid v3 certificate with no extensions and a dummy key.
pub(crate) fn certificate(subject: &str, issuer: &str, not_after_utc: &str, serial: u8) -> Vec<u8> {
    let sig_alg = seq(&[oid(&[1, 2, 840, 113549, 1, 1, 11]), null()]);
    let tbs = seq(&[
        tlv(0xa0, &tlv(0x02, &[2])),
        tlv(0x02, &[serial]),
        sig_alg.clone(),
        name(issuer),
        seq(&[tlv(0x17, b"200101000000Z"), tlv(0x17, not_after_utc.as_bytes())]),
        name(subject),
        seq(&[
            seq(&[oid(&[1, 2, 840, 113549, 1, 1, 1]), null()]),
            tlv(0x03, &[0x00, 0x30, 0x03, 0x02, 0x01, 0x03]),
        ]),
    ]);
    seq(&[tbs, sig_alg, tlv(0x03, &[0x00, 0x01, 0x02, 0x03])])
}

/// A CMS SignedData timestamp token whose TSTInfo carries `imprint`.
pub(crate) fn timestamp_token(method: DigestMethod, imprint: &[u8], gen_time: &str) -> Vec<u8> {
    let tst_info = seq(&[
        tlv(0x02, &[1]),
        oid(&[1, 2, 3, 4]),
        seq(&[seq(&[oid(method.oid()), null()]), tlv(0x04, imprint)]),
        tlv(0x02, &[0x01, 0x23]),
        tlv(0x18, gen_time.as_bytes()),
    ]);
    let signed_data = seq(&[
        tlv(0x02, &[3]),
        set(&[seq(&[oid(method.oid())])]),
        seq(&[
            oid(&[1, 2, 840, 113549, 1, 9, 16, 1, 4]),
            tlv(0xa0, &tlv(0x04, &tst_info)),
        ]),
        set(&[]),
    ]);
    seq(&[oid(&[1, 2, 840, 113549, 1, 7, 2]), tlv(0xa0, &signed_data)])
}
