/*!
 * Eddystone URL compression.
 *
 * The first byte selects a scheme prefix. In the body, any byte below 14
 * stands for one of the expansion strings; every other byte is a literal
 * ASCII character.
 */
use thingy_core::error::{Error, Result};

/// Scheme prefixes, indexed by their code
pub const PREFIXES: [&str; 4] = ["http://www.", "https://www.", "http://", "https://"];

/// Expansion strings, indexed by their code
pub const EXPANSIONS: [&str; 14] = [
    ".com/", ".org/", ".edu/", ".net/", ".info/", ".biz/", ".gov/", ".com", ".org", ".edu", ".net",
    ".info", ".biz", ".gov",
];

/// Longest compacted body the beacon slot accepts
pub const MAX_BODY_LEN: usize = 14;

/// Compress `url` into its prefix code followed by the compacted body
pub fn encode_url(url: &str) -> Result<Vec<u8>> {
    let (code, prefix) = PREFIXES
        .iter()
        .enumerate()
        .find(|(_, prefix)| url.starts_with(*prefix))
        .ok_or_else(|| Error::validation(format!("URL '{}' has no supported scheme prefix", url)))?;

    let mut body = Vec::with_capacity(MAX_BODY_LEN);
    let mut rest = &url[prefix.len()..];
    while !rest.is_empty() {
        if let Some((code, expansion)) = EXPANSIONS
            .iter()
            .enumerate()
            .find(|(_, expansion)| rest.starts_with(*expansion))
        {
            body.push(code as u8);
            rest = &rest[expansion.len()..];
            continue;
        }

        let mut chars = rest.chars();
        match chars.next() {
            Some(c) if c.is_ascii_graphic() => body.push(c as u8),
            Some(c) => {
                return Err(Error::validation(format!(
                    "URL contains a character that can't be encoded: {:?}",
                    c
                )))
            }
            None => break,
        }
        rest = chars.as_str();
    }

    if body.is_empty() {
        return Err(Error::validation("URL has nothing after the scheme prefix"));
    }
    if body.len() > MAX_BODY_LEN {
        return Err(Error::validation(format!(
            "compacted URL is {} bytes, the maximum is {}",
            body.len(),
            MAX_BODY_LEN
        )));
    }

    let mut out = Vec::with_capacity(body.len() + 1);
    out.push(code as u8);
    out.extend_from_slice(&body);
    Ok(out)
}

/// Expand a compacted URL
pub fn decode_url(raw: &[u8]) -> Result<String> {
    let (&code, body) = raw
        .split_first()
        .ok_or_else(|| Error::decode("eddystone payload is empty"))?;
    let prefix = PREFIXES
        .get(usize::from(code))
        .ok_or_else(|| Error::decode(format!("unknown URL prefix code {}", code)))?;

    let mut url = String::from(*prefix);
    for &byte in body {
        match EXPANSIONS.get(usize::from(byte)) {
            Some(expansion) => url.push_str(expansion),
            None if byte.is_ascii_graphic() => url.push(char::from(byte)),
            None => {
                return Err(Error::decode(format!(
                    "byte 0x{:02x} is neither an expansion code nor printable ASCII",
                    byte
                )))
            }
        }
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let url = "https://example.com/";
        let encoded = encode_url(url).unwrap();
        assert_eq!(encoded, vec![3, b'e', b'x', b'a', b'm', b'p', b'l', b'e', 0]);
        assert_eq!(decode_url(&encoded).unwrap(), url);
    }

    #[test]
    fn test_prefix_selection() {
        assert_eq!(encode_url("http://www.nordicsemi.com").unwrap()[0], 0);
        assert_eq!(encode_url("https://www.nordicsemi.com").unwrap()[0], 1);
        assert_eq!(encode_url("http://goo.gl/pIWdir").unwrap()[0], 2);
    }

    #[test]
    fn test_expansion_in_the_middle() {
        let encoded = encode_url("https://www.abc.org/x").unwrap();
        assert_eq!(encoded, vec![1, b'a', b'b', b'c', 1, b'x']);
        assert_eq!(decode_url(&encoded).unwrap(), "https://www.abc.org/x");
    }

    #[test]
    fn test_rejects_long_body() {
        let err = encode_url("https://averyveryverylongname.io").unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        // Expansions count as a single byte each
        assert!(encode_url("https://abcdefghijklm.com/").is_ok());
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(matches!(encode_url("ftp://example.com"), Err(Error::Validation(_))));
        assert!(matches!(encode_url("https://"), Err(Error::Validation(_))));
        assert!(matches!(encode_url("https://exa mple.com"), Err(Error::Validation(_))));
        assert!(matches!(decode_url(&[]), Err(Error::Decode(_))));
        assert!(matches!(decode_url(&[4, b'a']), Err(Error::Decode(_))));
        assert!(matches!(decode_url(&[3, 0x1F]), Err(Error::Decode(_))));
    }
}
