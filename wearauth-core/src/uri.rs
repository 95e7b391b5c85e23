//! `otpauth://` provisioning URI parsing and serialization.

use crate::account::{OtpAccount, OtpKind, MAX_DIGITS, MAX_PERIOD, MIN_DIGITS, MIN_PERIOD};
use crate::{base32, AuthenticatorError, Result};
use tracing::{debug, warn};

/// Parse an `otpauth://{totp|hotp}/{label}?...` URI into a credential.
///
/// Any violation is a total failure: a partially-populated credential is
/// never returned. The label splits on the first colon into issuer and
/// account name; a non-empty `issuer` query parameter overrides the label
/// issuer. An unrecognized authority falls back to TOTP rather than failing.
pub fn parse_otpauth_uri(uri: &str) -> Result<OtpAccount> {
    let trimmed = uri.trim();
    let (scheme, rest) = trimmed
        .split_once("://")
        .ok_or_else(|| parse_error("URI must start with otpauth://"))?;
    if !scheme.eq_ignore_ascii_case("otpauth") {
        return Err(parse_error("URI must start with otpauth://"));
    }

    let (authority, remainder) = match rest.split_once('/') {
        Some((authority, remainder)) => (authority, remainder),
        None => (rest, ""),
    };
    if !authority.eq_ignore_ascii_case("totp") && !authority.eq_ignore_ascii_case("hotp") {
        warn!(authority, "unrecognized otpauth authority, treating as totp");
    }
    let kind = OtpKind::from_wire(authority);

    let (label_raw, query_raw) = match remainder.split_once('?') {
        Some((label, query)) => (label, query),
        None => (remainder, ""),
    };

    let label = percent_decode(label_raw)?;
    let (mut issuer, name) = match label.split_once(':') {
        Some((issuer, name)) => (issuer.trim().to_string(), name.trim().to_string()),
        None => (String::new(), label.trim().to_string()),
    };

    let mut secret = None;
    let mut algorithm = "SHA1".to_string();
    let mut digits: u32 = 6;
    let mut period: u32 = 30;
    let mut counter: u64 = 0;

    for pair in query_raw.split('&').filter(|part| !part.is_empty()) {
        let (key_raw, value_raw) = pair.split_once('=').unwrap_or((pair, ""));
        let key = percent_decode(key_raw)?.to_ascii_lowercase();
        let value = percent_decode(value_raw)?;
        if value.trim().is_empty() {
            continue;
        }

        match key.as_str() {
            "secret" => secret = Some(value),
            "issuer" => issuer = value.trim().to_string(),
            "algorithm" => algorithm = value.trim().to_string(),
            "digits" => {
                digits = value
                    .trim()
                    .parse::<u32>()
                    .map_err(|_| parse_error("digits must be numeric"))?;
            }
            "period" => {
                period = value
                    .trim()
                    .parse::<u32>()
                    .map_err(|_| parse_error("period must be numeric"))?;
            }
            "counter" => {
                counter = value
                    .trim()
                    .parse::<u64>()
                    .map_err(|_| parse_error("counter must be numeric"))?;
            }
            _ => {}
        }
    }

    if !(MIN_DIGITS..=MAX_DIGITS).contains(&digits) {
        return Err(parse_error("digits out of range"));
    }
    if !(MIN_PERIOD..=MAX_PERIOD).contains(&period) {
        return Err(parse_error("period out of range"));
    }

    let secret = secret.ok_or_else(|| parse_error("missing secret parameter"))?;
    let secret = base32::normalize(&secret)
        .map_err(|_| parse_error("secret must be valid base32"))?;

    debug!(%kind, issuer = %issuer, name = %name, "parsed otpauth uri");

    Ok(OtpAccount {
        id: None,
        name,
        issuer,
        secret,
        algorithm,
        digits,
        period,
        kind,
        counter,
    })
}

/// Build the provisioning URI for a credential, the inverse of
/// `parse_otpauth_uri` modulo `id`. HOTP credentials carry their counter.
pub fn serialize_otpauth_uri(account: &OtpAccount) -> String {
    let label = if account.issuer.is_empty() {
        percent_encode(&account.name)
    } else {
        format!(
            "{}:{}",
            percent_encode(&account.issuer),
            percent_encode(&account.name)
        )
    };

    let mut uri = format!(
        "otpauth://{}/{}?secret={}",
        account.kind.as_str().to_ascii_lowercase(),
        label,
        account.secret
    );
    if !account.issuer.is_empty() {
        uri.push_str("&issuer=");
        uri.push_str(&percent_encode(&account.issuer));
    }
    uri.push_str("&algorithm=");
    uri.push_str(&percent_encode(&account.algorithm));
    uri.push_str(&format!("&digits={}", account.digits));
    uri.push_str(&format!("&period={}", account.period));
    if account.kind == OtpKind::Hotp {
        uri.push_str(&format!("&counter={}", account.counter));
    }
    uri
}

fn parse_error(message: &str) -> AuthenticatorError {
    AuthenticatorError::Parse(message.to_string())
}

fn percent_decode(input: &str) -> Result<String> {
    fn from_hex(byte: u8) -> Option<u8> {
        match byte {
            b'0'..=b'9' => Some(byte - b'0'),
            b'a'..=b'f' => Some(byte - b'a' + 10),
            b'A'..=b'F' => Some(byte - b'A' + 10),
            _ => None,
        }
    }

    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                if i + 2 >= bytes.len() {
                    return Err(parse_error("invalid percent encoding"));
                }
                let hi = from_hex(bytes[i + 1]).ok_or_else(|| parse_error("invalid percent encoding"))?;
                let lo = from_hex(bytes[i + 2]).ok_or_else(|| parse_error("invalid percent encoding"))?;
                out.push((hi << 4) | lo);
                i += 3;
            }
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            other => {
                out.push(other);
                i += 1;
            }
        }
    }

    String::from_utf8(out).map_err(|_| parse_error("URI contains invalid UTF-8"))
}

fn percent_encode(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for &byte in input.as_bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(byte as char);
            }
            other => out.push_str(&format!("%{:02X}", other)),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_all_fields() {
        let account = parse_otpauth_uri(
            "otpauth://totp/Acme:alice%40example.com?secret=JBSWY3DPEHPK3PXP&issuer=Acme&algorithm=SHA256&digits=8&period=45",
        )
        .unwrap();

        assert_eq!(account.kind, OtpKind::Totp);
        assert_eq!(account.issuer, "Acme");
        assert_eq!(account.name, "alice@example.com");
        assert_eq!(account.secret, "JBSWY3DPEHPK3PXP");
        assert_eq!(account.algorithm, "SHA256");
        assert_eq!(account.digits, 8);
        assert_eq!(account.period, 45);
    }

    #[test]
    fn test_parse_defaults() {
        let account =
            parse_otpauth_uri("otpauth://totp/alice@example.com?secret=JBSWY3DPEHPK3PXP").unwrap();

        assert_eq!(account.issuer, "");
        assert_eq!(account.name, "alice@example.com");
        assert_eq!(account.algorithm, "SHA1");
        assert_eq!(account.digits, 6);
        assert_eq!(account.period, 30);
        assert_eq!(account.counter, 0);
    }

    #[test]
    fn test_query_issuer_overrides_label_issuer() {
        let account = parse_otpauth_uri(
            "otpauth://totp/Acme:alice?secret=JBSWY3DPEHPK3PXP&issuer=Example",
        )
        .unwrap();
        assert_eq!(account.issuer, "Example");
    }

    #[test]
    fn test_label_issuer_is_fallback() {
        let account =
            parse_otpauth_uri("otpauth://totp/Acme:alice?secret=JBSWY3DPEHPK3PXP").unwrap();
        assert_eq!(account.issuer, "Acme");
        assert_eq!(account.name, "alice");
    }

    #[test]
    fn test_label_splits_on_first_colon_only() {
        let account = parse_otpauth_uri(
            "otpauth://totp/Acme:alice:work?secret=JBSWY3DPEHPK3PXP",
        )
        .unwrap();
        assert_eq!(account.issuer, "Acme");
        assert_eq!(account.name, "alice:work");
    }

    #[test]
    fn test_parse_hotp_with_counter() {
        let account =
            parse_otpauth_uri("otpauth://hotp/alice?secret=JBSWY3DPEHPK3PXP&counter=42").unwrap();
        assert_eq!(account.kind, OtpKind::Hotp);
        assert_eq!(account.counter, 42);
    }

    #[test]
    fn test_unrecognized_authority_falls_back_to_totp() {
        let account =
            parse_otpauth_uri("otpauth://motp/alice?secret=JBSWY3DPEHPK3PXP").unwrap();
        assert_eq!(account.kind, OtpKind::Totp);
    }

    #[test]
    fn test_unvalidated_algorithm_is_kept() {
        let account =
            parse_otpauth_uri("otpauth://totp/alice?secret=JBSWY3DPEHPK3PXP&algorithm=MD5")
                .unwrap();
        assert_eq!(account.algorithm, "MD5");
    }

    #[test]
    fn test_parse_rejections() {
        let rejected = [
            "https://totp/alice?secret=JBSWY3DPEHPK3PXP",
            "otpauth://totp/alice",
            "otpauth://totp/alice?secret=",
            "otpauth://totp/alice?secret=not%20base32!",
            "otpauth://totp/alice?secret=JBSWY3DPEHPK3PXP&digits=3",
            "otpauth://totp/alice?secret=JBSWY3DPEHPK3PXP&digits=11",
            "otpauth://totp/alice?secret=JBSWY3DPEHPK3PXP&digits=six",
            "otpauth://totp/alice?secret=JBSWY3DPEHPK3PXP&period=0",
            "otpauth://totp/alice?secret=JBSWY3DPEHPK3PXP&period=301",
            "otpauth://totp/alice%2?secret=JBSWY3DPEHPK3PXP",
        ];
        for uri in rejected {
            assert!(parse_otpauth_uri(uri).is_err(), "should reject {}", uri);
        }
    }

    #[test]
    fn test_serialize_parse_round_trip() {
        let account = OtpAccount {
            name: "alice@example.com".to_string(),
            issuer: "Acme Corp".to_string(),
            secret: "JBSWY3DPEHPK3PXP".to_string(),
            algorithm: "SHA256".to_string(),
            digits: 8,
            period: 45,
            ..OtpAccount::default()
        };

        let uri = serialize_otpauth_uri(&account);
        let parsed = parse_otpauth_uri(&uri).unwrap();
        assert_eq!(parsed, account);
    }

    #[test]
    fn test_serialize_parse_round_trip_hotp() {
        let account = OtpAccount {
            name: "bob".to_string(),
            issuer: "Example".to_string(),
            secret: "JBSWY3DPEHPK3PXP".to_string(),
            kind: OtpKind::Hotp,
            counter: 7,
            ..OtpAccount::default()
        };

        let uri = serialize_otpauth_uri(&account);
        assert!(uri.starts_with("otpauth://hotp/"));
        let parsed = parse_otpauth_uri(&uri).unwrap();
        assert_eq!(parsed, account);
    }

    #[test]
    fn test_serialize_without_issuer() {
        let account = OtpAccount {
            name: "alice".to_string(),
            secret: "JBSWY3DPEHPK3PXP".to_string(),
            ..OtpAccount::default()
        };

        let uri = serialize_otpauth_uri(&account);
        assert!(uri.starts_with("otpauth://totp/alice?secret="));
        assert!(!uri.contains("issuer="));
        assert_eq!(parse_otpauth_uri(&uri).unwrap(), account);
    }

    #[test]
    fn test_plus_decodes_to_space() {
        let account =
            parse_otpauth_uri("otpauth://totp/Acme+Inc:alice?secret=JBSWY3DPEHPK3PXP").unwrap();
        assert_eq!(account.issuer, "Acme Inc");
    }
}
