//! AWS Signature Version 4 for Product Advertising API requests.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::error::IngestError;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";

type HmacSha256 = Hmac<Sha256>;

pub(crate) struct SigV4Signer<'a> {
    pub access_key: &'a str,
    pub secret_key: &'a str,
    pub region: &'a str,
    pub service: &'a str,
}

impl SigV4Signer<'_> {
    /// Returns the headers to send: the given `headers` plus `x-amz-date`
    /// and `Authorization`. `host` must be included in `headers`.
    ///
    /// Header names are lowercased; values are trimmed.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Signing`] if the MAC cannot be keyed.
    pub fn sign(
        &self,
        method: &str,
        path: &str,
        headers: &[(&str, String)],
        payload: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<(String, String)>, IngestError> {
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date = now.format("%Y%m%d").to_string();

        let mut all: Vec<(String, String)> = headers
            .iter()
            .map(|(name, value)| (name.to_ascii_lowercase(), value.trim().to_string()))
            .collect();
        all.push(("x-amz-date".to_string(), amz_date.clone()));
        all.sort_by(|a, b| a.0.cmp(&b.0));

        let canonical_headers: String = all
            .iter()
            .map(|(name, value)| format!("{name}:{value}\n"))
            .collect();
        let signed_headers = all
            .iter()
            .map(|(name, _)| name.as_str())
            .collect::<Vec<_>>()
            .join(";");

        let canonical_request = format!(
            "{method}\n{path}\n\n{canonical_headers}\n{signed_headers}\n{}",
            hex::encode(Sha256::digest(payload.as_bytes()))
        );

        let scope = format!("{date}/{}/{}/aws4_request", self.region, self.service);
        let string_to_sign = format!(
            "{ALGORITHM}\n{amz_date}\n{scope}\n{}",
            hex::encode(Sha256::digest(canonical_request.as_bytes()))
        );

        let signature = hex::encode(hmac_sha256(
            &self.signing_key(&date)?,
            string_to_sign.as_bytes(),
        )?);

        all.push((
            "authorization".to_string(),
            format!(
                "{ALGORITHM} Credential={}/{scope}, SignedHeaders={signed_headers}, Signature={signature}",
                self.access_key
            ),
        ));
        // reqwest derives Host from the URL.
        all.retain(|(name, _)| name != "host");
        Ok(all)
    }

    fn signing_key(&self, date: &str) -> Result<[u8; 32], IngestError> {
        let k_date = hmac_sha256(format!("AWS4{}", self.secret_key).as_bytes(), date.as_bytes())?;
        let k_region = hmac_sha256(&k_date, self.region.as_bytes())?;
        let k_service = hmac_sha256(&k_region, self.service.as_bytes())?;
        hmac_sha256(&k_service, b"aws4_request")
    }
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<[u8; 32], IngestError> {
    let mut mac =
        HmacSha256::new_from_slice(key).map_err(|e| IngestError::Signing(e.to_string()))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().into())
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn hmac_matches_rfc4231_case_2() {
        let mac = hmac_sha256(b"Jefe", b"what do ya want for nothing?").unwrap();
        assert_eq!(
            hex::encode(mac),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn hmac_hashes_long_keys() {
        let key = [0xaau8; 131];
        let mac = hmac_sha256(
            &key,
            b"Test Using Larger Than Block-Size Key - Hash Key First",
        )
        .unwrap();
        assert_eq!(
            hex::encode(mac),
            "60e431591ee0b67f0d8a26aacbf5b77f8e0bc6213728c5140546040f0ee37f54"
        );
    }

    #[test]
    fn signing_key_matches_aws_example() {
        let signer = SigV4Signer {
            access_key: "AKIDEXAMPLE",
            secret_key: "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY",
            region: "us-east-1",
            service: "iam",
        };
        assert_eq!(
            hex::encode(signer.signing_key("20120215").unwrap()),
            "f4780e2d9f65fa895f9c67b32ce1baf0b0d8a43505a000a1a9e090d414db404d"
        );
    }

    #[test]
    fn sign_emits_date_and_authorization_without_host() {
        let signer = SigV4Signer {
            access_key: "AKIDEXAMPLE",
            secret_key: "secret",
            region: "us-east-1",
            service: "ProductAdvertisingAPI",
        };
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();
        let headers = signer.sign(
            "POST",
            "/paapi5/searchitems",
            &[
                ("Host", "webservices.amazon.com.mx".to_string()),
                ("Content-Type", "application/json; charset=utf-8".to_string()),
            ],
            "{}",
            now,
        )
        .unwrap();

        let get = |name: &str| {
            headers
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v.as_str())
        };
        assert_eq!(get("x-amz-date"), Some("20240501T123000Z"));
        assert!(get("host").is_none());
        let auth = get("authorization").unwrap();
        assert!(auth.starts_with(
            "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20240501/us-east-1/ProductAdvertisingAPI/aws4_request, "
        ));
        assert!(auth.contains("SignedHeaders=content-type;host;x-amz-date, "));
        let signature = auth.rsplit("Signature=").next().unwrap();
        assert_eq!(signature.len(), 64);
    }

    #[test]
    fn signature_changes_with_payload() {
        let signer = SigV4Signer {
            access_key: "a",
            secret_key: "b",
            region: "us-east-1",
            service: "ProductAdvertisingAPI",
        };
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let host = [("host", "example.com".to_string())];
        let one = signer.sign("POST", "/", &host, "{\"a\":1}", now).unwrap();
        let two = signer.sign("POST", "/", &host, "{\"a\":2}", now).unwrap();
        assert_ne!(one, two);
    }
}
