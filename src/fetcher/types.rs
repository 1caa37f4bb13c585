use bytes::Bytes;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Charset {
    Utf8,
    Windows1252,
    ShiftJis,
    Gbk,
    Big5,
    Other(String),
}

impl Charset {
    pub fn from_encoding(encoding: &'static encoding_rs::Encoding) -> Self {
        if encoding == encoding_rs::UTF_8 {
            Self::Utf8
        } else if encoding == encoding_rs::WINDOWS_1252 {
            Self::Windows1252
        } else if encoding == encoding_rs::SHIFT_JIS {
            Self::ShiftJis
        } else if encoding == encoding_rs::GBK || encoding == encoding_rs::GB18030 {
            Self::Gbk
        } else if encoding == encoding_rs::BIG5 {
            Self::Big5
        } else {
            Self::Other(encoding.name().to_string())
        }
    }

    pub fn encoding(&self) -> &'static encoding_rs::Encoding {
        match self {
            Self::Utf8 => encoding_rs::UTF_8,
            Self::Windows1252 => encoding_rs::WINDOWS_1252,
            Self::ShiftJis => encoding_rs::SHIFT_JIS,
            Self::Gbk => encoding_rs::GBK,
            Self::Big5 => encoding_rs::BIG5,
            Self::Other(name) => {
                encoding_rs::Encoding::for_label(name.as_bytes()).unwrap_or(encoding_rs::UTF_8)
            }
        }
    }
}

/// A retrieved document, whichever way it was retrieved.
#[derive(Debug, Clone)]
pub struct PageResponse {
    /// URL after redirects; relative links resolve against this.
    pub url_final: Url,
    pub status: StatusCode,
    pub body_raw: Bytes,
    pub body_utf8: String,
    pub charset: Charset,
    pub fetched_at: DateTime<Utc>,
}

impl PageResponse {
    /// Wrap an already-decoded document, e.g. one produced by a rendering
    /// browser or a test double.
    pub fn from_html(url_final: Url, status: StatusCode, html: impl Into<String>) -> Self {
        let body_utf8 = html.into();
        Self {
            url_final,
            status,
            body_raw: Bytes::from(body_utf8.clone()),
            body_utf8,
            charset: Charset::Utf8,
            fetched_at: Utc::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Hex md5 of the raw body.
    pub fn checksum(&self) -> String {
        format!("{:x}", md5::compute(self.body_raw.as_ref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn charset_round_trips_through_encoding() {
        for charset in [Charset::Utf8, Charset::Windows1252, Charset::ShiftJis, Charset::Big5] {
            assert_eq!(Charset::from_encoding(charset.encoding()), charset);
        }
        assert_eq!(
            Charset::from_encoding(encoding_rs::KOI8_R),
            Charset::Other("KOI8-R".to_string())
        );
    }

    #[test]
    fn checksum_is_md5_hex() {
        let page = PageResponse::from_html(
            Url::parse("https://example.com/").unwrap(),
            StatusCode::OK,
            "hello",
        );
        assert_eq!(page.checksum(), "5d41402abc4b2a76b9719d911017c592");
        assert!(page.is_success());
    }
}
