use crate::ensure;
use crate::protocol::ParseError;
use std::fmt;

/// Parsed `Content-Disposition` value: ordered `key[=value]` parameters.
///
/// ```
/// use micro_wire::codec::multipart::ContentDisposition;
///
/// let cd = ContentDisposition::decode(r#"form-data; name="file"; filename="a \"b\".txt""#).unwrap();
/// assert_eq!(cd.disposition(), Some("form-data"));
/// assert_eq!(cd.get("filename"), Some(r#"a "b".txt"#));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentDisposition {
    params: Vec<(String, Option<String>)>,
}

impl ContentDisposition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decode(value: &str) -> Result<Self, ParseError> {
        let mut decoder = Decoder { chars: value.chars().collect(), pos: 0 };
        let mut params = Vec::new();

        while decoder.skip_space() {
            let key = decoder.read_token()?;
            let mut value = None;
            if decoder.skip_space() {
                match decoder.peek() {
                    Some('=') => {
                        decoder.pos += 1;
                        ensure!(decoder.skip_space(), ParseError::malformed_header(format!("missing value for {key}")));
                        value = Some(decoder.read_token()?);
                        if decoder.skip_space() {
                            ensure!(decoder.peek() == Some(';'), ParseError::malformed_header("expected ';'"));
                            decoder.pos += 1;
                        }
                    }
                    Some(';') => decoder.pos += 1,
                    _ => return Err(ParseError::malformed_header("unexpected token in content-disposition")),
                }
            }
            params.push((key, value));
        }
        Ok(Self { params })
    }

    /// Renders every parameter with a value as `key="value"`, joined by `; `.
    pub fn encode(&self) -> String {
        self.to_string()
    }

    /// The leading parameter when it carries no value, such as `form-data`.
    pub fn disposition(&self) -> Option<&str> {
        match self.params.first() {
            Some((key, None)) => Some(key),
            _ => None,
        }
    }

    /// Value of the last parameter named `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.iter().rev().find(|(k, _)| k.eq_ignore_ascii_case(key)).and_then(|(_, v)| v.as_deref())
    }

    pub fn params(&self) -> &[(String, Option<String>)] {
        &self.params
    }

    pub fn push<K: Into<String>>(&mut self, key: K, value: Option<String>) -> &mut Self {
        self.params.push((key.into(), value));
        self
    }
}

impl fmt::Display for ContentDisposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, value)) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            f.write_str(key)?;
            if let Some(value) = value {
                f.write_str("=\"")?;
                for c in value.chars() {
                    if c == '"' || c == '\\' {
                        f.write_str("\\")?;
                    }
                    write!(f, "{c}")?;
                }
                f.write_str("\"")?;
            }
        }
        Ok(())
    }
}

struct Decoder {
    chars: Vec<char>,
    pos: usize,
}

impl Decoder {
    /// Skips spaces and tabs, returning whether input remains.
    fn skip_space(&mut self) -> bool {
        while matches!(self.peek(), Some(' ' | '\t')) {
            self.pos += 1;
        }
        self.pos < self.chars.len()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn read_token(&mut self) -> Result<String, ParseError> {
        if self.peek() == Some('"') {
            return self.read_quoted();
        }
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c == ';' || c == '=' {
                break;
            }
            self.pos += 1;
        }
        let token: String = self.chars[start..self.pos].iter().collect();
        let token = token.trim_end().to_string();
        ensure!(!token.is_empty(), ParseError::malformed_header("empty content-disposition token"));
        Ok(token)
    }

    fn read_quoted(&mut self) -> Result<String, ParseError> {
        self.pos += 1;
        let mut out = String::new();
        loop {
            match self.peek() {
                None => return Err(ParseError::malformed_header("unterminated quoted string")),
                Some('"') => {
                    self.pos += 1;
                    return Ok(out);
                }
                Some('\\') => {
                    self.pos += 1;
                    let escaped =
                        self.peek().ok_or_else(|| ParseError::malformed_header("unterminated quoted string"))?;
                    out.push(escaped);
                    self.pos += 1;
                }
                Some(c) => {
                    out.push(c);
                    self.pos += 1;
                }
            }
        }
    }
}
