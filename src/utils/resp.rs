//! RESP (Redis Serialization Protocol) encoder and decoder
//!
//! Commands are always sent as RESP arrays of bulk strings. Replies are
//! decoded from a buffered stream one value at a time, so a pipeline of N
//! commands is read back with N calls to [`RespDecoder::decode`].

use std::io::{self, BufRead};

use bytes::Bytes;

use super::error::ProtocolError;

/// RESP value types
#[derive(Debug, Clone, PartialEq)]
pub enum RespValue {
    /// Simple string (+OK\r\n)
    SimpleString(String),
    /// Error (-ERR message\r\n)
    Error(String),
    /// Integer (:1000\r\n)
    Integer(i64),
    /// Bulk string ($6\r\nfoobar\r\n)
    BulkString(Vec<u8>),
    /// Null bulk string or null array ($-1\r\n, *-1\r\n, _\r\n)
    Null,
    /// Array (*2\r\n...)
    Array(Vec<RespValue>),
    /// RESP3 double (,1.5\r\n)
    Double(f64),
}

impl RespValue {
    /// Turn an error reply into a `ProtocolError`, pass everything else through
    pub fn into_result(self) -> Result<RespValue, ProtocolError> {
        match self {
            RespValue::Error(e) => Err(ProtocolError::ServerError(e)),
            other => Ok(other),
        }
    }

    /// Get as string (for simple string or bulk string)
    pub fn as_str(&self) -> Option<&str> {
        match self {
            RespValue::SimpleString(s) => Some(s),
            RespValue::BulkString(b) => std::str::from_utf8(b).ok(),
            _ => None,
        }
    }

    /// Get as integer
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            RespValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Get as array
    pub fn as_array(&self) -> Option<&[RespValue]> {
        match self {
            RespValue::Array(arr) => Some(arr),
            _ => None,
        }
    }

    /// Consume into the array elements, if this is an array
    pub fn into_array(self) -> Option<Vec<RespValue>> {
        match self {
            RespValue::Array(arr) => Some(arr),
            _ => None,
        }
    }

    /// Consume a string-like reply into its exact bytes.
    /// Key names go through here so they can be sent back unchanged.
    pub fn into_bytes(self) -> Option<Bytes> {
        match self {
            RespValue::SimpleString(s) => Some(Bytes::from(s)),
            RespValue::BulkString(b) => Some(Bytes::from(b)),
            RespValue::Integer(i) => Some(Bytes::from(i.to_string())),
            _ => None,
        }
    }

    /// Consume a string-like reply into an owned `String` for display.
    /// Invalid UTF-8 is replaced, so this is never used for key names.
    pub fn into_text(self) -> Option<String> {
        match self {
            RespValue::SimpleString(s) => Some(s),
            RespValue::BulkString(b) => Some(match String::from_utf8(b) {
                Ok(s) => s,
                Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
            }),
            RespValue::Integer(i) => Some(i.to_string()),
            _ => None,
        }
    }

    /// Short description used in error messages
    pub fn describe(&self) -> String {
        match self {
            RespValue::SimpleString(s) => format!("simple string '{}'", s),
            RespValue::Error(e) => format!("error '{}'", e),
            RespValue::Integer(i) => format!("integer {}", i),
            RespValue::BulkString(b) => format!("bulk string of {} bytes", b.len()),
            RespValue::Null => "null".to_string(),
            RespValue::Array(a) => format!("array of {} elements", a.len()),
            RespValue::Double(d) => format!("double {}", d),
        }
    }
}

/// RESP encoder with pre-allocated buffer
pub struct RespEncoder {
    buf: Vec<u8>,
}

impl RespEncoder {
    /// Create new encoder with specified capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Clear buffer for reuse
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Get encoded bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Encode a command as RESP array.
    /// Appends to the buffer, so repeated calls build a pipeline.
    pub fn encode_command(&mut self, args: &[&[u8]]) {
        self.buf.push(b'*');
        self.write_int(args.len() as i64);
        self.buf.extend_from_slice(b"\r\n");

        for arg in args {
            self.buf.push(b'$');
            self.write_int(arg.len() as i64);
            self.buf.extend_from_slice(b"\r\n");
            self.buf.extend_from_slice(arg);
            self.buf.extend_from_slice(b"\r\n");
        }
    }

    /// Encode a command from string slices
    pub fn encode_command_str(&mut self, args: &[&str]) {
        let byte_args: Vec<&[u8]> = args.iter().map(|s| s.as_bytes()).collect();
        self.encode_command(&byte_args);
    }

    /// Encode a command whose tail is a list of binary keys
    pub fn encode_command_with_keys(&mut self, head: &[&str], keys: &[Bytes]) {
        let mut args: Vec<&[u8]> = Vec::with_capacity(head.len() + keys.len());
        args.extend(head.iter().map(|s| s.as_bytes()));
        args.extend(keys.iter().map(|k| &k[..]));
        self.encode_command(&args);
    }

    #[inline]
    fn write_int(&mut self, value: i64) {
        let mut buffer = itoa::Buffer::new();
        let s = buffer.format(value);
        self.buf.extend_from_slice(s.as_bytes());
    }
}

/// RESP decoder for streaming reads
pub struct RespDecoder<R> {
    reader: R,
    line_buf: String,
}

impl<R: BufRead> RespDecoder<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line_buf: String::with_capacity(256),
        }
    }

    /// Decode next RESP value from stream
    pub fn decode(&mut self) -> io::Result<RespValue> {
        self.line_buf.clear();
        self.reader.read_line(&mut self.line_buf)?;

        if self.line_buf.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "Connection closed",
            ));
        }

        let line = self.line_buf.trim_end_matches(&['\r', '\n'][..]);
        if line.is_empty() {
            return Err(invalid_data("Empty RESP line".to_string()));
        }

        let type_byte = line.as_bytes()[0];
        let content = &line[1..];

        match type_byte {
            b'+' => Ok(RespValue::SimpleString(content.to_string())),
            b'-' => Ok(RespValue::Error(content.to_string())),
            b':' => {
                let value: i64 = content
                    .parse()
                    .map_err(|_| invalid_data(format!("Invalid integer: {}", content)))?;
                Ok(RespValue::Integer(value))
            }
            b',' => {
                let value: f64 = content
                    .parse()
                    .map_err(|_| invalid_data(format!("Invalid double: {}", content)))?;
                Ok(RespValue::Double(value))
            }
            b'_' => Ok(RespValue::Null),
            b'$' => {
                let len: i64 = content
                    .parse()
                    .map_err(|_| invalid_data(format!("Invalid bulk length: {}", content)))?;

                if len < 0 {
                    return Ok(RespValue::Null);
                }

                let mut data = vec![0u8; len as usize];
                self.reader.read_exact(&mut data)?;

                let mut crlf = [0u8; 2];
                self.reader.read_exact(&mut crlf)?;

                Ok(RespValue::BulkString(data))
            }
            b'*' => {
                let count: i64 = content
                    .parse()
                    .map_err(|_| invalid_data(format!("Invalid array length: {}", content)))?;

                if count < 0 {
                    return Ok(RespValue::Null);
                }

                let mut elements = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    elements.push(self.decode()?);
                }

                Ok(RespValue::Array(elements))
            }
            _ => Err(invalid_data(format!(
                "Invalid RESP type byte: {}",
                type_byte as char
            ))),
        }
    }
}

fn invalid_data(msg: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg)
}
