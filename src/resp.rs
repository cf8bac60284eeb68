//! RESP2 reply composition.
//!
//! The engine does not parse requests — the embedding host's framing layer
//! hands it command arrays already split into strings. Replies are built
//! here and encoded into any `BufMut` sink, so the host can write straight
//! into its connection buffer; `serialize` is the owned-bytes convenience
//! on top.

use bytes::BufMut;

const CRLF: &[u8] = b"\r\n";
const NIL_BULK: &[u8] = b"$-1\r\n";
const NIL_ARRAY: &[u8] = b"*-1\r\n";

/// A RESP2 reply value.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// +OK\r\n
    Simple(String),
    /// -ERR message\r\n
    Error(String),
    /// :1000\r\n
    Integer(i64),
    /// $6\r\nfoobar\r\n  or  $-1\r\n (null)
    Bulk(Option<Vec<u8>>),
    /// *2\r\n...  or  *-1\r\n (null)
    Array(Option<Vec<Reply>>),
}

impl Reply {
    pub fn ok() -> Self {
        Reply::simple("OK")
    }

    pub fn simple(s: impl Into<String>) -> Self {
        Reply::Simple(s.into())
    }

    pub fn error(s: impl Into<String>) -> Self {
        Reply::Error(s.into())
    }

    pub fn integer(n: i64) -> Self {
        Reply::Integer(n)
    }

    pub fn bulk(data: impl Into<Vec<u8>>) -> Self {
        Reply::Bulk(Some(data.into()))
    }

    pub fn nil() -> Self {
        Reply::Bulk(None)
    }

    pub fn nil_array() -> Self {
        Reply::Array(None)
    }

    pub fn array(items: Vec<Reply>) -> Self {
        Reply::Array(Some(items))
    }

    pub fn empty_array() -> Self {
        Reply::array(Vec::new())
    }

    /// Encode into any byte sink.
    pub fn encode(&self, buf: &mut impl BufMut) {
        match self {
            Reply::Simple(s) => put_line(buf, b'+', s.as_bytes()),
            Reply::Error(s) => put_line(buf, b'-', s.as_bytes()),
            Reply::Integer(n) => put_line(buf, b':', n.to_string().as_bytes()),
            Reply::Bulk(None) => buf.put_slice(NIL_BULK),
            Reply::Bulk(Some(data)) => {
                put_count(buf, b'$', data.len());
                buf.put_slice(data);
                buf.put_slice(CRLF);
            }
            Reply::Array(None) => buf.put_slice(NIL_ARRAY),
            Reply::Array(Some(items)) => {
                put_count(buf, b'*', items.len());
                for item in items {
                    item.encode(buf);
                }
            }
        }
    }

    /// Encode to owned wire bytes.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_size_hint());
        self.encode(&mut buf);
        buf
    }

    /// Capacity estimate for one allocation in the common case. Integers
    /// use their widest textual form; headers get a small fixed pad.
    fn encoded_size_hint(&self) -> usize {
        match self {
            Reply::Simple(s) | Reply::Error(s) => s.len() + 3,
            Reply::Integer(_) => 23,
            Reply::Bulk(None) | Reply::Array(None) => NIL_BULK.len(),
            Reply::Bulk(Some(data)) => data.len() + 16,
            Reply::Array(Some(items)) => {
                16 + items.iter().map(Reply::encoded_size_hint).sum::<usize>()
            }
        }
    }
}

fn put_line(buf: &mut impl BufMut, marker: u8, line: &[u8]) {
    buf.put_u8(marker);
    buf.put_slice(line);
    buf.put_slice(CRLF);
}

fn put_count(buf: &mut impl BufMut, marker: u8, count: usize) {
    put_line(buf, marker, count.to_string().as_bytes());
}

/// Format a float the way the wire protocol expects: shortest
/// representation that round-trips, with infinities spelled `inf`/`-inf`.
pub fn format_score(n: f64) -> String {
    if n == f64::INFINITY {
        return "inf".to_string();
    }
    if n == f64::NEG_INFINITY {
        return "-inf".to_string();
    }
    if n == 0.0 && n.is_sign_negative() {
        return "0".to_string();
    }
    let simple = format!("{n}");
    if simple.parse::<f64>().ok() == Some(n) {
        simple
    } else {
        format!("{n:.17}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_and_error() {
        assert_eq!(Reply::ok().serialize(), b"+OK\r\n");
        assert_eq!(
            Reply::error("ERR boom").serialize(),
            b"-ERR boom\r\n".to_vec()
        );
    }

    #[test]
    fn test_integer() {
        assert_eq!(Reply::integer(42).serialize(), b":42\r\n");
        assert_eq!(Reply::integer(-3).serialize(), b":-3\r\n");
        assert_eq!(
            Reply::integer(i64::MIN).serialize(),
            b":-9223372036854775808\r\n".to_vec()
        );
    }

    #[test]
    fn test_bulk_string() {
        assert_eq!(Reply::bulk(b"bar".to_vec()).serialize(), b"$3\r\nbar\r\n");
        assert_eq!(Reply::bulk(Vec::new()).serialize(), b"$0\r\n\r\n");
        assert_eq!(Reply::nil().serialize(), b"$-1\r\n");
    }

    #[test]
    fn test_array() {
        let arr = Reply::array(vec![Reply::bulk(b"1".to_vec()), Reply::bulk(b"2".to_vec())]);
        assert_eq!(arr.serialize(), b"*2\r\n$1\r\n1\r\n$1\r\n2\r\n");
        assert_eq!(Reply::nil_array().serialize(), b"*-1\r\n");
        assert_eq!(Reply::empty_array().serialize(), b"*0\r\n");

        let nested = Reply::array(vec![Reply::integer(1), Reply::array(vec![Reply::ok()])]);
        assert_eq!(nested.serialize(), b"*2\r\n:1\r\n*1\r\n+OK\r\n");
    }

    #[test]
    fn test_encode_appends_to_shared_buffer() {
        let mut buf = Vec::new();
        Reply::ok().encode(&mut buf);
        Reply::integer(7).encode(&mut buf);
        assert_eq!(buf, b"+OK\r\n:7\r\n".to_vec());
    }

    #[test]
    fn test_format_score() {
        assert_eq!(format_score(6.0), "6");
        assert_eq!(format_score(1.5), "1.5");
        assert_eq!(format_score(f64::INFINITY), "inf");
        assert_eq!(format_score(f64::NEG_INFINITY), "-inf");
        assert_eq!(format_score(-0.0), "0");
    }
}
