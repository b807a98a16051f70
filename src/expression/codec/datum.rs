//! A small self-describing binary value format.
//!
//! A stream is the magic bytes, a symbol table and one tagged value.
//! Struct field names and symbol values are stored as indexes into the
//! symbol table, so repeated names such as `type` cost one byte each.
//!
//! ```text
//! stream  := MAGIC varint(nsyms) { varint(len) utf8 }* value
//! value   := 0x00                          null
//!          | 0x01 | 0x02                   false | true
//!          | 0x03 i64                      int
//!          | 0x04 f64                      float
//!          | 0x05 varint(sym)              symbol
//!          | 0x06 varint(len) utf8         string
//!          | 0x07 i64                      timestamp (unix micros)
//!          | 0x08 varint(len) bytes        blob
//!          | 0x09 varint(n) value*         list
//!          | 0x0a varint(n) (varint(sym) value)*   struct
//! ```
//!
//! Fixed-width numbers are big-endian.

use std::collections::HashMap;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::expression::error::{DecodeError, DecodeResult};

pub const MAGIC: &[u8; 4] = b"VXP\x01";

const TAG_NULL: u8 = 0x00;
const TAG_FALSE: u8 = 0x01;
const TAG_TRUE: u8 = 0x02;
const TAG_INT: u8 = 0x03;
const TAG_FLOAT: u8 = 0x04;
const TAG_SYMBOL: u8 = 0x05;
const TAG_STRING: u8 = 0x06;
const TAG_TIMESTAMP: u8 = 0x07;
const TAG_BLOB: u8 = 0x08;
const TAG_LIST: u8 = 0x09;
const TAG_STRUCT: u8 = 0x0a;

/// A decoded value.
#[derive(Debug, Clone, PartialEq)]
pub enum Datum {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Symbol(String),
    String(String),
    /// Microseconds since the Unix epoch
    Timestamp(i64),
    Blob(Vec<u8>),
    List(Vec<Datum>),
    /// Fields in stream order
    Struct(Vec<(String, Datum)>),
}

impl Datum {
    /// Name of the value kind, for error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Datum::Null => "null",
            Datum::Bool(_) => "bool",
            Datum::Int(_) => "int",
            Datum::Float(_) => "float",
            Datum::Symbol(_) => "symbol",
            Datum::String(_) => "string",
            Datum::Timestamp(_) => "timestamp",
            Datum::Blob(_) => "blob",
            Datum::List(_) => "list",
            Datum::Struct(_) => "struct",
        }
    }

    fn mismatch(&self, expected: &'static str) -> DecodeError {
        DecodeError::TypeMismatch {
            expected,
            found: self.kind_name(),
        }
    }

    pub fn into_int(self) -> DecodeResult<i64> {
        match self {
            Datum::Int(i) => Ok(i),
            other => Err(other.mismatch("int")),
        }
    }

    pub fn into_bool(self) -> DecodeResult<bool> {
        match self {
            Datum::Bool(b) => Ok(b),
            other => Err(other.mismatch("bool")),
        }
    }

    /// A string or symbol value.
    pub fn into_text(self) -> DecodeResult<String> {
        match self {
            Datum::String(s) | Datum::Symbol(s) => Ok(s),
            other => Err(other.mismatch("string")),
        }
    }

    pub fn into_blob(self) -> DecodeResult<Vec<u8>> {
        match self {
            Datum::Blob(b) => Ok(b),
            other => Err(other.mismatch("blob")),
        }
    }

    pub fn into_list(self) -> DecodeResult<Vec<Datum>> {
        match self {
            Datum::List(l) => Ok(l),
            other => Err(other.mismatch("list")),
        }
    }

    pub fn into_struct(self) -> DecodeResult<Vec<(String, Datum)>> {
        match self {
            Datum::Struct(s) => Ok(s),
            other => Err(other.mismatch("struct")),
        }
    }
}

/// Symbols interned while encoding one stream.
#[derive(Debug, Default)]
struct Symtab {
    names: Vec<String>,
    index: HashMap<String, u64>,
}

impl Symtab {
    fn intern(&mut self, name: &str) -> u64 {
        if let Some(id) = self.index.get(name) {
            return *id;
        }
        let id = self.names.len() as u64;
        self.names.push(name.to_string());
        self.index.insert(name.to_string(), id);
        id
    }
}

/// Encode `value` as a complete stream.
pub fn encode(value: &Datum) -> Bytes {
    let mut symtab = Symtab::default();
    let mut body = BytesMut::new();
    write_value(&mut body, value, &mut symtab);

    let mut out = BytesMut::with_capacity(body.len() + 64);
    out.put_slice(MAGIC);
    put_varint(&mut out, symtab.names.len() as u64);
    for name in &symtab.names {
        put_varint(&mut out, name.len() as u64);
        out.put_slice(name.as_bytes());
    }
    out.put(body);
    out.freeze()
}

/// Decode a complete stream produced by [`encode`].
pub fn decode(mut buf: &[u8]) -> DecodeResult<Datum> {
    need(&buf, MAGIC.len())?;
    if &buf[..MAGIC.len()] != MAGIC {
        return Err(DecodeError::BadMagic);
    }
    buf.advance(MAGIC.len());

    let count = get_varint(&mut buf)?;
    let mut symbols = Vec::new();
    for _ in 0..count {
        symbols.push(get_string(&mut buf)?);
    }
    let value = read_value(&mut buf, &symbols)?;
    if buf.has_remaining() {
        return Err(DecodeError::TrailingBytes(buf.remaining()));
    }
    Ok(value)
}

fn write_value(dst: &mut BytesMut, value: &Datum, st: &mut Symtab) {
    match value {
        Datum::Null => dst.put_u8(TAG_NULL),
        Datum::Bool(false) => dst.put_u8(TAG_FALSE),
        Datum::Bool(true) => dst.put_u8(TAG_TRUE),
        Datum::Int(i) => {
            dst.put_u8(TAG_INT);
            dst.put_i64(*i);
        }
        Datum::Float(f) => {
            dst.put_u8(TAG_FLOAT);
            dst.put_f64(*f);
        }
        Datum::Symbol(s) => {
            dst.put_u8(TAG_SYMBOL);
            put_varint(dst, st.intern(s));
        }
        Datum::String(s) => {
            dst.put_u8(TAG_STRING);
            put_varint(dst, s.len() as u64);
            dst.put_slice(s.as_bytes());
        }
        Datum::Timestamp(t) => {
            dst.put_u8(TAG_TIMESTAMP);
            dst.put_i64(*t);
        }
        Datum::Blob(b) => {
            dst.put_u8(TAG_BLOB);
            put_varint(dst, b.len() as u64);
            dst.put_slice(b);
        }
        Datum::List(values) => {
            dst.put_u8(TAG_LIST);
            put_varint(dst, values.len() as u64);
            for v in values {
                write_value(dst, v, st);
            }
        }
        Datum::Struct(fields) => {
            dst.put_u8(TAG_STRUCT);
            put_varint(dst, fields.len() as u64);
            for (name, v) in fields {
                put_varint(dst, st.intern(name));
                write_value(dst, v, st);
            }
        }
    }
}

fn read_value(buf: &mut &[u8], symbols: &[String]) -> DecodeResult<Datum> {
    need(buf, 1)?;
    let value = match buf.get_u8() {
        TAG_NULL => Datum::Null,
        TAG_FALSE => Datum::Bool(false),
        TAG_TRUE => Datum::Bool(true),
        TAG_INT => {
            need(buf, 8)?;
            Datum::Int(buf.get_i64())
        }
        TAG_FLOAT => {
            need(buf, 8)?;
            Datum::Float(buf.get_f64())
        }
        TAG_SYMBOL => Datum::Symbol(symbol(buf, symbols)?),
        TAG_STRING => Datum::String(get_string(buf)?),
        TAG_TIMESTAMP => {
            need(buf, 8)?;
            Datum::Timestamp(buf.get_i64())
        }
        TAG_BLOB => {
            let len = get_len(buf)?;
            let bytes = buf[..len].to_vec();
            buf.advance(len);
            Datum::Blob(bytes)
        }
        TAG_LIST => {
            let n = get_varint(buf)?;
            let mut values = Vec::new();
            for _ in 0..n {
                values.push(read_value(buf, symbols)?);
            }
            Datum::List(values)
        }
        TAG_STRUCT => {
            let n = get_varint(buf)?;
            let mut fields = Vec::new();
            for _ in 0..n {
                let name = symbol(buf, symbols)?;
                fields.push((name, read_value(buf, symbols)?));
            }
            Datum::Struct(fields)
        }
        tag => {
            return Err(DecodeError::InvalidDiscriminator {
                what: "value tag",
                value: tag as i64,
            })
        }
    };
    Ok(value)
}

fn need(buf: &&[u8], n: usize) -> DecodeResult<()> {
    if buf.remaining() < n {
        return Err(DecodeError::Truncated);
    }
    Ok(())
}

fn symbol(buf: &mut &[u8], symbols: &[String]) -> DecodeResult<String> {
    let id = get_varint(buf)?;
    usize::try_from(id)
        .ok()
        .and_then(|i| symbols.get(i))
        .cloned()
        .ok_or(DecodeError::BadSymbol(id))
}

fn get_len(buf: &mut &[u8]) -> DecodeResult<usize> {
    let len = get_varint(buf)?;
    let len = usize::try_from(len).map_err(|_| DecodeError::Truncated)?;
    need(buf, len)?;
    Ok(len)
}

fn get_string(buf: &mut &[u8]) -> DecodeResult<String> {
    let len = get_len(buf)?;
    let s = std::str::from_utf8(&buf[..len])
        .map_err(|_| DecodeError::Utf8)?
        .to_string();
    buf.advance(len);
    Ok(s)
}

fn put_varint(dst: &mut BytesMut, mut v: u64) {
    while v >= 0x80 {
        dst.put_u8((v as u8) | 0x80);
        v >>= 7;
    }
    dst.put_u8(v as u8);
}

fn get_varint(buf: &mut &[u8]) -> DecodeResult<u64> {
    let mut out = 0u64;
    for shift in (0..64).step_by(7) {
        need(buf, 1)?;
        let b = buf.get_u8();
        out |= u64::from(b & 0x7f) << shift;
        if b & 0x80 == 0 {
            return Ok(out);
        }
    }
    Err(DecodeError::InvalidDiscriminator {
        what: "varint",
        value: -1,
    })
}
