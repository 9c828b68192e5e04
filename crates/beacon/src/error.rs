use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("advertisement payload too short: {actual} bytes, need at least {min}")]
    TooShort { actual: usize, min: usize },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ByteConvertError {
    #[error("too many bytes to convert to an integer: {0}, max 4")]
    TooManyBytes(usize),

    #[error("uuid string must be exactly 16 bytes, got {0}")]
    BadUuidLength(usize),
}

pub type DecodeResult<T> = std::result::Result<T, DecodeError>;
pub type ConvertResult<T> = std::result::Result<T, ByteConvertError>;
