pub mod bytes;
pub mod error;
pub mod frame;
pub mod measurement;

pub use bytes::{
    bytes_to_hex_string, bytes_to_int_be, bytes_to_string, bytes_to_uint_be, string_to_uuid_bytes,
};
pub use error::{ByteConvertError, ConvertResult, DecodeError, DecodeResult};
pub use frame::{AdvertisementFrame, FRAME_LEN};
pub use measurement::{GeoPoint, Measurement};
