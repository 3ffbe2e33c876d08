//! ## [Data Types](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/1d61ee78-4466-4141-8276-f45153484619)

use byteorder::{ByteOrder, LittleEndian};
use std::fmt::Debug;

use super::*;
use crate::ndb::node_id::NodeId;

/// [Property Data Types](https://learn.microsoft.com/en-us/openspecs/exchange_server_protocols/MS-OXCDATA/0c77892e-288e-435a-9c49-be1c20c7afdb)
#[repr(u16)]
#[derive(Copy, Clone, PartialEq, Eq, Default, Debug)]
pub enum PropertyType {
    /// `PtypNull`: None: This property is a placeholder.
    #[default]
    Null = 0x0001,
    /// `PtypInteger16`: 2 bytes; a 16-bit integer
    Integer16 = 0x0002,
    /// `PtypInteger32`: 4 bytes; a 32-bit integer
    Integer32 = 0x0003,
    /// `PtypFloating32`: 4 bytes; a 32-bit floating-point number
    Floating32 = 0x0004,
    /// `PtypFloating64`: 8 bytes; a 64-bit floating-point number
    Floating64 = 0x0005,
    /// `PtypCurrency`: 8 bytes; a 64-bit signed, scaled integer representation of a decimal
    /// currency value, with four places to the right of the decimal point
    Currency = 0x0006,
    /// `PtypFloatingTime`: 8 bytes; a 64-bit floating point number in which the whole number part
    /// represents the number of days since December 30, 1899, and the fractional part represents
    /// the fraction of a day since midnight
    FloatingTime = 0x0007,
    /// `PtypErrorCode`: 4 bytes; a 32-bit integer encoding error information as specified in
    /// section [2.4.1](https://learn.microsoft.com/en-us/openspecs/exchange_server_protocols/ms-oxcdata/c9dc2fb0-73ca-4cc2-bdee-cc6ffb9b70eb).
    ErrorCode = 0x000A,
    /// `PtypBoolean`: 1 byte; restricted to 1 or 0
    Boolean = 0x000B,
    /// `PtypInteger64`: 8 bytes; a 64-bit integer
    Integer64 = 0x0014,
    /// `PtypString8`: Variable size; a string of multibyte characters in externally specified
    /// encoding with terminating null character (single 0 byte).
    String8 = 0x001E,
    /// `PtypString`: Variable size; a string of Unicode characters in UTF-16LE format encoding
    /// with terminating null character (0x0000).
    Unicode = 0x001F,
    /// `PtypTime`: 8 bytes; a 64-bit integer representing the number of 100-nanosecond intervals
    /// since January 1, 1601
    Time = 0x0040,
    /// `PtypGuid`: 16 bytes; a GUID with Data1, Data2, and Data3 fields in little-endian format
    Guid = 0x0048,
    /// `PtypBinary`: Variable size; a COUNT field followed by that many bytes.
    Binary = 0x0102,
    /// `PtypObject`: The property value is a Component Object Model (COM) object, as specified in
    /// section [2.11.1.5](https://learn.microsoft.com/en-us/openspecs/exchange_server_protocols/ms-oxcdata/5a024c95-2264-4832-9840-d6260c9c2cdb).
    Object = 0x000D,

    /// `PtypMultipleInteger16`: Variable size; a COUNT field followed by that many
    /// [PropertyType::Integer16] values.
    MultipleInteger16 = 0x1002,
    /// `PtypMultipleInteger32`: Variable size; a COUNT field followed by that many
    /// [PropertyType::Integer32] values.
    MultipleInteger32 = 0x1003,
    /// `PtypMultipleFloating32`: Variable size; a COUNT field followed by that many
    /// [PropertyType::Floating32] values.
    MultipleFloating32 = 0x1004,
    /// `PtypMultipleFloating64`: Variable size; a COUNT field followed by that many
    /// [PropertyType::Floating64] values.
    MultipleFloating64 = 0x1005,
    /// `PtypMultipleCurrency`: Variable size; a COUNT field followed by that many
    /// [PropertyType::Currency] values.
    MultipleCurrency = 0x1006,
    /// `PtypMultipleFloatingTime`: Variable size; a COUNT field followed by that many
    /// [PropertyType::FloatingTime] values.
    MultipleFloatingTime = 0x1007,
    /// `PtypMultipleInteger64`: Variable size; a COUNT field followed by that many
    /// [PropertyType::Integer64] values.
    MultipleInteger64 = 0x1014,
    /// `PtypMultipleString8`: Variable size; a COUNT field followed by that many
    /// [PropertyType::String8] values.
    MultipleString8 = 0x101E,
    /// `PtypMultipleString`: Variable size; a COUNT field followed by that many
    /// [PropertyType::Unicode] values.
    MultipleUnicode = 0x101F,
    /// `PtypMultipleTime`: Variable size; a COUNT field followed by that many [PropertyType::Time]
    /// values.
    MultipleTime = 0x1040,
    /// `PtypMultipleGuid`: Variable size; a COUNT field followed by that many [PropertyType::Guid]
    /// values.
    MultipleGuid = 0x1048,
    /// `PtypMultipleBinary`: Variable size; a COUNT field followed by that many
    /// [PropertyType::Binary] values.
    MultipleBinary = 0x1102,
}

impl TryFrom<u16> for PropertyType {
    type Error = LtpError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0x0001 => Ok(Self::Null),
            0x0002 => Ok(Self::Integer16),
            0x0003 => Ok(Self::Integer32),
            0x0004 => Ok(Self::Floating32),
            0x0005 => Ok(Self::Floating64),
            0x0006 => Ok(Self::Currency),
            0x0007 => Ok(Self::FloatingTime),
            0x000A => Ok(Self::ErrorCode),
            0x000B => Ok(Self::Boolean),
            0x000D => Ok(Self::Object),
            0x0014 => Ok(Self::Integer64),
            0x001E => Ok(Self::String8),
            0x001F => Ok(Self::Unicode),
            0x0040 => Ok(Self::Time),
            0x0048 => Ok(Self::Guid),
            0x0102 => Ok(Self::Binary),

            0x1002 => Ok(Self::MultipleInteger16),
            0x1003 => Ok(Self::MultipleInteger32),
            0x1004 => Ok(Self::MultipleFloating32),
            0x1005 => Ok(Self::MultipleFloating64),
            0x1006 => Ok(Self::MultipleCurrency),
            0x1007 => Ok(Self::MultipleFloatingTime),
            0x1014 => Ok(Self::MultipleInteger64),
            0x101E => Ok(Self::MultipleString8),
            0x101F => Ok(Self::MultipleUnicode),
            0x1040 => Ok(Self::MultipleTime),
            0x1048 => Ok(Self::MultipleGuid),
            0x1102 => Ok(Self::MultipleBinary),

            invalid => Err(LtpError::InvalidPropertyType(invalid)),
        }
    }
}

impl From<PropertyType> for u16 {
    fn from(value: PropertyType) -> Self {
        value as u16
    }
}

impl PropertyType {
    /// Size of a single value of a fixed-width type, `None` for variable-width types.
    pub const fn fixed_size(self) -> Option<usize> {
        match self {
            Self::Null => Some(0),
            Self::Boolean => Some(1),
            Self::Integer16 => Some(2),
            Self::Integer32 | Self::Floating32 | Self::ErrorCode => Some(4),
            Self::Floating64
            | Self::Currency
            | Self::FloatingTime
            | Self::Integer64
            | Self::Time => Some(8),
            Self::Guid => Some(16),
            _ => None,
        }
    }

    /// Types which fit in the 4 byte `dwValueHnid` of a PC record.
    pub const fn is_inline(self) -> bool {
        matches!(self.fixed_size(), Some(size) if size <= 4)
    }

    pub const fn is_multi_valued(self) -> bool {
        (self as u16) & 0x1000 != 0
    }

    /// The single-valued type of each element of a multi-valued type.
    pub const fn element_type(self) -> Self {
        match self {
            Self::MultipleInteger16 => Self::Integer16,
            Self::MultipleInteger32 => Self::Integer32,
            Self::MultipleFloating32 => Self::Floating32,
            Self::MultipleFloating64 => Self::Floating64,
            Self::MultipleCurrency => Self::Currency,
            Self::MultipleFloatingTime => Self::FloatingTime,
            Self::MultipleInteger64 => Self::Integer64,
            Self::MultipleString8 => Self::String8,
            Self::MultipleUnicode => Self::Unicode,
            Self::MultipleTime => Self::Time,
            Self::MultipleGuid => Self::Guid,
            Self::MultipleBinary => Self::Binary,
            other => other,
        }
    }
}

/// `PtypGuid` value, with `Data1`, `Data2`, and `Data3` in host order.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct GuidValue {
    data1: u32,
    data2: u16,
    data3: u16,
    data4: [u8; 8],
}

impl GuidValue {
    pub const fn new(data1: u32, data2: u16, data3: u16, data4: [u8; 8]) -> Self {
        Self {
            data1,
            data2,
            data3,
            data4,
        }
    }

    /// Decode the 16 byte little-endian form.
    pub fn from_bytes(data: &[u8; 16]) -> Self {
        let mut data4 = [0; 8];
        data4.copy_from_slice(&data[8..]);
        Self {
            data1: LittleEndian::read_u32(&data[0..4]),
            data2: LittleEndian::read_u16(&data[4..6]),
            data3: LittleEndian::read_u16(&data[6..8]),
            data4,
        }
    }

    pub fn to_bytes(&self) -> [u8; 16] {
        let mut data = [0; 16];
        LittleEndian::write_u32(&mut data[0..4], self.data1);
        LittleEndian::write_u16(&mut data[4..6], self.data2);
        LittleEndian::write_u16(&mut data[6..8], self.data3);
        data[8..].copy_from_slice(&self.data4);
        data
    }

    pub fn data1(&self) -> u32 {
        self.data1
    }

    pub fn data2(&self) -> u16 {
        self.data2
    }

    pub fn data3(&self) -> u16 {
        self.data3
    }

    pub fn data4(&self) -> &[u8; 8] {
        &self.data4
    }
}

impl Debug for GuidValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{{{:08X}-{:04X}-{:04X}-{:02X}{:02X}-{:02X}{:02X}{:02X}{:02X}{:02X}{:02X}}}",
            self.data1,
            self.data2,
            self.data3,
            self.data4[0],
            self.data4[1],
            self.data4[2],
            self.data4[3],
            self.data4[4],
            self.data4[5],
            self.data4[6],
            self.data4[7]
        )
    }
}

/// `PtypObject` value: the subnode holding the object, and its size.
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct ObjectValue {
    node: NodeId,
    size: u32,
}

impl ObjectValue {
    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn size(&self) -> u32 {
        self.size
    }
}

impl Debug for ObjectValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ObjectValue {{ {:?}, size: 0x{:X} }}", self.node, self.size)
    }
}

#[derive(Clone, Default, PartialEq, Debug)]
pub enum PropertyValue {
    /// `PtypNull`
    #[default]
    Null,
    /// `PtypInteger16`
    Integer16(i16),
    /// `PtypInteger32`
    Integer32(i32),
    /// `PtypFloating32`
    Floating32(f32),
    /// `PtypFloating64`
    Floating64(f64),
    /// `PtypCurrency`
    Currency(i64),
    /// `PtypFloatingTime`
    FloatingTime(f64),
    /// `PtypErrorCode`
    ErrorCode(i32),
    /// `PtypBoolean`
    Boolean(bool),
    /// `PtypInteger64`
    Integer64(i64),
    /// `PtypString8`: raw bytes in the code page of the store, without a terminating NUL.
    String8(Vec<u8>),
    /// `PtypString`: decoded from UTF-16LE, without a terminating NUL.
    ///
    /// Unpaired surrogates decode as U+FFFD. Use [read_utf16] on the stored bytes to get the
    /// exact code units.
    Unicode(String),
    /// `PtypTime`: 100-nanosecond intervals since January 1, 1601
    Time(i64),
    /// `PtypGuid`
    Guid(GuidValue),
    /// `PtypBinary`
    Binary(Vec<u8>),
    /// `PtypObject`
    Object(ObjectValue),

    MultipleInteger16(Vec<i16>),
    MultipleInteger32(Vec<i32>),
    MultipleFloating32(Vec<f32>),
    MultipleFloating64(Vec<f64>),
    MultipleCurrency(Vec<i64>),
    MultipleFloatingTime(Vec<f64>),
    MultipleInteger64(Vec<i64>),
    MultipleString8(Vec<Vec<u8>>),
    MultipleUnicode(Vec<String>),
    MultipleTime(Vec<i64>),
    MultipleGuid(Vec<GuidValue>),
    MultipleBinary(Vec<Vec<u8>>),
}

impl From<&PropertyValue> for PropertyType {
    fn from(value: &PropertyValue) -> Self {
        match value {
            PropertyValue::Null => PropertyType::Null,
            PropertyValue::Integer16(_) => PropertyType::Integer16,
            PropertyValue::Integer32(_) => PropertyType::Integer32,
            PropertyValue::Floating32(_) => PropertyType::Floating32,
            PropertyValue::Floating64(_) => PropertyType::Floating64,
            PropertyValue::Currency(_) => PropertyType::Currency,
            PropertyValue::FloatingTime(_) => PropertyType::FloatingTime,
            PropertyValue::ErrorCode(_) => PropertyType::ErrorCode,
            PropertyValue::Boolean(_) => PropertyType::Boolean,
            PropertyValue::Integer64(_) => PropertyType::Integer64,
            PropertyValue::String8(_) => PropertyType::String8,
            PropertyValue::Unicode(_) => PropertyType::Unicode,
            PropertyValue::Time(_) => PropertyType::Time,
            PropertyValue::Guid(_) => PropertyType::Guid,
            PropertyValue::Binary(_) => PropertyType::Binary,
            PropertyValue::Object(_) => PropertyType::Object,
            PropertyValue::MultipleInteger16(_) => PropertyType::MultipleInteger16,
            PropertyValue::MultipleInteger32(_) => PropertyType::MultipleInteger32,
            PropertyValue::MultipleFloating32(_) => PropertyType::MultipleFloating32,
            PropertyValue::MultipleFloating64(_) => PropertyType::MultipleFloating64,
            PropertyValue::MultipleCurrency(_) => PropertyType::MultipleCurrency,
            PropertyValue::MultipleFloatingTime(_) => PropertyType::MultipleFloatingTime,
            PropertyValue::MultipleInteger64(_) => PropertyType::MultipleInteger64,
            PropertyValue::MultipleString8(_) => PropertyType::MultipleString8,
            PropertyValue::MultipleUnicode(_) => PropertyType::MultipleUnicode,
            PropertyValue::MultipleTime(_) => PropertyType::MultipleTime,
            PropertyValue::MultipleGuid(_) => PropertyType::MultipleGuid,
            PropertyValue::MultipleBinary(_) => PropertyType::MultipleBinary,
        }
    }
}

fn trim_string8(data: &[u8]) -> Vec<u8> {
    let end = data
        .iter()
        .rposition(|&byte| byte != 0)
        .map_or(0, |index| index + 1);
    data[..end].to_vec()
}

/// The UTF-16 code units of a `PtypString` value, without trailing NULs.
pub fn read_utf16(data: &[u8]) -> LtpResult<Vec<u16>> {
    if data.len() % 2 != 0 {
        return Err(LtpError::InvalidPropertyValueSize(
            PropertyType::Unicode,
            data.len(),
        ));
    }
    let mut chars: Vec<u16> = data.chunks_exact(2).map(LittleEndian::read_u16).collect();
    while chars.last() == Some(&0) {
        chars.pop();
    }
    Ok(chars)
}

fn decode_unicode(data: &[u8]) -> LtpResult<String> {
    Ok(String::from_utf16_lossy(&read_utf16(data)?))
}

/// Split the `ulCount` and `rgulDataOffsets` form of a variable-width multi-valued property.
fn split_multi_value(data: &[u8]) -> LtpResult<Vec<&[u8]>> {
    if data.is_empty() {
        return Ok(Vec::new());
    }
    check_size("ulCount", data, 4)?;
    let count = LittleEndian::read_u32(data) as usize;
    let header_size = count
        .checked_mul(4)
        .and_then(|size| size.checked_add(4))
        .filter(|&size| size <= data.len())
        .ok_or(LtpError::Truncated(
            "rgulDataOffsets",
            count.saturating_mul(4).saturating_add(4),
            data.len(),
        ))?;

    let offsets: Vec<u32> = data[4..header_size]
        .chunks_exact(4)
        .map(LittleEndian::read_u32)
        .collect();

    let mut values = Vec::with_capacity(count);
    for (index, &start) in offsets.iter().enumerate() {
        let end = offsets
            .get(index + 1)
            .copied()
            .unwrap_or(data.len() as u32);
        if (start as usize) < header_size || start > end || end as usize > data.len() {
            return Err(LtpError::InvalidMultiValueOffset(start));
        }
        values.push(&data[start as usize..end as usize]);
    }
    Ok(values)
}

impl PropertyValue {
    /// Decode a value of `prop_type` from its stored bytes. Fixed-width types need exactly their
    /// size; multi-valued fixed-width types are packed arrays; variable-width multi-valued types
    /// start with a count and an offset table.
    pub fn read(prop_type: PropertyType, data: &[u8]) -> LtpResult<Self> {
        if let Some(size) = prop_type.fixed_size() {
            if data.len() != size {
                return Err(LtpError::InvalidPropertyValueSize(prop_type, data.len()));
            }
        }

        let value = match prop_type {
            PropertyType::Null => Self::Null,
            PropertyType::Integer16 => Self::Integer16(LittleEndian::read_i16(data)),
            PropertyType::Integer32 => Self::Integer32(LittleEndian::read_i32(data)),
            PropertyType::Floating32 => Self::Floating32(LittleEndian::read_f32(data)),
            PropertyType::Floating64 => Self::Floating64(LittleEndian::read_f64(data)),
            PropertyType::Currency => Self::Currency(LittleEndian::read_i64(data)),
            PropertyType::FloatingTime => Self::FloatingTime(LittleEndian::read_f64(data)),
            PropertyType::ErrorCode => Self::ErrorCode(LittleEndian::read_i32(data)),
            PropertyType::Boolean => Self::Boolean(data[0] != 0),
            PropertyType::Integer64 => Self::Integer64(LittleEndian::read_i64(data)),
            PropertyType::Time => Self::Time(LittleEndian::read_i64(data)),
            PropertyType::Guid => Self::Guid(Self::read_guid(data)),
            PropertyType::String8 => Self::String8(trim_string8(data)),
            PropertyType::Unicode => Self::Unicode(decode_unicode(data)?),
            PropertyType::Binary => Self::Binary(data.to_vec()),
            PropertyType::Object => {
                if data.len() != 8 {
                    return Err(LtpError::InvalidPropertyValueSize(prop_type, data.len()));
                }
                Self::Object(ObjectValue {
                    node: NodeId::from(LittleEndian::read_u32(&data[0..4])),
                    size: LittleEndian::read_u32(&data[4..8]),
                })
            }

            PropertyType::MultipleInteger16 => Self::MultipleInteger16(
                Self::read_packed(prop_type, data, LittleEndian::read_i16)?,
            ),
            PropertyType::MultipleInteger32 => Self::MultipleInteger32(
                Self::read_packed(prop_type, data, LittleEndian::read_i32)?,
            ),
            PropertyType::MultipleFloating32 => Self::MultipleFloating32(
                Self::read_packed(prop_type, data, LittleEndian::read_f32)?,
            ),
            PropertyType::MultipleFloating64 => Self::MultipleFloating64(
                Self::read_packed(prop_type, data, LittleEndian::read_f64)?,
            ),
            PropertyType::MultipleCurrency => Self::MultipleCurrency(Self::read_packed(
                prop_type,
                data,
                LittleEndian::read_i64,
            )?),
            PropertyType::MultipleFloatingTime => Self::MultipleFloatingTime(
                Self::read_packed(prop_type, data, LittleEndian::read_f64)?,
            ),
            PropertyType::MultipleInteger64 => Self::MultipleInteger64(
                Self::read_packed(prop_type, data, LittleEndian::read_i64)?,
            ),
            PropertyType::MultipleTime => {
                Self::MultipleTime(Self::read_packed(prop_type, data, LittleEndian::read_i64)?)
            }
            PropertyType::MultipleGuid => {
                Self::MultipleGuid(Self::read_packed(prop_type, data, Self::read_guid)?)
            }

            PropertyType::MultipleString8 => Self::MultipleString8(
                split_multi_value(data)?
                    .into_iter()
                    .map(trim_string8)
                    .collect(),
            ),
            PropertyType::MultipleUnicode => Self::MultipleUnicode(
                split_multi_value(data)?
                    .into_iter()
                    .map(decode_unicode)
                    .collect::<LtpResult<_>>()?,
            ),
            PropertyType::MultipleBinary => Self::MultipleBinary(
                split_multi_value(data)?
                    .into_iter()
                    .map(<[u8]>::to_vec)
                    .collect(),
            ),
        };
        Ok(value)
    }

    fn read_guid(data: &[u8]) -> GuidValue {
        let mut bytes = [0; 16];
        bytes.copy_from_slice(&data[..16]);
        GuidValue::from_bytes(&bytes)
    }

    fn read_packed<T>(
        prop_type: PropertyType,
        data: &[u8],
        read: fn(&[u8]) -> T,
    ) -> LtpResult<Vec<T>> {
        let size = prop_type.element_type().fixed_size().unwrap_or(1);
        if data.len() % size != 0 {
            return Err(LtpError::InvalidPropertyValueSize(prop_type, data.len()));
        }
        Ok(data.chunks_exact(size).map(read).collect())
    }

    pub fn prop_type(&self) -> PropertyType {
        PropertyType::from(self)
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Self::Integer16(value) => Some(i32::from(*value)),
            Self::Integer32(value) | Self::ErrorCode(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer64(value) | Self::Currency(value) | Self::Time(value) => Some(*value),
            other => other.as_i32().map(i64::from),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Unicode(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Binary(value) | Self::String8(value) => Some(value),
            _ => None,
        }
    }
}
