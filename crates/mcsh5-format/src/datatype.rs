//! HDF5 datatype message parsing (message type 0x0003).
//!
//! All eleven type classes are decoded, recursively for compound,
//! enumeration, variable-length and array types. Compound members are read
//! in each of the three encodings the format has used.

#[cfg(not(feature = "std"))]
use alloc::{boxed::Box, string::String, vec::Vec};

use crate::bytes::{ensure_len, pad8, read_cstr, read_u16, read_u32, read_uint};
use crate::error::FormatError;

/// Byte order of numeric data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatatypeByteOrder {
    LittleEndian,
    BigEndian,
    Vax,
}

/// String padding type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringPadding {
    NullTerminate,
    NullPad,
    SpacePad,
}

/// Character set encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharacterSet {
    Ascii,
    Utf8,
}

/// Reference type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceType {
    Object,
    DatasetRegion,
}

/// A member of a compound datatype.
#[derive(Debug, Clone, PartialEq)]
pub struct CompoundMember {
    /// Member name.
    pub name: String,
    /// Byte offset within the compound, as stored in the file.
    pub byte_offset: u64,
    /// Member datatype.
    pub datatype: Datatype,
}

/// A member of an enumeration datatype.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumMember {
    /// Member name.
    pub name: String,
    /// Raw value bytes (length = base type size).
    pub value: Vec<u8>,
}

/// Parsed HDF5 datatype. `size` is always the element size recorded in the
/// message.
#[derive(Debug, Clone, PartialEq)]
pub enum Datatype {
    /// Class 0: fixed-point (integer) types.
    FixedPoint {
        size: u32,
        byte_order: DatatypeByteOrder,
        signed: bool,
        bit_offset: u16,
        bit_precision: u16,
    },
    /// Class 1: floating-point types.
    FloatingPoint {
        size: u32,
        byte_order: DatatypeByteOrder,
        bit_offset: u16,
        bit_precision: u16,
        exponent_location: u8,
        exponent_size: u8,
        mantissa_location: u8,
        mantissa_size: u8,
        exponent_bias: u32,
    },
    /// Class 2: time.
    Time {
        size: u32,
        byte_order: DatatypeByteOrder,
        bit_precision: u16,
    },
    /// Class 3: fixed-length string.
    String {
        size: u32,
        padding: StringPadding,
        charset: CharacterSet,
    },
    /// Class 4: bit field.
    BitField {
        size: u32,
        byte_order: DatatypeByteOrder,
        bit_offset: u16,
        bit_precision: u16,
    },
    /// Class 5: opaque data with an ASCII tag.
    Opaque { size: u32, tag: String },
    /// Class 6: compound type.
    Compound {
        size: u32,
        members: Vec<CompoundMember>,
    },
    /// Class 7: reference.
    Reference { size: u32, ref_type: ReferenceType },
    /// Class 8: enumeration.
    Enumeration {
        size: u32,
        base_type: Box<Datatype>,
        members: Vec<EnumMember>,
    },
    /// Class 9: variable-length sequence or string.
    VariableLength {
        size: u32,
        is_string: bool,
        padding: Option<StringPadding>,
        charset: Option<CharacterSet>,
        base_type: Box<Datatype>,
    },
    /// Class 10: fixed-size array.
    Array {
        size: u32,
        base_type: Box<Datatype>,
        dimensions: Vec<u32>,
    },
}

fn string_padding(val: u8) -> Result<StringPadding, FormatError> {
    match val {
        0 => Ok(StringPadding::NullTerminate),
        1 => Ok(StringPadding::NullPad),
        2 => Ok(StringPadding::SpacePad),
        _ => Err(FormatError::InvalidStringPadding(val)),
    }
}

fn charset(val: u8) -> Result<CharacterSet, FormatError> {
    match val {
        0 => Ok(CharacterSet::Ascii),
        1 => Ok(CharacterSet::Utf8),
        _ => Err(FormatError::InvalidCharacterSet(val)),
    }
}

fn integer_order(bf0: u8) -> DatatypeByteOrder {
    if bf0 & 0x01 == 0 {
        DatatypeByteOrder::LittleEndian
    } else {
        DatatypeByteOrder::BigEndian
    }
}

/// Bytes used for a member offset in a version 3 compound of `size` bytes.
fn member_offset_width(size: u32) -> usize {
    match size {
        0..=0xFF => 1,
        0x100..=0xFFFF => 2,
        0x1_0000..=0xFF_FFFF => 3,
        _ => 4,
    }
}

/// Member or enumeration names are padded to eight bytes before version 3.
fn read_name(data: &[u8], pos: usize, version: u8) -> Result<(String, usize), FormatError> {
    let (name, consumed) = read_cstr(data, pos)?;
    Ok((name, if version < 3 { pad8(consumed) } else { consumed }))
}

impl Datatype {
    /// Parse a datatype message from raw bytes.
    ///
    /// Returns the datatype and the number of bytes consumed, so nested
    /// member types can be read in sequence.
    pub fn parse(data: &[u8]) -> Result<(Datatype, usize), FormatError> {
        ensure_len(data, 0, 8)?;
        let class = data[0] & 0x0F;
        let version = data[0] >> 4;
        let [bf0, bf1, _bf2] = [data[1], data[2], data[3]];
        let size = read_u32(data, 4)?;
        let pos = 8;

        match class {
            0 => Ok((
                Datatype::FixedPoint {
                    size,
                    byte_order: integer_order(bf0),
                    signed: bf0 & 0x08 != 0,
                    bit_offset: read_u16(data, pos)?,
                    bit_precision: read_u16(data, pos + 2)?,
                },
                pos + 4,
            )),
            1 => {
                ensure_len(data, pos, 12)?;
                // Bits 0 and 6 together select LE, BE or VAX order.
                let byte_order = match (bf0 & 0x40 != 0, bf0 & 0x01 != 0) {
                    (false, false) => DatatypeByteOrder::LittleEndian,
                    (false, true) => DatatypeByteOrder::BigEndian,
                    (true, _) => DatatypeByteOrder::Vax,
                };
                Ok((
                    Datatype::FloatingPoint {
                        size,
                        byte_order,
                        bit_offset: read_u16(data, pos)?,
                        bit_precision: read_u16(data, pos + 2)?,
                        exponent_location: data[pos + 4],
                        exponent_size: data[pos + 5],
                        mantissa_location: data[pos + 6],
                        mantissa_size: data[pos + 7],
                        exponent_bias: read_u32(data, pos + 8)?,
                    },
                    pos + 12,
                ))
            }
            2 => Ok((
                Datatype::Time {
                    size,
                    byte_order: integer_order(bf0),
                    bit_precision: read_u16(data, pos)?,
                },
                pos + 2,
            )),
            3 => Ok((
                Datatype::String {
                    size,
                    padding: string_padding(bf0 & 0x0F)?,
                    charset: charset(bf0 >> 4)?,
                },
                pos,
            )),
            4 => Ok((
                Datatype::BitField {
                    size,
                    byte_order: integer_order(bf0),
                    bit_offset: read_u16(data, pos)?,
                    bit_precision: read_u16(data, pos + 2)?,
                },
                pos + 4,
            )),
            5 => {
                let tag_len = bf0 as usize;
                ensure_len(data, pos, tag_len)?;
                let raw = &data[pos..pos + tag_len];
                let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
                let tag = String::from_utf8_lossy(&raw[..end]).into_owned();
                Ok((Datatype::Opaque { size, tag }, pos + pad8(tag_len)))
            }
            6 => Self::parse_compound(data, version, u16::from_le_bytes([bf0, bf1]), size),
            7 => {
                let ref_type = match bf0 & 0x0F {
                    0 => ReferenceType::Object,
                    1 => ReferenceType::DatasetRegion,
                    v => return Err(FormatError::InvalidReferenceType(v)),
                };
                Ok((Datatype::Reference { size, ref_type }, pos))
            }
            8 => Self::parse_enumeration(data, version, u16::from_le_bytes([bf0, bf1]), size),
            9 => {
                let is_string = bf0 & 0x0F == 1;
                let (padding, charset) = if is_string {
                    (
                        Some(string_padding(bf0 >> 4)?),
                        Some(charset(bf1 & 0x0F)?),
                    )
                } else {
                    (None, None)
                };
                let (base, consumed) = Datatype::parse(&data[pos..])?;
                Ok((
                    Datatype::VariableLength {
                        size,
                        is_string,
                        padding,
                        charset,
                        base_type: Box::new(base),
                    },
                    pos + consumed,
                ))
            }
            10 => Self::parse_array(data, version, size),
            _ => Err(FormatError::InvalidDatatypeClass(class)),
        }
    }

    fn parse_compound(
        data: &[u8],
        version: u8,
        count: u16,
        size: u32,
    ) -> Result<(Datatype, usize), FormatError> {
        if !(1..=3).contains(&version) {
            return Err(FormatError::InvalidDatatypeVersion { class: 6, version });
        }
        let mut pos = 8;
        let mut members = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let (name, consumed) = read_name(data, pos, version)?;
            pos += consumed;
            let byte_offset = match version {
                3 => {
                    let width = member_offset_width(size);
                    let off = read_uint(data, pos, width)?;
                    pos += width;
                    off
                }
                _ => {
                    let off = read_u32(data, pos)? as u64;
                    pos += 4;
                    if version == 1 {
                        // dimensionality(1) reserved(3) permutation(4)
                        // reserved(4) four dimension sizes(16)
                        ensure_len(data, pos, 28)?;
                        pos += 28;
                    }
                    off
                }
            };
            let (datatype, consumed) = Datatype::parse(&data[pos..])?;
            pos += consumed;
            members.push(CompoundMember {
                name,
                byte_offset,
                datatype,
            });
        }
        Ok((Datatype::Compound { size, members }, pos))
    }

    fn parse_enumeration(
        data: &[u8],
        version: u8,
        count: u16,
        size: u32,
    ) -> Result<(Datatype, usize), FormatError> {
        let mut pos = 8;
        let (base, consumed) = Datatype::parse(&data[pos..])?;
        pos += consumed;
        let mut names = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let (name, consumed) = read_name(data, pos, version)?;
            pos += consumed;
            names.push(name);
        }
        let width = base.type_size() as usize;
        ensure_len(data, pos, width * names.len())?;
        let members = names
            .into_iter()
            .enumerate()
            .map(|(i, name)| EnumMember {
                name,
                value: data[pos + i * width..pos + (i + 1) * width].to_vec(),
            })
            .collect::<Vec<_>>();
        pos += width * members.len();
        Ok((
            Datatype::Enumeration {
                size,
                base_type: Box::new(base),
                members,
            },
            pos,
        ))
    }

    fn parse_array(data: &[u8], version: u8, size: u32) -> Result<(Datatype, usize), FormatError> {
        let mut pos = 8;
        ensure_len(data, pos, 1)?;
        let rank = data[pos] as usize;
        pos += match version {
            2 => 4, // rank(1) reserved(3)
            3 => 1,
            _ => return Err(FormatError::InvalidDatatypeVersion { class: 10, version }),
        };
        let dimensions = (0..rank)
            .map(|i| read_u32(data, pos + 4 * i))
            .collect::<Result<Vec<_>, _>>()?;
        pos += 4 * rank;
        if version == 2 {
            // permutation indices, never used by the library
            ensure_len(data, pos, 4 * rank)?;
            pos += 4 * rank;
        }
        let (base, consumed) = Datatype::parse(&data[pos..])?;
        Ok((
            Datatype::Array {
                size,
                base_type: Box::new(base),
                dimensions,
            },
            pos + consumed,
        ))
    }

    /// Size in bytes of one element of this type as stored in the file.
    pub fn type_size(&self) -> u32 {
        match self {
            Datatype::FixedPoint { size, .. }
            | Datatype::FloatingPoint { size, .. }
            | Datatype::Time { size, .. }
            | Datatype::String { size, .. }
            | Datatype::BitField { size, .. }
            | Datatype::Opaque { size, .. }
            | Datatype::Compound { size, .. }
            | Datatype::Reference { size, .. }
            | Datatype::Enumeration { size, .. }
            | Datatype::VariableLength { size, .. }
            | Datatype::Array { size, .. } => *size,
        }
    }

    /// The numeric class identifier (0–10).
    pub fn class_id(&self) -> u8 {
        match self {
            Datatype::FixedPoint { .. } => 0,
            Datatype::FloatingPoint { .. } => 1,
            Datatype::Time { .. } => 2,
            Datatype::String { .. } => 3,
            Datatype::BitField { .. } => 4,
            Datatype::Opaque { .. } => 5,
            Datatype::Compound { .. } => 6,
            Datatype::Reference { .. } => 7,
            Datatype::Enumeration { .. } => 8,
            Datatype::VariableLength { .. } => 9,
            Datatype::Array { .. } => 10,
        }
    }

    /// Compound members, or `None` for any other class.
    pub fn compound_members(&self) -> Option<&[CompoundMember]> {
        match self {
            Datatype::Compound { members, .. } => Some(members),
            _ => None,
        }
    }

    /// Whether this is a variable-length string.
    pub fn is_variable_string(&self) -> bool {
        matches!(self, Datatype::VariableLength { is_string: true, .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(class: u8, version: u8, bf: [u8; 3], size: u32) -> Vec<u8> {
        let mut buf = vec![class | (version << 4), bf[0], bf[1], bf[2]];
        buf.extend_from_slice(&size.to_le_bytes());
        buf
    }

    fn int_type(size: u32, signed: bool) -> Vec<u8> {
        let mut buf = header(0, 1, [if signed { 0x08 } else { 0 }, 0, 0], size);
        buf.extend_from_slice(&0u16.to_le_bytes());
        buf.extend_from_slice(&((size * 8) as u16).to_le_bytes());
        buf
    }

    fn f64_type() -> Vec<u8> {
        let mut buf = header(1, 1, [0x20, 63, 0], 8);
        buf.extend_from_slice(&0u16.to_le_bytes());
        buf.extend_from_slice(&64u16.to_le_bytes());
        buf.extend_from_slice(&[52, 11, 0, 52]);
        buf.extend_from_slice(&1023u32.to_le_bytes());
        buf
    }

    fn padded_name(name: &str) -> Vec<u8> {
        let mut buf = name.as_bytes().to_vec();
        buf.push(0);
        buf.resize(pad8(buf.len()), 0);
        buf
    }

    #[test]
    fn fixed_point_signed_little_endian() {
        let (dt, used) = Datatype::parse(&int_type(4, true)).unwrap();
        assert_eq!(used, 12);
        assert_eq!(
            dt,
            Datatype::FixedPoint {
                size: 4,
                byte_order: DatatypeByteOrder::LittleEndian,
                signed: true,
                bit_offset: 0,
                bit_precision: 32,
            }
        );
        assert_eq!(dt.class_id(), 0);
    }

    #[test]
    fn fixed_point_big_endian_unsigned() {
        let mut buf = header(0, 1, [0x01, 0, 0], 2);
        buf.extend_from_slice(&[0, 0, 16, 0]);
        let (dt, _) = Datatype::parse(&buf).unwrap();
        assert!(matches!(
            dt,
            Datatype::FixedPoint {
                byte_order: DatatypeByteOrder::BigEndian,
                signed: false,
                ..
            }
        ));
    }

    #[test]
    fn floating_point_ieee_double() {
        let (dt, used) = Datatype::parse(&f64_type()).unwrap();
        assert_eq!(used, 20);
        match dt {
            Datatype::FloatingPoint {
                size,
                byte_order,
                exponent_size,
                mantissa_size,
                exponent_bias,
                ..
            } => {
                assert_eq!(size, 8);
                assert_eq!(byte_order, DatatypeByteOrder::LittleEndian);
                assert_eq!(exponent_size, 11);
                assert_eq!(mantissa_size, 52);
                assert_eq!(exponent_bias, 1023);
            }
            other => panic!("expected float, got {other:?}"),
        }
    }

    #[test]
    fn fixed_string_padding_and_charset() {
        let buf = header(3, 1, [0x02 | 0x10, 0, 0], 32);
        let (dt, used) = Datatype::parse(&buf).unwrap();
        assert_eq!(used, 8);
        assert_eq!(
            dt,
            Datatype::String {
                size: 32,
                padding: StringPadding::SpacePad,
                charset: CharacterSet::Utf8,
            }
        );
    }

    #[test]
    fn variable_length_string() {
        let mut buf = header(9, 1, [0x01, 0x00, 0], 16);
        buf.extend_from_slice(&int_type(1, false));
        let (dt, used) = Datatype::parse(&buf).unwrap();
        assert_eq!(used, 20);
        assert!(dt.is_variable_string());
        assert_eq!(dt.type_size(), 16);
        match dt {
            Datatype::VariableLength {
                padding, charset, ..
            } => {
                assert_eq!(padding, Some(StringPadding::NullTerminate));
                assert_eq!(charset, Some(CharacterSet::Ascii));
            }
            other => panic!("expected vlen, got {other:?}"),
        }
    }

    #[test]
    fn compound_version_3_packed_offsets() {
        let mut buf = header(6, 3, [3, 0, 0], 16);
        buf.extend_from_slice(b"a\0");
        buf.push(0);
        buf.extend_from_slice(&int_type(4, true));
        buf.extend_from_slice(b"b\0");
        buf.push(4);
        buf.extend_from_slice(&int_type(4, true));
        buf.extend_from_slice(b"c\0");
        buf.push(8);
        buf.extend_from_slice(&f64_type());

        let (dt, used) = Datatype::parse(&buf).unwrap();
        assert_eq!(used, buf.len());
        let members = dt.compound_members().unwrap();
        let names: Vec<&str> = members.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["a", "b", "c"]);
        let offsets: Vec<u64> = members.iter().map(|m| m.byte_offset).collect();
        assert_eq!(offsets, [0, 4, 8]);
        assert_eq!(members[2].datatype.type_size(), 8);
    }

    #[test]
    fn compound_version_3_wide_offsets() {
        let mut buf = header(6, 3, [1, 0, 0], 300);
        buf.extend_from_slice(b"tail\0");
        buf.extend_from_slice(&296u16.to_le_bytes());
        buf.extend_from_slice(&int_type(4, false));
        let (dt, _) = Datatype::parse(&buf).unwrap();
        assert_eq!(dt.compound_members().unwrap()[0].byte_offset, 296);
    }

    #[test]
    fn compound_version_1_skips_dimension_block() {
        let mut buf = header(6, 1, [2, 0, 0], 12);
        buf.extend_from_slice(&padded_name("ChannelID"));
        buf.extend_from_slice(&0u32.to_le_bytes());
        buf.extend_from_slice(&[0u8; 28]);
        buf.extend_from_slice(&int_type(4, true));
        buf.extend_from_slice(&padded_name("Tick"));
        buf.extend_from_slice(&4u32.to_le_bytes());
        buf.extend_from_slice(&[0u8; 28]);
        buf.extend_from_slice(&int_type(8, true));

        let (dt, used) = Datatype::parse(&buf).unwrap();
        assert_eq!(used, buf.len());
        let members = dt.compound_members().unwrap();
        assert_eq!(members[0].name, "ChannelID");
        assert_eq!(members[1].name, "Tick");
        assert_eq!(members[1].byte_offset, 4);
        assert_eq!(members[1].datatype.type_size(), 8);
    }

    #[test]
    fn compound_version_2_padded_names() {
        let mut buf = header(6, 2, [2, 0, 0], 9);
        buf.extend_from_slice(&padded_name("Exponent"));
        buf.extend_from_slice(&0u32.to_le_bytes());
        buf.extend_from_slice(&int_type(4, true));
        buf.extend_from_slice(&padded_name("Label"));
        buf.extend_from_slice(&4u32.to_le_bytes());
        let mut s = header(3, 1, [0, 0, 0], 5);
        buf.append(&mut s);

        let (dt, used) = Datatype::parse(&buf).unwrap();
        assert_eq!(used, buf.len());
        let members = dt.compound_members().unwrap();
        assert_eq!(members[0].name, "Exponent");
        assert_eq!(members[1].name, "Label");
        assert_eq!(members[1].byte_offset, 4);
        assert_eq!(members[1].datatype.class_id(), 3);
    }

    #[test]
    fn compound_bad_version() {
        let buf = header(6, 4, [0, 0, 0], 0);
        assert_eq!(
            Datatype::parse(&buf),
            Err(FormatError::InvalidDatatypeVersion {
                class: 6,
                version: 4
            })
        );
    }

    #[test]
    fn enumeration_version_3() {
        let mut buf = header(8, 3, [2, 0, 0], 1);
        buf.extend_from_slice(&int_type(1, false));
        buf.extend_from_slice(b"OFF\0ON\0");
        buf.extend_from_slice(&[0, 1]);
        let (dt, used) = Datatype::parse(&buf).unwrap();
        assert_eq!(used, buf.len());
        match dt {
            Datatype::Enumeration { members, .. } => {
                assert_eq!(members[0].name, "OFF");
                assert_eq!(members[1].value, vec![1]);
            }
            other => panic!("expected enum, got {other:?}"),
        }
    }

    #[test]
    fn array_version_3_and_2() {
        let mut v3 = header(10, 3, [0, 0, 0], 24);
        v3.push(2);
        v3.extend_from_slice(&2u32.to_le_bytes());
        v3.extend_from_slice(&3u32.to_le_bytes());
        v3.extend_from_slice(&int_type(4, true));
        let (dt, used) = Datatype::parse(&v3).unwrap();
        assert_eq!(used, v3.len());
        assert_eq!(dt.type_size(), 24);
        assert!(matches!(dt, Datatype::Array { ref dimensions, .. } if dimensions == &[2, 3]));

        let mut v2 = header(10, 2, [0, 0, 0], 16);
        v2.extend_from_slice(&[1, 0, 0, 0]);
        v2.extend_from_slice(&4u32.to_le_bytes());
        v2.extend_from_slice(&0u32.to_le_bytes());
        v2.extend_from_slice(&int_type(4, true));
        let (dt, used) = Datatype::parse(&v2).unwrap();
        assert_eq!(used, v2.len());
        assert!(matches!(dt, Datatype::Array { ref dimensions, .. } if dimensions == &[4]));
    }

    #[test]
    fn opaque_reference_time_bitfield() {
        let mut op = header(5, 1, [8, 0, 0], 4);
        op.extend_from_slice(b"blob\0\0\0\0");
        assert_eq!(
            Datatype::parse(&op).unwrap(),
            (
                Datatype::Opaque {
                    size: 4,
                    tag: "blob".into()
                },
                16
            )
        );

        let r = header(7, 1, [0, 0, 0], 8);
        assert_eq!(Datatype::parse(&r).unwrap().0.class_id(), 7);

        let mut t = header(2, 1, [0, 0, 0], 4);
        t.extend_from_slice(&32u16.to_le_bytes());
        assert_eq!(Datatype::parse(&t).unwrap().1, 10);

        let mut b = header(4, 1, [0, 0, 0], 1);
        b.extend_from_slice(&[0, 0, 8, 0]);
        assert_eq!(Datatype::parse(&b).unwrap().0.class_id(), 4);
    }

    #[test]
    fn invalid_class_and_truncation() {
        let buf = header(12, 1, [0, 0, 0], 4);
        assert_eq!(
            Datatype::parse(&buf),
            Err(FormatError::InvalidDatatypeClass(12))
        );
        assert!(matches!(
            Datatype::parse(&[0x10, 0, 0]),
            Err(FormatError::UnexpectedEof { .. })
        ));
    }
}
