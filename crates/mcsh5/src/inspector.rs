//! Schema-agnostic description of compound datasets.

use std::fmt::{self, Write};

use mcsh5_format::datatype::{CharacterSet, Datatype, DatatypeByteOrder, StringPadding};

use crate::error::{Error, Result};
use crate::reader::{Dataset, SpaceHandle, TypeHandle};

const RULE: &str = "-------------------------------------";

/// Primitive kind of a compound field, from its type class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Integer,
    Float,
    Time,
    String,
    BitField,
    Opaque,
    Compound,
    Reference,
    Enum,
    VariableLength,
    Array,
    Unrecognized(u8),
}

impl FieldKind {
    /// Kind of a datatype. Variable-length strings report [`FieldKind::String`].
    pub fn of(datatype: &Datatype) -> FieldKind {
        if datatype.is_variable_string() {
            return FieldKind::String;
        }
        FieldKind::from_class(datatype.class_id())
    }

    /// Kind of a raw type class identifier.
    pub fn from_class(class: u8) -> FieldKind {
        match class {
            0 => FieldKind::Integer,
            1 => FieldKind::Float,
            2 => FieldKind::Time,
            3 => FieldKind::String,
            4 => FieldKind::BitField,
            5 => FieldKind::Opaque,
            6 => FieldKind::Compound,
            7 => FieldKind::Reference,
            8 => FieldKind::Enum,
            9 => FieldKind::VariableLength,
            10 => FieldKind::Array,
            other => FieldKind::Unrecognized(other),
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldKind::Integer => "INTEGER",
            FieldKind::Float => "FLOAT",
            FieldKind::Time => "TIME",
            FieldKind::String => "STRING",
            FieldKind::BitField => "BITFIELD",
            FieldKind::Opaque => "OPAQUE",
            FieldKind::Compound => "COMPOUND",
            FieldKind::Reference => "REFERENCE",
            FieldKind::Enum => "ENUM",
            FieldKind::VariableLength => "VLEN",
            FieldKind::Array => "ARRAY",
            FieldKind::Unrecognized(class) => return write!(f, "UNKNOWN: {class}"),
        };
        f.write_str(name)
    }
}

/// One member of a compound type.
#[derive(Debug)]
pub struct Field {
    name: String,
    offset: u64,
    size: u64,
    kind: FieldKind,
    handle: TypeHandle,
}

impl Field {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sum of the sizes of the fields before this one.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    /// Handle on the member's own datatype.
    pub fn datatype(&self) -> &Datatype {
        self.handle.datatype()
    }

    /// Byte order, or `None` for types without one.
    pub fn byte_order(&self) -> Option<DatatypeByteOrder> {
        byte_order(self.datatype())
    }

    /// Signedness of integer fields.
    pub fn signed(&self) -> Option<bool> {
        match self.datatype() {
            Datatype::FixedPoint { signed, .. } => Some(*signed),
            _ => None,
        }
    }

    /// Whether this is a variable-length string.
    pub fn is_variable_length(&self) -> bool {
        self.datatype().is_variable_string()
    }

    /// String padding of string fields.
    pub fn padding(&self) -> Option<StringPadding> {
        match self.datatype() {
            Datatype::String { padding, .. } => Some(*padding),
            Datatype::VariableLength { padding, .. } => *padding,
            _ => None,
        }
    }

    /// Character set of string fields.
    pub fn charset(&self) -> Option<CharacterSet> {
        match self.datatype() {
            Datatype::String { charset, .. } => Some(*charset),
            Datatype::VariableLength { charset, .. } => *charset,
            _ => None,
        }
    }

    fn describe(&self, out: &mut String) -> fmt::Result {
        writeln!(out, "Name: {}", self.name)?;
        writeln!(out, "Offset: {}", self.offset)?;
        writeln!(out, "Size: {}", self.size)?;
        writeln!(out, "Type: {}", self.kind)?;
        writeln!(out, "Byte order: {}", order_name(self.byte_order()))?;
        match self.kind {
            FieldKind::Integer => {
                let sign = match self.signed() {
                    Some(true) => "With sign",
                    Some(false) => "No sign",
                    None => "Unknown",
                };
                writeln!(out, "Sign: {sign}")?;
            }
            FieldKind::String => {
                let vlen = if self.is_variable_length() { "True" } else { "False" };
                writeln!(out, "Is variable length: {vlen}")?;
                writeln!(out, "Padding: {}", padding_name(self.padding()))?;
                writeln!(out, "Char Set: {}", charset_name(self.charset()))?;
            }
            _ => {}
        }
        writeln!(out, "{RULE}")
    }
}

fn byte_order(datatype: &Datatype) -> Option<DatatypeByteOrder> {
    match datatype {
        Datatype::FixedPoint { byte_order, .. }
        | Datatype::FloatingPoint { byte_order, .. }
        | Datatype::Time { byte_order, .. }
        | Datatype::BitField { byte_order, .. } => Some(*byte_order),
        Datatype::Enumeration { base_type, .. } | Datatype::Array { base_type, .. } => {
            byte_order(base_type)
        }
        _ => None,
    }
}

fn order_name(order: Option<DatatypeByteOrder>) -> &'static str {
    match order {
        Some(DatatypeByteOrder::LittleEndian) => "Little Endian",
        Some(DatatypeByteOrder::BigEndian) => "Big Endian",
        Some(DatatypeByteOrder::Vax) => "Vax",
        None => "None",
    }
}

fn padding_name(padding: Option<StringPadding>) -> &'static str {
    match padding {
        Some(StringPadding::NullTerminate) => "C-style NULL terminated",
        Some(StringPadding::NullPad) => "Pad with zeros",
        Some(StringPadding::SpacePad) => "Pad with spaces",
        None => "Unknown",
    }
}

fn charset_name(charset: Option<CharacterSet>) -> &'static str {
    match charset {
        Some(CharacterSet::Ascii) => "ASCII",
        Some(CharacterSet::Utf8) => "UTF-8",
        None => "Unknown",
    }
}

/// Field table and extent of a compound dataset.
///
/// Keeps a type handle, a space handle and one type handle per field open
/// until dropped.
#[derive(Debug)]
pub struct DatasetInspector {
    fields: Vec<Field>,
    dimensions: Vec<u64>,
    datatype: TypeHandle,
    dataspace: SpaceHandle,
}

impl DatasetInspector {
    /// Describe `dataset`, which must have a compound element type.
    ///
    /// Offsets are a running sum of member sizes; the offsets stored in the
    /// file are not consulted.
    pub fn build(dataset: &Dataset) -> Result<DatasetInspector> {
        let datatype = dataset.type_handle();
        let members = datatype
            .datatype()
            .compound_members()
            .ok_or_else(|| Error::NotCompound {
                path: dataset.path().to_string(),
            })?;

        let mut offset = 0u64;
        let mut fields = Vec::with_capacity(members.len());
        for (index, member) in members.iter().enumerate() {
            let handle = datatype.member(index).ok_or_else(|| {
                Error::Schema(format!("{}: member {index} vanished", dataset.path()))
            })?;
            let size = u64::from(member.datatype.type_size());
            fields.push(Field {
                name: member.name.clone(),
                offset,
                size,
                kind: FieldKind::of(&member.datatype),
                handle,
            });
            offset += size;
        }

        let dataspace = dataset.space_handle();
        let dimensions = dataspace.dimensions().to_vec();
        Ok(DatasetInspector {
            fields,
            dimensions,
            datatype,
            dataspace,
        })
    }

    /// Fields in declared order.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Dimension sizes of the dataset.
    pub fn dimensions(&self) -> &[u64] {
        &self.dimensions
    }

    /// The compound type being described.
    pub fn datatype(&self) -> &Datatype {
        self.datatype.datatype()
    }

    /// Render the field table and extent as a multi-line report.
    pub fn structure(&self) -> Result<String> {
        let mut out = String::new();
        writeln!(out, "{RULE}")?;
        for field in &self.fields {
            field.describe(&mut out)?;
        }
        writeln!(out, "Simple dataspace: {}", self.dataspace.is_simple())?;
        writeln!(out, "Dataspace rank: {}", self.dimensions.len())?;
        out.push_str("Dimensions: [ ");
        for dim in &self.dimensions {
            write!(out, "{dim} ")?;
        }
        writeln!(out, "]")?;
        writeln!(out, "{RULE}")?;
        Ok(out)
    }
}

impl fmt::Display for DatasetInspector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let report = self.structure().map_err(|_| fmt::Error)?;
        f.write_str(&report)
    }
}
