//! A small HDF5 writer for test files.
//!
//! Files use a version 2 superblock, version 2 object headers, compact
//! (link message) groups and one global heap collection holding every
//! variable-length string. Datasets are compact, contiguous or chunked with
//! a version 1 B-tree index and optional shuffle and deflate filters.

use std::io::{self, Write};
use std::path::Path;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use mcsh5_format::checksum::jenkins_lookup3;
use mcsh5_format::datatype::StringPadding;
use mcsh5_format::filter_pipeline::{FILTER_DEFLATE, FILTER_SHUFFLE};
use mcsh5_format::message_type::MessageType;
use mcsh5_format::signature::HDF5_SIGNATURE;

const UNDEFINED: u64 = u64::MAX;
const SUPERBLOCK_SIZE: usize = 48;
/// The global heap collection always sits right after the superblock.
pub const HEAP_ADDRESS: u64 = SUPERBLOCK_SIZE as u64;
const MIN_COLLECTION_SIZE: usize = 4096;
/// Size of a variable-length reference with 8-byte offsets.
const VLEN_SIZE: u32 = 16;

/// Element type of a dataset.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeSpec {
    Int {
        size: u32,
        signed: bool,
        big_endian: bool,
    },
    Float64,
    FixedString {
        size: u32,
        padding: StringPadding,
    },
    VlenString,
    /// Members are packed without padding.
    Compound(Vec<(String, TypeSpec)>),
    Array {
        base: Box<TypeSpec>,
        len: u32,
    },
}

impl TypeSpec {
    pub fn i16() -> TypeSpec {
        TypeSpec::int(2, true)
    }

    pub fn i32() -> TypeSpec {
        TypeSpec::int(4, true)
    }

    pub fn i64() -> TypeSpec {
        TypeSpec::int(8, true)
    }

    pub fn u8() -> TypeSpec {
        TypeSpec::int(1, false)
    }

    /// Little-endian integer of `size` bytes.
    pub fn int(size: u32, signed: bool) -> TypeSpec {
        TypeSpec::Int {
            size,
            signed,
            big_endian: false,
        }
    }

    /// Null-padded fixed-length string.
    pub fn fixed_string(size: u32) -> TypeSpec {
        TypeSpec::FixedString {
            size,
            padding: StringPadding::NullPad,
        }
    }

    /// Compound of named members in declared order.
    pub fn compound<S: Into<String>>(members: impl IntoIterator<Item = (S, TypeSpec)>) -> TypeSpec {
        TypeSpec::Compound(members.into_iter().map(|(n, t)| (n.into(), t)).collect())
    }

    /// Bytes per element.
    pub fn size(&self) -> u32 {
        match self {
            TypeSpec::Int { size, .. } | TypeSpec::FixedString { size, .. } => *size,
            TypeSpec::Float64 => 8,
            TypeSpec::VlenString => VLEN_SIZE,
            TypeSpec::Compound(members) => members.iter().map(|(_, t)| t.size()).sum(),
            TypeSpec::Array { base, len } => base.size() * len,
        }
    }

    fn message(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        match self {
            TypeSpec::Int {
                size,
                signed,
                big_endian,
            } => {
                let bf0 = u8::from(*big_endian) | if *signed { 0x08 } else { 0 };
                buf.extend_from_slice(&[0x10, bf0, 0, 0]);
                buf.extend_from_slice(&size.to_le_bytes());
                buf.extend_from_slice(&0u16.to_le_bytes());
                buf.extend_from_slice(&((size * 8) as u16).to_le_bytes());
            }
            TypeSpec::Float64 => {
                // IEEE little-endian, implied mantissa bit, sign at bit 63
                buf.extend_from_slice(&[0x11, 0x20, 0x3f, 0]);
                buf.extend_from_slice(&8u32.to_le_bytes());
                buf.extend_from_slice(&0u16.to_le_bytes());
                buf.extend_from_slice(&64u16.to_le_bytes());
                buf.extend_from_slice(&[52, 11, 0, 52]);
                buf.extend_from_slice(&1023u32.to_le_bytes());
            }
            TypeSpec::FixedString { size, padding } => {
                buf.extend_from_slice(&[0x13, padding_code(*padding), 0, 0]);
                buf.extend_from_slice(&size.to_le_bytes());
            }
            TypeSpec::VlenString => {
                // string, null terminated, ASCII, over unsigned bytes
                buf.extend_from_slice(&[0x19, 0x01, 0, 0]);
                buf.extend_from_slice(&VLEN_SIZE.to_le_bytes());
                buf.extend_from_slice(&TypeSpec::u8().message());
            }
            TypeSpec::Compound(members) => {
                let size = self.size();
                let count = members.len() as u16;
                buf.push(0x36);
                buf.extend_from_slice(&count.to_le_bytes());
                buf.push(0);
                buf.extend_from_slice(&size.to_le_bytes());
                let width = offset_width(size);
                let mut offset = 0u32;
                for (name, member) in members {
                    buf.extend_from_slice(name.as_bytes());
                    buf.push(0);
                    buf.extend_from_slice(&offset.to_le_bytes()[..width]);
                    buf.extend_from_slice(&member.message());
                    offset += member.size();
                }
            }
            TypeSpec::Array { base, len } => {
                buf.extend_from_slice(&[0x3a, 0, 0, 0]);
                buf.extend_from_slice(&self.size().to_le_bytes());
                buf.push(1);
                buf.extend_from_slice(&len.to_le_bytes());
                buf.extend_from_slice(&base.message());
            }
        }
        buf
    }
}

fn padding_code(padding: StringPadding) -> u8 {
    match padding {
        StringPadding::NullTerminate => 0,
        StringPadding::NullPad => 1,
        StringPadding::SpacePad => 2,
    }
}

/// Width of member offsets in a version 3 compound of `size` bytes.
fn offset_width(size: u32) -> usize {
    match size {
        0..=0xFF => 1,
        0x100..=0xFFFF => 2,
        0x1_0000..=0xFF_FFFF => 3,
        _ => 4,
    }
}

/// One element value, matched against a [`TypeSpec`] when encoded.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Text(String),
    Record(Vec<Value>),
    List(Vec<Value>),
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

/// Contents of a dataset.
#[derive(Debug, Clone, PartialEq)]
pub enum Data {
    /// Already encoded elements in row-major order.
    Raw(Vec<u8>),
    /// One value per element in row-major order.
    Values(Vec<Value>),
}

/// Where a dataset's elements are stored.
#[derive(Debug, Clone, PartialEq)]
pub enum Layout {
    Compact,
    Contiguous,
    /// Contiguous layout whose storage was never allocated.
    Unallocated,
    Chunked {
        chunk: Vec<u64>,
        deflate: Option<u32>,
        shuffle: bool,
    },
}

/// A dataset to write.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetSpec {
    pub name: String,
    pub datatype: TypeSpec,
    pub shape: Vec<u64>,
    pub data: Data,
    pub layout: Layout,
    /// Extent written to the dataspace message instead of `shape`. The
    /// stored elements still follow `shape`.
    pub declared_shape: Option<Vec<u64>>,
}

impl DatasetSpec {
    /// Contiguous dataset of `values`.
    pub fn new(
        name: impl Into<String>,
        datatype: TypeSpec,
        shape: Vec<u64>,
        values: Vec<Value>,
    ) -> DatasetSpec {
        DatasetSpec {
            name: name.into(),
            datatype,
            shape,
            data: Data::Values(values),
            layout: Layout::Contiguous,
            declared_shape: None,
        }
    }

    /// Contiguous dataset of little-endian `i32` elements.
    pub fn i32s(name: impl Into<String>, shape: Vec<u64>, values: &[i32]) -> DatasetSpec {
        DatasetSpec {
            name: name.into(),
            datatype: TypeSpec::i32(),
            shape,
            data: Data::Raw(values.iter().flat_map(|v| v.to_le_bytes()).collect()),
            layout: Layout::Contiguous,
            declared_shape: None,
        }
    }

    pub fn with_layout(mut self, layout: Layout) -> DatasetSpec {
        self.layout = layout;
        self
    }

    /// Claim an extent the stored data does not have.
    pub fn with_declared_shape(mut self, shape: Vec<u64>) -> DatasetSpec {
        self.declared_shape = Some(shape);
        self
    }
}

/// A member of a group.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Group(GroupSpec),
    Dataset(DatasetSpec),
    SoftLink { name: String, target: String },
}

/// A group and its members in creation order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GroupSpec {
    pub name: String,
    pub children: Vec<Node>,
}

impl GroupSpec {
    pub fn new(name: impl Into<String>) -> GroupSpec {
        GroupSpec {
            name: name.into(),
            children: Vec::new(),
        }
    }

    pub fn group(mut self, group: GroupSpec) -> GroupSpec {
        self.children.push(Node::Group(group));
        self
    }

    pub fn dataset(mut self, dataset: DatasetSpec) -> GroupSpec {
        self.children.push(Node::Dataset(dataset));
        self
    }

    pub fn soft_link(mut self, name: impl Into<String>, target: impl Into<String>) -> GroupSpec {
        self.children.push(Node::SoftLink {
            name: name.into(),
            target: target.into(),
        });
        self
    }
}

/// Builds a whole file from a tree rooted at `/`.
///
/// ```
/// use mcsh5_fixtures::writer::{DatasetSpec, GroupSpec, H5Builder};
///
/// let root = GroupSpec::default()
///     .group(GroupSpec::new("Data").dataset(DatasetSpec::i32s("x", vec![3], &[1, 2, 3])));
/// let bytes = H5Builder::new(root).finish().unwrap();
/// assert_eq!(&bytes[1..4], b"HDF");
/// ```
#[derive(Debug, Clone, Default)]
pub struct H5Builder {
    root: GroupSpec,
}

impl H5Builder {
    pub fn new(root: GroupSpec) -> H5Builder {
        H5Builder { root }
    }

    /// Serialize the file.
    pub fn finish(&self) -> io::Result<Vec<u8>> {
        let mut heap = GlobalHeap::default();
        let prepared = prepare_group(&self.root, &mut heap)?;

        let mut out = vec![0u8; SUPERBLOCK_SIZE];
        if !heap.objects.is_empty() {
            out.extend_from_slice(&heap.serialize());
        }
        let root = write_group(&prepared, &mut out)?;

        let eof = out.len() as u64;
        let mut sb = HDF5_SIGNATURE.to_vec();
        sb.extend_from_slice(&[2, 8, 8, 0]);
        sb.extend_from_slice(&0u64.to_le_bytes());
        sb.extend_from_slice(&UNDEFINED.to_le_bytes());
        sb.extend_from_slice(&eof.to_le_bytes());
        sb.extend_from_slice(&root.to_le_bytes());
        let sum = jenkins_lookup3(&sb);
        sb.extend_from_slice(&sum.to_le_bytes());
        out[..SUPERBLOCK_SIZE].copy_from_slice(&sb);
        Ok(out)
    }

    /// Serialize the file and write it to `path`.
    pub fn write_to(&self, path: impl AsRef<Path>) -> io::Result<()> {
        std::fs::write(path, self.finish()?)
    }
}

#[derive(Default)]
struct GlobalHeap {
    objects: Vec<Vec<u8>>,
}

impl GlobalHeap {
    /// Store `bytes` and return its object index.
    fn insert(&mut self, bytes: &[u8]) -> u32 {
        self.objects.push(bytes.to_vec());
        self.objects.len() as u32
    }

    fn serialize(&self) -> Vec<u8> {
        let mut body = Vec::new();
        for (i, object) in self.objects.iter().enumerate() {
            body.extend_from_slice(&((i + 1) as u16).to_le_bytes());
            body.extend_from_slice(&1u16.to_le_bytes());
            body.extend_from_slice(&[0; 4]);
            body.extend_from_slice(&(object.len() as u64).to_le_bytes());
            body.extend_from_slice(object);
            body.resize(body.len() + pad(object.len()), 0);
        }
        let used = 16 + body.len();
        let total = used.max(MIN_COLLECTION_SIZE);
        if total - used >= 16 {
            // free space object: index 0, size of the remainder
            body.extend_from_slice(&[0; 8]);
            body.extend_from_slice(&((total - used) as u64).to_le_bytes());
        }

        let mut buf = b"GCOL".to_vec();
        buf.extend_from_slice(&[1, 0, 0, 0]);
        buf.extend_from_slice(&(total as u64).to_le_bytes());
        buf.extend_from_slice(&body);
        buf.resize(total, 0);
        buf
    }
}

fn pad(len: usize) -> usize {
    (8 - len % 8) % 8
}

fn invalid(message: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, message)
}

fn encode(ty: &TypeSpec, value: &Value, heap: &mut GlobalHeap, out: &mut Vec<u8>) -> io::Result<()> {
    match (ty, value) {
        (
            TypeSpec::Int {
                size, big_endian, ..
            },
            Value::Int(v),
        ) => {
            let size = *size as usize;
            if *big_endian {
                out.extend_from_slice(&v.to_be_bytes()[8 - size..]);
            } else {
                out.extend_from_slice(&v.to_le_bytes()[..size]);
            }
        }
        (TypeSpec::Float64, Value::Float(v)) => out.extend_from_slice(&v.to_le_bytes()),
        (TypeSpec::FixedString { size, padding }, Value::Text(s)) => {
            let size = *size as usize;
            let fill = if *padding == StringPadding::SpacePad { b' ' } else { 0 };
            let bytes = &s.as_bytes()[..s.len().min(size)];
            out.extend_from_slice(bytes);
            out.resize(out.len() + size - bytes.len(), fill);
        }
        (TypeSpec::VlenString, Value::Text(s)) => {
            let (collection, index) = if s.is_empty() {
                (0, 0)
            } else {
                (HEAP_ADDRESS, heap.insert(s.as_bytes()))
            };
            out.extend_from_slice(&(s.len() as u32).to_le_bytes());
            out.extend_from_slice(&collection.to_le_bytes());
            out.extend_from_slice(&index.to_le_bytes());
        }
        (TypeSpec::Compound(members), Value::Record(fields)) if members.len() == fields.len() => {
            for ((_, member), field) in members.iter().zip(fields) {
                encode(member, field, heap, out)?;
            }
        }
        (TypeSpec::Array { base, len }, Value::List(items)) if items.len() == *len as usize => {
            for item in items {
                encode(base, item, heap, out)?;
            }
        }
        (ty, value) => return Err(invalid(format!("cannot encode {value:?} as {ty:?}"))),
    }
    Ok(())
}

enum Prepared {
    Group {
        name: String,
        children: Vec<Prepared>,
    },
    Dataset {
        name: String,
        datatype: Vec<u8>,
        shape: Vec<u64>,
        extent: Vec<u64>,
        element_size: usize,
        payload: Vec<u8>,
        layout: Layout,
    },
    SoftLink {
        name: String,
        target: String,
    },
}

fn prepare_group(group: &GroupSpec, heap: &mut GlobalHeap) -> io::Result<Prepared> {
    let children = group
        .children
        .iter()
        .map(|child| match child {
            Node::Group(g) => prepare_group(g, heap),
            Node::Dataset(d) => prepare_dataset(d, heap),
            Node::SoftLink { name, target } => Ok(Prepared::SoftLink {
                name: name.clone(),
                target: target.clone(),
            }),
        })
        .collect::<io::Result<Vec<_>>>()?;
    Ok(Prepared::Group {
        name: group.name.clone(),
        children,
    })
}

fn prepare_dataset(dataset: &DatasetSpec, heap: &mut GlobalHeap) -> io::Result<Prepared> {
    let element_size = dataset.datatype.size() as usize;
    let elements: u64 = dataset.shape.iter().product();
    let payload = match &dataset.data {
        Data::Raw(bytes) => bytes.clone(),
        Data::Values(values) => {
            let mut out = Vec::with_capacity(values.len() * element_size);
            for value in values {
                encode(&dataset.datatype, value, heap, &mut out)?;
            }
            out
        }
    };
    if payload.len() as u64 != elements * element_size as u64 {
        return Err(invalid(format!(
            "{}: {} bytes for {elements} elements of {element_size} bytes",
            dataset.name,
            payload.len()
        )));
    }
    Ok(Prepared::Dataset {
        name: dataset.name.clone(),
        datatype: dataset.datatype.message(),
        shape: dataset.shape.clone(),
        extent: dataset.declared_shape.clone().unwrap_or_else(|| dataset.shape.clone()),
        element_size,
        payload,
        layout: dataset.layout.clone(),
    })
}

/// Write `node` and everything below it; returns its object header address.
fn write_group(node: &Prepared, out: &mut Vec<u8>) -> io::Result<u64> {
    let Prepared::Group { children, .. } = node else {
        return write_object(node, out);
    };
    let mut links = Vec::with_capacity(children.len());
    for child in children {
        let link = match child {
            Prepared::SoftLink { name, target } => soft_link(name, target),
            Prepared::Group { name, .. } | Prepared::Dataset { name, .. } => {
                hard_link(name, write_object(child, out)?)
            }
        };
        links.push(link);
    }

    let mut header = HeaderWriter::default();
    let mut info = vec![0, 0];
    info.extend_from_slice(&UNDEFINED.to_le_bytes());
    info.extend_from_slice(&UNDEFINED.to_le_bytes());
    header.add(MessageType::LinkInfo, info, 0);
    header.add(MessageType::GroupInfo, vec![0, 0], 0);
    for link in links {
        header.add(MessageType::Link, link, 0);
    }
    Ok(append(out, &header.serialize()))
}

fn write_object(node: &Prepared, out: &mut Vec<u8>) -> io::Result<u64> {
    match node {
        Prepared::Group { .. } => write_group(node, out),
        Prepared::Dataset {
            datatype,
            shape,
            extent,
            element_size,
            payload,
            layout,
            ..
        } => {
            let (layout_msg, pipeline) = write_storage(layout, shape, *element_size, payload, out)?;
            let mut header = HeaderWriter::default();
            header.add(MessageType::Datatype, datatype.clone(), 0x01);
            header.add(MessageType::Dataspace, dataspace(extent), 0);
            header.add(MessageType::FillValue, vec![3, 0x0a], 0x01);
            header.add(MessageType::DataLayout, layout_msg, 0);
            if let Some(pipeline) = pipeline {
                header.add(MessageType::FilterPipeline, pipeline, 0);
            }
            Ok(append(out, &header.serialize()))
        }
        Prepared::SoftLink { name, .. } => Err(invalid(format!("{name} is a link, not an object"))),
    }
}

fn append(out: &mut Vec<u8>, bytes: &[u8]) -> u64 {
    let address = out.len() as u64;
    out.extend_from_slice(bytes);
    address
}

fn dataspace(shape: &[u64]) -> Vec<u8> {
    let space_type = if shape.is_empty() { 0 } else { 1 };
    let mut buf = vec![2, shape.len() as u8, 0, space_type];
    for dim in shape {
        buf.extend_from_slice(&dim.to_le_bytes());
    }
    buf
}

fn hard_link(name: &str, address: u64) -> Vec<u8> {
    let mut buf = vec![1, 0, name.len() as u8];
    buf.extend_from_slice(name.as_bytes());
    buf.extend_from_slice(&address.to_le_bytes());
    buf
}

fn soft_link(name: &str, target: &str) -> Vec<u8> {
    let mut buf = vec![1, 0x08, 1, name.len() as u8];
    buf.extend_from_slice(name.as_bytes());
    buf.extend_from_slice(&(target.len() as u16).to_le_bytes());
    buf.extend_from_slice(target.as_bytes());
    buf
}

/// Write a dataset's elements; returns the layout message and the filter
/// pipeline message, if any.
fn write_storage(
    layout: &Layout,
    shape: &[u64],
    element_size: usize,
    payload: &[u8],
    out: &mut Vec<u8>,
) -> io::Result<(Vec<u8>, Option<Vec<u8>>)> {
    let mut msg = vec![3];
    match layout {
        Layout::Compact => {
            msg.push(0);
            msg.extend_from_slice(&(payload.len() as u16).to_le_bytes());
            msg.extend_from_slice(payload);
            Ok((msg, None))
        }
        Layout::Contiguous | Layout::Unallocated => {
            let address = match layout {
                Layout::Contiguous if !payload.is_empty() => append(out, payload),
                _ => UNDEFINED,
            };
            msg.push(1);
            msg.extend_from_slice(&address.to_le_bytes());
            msg.extend_from_slice(&(payload.len() as u64).to_le_bytes());
            Ok((msg, None))
        }
        Layout::Chunked {
            chunk,
            deflate,
            shuffle,
        } => {
            if chunk.len() != shape.len() || chunk.contains(&0) {
                return Err(invalid(format!("chunk {chunk:?} does not fit shape {shape:?}")));
            }
            let btree = write_chunks(shape, chunk, element_size, payload, *deflate, *shuffle, out)?;
            msg.push(2);
            msg.push(shape.len() as u8 + 1);
            msg.extend_from_slice(&btree.to_le_bytes());
            for dim in chunk {
                msg.extend_from_slice(&(*dim as u32).to_le_bytes());
            }
            msg.extend_from_slice(&(element_size as u32).to_le_bytes());

            let mut filters = Vec::new();
            if *shuffle {
                filters.push((FILTER_SHUFFLE, element_size as u32));
            }
            if let Some(level) = deflate {
                filters.push((FILTER_DEFLATE, *level));
            }
            let pipeline = (!filters.is_empty()).then(|| {
                let mut buf = vec![2, filters.len() as u8];
                for (id, value) in filters {
                    buf.extend_from_slice(&id.to_le_bytes());
                    buf.extend_from_slice(&0u16.to_le_bytes());
                    buf.extend_from_slice(&1u16.to_le_bytes());
                    buf.extend_from_slice(&value.to_le_bytes());
                }
                buf
            });
            Ok((msg, pipeline))
        }
    }
}

/// Write every chunk and a single-leaf B-tree over them; returns the tree
/// address, undefined when the dataset has no elements.
fn write_chunks(
    shape: &[u64],
    chunk: &[u64],
    element_size: usize,
    payload: &[u8],
    deflate: Option<u32>,
    shuffle: bool,
    out: &mut Vec<u8>,
) -> io::Result<u64> {
    let rank = shape.len();
    let grid: Vec<u64> = shape.iter().zip(chunk).map(|(&d, &c)| d.div_ceil(c)).collect();
    if grid.iter().any(|&g| g == 0) {
        return Ok(UNDEFINED);
    }
    let chunk_elements: u64 = chunk.iter().product();

    let mut entries = Vec::new();
    let mut index = vec![0u64; rank];
    loop {
        let origin: Vec<u64> = index.iter().zip(chunk).map(|(&i, &c)| i * c).collect();
        let mut bytes = vec![0u8; chunk_elements as usize * element_size];
        for local in 0..chunk_elements {
            let mut rem = local;
            let mut global = 0u64;
            let mut inside = true;
            for d in 0..rank {
                let inner: u64 = chunk[d + 1..].iter().product();
                let coord = origin[d] + rem / inner;
                rem %= inner;
                if coord >= shape[d] {
                    inside = false;
                    break;
                }
                global = global * shape[d] + coord;
            }
            if inside {
                let src = global as usize * element_size;
                let dst = local as usize * element_size;
                bytes[dst..dst + element_size].copy_from_slice(&payload[src..src + element_size]);
            }
        }
        if shuffle && element_size > 1 {
            bytes = shuffle_bytes(&bytes, element_size);
        }
        if let Some(level) = deflate {
            let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(level));
            encoder.write_all(&bytes)?;
            bytes = encoder.finish()?;
        }
        let address = append(out, &bytes);
        entries.push((bytes.len() as u32, origin, address));

        // advance the chunk index, last dimension fastest
        let mut d = rank;
        loop {
            if d == 0 {
                return Ok(append(out, &btree_leaf(&entries, shape)));
            }
            d -= 1;
            index[d] += 1;
            if index[d] < grid[d] {
                break;
            }
            index[d] = 0;
        }
    }
}

fn shuffle_bytes(data: &[u8], element_size: usize) -> Vec<u8> {
    let count = data.len() / element_size;
    let mut out = vec![0u8; data.len()];
    for (i, element) in data.chunks_exact(element_size).enumerate() {
        for (b, &byte) in element.iter().enumerate() {
            out[b * count + i] = byte;
        }
    }
    out
}

fn btree_leaf(entries: &[(u32, Vec<u64>, u64)], shape: &[u64]) -> Vec<u8> {
    let mut buf = b"TREE".to_vec();
    buf.extend_from_slice(&[1, 0]);
    buf.extend_from_slice(&(entries.len() as u16).to_le_bytes());
    buf.extend_from_slice(&UNDEFINED.to_le_bytes());
    buf.extend_from_slice(&UNDEFINED.to_le_bytes());
    let key = |buf: &mut Vec<u8>, size: u32, offsets: &[u64]| {
        buf.extend_from_slice(&size.to_le_bytes());
        buf.extend_from_slice(&0u32.to_le_bytes());
        for offset in offsets {
            buf.extend_from_slice(&offset.to_le_bytes());
        }
        buf.extend_from_slice(&0u64.to_le_bytes());
    };
    for (size, origin, address) in entries {
        key(&mut buf, *size, origin);
        buf.extend_from_slice(&address.to_le_bytes());
    }
    key(&mut buf, 0, shape);
    buf
}

/// Collects messages and serializes a version 2 object header.
#[derive(Default)]
struct HeaderWriter {
    messages: Vec<(MessageType, Vec<u8>, u8)>,
}

impl HeaderWriter {
    fn add(&mut self, msg_type: MessageType, data: Vec<u8>, flags: u8) {
        self.messages.push((msg_type, data, flags));
    }

    fn serialize(&self) -> Vec<u8> {
        let total: usize = self.messages.iter().map(|(_, d, _)| 4 + d.len()).sum();
        let (flags, width) = match total {
            0..=0xFF => (0x00u8, 1),
            0x100..=0xFFFF => (0x01, 2),
            _ => (0x02, 4),
        };
        let mut buf = b"OHDR".to_vec();
        buf.push(2);
        buf.push(flags);
        buf.extend_from_slice(&(total as u32).to_le_bytes()[..width]);
        for (msg_type, data, msg_flags) in &self.messages {
            buf.push(msg_type.to_u16() as u8);
            buf.extend_from_slice(&(data.len() as u16).to_le_bytes());
            buf.push(*msg_flags);
            buf.extend_from_slice(data);
        }
        let sum = jenkins_lookup3(&buf);
        buf.extend_from_slice(&sum.to_le_bytes());
        buf
    }
}
