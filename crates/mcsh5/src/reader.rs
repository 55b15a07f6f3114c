//! Read-only handles: [`File`], [`Group`], [`Dataset`], [`TypeHandle`] and
//! [`SpaceHandle`].
//!
//! Handles share the file through an `Rc`, so they can outlive the [`File`]
//! they came from and are not `Send`. None of them is `Clone`: each one
//! stands for exactly one open handle in the file's registry.

use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use log::{debug, trace};
use mcsh5_format::data_layout::DataLayout;
use mcsh5_format::data_read::{self, DatasetStorage};
use mcsh5_format::dataspace::Dataspace;
use mcsh5_format::datatype::Datatype;
use mcsh5_format::filter_pipeline::FilterPipeline;
use mcsh5_format::group::{self, FileLayout, GroupEntry};
use mcsh5_format::message_type::MessageType;
use mcsh5_format::object_header::ObjectHeader;
use mcsh5_format::selection::Hyperslab;
use mcsh5_format::signature;
use mcsh5_format::superblock::Superblock;
use mcsh5_format::FormatError;

use crate::error::{Error, Result};
use crate::handle::{HandleKind, HandleRegistry, Token};
use crate::options::OpenOptions;
use crate::storage::Storage;

/// State shared by every handle of one open file.
pub(crate) struct FileInner {
    storage: Storage,
    base: usize,
    superblock: Superblock,
    pub(crate) layout: FileLayout,
    path: Option<PathBuf>,
    pub(crate) registry: HandleRegistry,
}

impl FileInner {
    /// File bytes starting at the superblock's base address.
    pub(crate) fn data(&self) -> &[u8] {
        &self.storage.bytes()[self.base..]
    }
}

/// Join a parent path and a member name into a canonical path.
pub(crate) fn child_path(parent: &str, name: &str) -> String {
    if parent == "/" {
        format!("/{name}")
    } else {
        format!("{parent}/{name}")
    }
}

fn canonical(path: &str) -> String {
    let parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();
    format!("/{}", parts.join("/"))
}

/// An open HDF5 file.
pub struct File {
    token: Token,
}

impl File {
    /// Open the file at `path` read-only.
    ///
    /// Any failure to read the file or to find a valid superblock and root
    /// group is reported as [`Error::Open`].
    pub fn open(path: impl AsRef<Path>, options: &OpenOptions) -> Result<File> {
        let path = path.as_ref();
        let storage =
            Storage::open(path, options.memory_map).map_err(|e| Error::open(path, e))?;
        Self::from_storage(storage, Some(path.to_path_buf()), options)
    }

    /// Open a file held in memory.
    pub fn from_bytes(bytes: Vec<u8>, options: &OpenOptions) -> Result<File> {
        Self::from_storage(Storage::Owned(bytes), None, options)
    }

    fn from_storage(
        storage: Storage,
        path: Option<PathBuf>,
        options: &OpenOptions,
    ) -> Result<File> {
        let display = path.clone().unwrap_or_else(|| PathBuf::from("<memory>"));
        let (superblock, base) =
            Self::locate(storage.bytes(), options).map_err(|e| Error::open(&display, e))?;
        let layout = FileLayout {
            offset_size: superblock.offset_size,
            length_size: superblock.length_size,
            verify_checksums: options.verify_checksums,
        };
        let inner = FileInner {
            storage,
            base,
            superblock,
            layout,
            path,
            registry: HandleRegistry::default(),
        };
        // a file whose root group cannot be read is not usable at all
        layout
            .object_header(inner.data(), inner.superblock.root_group_address)
            .map_err(|e| Error::open(&display, e))?;
        debug!(
            "opened {} (superblock v{}, {} bytes, mapped: {})",
            display.display(),
            inner.superblock.version,
            inner.storage.bytes().len(),
            inner.storage.is_mapped()
        );
        let inner = Rc::new(inner);
        Ok(File {
            token: Token::new(inner, HandleKind::File, "/"),
        })
    }

    fn locate(
        bytes: &[u8],
        options: &OpenOptions,
    ) -> std::result::Result<(Superblock, usize), FormatError> {
        let offset = signature::find_signature(bytes)?;
        let superblock = Superblock::parse(bytes, offset, options.verify_checksums)?;
        // Files with a user block either record its size or rely on the signature position.
        let base = match superblock.base_address {
            0 => offset,
            b => usize::try_from(b).map_err(|_| FormatError::UnexpectedEof {
                expected: usize::MAX,
                available: bytes.len(),
            })?,
        };
        if base > bytes.len() {
            return Err(FormatError::UnexpectedEof {
                expected: base,
                available: bytes.len(),
            });
        }
        Ok((superblock, base))
    }

    fn inner(&self) -> &Rc<FileInner> {
        self.token.file()
    }

    /// Path the file was opened from, `None` for in-memory files.
    pub fn path(&self) -> Option<&Path> {
        self.inner().path.as_deref()
    }

    /// The parsed superblock.
    pub fn superblock(&self) -> &Superblock {
        &self.inner().superblock
    }

    /// Open the root group.
    pub fn root(&self) -> Result<Group> {
        Group::open(
            Rc::clone(self.inner()),
            "/".to_string(),
            self.inner().superblock.root_group_address,
        )
    }

    /// Open the group at `path`, relative to the root.
    pub fn group(&self, path: &str) -> Result<Group> {
        let address = self.resolve(path)?;
        Group::open(Rc::clone(self.inner()), canonical(path), address)
    }

    /// Open the dataset at `path`, relative to the root.
    pub fn dataset(&self, path: &str) -> Result<Dataset> {
        let address = self.resolve(path)?;
        Dataset::open(Rc::clone(self.inner()), canonical(path), address)
    }

    fn resolve(&self, path: &str) -> Result<u64> {
        let inner = self.inner();
        Ok(group::resolve_path(
            inner.data(),
            inner.superblock.root_group_address,
            path,
            &inner.layout,
        )?)
    }

    /// Number of handles of this file still open, this one included.
    pub fn open_handles(&self) -> usize {
        self.inner().registry.total()
    }

    /// Number of open handles of one kind.
    pub fn open_handles_of(&self, kind: HandleKind) -> usize {
        self.inner().registry.count(kind)
    }
}

impl fmt::Debug for File {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("File")
            .field("path", &self.path())
            .field("open_handles", &self.open_handles())
            .finish()
    }
}

/// An open group.
#[derive(Debug)]
pub struct Group {
    token: Token,
    path: String,
    address: u64,
    header: ObjectHeader,
}

impl Group {
    fn open(file: Rc<FileInner>, path: String, address: u64) -> Result<Group> {
        let header = file.layout.object_header(file.data(), address)?;
        if header.find(MessageType::DataLayout).is_some() {
            return Err(Error::Schema(format!("{path} is not a group")));
        }
        let token = Token::new(file, HandleKind::Group, &path);
        Ok(Group {
            token,
            path,
            address,
            header,
        })
    }

    /// Canonical path of the group.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Object header address.
    pub fn address(&self) -> u64 {
        self.address
    }

    /// Hard-linked members in the order the file stores them.
    pub fn entries(&self) -> Result<Vec<GroupEntry>> {
        let file = self.token.file();
        Ok(group::group_entries(file.data(), &self.header, &file.layout)?)
    }

    /// Names of the members.
    pub fn member_names(&self) -> Result<Vec<String>> {
        Ok(self.entries()?.into_iter().map(|e| e.name).collect())
    }

    fn member(&self, name: &str) -> Result<GroupEntry> {
        self.entries()?
            .into_iter()
            .find(|e| e.name == name)
            .ok_or_else(|| Error::Format(FormatError::PathNotFound(child_path(&self.path, name))))
    }

    /// Open the child group `name`.
    pub fn group(&self, name: &str) -> Result<Group> {
        let entry = self.member(name)?;
        Group::open(
            Rc::clone(self.token.file()),
            child_path(&self.path, name),
            entry.address,
        )
    }

    /// Open the child dataset `name`.
    pub fn dataset(&self, name: &str) -> Result<Dataset> {
        let entry = self.member(name)?;
        Dataset::open(
            Rc::clone(self.token.file()),
            child_path(&self.path, name),
            entry.address,
        )
    }

    /// Whether the member at `address` is a dataset rather than a group.
    pub(crate) fn is_dataset_at(&self, address: u64) -> Result<bool> {
        let file = self.token.file();
        let header = file.layout.object_header(file.data(), address)?;
        Ok(header.find(MessageType::DataLayout).is_some())
    }
}

/// An open dataset with its type, extent and storage description.
#[derive(Debug)]
pub struct Dataset {
    token: Token,
    path: String,
    datatype: Datatype,
    dataspace: Dataspace,
    layout: DataLayout,
    pipeline: Option<FilterPipeline>,
}

impl Dataset {
    fn open(file: Rc<FileInner>, path: String, address: u64) -> Result<Dataset> {
        let header = file.layout.object_header(file.data(), address)?;
        let fl = file.layout;
        if header.find(MessageType::DataLayout).is_none() {
            return Err(Error::Schema(format!("{path} is not a dataset")));
        }
        let (datatype, _) = Datatype::parse(header.require(MessageType::Datatype, "datatype")?)?;
        let dataspace = Dataspace::parse(
            header.require(MessageType::Dataspace, "dataspace")?,
            fl.length_size,
        )?;
        let layout = DataLayout::parse(
            header.require(MessageType::DataLayout, "data layout")?,
            fl.offset_size,
            fl.length_size,
        )?;
        let pipeline = match header.find(MessageType::FilterPipeline) {
            Some(msg) => Some(FilterPipeline::parse(&msg.data)?),
            None => None,
        };
        let token = Token::new(file, HandleKind::Dataset, &path);
        Ok(Dataset {
            token,
            path,
            datatype,
            dataspace,
            layout,
            pipeline,
        })
    }

    /// Canonical path of the dataset.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Element type.
    pub fn datatype(&self) -> &Datatype {
        &self.datatype
    }

    /// Extent description.
    pub fn dataspace(&self) -> &Dataspace {
        &self.dataspace
    }

    /// Storage layout.
    pub fn layout(&self) -> &DataLayout {
        &self.layout
    }

    /// Dimension sizes.
    pub fn shape(&self) -> &[u64] {
        &self.dataspace.dimensions
    }

    /// Open a separate handle on the element type.
    pub fn type_handle(&self) -> TypeHandle {
        TypeHandle::new(Rc::clone(self.token.file()), self.datatype.clone(), &self.path)
    }

    /// Open a separate handle on the extent.
    pub fn space_handle(&self) -> SpaceHandle {
        SpaceHandle {
            _token: Token::new(Rc::clone(self.token.file()), HandleKind::Dataspace, &self.path),
            dataspace: self.dataspace.clone(),
        }
    }

    fn storage(&self) -> DatasetStorage<'_> {
        DatasetStorage {
            layout: &self.layout,
            pipeline: self.pipeline.as_ref(),
            dimensions: &self.dataspace.dimensions,
            element_size: self.datatype.type_size() as usize,
        }
    }

    /// Read every element as raw bytes.
    pub fn read_raw(&self) -> Result<Vec<u8>> {
        let file = self.token.file();
        trace!("read all of {}", self.path);
        Ok(data_read::read_raw(file.data(), &self.storage(), &file.layout)?)
    }

    /// Read a hyperslab as raw bytes in row-major order.
    pub fn read_hyperslab(&self, selection: &Hyperslab) -> Result<Vec<u8>> {
        let file = self.token.file();
        trace!(
            "read {} start {:?} count {:?}",
            self.path,
            selection.start,
            selection.count
        );
        Ok(data_read::read_hyperslab(
            file.data(),
            &self.storage(),
            selection,
            &file.layout,
        )?)
    }

    /// Raw integer elements of a buffer read from this dataset.
    pub fn decode_ints(&self, bytes: &[u8]) -> Result<Vec<i64>> {
        Ok(data_read::decode_ints(bytes, &self.datatype)?)
    }

    /// Decode one string-typed element, resolving variable-length strings.
    pub(crate) fn decode_string(&self, bytes: &[u8], datatype: &Datatype) -> Result<String> {
        let file = self.token.file();
        Ok(data_read::decode_string(file.data(), bytes, datatype, &file.layout)?)
    }
}

/// An open handle on a datatype.
#[derive(Debug)]
pub struct TypeHandle {
    token: Token,
    datatype: Datatype,
}

impl TypeHandle {
    fn new(file: Rc<FileInner>, datatype: Datatype, path: &str) -> TypeHandle {
        TypeHandle {
            token: Token::new(file, HandleKind::Datatype, path),
            datatype,
        }
    }

    /// The described type.
    pub fn datatype(&self) -> &Datatype {
        &self.datatype
    }

    /// Open a handle on compound member `index`.
    pub fn member(&self, index: usize) -> Option<TypeHandle> {
        let member = self.datatype.compound_members()?.get(index)?;
        Some(TypeHandle::new(
            Rc::clone(self.token.file()),
            member.datatype.clone(),
            &member.name,
        ))
    }
}

/// An open handle on a dataspace.
#[derive(Debug)]
pub struct SpaceHandle {
    _token: Token,
    dataspace: Dataspace,
}

impl SpaceHandle {
    /// The described extent.
    pub fn dataspace(&self) -> &Dataspace {
        &self.dataspace
    }

    /// Dimension sizes.
    pub fn dimensions(&self) -> &[u64] {
        &self.dataspace.dimensions
    }

    /// Number of dimensions.
    pub fn rank(&self) -> usize {
        self.dataspace.rank()
    }

    /// Whether the extent is simple (scalar or N-dimensional, not null).
    pub fn is_simple(&self) -> bool {
        self.dataspace.is_simple()
    }
}
