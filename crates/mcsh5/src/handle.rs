//! Open-handle bookkeeping.
//!
//! Every object handle (file, group, dataset, datatype, dataspace) owns a
//! [`Token`] that counts itself in the file's registry when created and
//! uncounts itself exactly once when dropped. Tokens are neither `Clone` nor
//! `Copy`, so moving a handle moves the obligation with it.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use log::debug;

use crate::reader::FileInner;

/// Kinds of handle a file hands out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleKind {
    File,
    Group,
    Dataset,
    Datatype,
    Dataspace,
}

impl HandleKind {
    const ALL: [HandleKind; 5] = [
        HandleKind::File,
        HandleKind::Group,
        HandleKind::Dataset,
        HandleKind::Datatype,
        HandleKind::Dataspace,
    ];

    fn slot(self) -> usize {
        match self {
            HandleKind::File => 0,
            HandleKind::Group => 1,
            HandleKind::Dataset => 2,
            HandleKind::Datatype => 3,
            HandleKind::Dataspace => 4,
        }
    }
}

impl fmt::Display for HandleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HandleKind::File => "file",
            HandleKind::Group => "group",
            HandleKind::Dataset => "dataset",
            HandleKind::Datatype => "datatype",
            HandleKind::Dataspace => "dataspace",
        })
    }
}

/// Live handle counts of one file.
#[derive(Debug, Default)]
pub(crate) struct HandleRegistry {
    counts: [Cell<usize>; 5],
}

impl HandleRegistry {
    fn acquire(&self, kind: HandleKind) {
        let c = &self.counts[kind.slot()];
        c.set(c.get() + 1);
    }

    fn release(&self, kind: HandleKind) {
        let c = &self.counts[kind.slot()];
        c.set(c.get().saturating_sub(1));
    }

    pub(crate) fn count(&self, kind: HandleKind) -> usize {
        self.counts[kind.slot()].get()
    }

    pub(crate) fn total(&self) -> usize {
        HandleKind::ALL.iter().map(|&k| self.count(k)).sum()
    }
}

/// Ownership of one open handle.
pub(crate) struct Token {
    file: Rc<FileInner>,
    kind: HandleKind,
}

impl Token {
    pub(crate) fn new(file: Rc<FileInner>, kind: HandleKind, path: &str) -> Token {
        file.registry.acquire(kind);
        debug!("open {kind} handle {path} ({} live)", file.registry.total());
        Token { file, kind }
    }

    pub(crate) fn file(&self) -> &Rc<FileInner> {
        &self.file
    }
}

impl Drop for Token {
    fn drop(&mut self) {
        self.file.registry.release(self.kind);
        debug!(
            "release {} handle ({} live)",
            self.kind,
            self.file.registry.total()
        );
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token").field("kind", &self.kind).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_by_kind() {
        let reg = HandleRegistry::default();
        reg.acquire(HandleKind::File);
        reg.acquire(HandleKind::Group);
        reg.acquire(HandleKind::Group);
        assert_eq!(reg.count(HandleKind::Group), 2);
        assert_eq!(reg.total(), 3);
        reg.release(HandleKind::Group);
        assert_eq!(reg.count(HandleKind::Group), 1);
        assert_eq!(reg.total(), 2);
    }

    #[test]
    fn release_never_underflows() {
        let reg = HandleRegistry::default();
        reg.release(HandleKind::Dataset);
        assert_eq!(reg.total(), 0);
    }

    #[test]
    fn kind_names() {
        assert_eq!(HandleKind::Dataspace.to_string(), "dataspace");
        assert_eq!(HandleKind::File.to_string(), "file");
    }
}
