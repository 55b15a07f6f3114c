//! Query helpers over open handles.

use std::collections::HashSet;

use mcsh5_format::datatype::Datatype;

use crate::error::Result;
use crate::reader::{child_path, Dataset, File, Group};

/// Anything that lives at a path in the file.
pub trait Object {
    /// Canonical path, starting at `/`.
    fn object_path(&self) -> &str;
}

impl Object for Group {
    fn object_path(&self) -> &str {
        self.path()
    }
}

impl Object for Dataset {
    fn object_path(&self) -> &str {
        self.path()
    }
}

/// Canonical path of an open object.
pub fn object_path(object: &impl Object) -> String {
    object.object_path().to_string()
}

/// Names of a group's members, in the order the file enumerates them.
pub fn group_objects(group: &Group) -> Result<Vec<String>> {
    group.member_names()
}

/// Every object path reachable from the root, depth first.
///
/// Groups reachable through more than one link are descended once.
pub fn group_tree(file: &File) -> Result<Vec<String>> {
    let root = file.root()?;
    let mut visited = HashSet::from([root.address()]);
    let mut paths = Vec::new();
    walk(&root, &mut visited, &mut paths)?;
    Ok(paths)
}

fn walk(group: &Group, visited: &mut HashSet<u64>, paths: &mut Vec<String>) -> Result<()> {
    for entry in group.entries()? {
        paths.push(child_path(group.path(), &entry.name));
        if group.is_dataset_at(entry.address)? || !visited.insert(entry.address) {
            continue;
        }
        let child = group.group(&entry.name)?;
        walk(&child, visited, paths)?;
    }
    Ok(())
}

/// Short human-readable name of a type class.
pub fn type_name(datatype: &Datatype) -> &'static str {
    match datatype {
        Datatype::FloatingPoint { .. } => "Float",
        Datatype::FixedPoint { .. } => "Integer",
        Datatype::Array { .. } => "Array",
        Datatype::String { .. } => "String",
        Datatype::Compound { .. } => "Compound",
        _ => "Unknown",
    }
}
