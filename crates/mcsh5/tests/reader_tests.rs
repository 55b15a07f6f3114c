use mcsh5::mcsh5_format::selection::Hyperslab;
use mcsh5::utils::{group_objects, group_tree, object_path, type_name};
use mcsh5::{ErrorKind, File, HandleKind, OpenOptions};
use mcsh5_fixtures::{DatasetSpec, GroupSpec, H5Builder, Layout};

fn matrix(rows: u64, cols: u64) -> Vec<i32> {
    (0..(rows * cols) as i32).collect()
}

fn open(root: GroupSpec) -> File {
    let bytes = H5Builder::new(root).finish().expect("fixture should serialize");
    File::from_bytes(bytes, &OpenOptions::default()).expect("file should open")
}

fn layouts() -> Vec<Layout> {
    vec![
        Layout::Contiguous,
        Layout::Compact,
        Layout::Chunked {
            chunk: vec![2, 3],
            deflate: None,
            shuffle: false,
        },
        Layout::Chunked {
            chunk: vec![4, 4],
            deflate: Some(1),
            shuffle: true,
        },
    ]
}

#[test]
fn hyperslab_across_layouts() {
    let values = matrix(5, 7);
    for layout in layouts() {
        let ds = DatasetSpec::i32s("m", vec![5, 7], &values).with_layout(layout.clone());
        let f = open(GroupSpec::default().dataset(ds));
        let m = f.dataset("m").unwrap();

        let all = m.decode_ints(&m.read_raw().unwrap()).unwrap();
        assert_eq!(all.len(), 35, "{layout:?}");
        assert_eq!(all[34], 34);

        let row = m.read_hyperslab(&Hyperslab::row(3, 7)).unwrap();
        assert_eq!(m.decode_ints(&row).unwrap(), (21..28).collect::<Vec<i64>>(), "{layout:?}");

        let block = m
            .read_hyperslab(&Hyperslab::new(vec![1, 2], vec![2, 3]))
            .unwrap();
        assert_eq!(m.decode_ints(&block).unwrap(), vec![9, 10, 11, 16, 17, 18], "{layout:?}");
    }
}

#[test]
fn out_of_bounds_selection() {
    let f = open(GroupSpec::default().dataset(DatasetSpec::i32s("m", vec![2, 2], &[1, 2, 3, 4])));
    let m = f.dataset("m").unwrap();
    let err = m.read_hyperslab(&Hyperslab::row(2, 2)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Format);
}

#[test]
fn unallocated_reads_zero() {
    let ds = DatasetSpec::i32s("z", vec![3], &[7, 8, 9]).with_layout(Layout::Unallocated);
    let f = open(GroupSpec::default().dataset(ds));
    let z = f.dataset("z").unwrap();
    assert_eq!(z.decode_ints(&z.read_raw().unwrap()).unwrap(), vec![0, 0, 0]);
}

#[test]
fn declared_extent_beyond_storage() {
    let values = matrix(4, 6);
    let chunked = Layout::Chunked {
        chunk: vec![2, 3],
        deflate: Some(1),
        shuffle: false,
    };
    for layout in [Layout::Contiguous, chunked, Layout::Unallocated] {
        let ds = DatasetSpec::i32s("m", vec![4, 6], &values)
            .with_layout(layout.clone())
            .with_declared_shape(vec![4, 1 << 50]);
        let f = open(GroupSpec::default().dataset(ds));
        let m = f.dataset("m").unwrap();
        assert_eq!(m.shape(), &[4, 1 << 50]);
        let err = m.read_hyperslab(&Hyperslab::row(1, 1 << 50)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format, "{layout:?}");

        // contiguous storage must cover the whole extent; chunks are read where they exist
        let window = m.read_hyperslab(&Hyperslab::new(vec![0, 0], vec![1, 2]));
        match layout {
            Layout::Contiguous => assert_eq!(window.unwrap_err().kind(), ErrorKind::Format),
            Layout::Unallocated => assert_eq!(m.decode_ints(&window.unwrap()).unwrap(), vec![0, 0]),
            _ => assert_eq!(m.decode_ints(&window.unwrap()).unwrap(), vec![0, 1]),
        }
    }
}

#[test]
fn soft_links_are_not_members() {
    let root = GroupSpec::default()
        .group(GroupSpec::new("b").dataset(DatasetSpec::i32s("x", vec![1], &[1])))
        .group(GroupSpec::new("a"))
        .soft_link("alias", "/b/x");
    let f = open(root);
    let root = f.root().unwrap();
    assert_eq!(group_objects(&root).unwrap(), ["a", "b"]);
    assert_eq!(group_tree(&f).unwrap(), ["/a", "/b", "/b/x"]);
}

#[test]
fn groups_and_datasets_are_distinct() {
    let root = GroupSpec::default()
        .group(GroupSpec::new("g").dataset(DatasetSpec::i32s("x", vec![1], &[1])));
    let f = open(root);
    assert_eq!(f.group("g/x").unwrap_err().kind(), ErrorKind::Schema);
    assert_eq!(f.dataset("g").unwrap_err().kind(), ErrorKind::Schema);
    assert_eq!(f.dataset("g/y").unwrap_err().kind(), ErrorKind::Format);

    let g = f.group("/g").unwrap();
    let x = g.dataset("x").unwrap();
    assert_eq!(object_path(&x), "/g/x");
    assert_eq!(type_name(x.datatype()), "Integer");
    assert_eq!(x.shape(), &[1]);
}

#[test]
fn handle_lifetimes() {
    let f = open(GroupSpec::default().group(GroupSpec::new("g")));
    assert_eq!(f.open_handles(), 1);
    let g = f.group("g").unwrap();
    assert_eq!(f.open_handles_of(HandleKind::Group), 1);
    let moved = g;
    assert_eq!(f.open_handles(), 2);
    drop(moved);
    assert_eq!(f.open_handles(), 1);
}

#[test]
fn checksum_mismatch_is_rejected() {
    let root = GroupSpec::default().dataset(DatasetSpec::i32s("x", vec![1], &[1]));
    let mut bytes = H5Builder::new(root).finish().unwrap();
    // corrupt the superblock's end-of-file address
    bytes[28] ^= 0xff;
    let err = File::from_bytes(bytes.clone(), &OpenOptions::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Open);
    let lenient = OpenOptions::new().verify_checksums(false);
    assert!(File::from_bytes(bytes, &lenient).is_ok());
}
