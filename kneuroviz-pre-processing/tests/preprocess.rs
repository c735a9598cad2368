use kneuroviz::bounds::Bbox;
use kneuroviz::config::{ImageType, PreprocessConfig, Resolution};
use kneuroviz::converter::VolumeConverter;
use kneuroviz::info::LayerType;
use kneuroviz::manifest::read_manifest;
use kneuroviz::volume::PrecomputedVolume;
use kneuroviz::voxel::DataType;
use ndarray::{Array3, s};
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn write_h5<T: hdf5::H5Type>(path: &Path, name: &str, data: &Array3<T>) {
    let file = hdf5::File::create(path).unwrap();
    file.new_dataset_builder()
        .with_data(data)
        .create(name)
        .unwrap();
}

fn config(source: PathBuf, destination: PathBuf, image_type: ImageType) -> PreprocessConfig {
    PreprocessConfig {
        source,
        resolution: "4,4,40".parse::<Resolution>().unwrap(),
        image_type,
        destination,
        block_shape: None,
        chunk_size: [64, 64, 64],
        parallel: 8,
        magnitude: 2,
    }
}

/// Labels in (z, y, x) order: two boxes in a 64 x 128 x 128 volume.
fn segmentation_fixture() -> Array3<u16> {
    let mut data = Array3::<u16>::zeros((64, 128, 128));
    data.slice_mut(s![10..30, 20..60, 40..100]).fill(3);
    data.slice_mut(s![35..50, 70..110, 10..50]).fill(144);
    data
}

#[test]
fn segmentation_end_to_end() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("seg.h5");
    let destination = dir.path().join("store");
    let data = segmentation_fixture();
    write_h5(&source, "main", &data);

    let converter = VolumeConverter::new(config(source, destination.clone(), ImageType::Segmentation));
    let report = converter.convert().unwrap();

    assert_eq!(report.extent, [128, 128, 64]);
    assert_eq!(report.data_type, DataType::Uint16);
    assert_eq!(report.layer_type, LayerType::Segmentation);
    assert_eq!(report.block_shape, [32, 32, 4]);
    assert_eq!(report.blocks_written, 4 * 4 * 16);
    assert_eq!(report.mesh_tasks, 4 * 4 * 16);
    assert_eq!(report.manifest_tasks, 99);
    assert_eq!(report.parallel, Some(8));

    let volume = PrecomputedVolume::open(&destination).unwrap();
    assert_eq!(volume.info().data_type, DataType::Uint16);
    assert_eq!(volume.info().mesh.as_deref(), Some("mesh"));
    assert_eq!(volume.resolution(), [4.0, 4.0, 40.0]);

    let stored = volume.read_block::<u16>(Bbox::from_shape([128, 128, 64])).unwrap();
    assert_eq!(stored, data.reversed_axes());

    let mesh_dir = destination.join("mesh");
    for label in [3, 144] {
        let manifest = read_manifest(&mesh_dir, label).unwrap();
        assert!(!manifest.fragments.is_empty());
        for fragment in &manifest.fragments {
            assert!(mesh_dir.join(fragment).is_file());
        }
    }
    assert!(read_manifest(&mesh_dir, 7).is_err());
}

#[test]
fn channel_is_copied_without_meshing() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("img.h5");
    let destination = dir.path().join("store");
    let data = Array3::from_shape_fn((8, 20, 30), |(z, y, x)| ((x + 3 * y + 7 * z) % 251) as u8);
    write_h5(&source, "raw", &data);

    let converter = VolumeConverter::new(config(source, destination.clone(), ImageType::Channel));
    let report = converter.convert().unwrap();

    assert_eq!(report.extent, [30, 20, 8]);
    assert_eq!(report.data_type, DataType::Uint8);
    assert_eq!(report.layer_type, LayerType::Image);
    assert_eq!(report.mesh_tasks, 0);
    assert_eq!(report.parallel, None);

    let volume = PrecomputedVolume::open(&destination).unwrap();
    let stored = volume.read_block::<u8>(Bbox::from_shape([30, 20, 8])).unwrap();
    assert_eq!(stored, data.reversed_axes());
    assert!(!destination.join("mesh").exists());
}

#[test]
fn out_of_range_values_wrap_to_the_voxel_type() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("wide.h5");
    let mut data = Array3::<u16>::zeros((2, 2, 2));
    data[[0, 0, 0]] = 300;
    data[[1, 1, 1]] = 255;
    data[[0, 1, 0]] = 512;
    write_h5(&source, "main", &data);

    let destination = dir.path().join("store");
    VolumeConverter::new(config(source, destination.clone(), ImageType::Channel))
        .convert()
        .unwrap();

    let volume = PrecomputedVolume::open(&destination).unwrap();
    let stored = volume.read_block::<u8>(Bbox::from_shape([2, 2, 2])).unwrap();
    assert_eq!(stored[[0, 0, 0]], 44);
    assert_eq!(stored[[1, 1, 1]], 255);
    // (z, y, x) = (0, 1, 0) lands at [x, y, z] = [0, 1, 0]
    assert_eq!(stored[[0, 1, 0]], 0);
}

#[test]
fn signed_sources_wrap_like_unsigned_ones() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("signed.h5");
    let data = Array3::<i32>::from_elem((1, 1, 2), -1);
    write_h5(&source, "main", &data);

    let destination = dir.path().join("store");
    VolumeConverter::new(config(source, destination.clone(), ImageType::Segmentation))
        .convert()
        .unwrap();

    let volume = PrecomputedVolume::open(&destination).unwrap();
    let stored = volume.read_block::<u16>(Bbox::from_shape([2, 1, 1])).unwrap();
    assert!(stored.iter().all(|&v| v == u16::MAX));
}

#[test]
fn first_dataset_is_used_when_several_exist() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("multi.h5");
    let file = hdf5::File::create(&source).unwrap();
    file.new_dataset_builder()
        .with_data(&Array3::<u8>::from_elem((2, 2, 2), 1))
        .create("a")
        .unwrap();
    file.new_dataset_builder()
        .with_data(&Array3::<u8>::from_elem((3, 3, 3), 2))
        .create("b")
        .unwrap();
    drop(file);

    let destination = dir.path().join("store");
    let report = VolumeConverter::new(config(source, destination, ImageType::Channel))
        .convert()
        .unwrap();
    assert_eq!(report.extent, [2, 2, 2]);
}

#[test]
fn channel_run_exits_successfully() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("img.h5");
    write_h5(&source, "main", &Array3::<u8>::from_elem((4, 6, 6), 9));

    let status = Command::new(env!("CARGO_BIN_EXE_kneuroviz-pre-processing"))
        .args(["-S", source.to_str().unwrap()])
        .args(["-R", "4.0,4.0,40.0"])
        .args(["-I", "channel"])
        .args(["-D", dir.path().join("store").to_str().unwrap()])
        .status()
        .unwrap();

    assert_eq!(status.code(), Some(0));
    assert!(dir.path().join("store/info").is_file());
}

#[test]
fn invalid_image_type_creates_no_store() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("img.h5");
    write_h5(&source, "main", &Array3::<u8>::zeros((2, 2, 2)));
    let destination = dir.path().join("store");

    let status = Command::new(env!("CARGO_BIN_EXE_kneuroviz-pre-processing"))
        .args(["-S", source.to_str().unwrap()])
        .args(["-R", "4,4,40"])
        .args(["-I", "rgb"])
        .args(["-D", destination.to_str().unwrap()])
        .status()
        .unwrap();

    assert_eq!(status.code(), Some(1));
    assert!(!destination.exists());
}

#[test]
fn missing_source_is_a_data_error() {
    let dir = TempDir::new().unwrap();

    let status = Command::new(env!("CARGO_BIN_EXE_kneuroviz-pre-processing"))
        .args(["-S", dir.path().join("absent.h5").to_str().unwrap()])
        .args(["-R", "4,4,40"])
        .args(["-I", "segmentation"])
        .args(["-D", dir.path().join("store").to_str().unwrap()])
        .status()
        .unwrap();

    assert_eq!(status.code(), Some(3));
}
