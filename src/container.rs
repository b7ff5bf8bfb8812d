//! Persistence of factorized planes.
//!
//! A container is an `.npz` archive holding three binary `.npy` entries per
//! plane: `channel_000_u`, `channel_000_s` and `channel_000_vt`, then
//! `channel_001_*` and so on. Channel names are zero padded, so that their
//! lexicographic order is the channel order. Values are stored as raw
//! `f64`, which makes a restored plane set bit for bit identical to the one
//! that was saved.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, Write};
use std::path::Path;

use crate::plane::PlaneFactorization;
use crate::types::{Result, SvdImageError};
use log::info;
use ndarray::{Array1, Array2};
use ndarray_npy::{NpzReader, NpzWriter};

/// Prefix of the per-plane entry names.
pub const ENTRY_PREFIX: &str = "channel_";

/// Suffix the archive format appends to every entry.
const NPY_SUFFIX: &str = ".npy";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Factor {
    U,
    S,
    Vt,
}

impl Factor {
    fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "u" => Some(Factor::U),
            "s" => Some(Factor::S),
            "vt" => Some(Factor::Vt),
            _ => None,
        }
    }
}

#[derive(Default)]
struct PartialPlane {
    u: Option<Array2<f64>>,
    s: Option<Array1<f64>>,
    vt: Option<Array2<f64>>,
}

fn format_error<E: Display>(err: E) -> SvdImageError {
    SvdImageError::ContainerFormat(err.to_string())
}

/// Name of the container entries for channel `index`.
pub fn entry_name(index: usize) -> String {
    format!("{}{:03}", ENTRY_PREFIX, index)
}

/// Split an archive entry name into its channel name and factor.
fn split_entry(name: &str) -> Option<(&str, Factor)> {
    let stem = name.strip_suffix(NPY_SUFFIX).unwrap_or(name);
    let (channel, suffix) = stem.rsplit_once('_')?;
    let digits = channel.strip_prefix(ENTRY_PREFIX)?;

    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    Factor::from_suffix(suffix).map(|factor| (channel, factor))
}

/// Write `planes` as an archive to `writer` and hand the writer back.
pub fn write_planes<W: Write + Seek>(planes: &[PlaneFactorization], writer: W) -> Result<W> {
    let mut npz = NpzWriter::new(writer);

    for (index, plane) in planes.iter().enumerate() {
        let name = entry_name(index);
        npz.add_array(format!("{}_u", name), &plane.u())?;
        npz.add_array(format!("{}_s", name), &plane.s())?;
        npz.add_array(format!("{}_vt", name), &plane.vt())?;
    }

    Ok(npz.finish()?)
}

/// Read planes from an archive, in channel name order.
pub fn read_planes<R: Read + Seek>(reader: R) -> Result<Vec<PlaneFactorization>> {
    let mut npz = NpzReader::new(reader).map_err(format_error)?;
    let names = npz.names().map_err(format_error)?;

    // BTreeMap iterates in lexicographic key order.
    let mut channels: BTreeMap<String, PartialPlane> = BTreeMap::new();
    for name in &names {
        let (channel, factor) = split_entry(name).ok_or_else(|| {
            SvdImageError::ContainerFormat(format!("unexpected entry `{}`", name))
        })?;

        let partial = channels.entry(channel.to_string()).or_default();
        match factor {
            Factor::U => partial.u = Some(npz.by_name(name).map_err(format_error)?),
            Factor::S => partial.s = Some(npz.by_name(name).map_err(format_error)?),
            Factor::Vt => partial.vt = Some(npz.by_name(name).map_err(format_error)?),
        }
    }

    if channels.is_empty() {
        return Err(SvdImageError::ContainerFormat(
            "container holds no planes".to_string(),
        ));
    }

    channels
        .into_iter()
        .map(|(channel, partial)| match (partial.u, partial.s, partial.vt) {
            (Some(u), Some(s), Some(vt)) => PlaneFactorization::from_factors(u, s, vt)
                .map_err(|err| format_error(format!("entry `{}`: {}", channel, err))),
            _ => Err(SvdImageError::ContainerFormat(format!(
                "entry `{}` lacks one of u, s, vt",
                channel
            ))),
        })
        .collect()
}

/// Save `planes` to the container file at `path`.
pub fn save(planes: &[PlaneFactorization], path: &Path) -> Result<()> {
    let writer = BufWriter::new(File::create(path)?);
    let mut writer = write_planes(planes, writer)?;
    writer.flush()?;

    info!("saved {} planes to {}", planes.len(), path.display());
    Ok(())
}

/// Load planes from the container file at `path`.
pub fn load(path: &Path) -> Result<Vec<PlaneFactorization>> {
    let reader = BufReader::new(File::open(path)?);
    let planes = read_planes(reader)?;

    info!("loaded {} planes from {}", planes.len(), path.display());
    Ok(planes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random_matrix::RandomMatrix;
    use ndarray::array;
    use std::io::Cursor;

    fn random_planes(count: usize, dimension: (usize, usize)) -> Vec<PlaneFactorization> {
        let mut rng = rand::thread_rng();
        (0..count)
            .map(|_| {
                let mat = f64::random_gaussian(dimension, &mut rng) * 100.0;
                PlaneFactorization::factorize(mat.view()).unwrap()
            })
            .collect()
    }

    fn assert_bit_identical(first: &[PlaneFactorization], second: &[PlaneFactorization]) {
        let bits = |plane: &PlaneFactorization| -> Vec<u64> {
            plane
                .u()
                .iter()
                .chain(plane.s().iter())
                .chain(plane.vt().iter())
                .map(|value| value.to_bits())
                .collect()
        };

        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.shape(), b.shape());
            assert_eq!(a.rank(), b.rank());
            assert_eq!(bits(a), bits(b));
        }
    }

    fn to_bytes(planes: &[PlaneFactorization]) -> Vec<u8> {
        write_planes(planes, Cursor::new(Vec::new()))
            .unwrap()
            .into_inner()
    }

    macro_rules! container_round_trip_tests {

        ($($name:ident: $count:expr, $dim:expr,)*) => {

            $(

        #[test]
        fn $name() {
            let planes = random_planes($count, $dim);

            let restored = read_planes(Cursor::new(to_bytes(&planes))).unwrap();

            assert_bit_identical(&planes, &restored);
        }

            )*

        }
    }

    container_round_trip_tests! {
        test_container_round_trip_gray: 1, (20, 13),
        test_container_round_trip_rgb: 3, (9, 17),
        test_container_round_trip_rgba: 4, (12, 12),
    }

    #[test]
    fn test_entry_names_sort_in_channel_order() {
        let mut names: Vec<String> = (0..12).map(entry_name).collect();
        let expected = names.clone();
        names.sort();

        assert_eq!(names, expected);
        assert_eq!(entry_name(2), "channel_002");
    }

    #[test]
    fn test_split_entry() {
        assert_eq!(split_entry("channel_003_vt.npy"), Some(("channel_003", Factor::Vt)));
        assert_eq!(split_entry("channel_010_s"), Some(("channel_010", Factor::S)));
        assert_eq!(split_entry("channel_000_w.npy"), None);
        assert_eq!(split_entry("channel__u.npy"), None);
        assert_eq!(split_entry("plane_000_u.npy"), None);
    }

    #[test]
    fn test_read_planes_orders_by_entry_name() {
        let planes = random_planes(3, (6, 5));

        // Write the entries with channels in reverse order.
        let mut npz = NpzWriter::new(Cursor::new(Vec::new()));
        for (index, plane) in planes.iter().enumerate().rev() {
            let name = entry_name(index);
            npz.add_array(format!("{}_vt", name), &plane.vt()).unwrap();
            npz.add_array(format!("{}_s", name), &plane.s()).unwrap();
            npz.add_array(format!("{}_u", name), &plane.u()).unwrap();
        }
        let bytes = npz.finish().unwrap().into_inner();

        let restored = read_planes(Cursor::new(bytes)).unwrap();
        assert_bit_identical(&planes, &restored);
    }

    #[test]
    fn test_read_planes_rejects_malformed_archives() {
        let garbage = read_planes(Cursor::new(b"not an archive".to_vec()));
        assert!(matches!(garbage, Err(SvdImageError::ContainerFormat(_))));

        let empty = read_planes(Cursor::new(to_bytes(&[])));
        assert!(matches!(empty, Err(SvdImageError::ContainerFormat(_))));

        let mut npz = NpzWriter::new(Cursor::new(Vec::new()));
        npz.add_array("weights", &array![1.0, 2.0]).unwrap();
        let unexpected = read_planes(Cursor::new(npz.finish().unwrap().into_inner()));
        assert!(matches!(unexpected, Err(SvdImageError::ContainerFormat(_))));

        let plane = &random_planes(1, (4, 3))[0];
        let mut npz = NpzWriter::new(Cursor::new(Vec::new()));
        npz.add_array("channel_000_u", &plane.u()).unwrap();
        npz.add_array("channel_000_s", &plane.s()).unwrap();
        let missing = read_planes(Cursor::new(npz.finish().unwrap().into_inner()));
        assert!(matches!(missing, Err(SvdImageError::ContainerFormat(_))));
    }

    #[test]
    fn test_read_planes_rejects_inconsistent_factors() {
        let plane = &random_planes(1, (4, 3))[0];

        let mut npz = NpzWriter::new(Cursor::new(Vec::new()));
        npz.add_array("channel_000_u", &plane.u()).unwrap();
        npz.add_array("channel_000_s", &array![1.0, 2.0]).unwrap();
        npz.add_array("channel_000_vt", &plane.vt()).unwrap();
        let bytes = npz.finish().unwrap().into_inner();

        assert!(matches!(
            read_planes(Cursor::new(bytes)),
            Err(SvdImageError::ContainerFormat(_))
        ));
    }

    #[test]
    fn test_read_planes_rejects_wrong_element_type() {
        let mut npz = NpzWriter::new(Cursor::new(Vec::new()));
        npz.add_array("channel_000_u", &Array2::<f32>::eye(2)).unwrap();
        let bytes = npz.finish().unwrap().into_inner();

        assert!(matches!(
            read_planes(Cursor::new(bytes)),
            Err(SvdImageError::ContainerFormat(_))
        ));
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("planes.npz");
        let planes = random_planes(3, (8, 11));

        save(&planes, &path).unwrap();
        let restored = load(&path).unwrap();

        assert_bit_identical(&planes, &restored);
    }
}
