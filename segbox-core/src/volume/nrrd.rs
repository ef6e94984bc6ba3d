//! Reader for attached-header NRRD files, the format 3D Slicer writes
//! volumes and `.seg.nrrd` segmentations in.

use std::fs;
use std::io::Read;
use std::path::Path;

use flate2::read::GzDecoder;
use ndarray::prelude::*;
use snafu::ResultExt;
use tracing::*;

use crate::{consts::NRRD_MAGIC, error::*, volume::squeeze_to_3d};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScalarType {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
}

impl ScalarType {
    fn parse(value: &str) -> Option<Self> {
        let kind = match value {
            "signed char" | "int8" | "int8_t" => Self::I8,
            "uchar" | "unsigned char" | "uint8" | "uint8_t" => Self::U8,
            "short" | "short int" | "signed short" | "signed short int" | "int16" | "int16_t" => {
                Self::I16
            }
            "ushort" | "unsigned short" | "unsigned short int" | "uint16" | "uint16_t" => {
                Self::U16
            }
            "int" | "signed int" | "int32" | "int32_t" => Self::I32,
            "uint" | "unsigned int" | "uint32" | "uint32_t" => Self::U32,
            "longlong" | "long long" | "long long int" | "signed long long"
            | "signed long long int" | "int64" | "int64_t" => Self::I64,
            "ulonglong" | "unsigned long long" | "unsigned long long int" | "uint64"
            | "uint64_t" => Self::U64,
            "float" => Self::F32,
            "double" => Self::F64,
            _ => return None,
        };
        Some(kind)
    }

    fn width(self) -> usize {
        match self {
            Self::I8 | Self::U8 => 1,
            Self::I16 | Self::U16 => 2,
            Self::I32 | Self::U32 | Self::F32 => 4,
            Self::I64 | Self::U64 | Self::F64 => 8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Encoding {
    Raw,
    Gzip,
    Ascii,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endian {
    Little,
    Big,
}

#[derive(Debug)]
struct Header {
    kind: ScalarType,
    sizes: Vec<usize>,
    encoding: Encoding,
    endian: Endian,
    /// Offset of the first data byte.
    data_offset: usize,
}

/// Loads an NRRD file into `[slice, row, column]` order.
pub fn load<P: AsRef<Path>>(path: P) -> Result<Array3<f32>, SegboxError> {
    let path = path.as_ref();
    let bytes = fs::read(path).context(IoReadSnafu {
        path: path.to_string_lossy(),
    })?;
    parse(&bytes, &path.to_string_lossy())
}

pub(crate) fn parse(bytes: &[u8], path: &str) -> Result<Array3<f32>, SegboxError> {
    let header = parse_header(bytes, path)?;
    debug!("nrrd header of {path}: {header:?}");

    let count = header
        .sizes
        .iter()
        .try_fold(1usize, |acc, &size| acc.checked_mul(size))
        .ok_or_else(|| nrrd_error(path, "sizes overflow"))?;
    let payload = &bytes[header.data_offset..];
    let values = match header.encoding {
        Encoding::Raw => decode_binary(payload, header.kind, header.endian, count, path)?,
        Encoding::Gzip => {
            let expected = byte_count(count, header.kind, path)?;
            // the buffer grows with the actual stream, never with the declared sizes
            let mut inflated = Vec::new();
            GzDecoder::new(payload)
                .take(expected as u64)
                .read_to_end(&mut inflated)
                .context(IoReadSnafu { path })?;
            decode_binary(&inflated, header.kind, header.endian, count, path)?
        }
        Encoding::Ascii => decode_ascii(payload, count, path)?,
    };

    // NRRD lists the fastest axis first
    let shape: Vec<usize> = header.sizes.iter().rev().copied().collect();
    let [depth, height, width] = squeeze_to_3d(&shape, path)?;
    Array3::from_shape_vec((depth, height, width), values).context(ShapeSnafu { stage: "nrrd" })
}

fn nrrd_error(path: &str, message: impl Into<String>) -> SegboxError {
    SegboxError::Nrrd {
        path: path.to_string(),
        message: message.into(),
    }
}

fn parse_header(bytes: &[u8], path: &str) -> Result<Header, SegboxError> {
    let mut kind = None;
    let mut sizes = None;
    let mut dimension = None;
    let mut encoding = None;
    let mut endian = Endian::Little;

    let mut offset = 0;
    let mut line_no = 0;
    let data_offset = loop {
        let Some(length) = bytes[offset..].iter().position(|&byte| byte == b'\n') else {
            return Err(nrrd_error(path, "header is not terminated by a blank line"));
        };
        let line = String::from_utf8_lossy(&bytes[offset..offset + length]);
        let line = line.trim_end_matches('\r');
        offset += length + 1;
        line_no += 1;

        if line_no == 1 {
            if !line.starts_with(NRRD_MAGIC) {
                return Err(nrrd_error(path, "missing NRRD magic"));
            }
            continue;
        }
        if line.is_empty() {
            break offset;
        }
        if line.starts_with('#') || line.contains(":=") {
            continue;
        }

        let Some((field, value)) = line.split_once(':') else {
            return Err(nrrd_error(path, format!("malformed header line `{line}`")));
        };
        let value = value.trim();
        match field.trim().to_lowercase().as_str() {
            "type" => {
                kind = Some(
                    ScalarType::parse(value)
                        .ok_or_else(|| nrrd_error(path, format!("unsupported type `{value}`")))?,
                );
            }
            "dimension" => {
                dimension = Some(
                    value
                        .parse::<usize>()
                        .map_err(|_| nrrd_error(path, format!("bad dimension `{value}`")))?,
                );
            }
            "sizes" => {
                sizes = Some(
                    value
                        .split_whitespace()
                        .map(|size| size.parse::<usize>())
                        .collect::<Result<Vec<_>, _>>()
                        .map_err(|_| nrrd_error(path, format!("bad sizes `{value}`")))?,
                );
            }
            "encoding" => {
                encoding = Some(match value {
                    "raw" => Encoding::Raw,
                    "gzip" | "gz" => Encoding::Gzip,
                    "ascii" | "text" | "txt" => Encoding::Ascii,
                    _ => return Err(nrrd_error(path, format!("unsupported encoding `{value}`"))),
                });
            }
            "endian" => {
                endian = match value {
                    "little" => Endian::Little,
                    "big" => Endian::Big,
                    _ => return Err(nrrd_error(path, format!("bad endian `{value}`"))),
                };
            }
            "data file" | "datafile" => {
                return Err(nrrd_error(path, "detached data files are not supported"));
            }
            "line skip" | "lineskip" | "byte skip" | "byteskip" if value != "0" => {
                return Err(nrrd_error(path, format!("`{field}` is not supported")));
            }
            _ => {}
        }
    };

    let kind = kind.ok_or_else(|| nrrd_error(path, "missing `type` field"))?;
    let sizes = sizes.ok_or_else(|| nrrd_error(path, "missing `sizes` field"))?;
    let encoding = encoding.ok_or_else(|| nrrd_error(path, "missing `encoding` field"))?;
    if let Some(dimension) = dimension {
        if dimension != sizes.len() {
            return Err(nrrd_error(
                path,
                format!("dimension {dimension} does not match {} sizes", sizes.len()),
            ));
        }
    }

    Ok(Header {
        kind,
        sizes,
        encoding,
        endian,
        data_offset,
    })
}

macro_rules! decode_as {
    ($ty:ty, $data:expr, $endian:expr) => {
        $data
            .chunks_exact(std::mem::size_of::<$ty>())
            .map(|chunk| {
                let mut buffer = [0u8; std::mem::size_of::<$ty>()];
                buffer.copy_from_slice(chunk);
                match $endian {
                    Endian::Little => <$ty>::from_le_bytes(buffer) as f32,
                    Endian::Big => <$ty>::from_be_bytes(buffer) as f32,
                }
            })
            .collect::<Vec<f32>>()
    };
}

fn byte_count(count: usize, kind: ScalarType, path: &str) -> Result<usize, SegboxError> {
    count
        .checked_mul(kind.width())
        .ok_or_else(|| nrrd_error(path, "sizes overflow"))
}

fn decode_binary(
    data: &[u8],
    kind: ScalarType,
    endian: Endian,
    count: usize,
    path: &str,
) -> Result<Vec<f32>, SegboxError> {
    let expected = byte_count(count, kind, path)?;
    if data.len() < expected {
        return Err(nrrd_error(
            path,
            format!("expected {expected} data bytes, found {}", data.len()),
        ));
    }
    let data = &data[..expected];

    let values = match kind {
        ScalarType::I8 => decode_as!(i8, data, endian),
        ScalarType::U8 => decode_as!(u8, data, endian),
        ScalarType::I16 => decode_as!(i16, data, endian),
        ScalarType::U16 => decode_as!(u16, data, endian),
        ScalarType::I32 => decode_as!(i32, data, endian),
        ScalarType::U32 => decode_as!(u32, data, endian),
        ScalarType::I64 => decode_as!(i64, data, endian),
        ScalarType::U64 => decode_as!(u64, data, endian),
        ScalarType::F32 => decode_as!(f32, data, endian),
        ScalarType::F64 => decode_as!(f64, data, endian),
    };
    Ok(values)
}

fn decode_ascii(data: &[u8], count: usize, path: &str) -> Result<Vec<f32>, SegboxError> {
    let text = String::from_utf8_lossy(data);
    let values = text
        .split_whitespace()
        .take(count)
        .map(|token| {
            token
                .parse::<f64>()
                .map(|value| value as f32)
                .map_err(|_| nrrd_error(path, format!("bad ascii value `{token}`")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    if values.len() < count {
        return Err(nrrd_error(
            path,
            format!("expected {count} ascii values, found {}", values.len()),
        ));
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use flate2::{Compression, write::GzEncoder};

    use super::*;

    fn with_header(header: &str, data: &[u8]) -> Vec<u8> {
        let mut bytes = header.as_bytes().to_vec();
        bytes.extend_from_slice(data);
        bytes
    }

    #[test]
    fn test_raw_u8_axis_order() {
        let data: Vec<u8> = (0..24).collect();
        let bytes = with_header(
            "NRRD0004\ntype: uchar\ndimension: 3\nsizes: 4 3 2\nencoding: raw\n\n",
            &data,
        );

        let volume = parse(&bytes, "test.nrrd").unwrap();
        assert_eq!(volume.shape(), &[2, 3, 4]);
        // x varies fastest in the file
        assert_eq!(volume[[0, 0, 1]], 1.0);
        assert_eq!(volume[[0, 1, 0]], 4.0);
        assert_eq!(volume[[1, 0, 0]], 12.0);
    }

    #[test]
    fn test_big_endian_short_with_comments() {
        let values: [i16; 4] = [-2, 0, 300, 7];
        let data: Vec<u8> = values.iter().flat_map(|v| v.to_be_bytes()).collect();
        let bytes = with_header(
            "NRRD0005\n# written by 3D Slicer\ntype: short\ndimension: 3\nspace: left-posterior-superior\nsizes: 2 2 1\nendian: big\nencoding: raw\nSegment0_Name:=tumor\n\n",
            &data,
        );

        let volume = parse(&bytes, "test.nrrd").unwrap();
        assert_eq!(volume.shape(), &[1, 2, 2]);
        assert_eq!(volume[[0, 0, 0]], -2.0);
        assert_eq!(volume[[0, 1, 0]], 300.0);
        assert_eq!(volume[[0, 1, 1]], 7.0);
    }

    #[test]
    fn test_gzip_float() {
        let values: [f32; 8] = [0.0, 0.5, 1.0, 1.5, 2.0, 2.5, 3.0, 3.5];
        let raw: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&raw).unwrap();
        let compressed = encoder.finish().unwrap();

        let bytes = with_header(
            "NRRD0004\r\ntype: float\r\ndimension: 3\r\nsizes: 2 2 2\r\nendian: little\r\nencoding: gzip\r\n\r\n",
            &compressed,
        );

        let volume = parse(&bytes, "test.nrrd").unwrap();
        assert_eq!(volume.shape(), &[2, 2, 2]);
        assert_eq!(volume[[1, 1, 1]], 3.5);
        assert_eq!(volume[[0, 1, 0]], 1.0);
    }

    #[test]
    fn test_ascii_encoding() {
        let bytes = with_header(
            "NRRD0004\ntype: int\ndimension: 3\nsizes: 3 1 1\nencoding: ascii\n\n",
            b"1 0\n-4\n",
        );
        let volume = parse(&bytes, "test.nrrd").unwrap();
        assert_eq!(volume.shape(), &[1, 1, 3]);
        assert_eq!(volume[[0, 0, 2]], -4.0);
    }

    #[test]
    fn test_four_dimensional_singleton_layer() {
        let data: Vec<u8> = (0..8).collect();
        let bytes = with_header(
            "NRRD0004\ntype: uint8\ndimension: 4\nsizes: 1 2 2 2\nencoding: raw\n\n",
            &data,
        );
        let volume = parse(&bytes, "test.seg.nrrd").unwrap();
        assert_eq!(volume.shape(), &[2, 2, 2]);
        assert_eq!(volume[[1, 0, 1]], 5.0);
    }

    #[test]
    fn test_rejects_multi_layer_and_2d() {
        let data = [0u8; 16];
        let layered = with_header(
            "NRRD0004\ntype: uint8\ndimension: 4\nsizes: 2 2 2 2\nencoding: raw\n\n",
            &data,
        );
        assert!(matches!(
            parse(&layered, "test.nrrd"),
            Err(SegboxError::InvalidInputShape { .. })
        ));

        let flat = with_header(
            "NRRD0004\ntype: uint8\ndimension: 2\nsizes: 4 4\nencoding: raw\n\n",
            &data,
        );
        assert!(matches!(
            parse(&flat, "test.nrrd"),
            Err(SegboxError::InvalidInputShape { .. })
        ));
    }

    #[test]
    fn test_header_errors() {
        let cases: [&[u8]; 6] = [
            b"P5\n4 4\n\n",
            b"NRRD0004\ntype: uint8\nsizes: 2 2 2\nencoding: raw\n",
            b"NRRD0004\ntype: quaternion\nsizes: 2 2 2\nencoding: raw\n\n",
            b"NRRD0004\ntype: uint8\nsizes: 2 2 2\nencoding: bzip2\n\n",
            b"NRRD0004\ntype: uint8\nsizes: 2 2 2\nencoding: raw\ndata file: mask.raw\n\n",
            b"NRRD0004\ntype: uint8\ndimension: 2\nsizes: 2 2 2\nencoding: raw\n\n",
        ];
        for bytes in cases {
            assert!(
                matches!(parse(bytes, "test.nrrd"), Err(SegboxError::Nrrd { .. })),
                "header should be rejected: {}",
                String::from_utf8_lossy(bytes)
            );
        }
    }

    #[test]
    fn test_sizes_overflow() {
        let bytes = with_header(
            "NRRD0004\ntype: uint8\ndimension: 3\nsizes: 4294967296 4294967296 2\nencoding: raw\n\n",
            &[0u8],
        );
        match parse(&bytes, "test.nrrd") {
            Err(SegboxError::Nrrd { message, .. }) => assert_eq!(message, "sizes overflow"),
            other => panic!("unexpected result {other:?}"),
        }

        let wide = with_header(
            "NRRD0004\ntype: double\ndimension: 3\nsizes: 2305843009213693952 1 1\nencoding: gzip\n\n",
            &[0x1f, 0x8b],
        );
        assert!(matches!(
            parse(&wide, "test.nrrd"),
            Err(SegboxError::Nrrd { .. })
        ));
    }

    #[test]
    fn test_huge_sizes_with_tiny_gzip_payload() {
        let bytes = with_header(
            "NRRD0004\ntype: float\ndimension: 3\nsizes: 100000 100000 100000\nencoding: gzip\n\n",
            &[0x1f, 0x8b],
        );
        // truncated gzip header surfaces as a read error, without allocating the declared size
        assert!(parse(&bytes, "test.nrrd").is_err());
    }

    #[test]
    fn test_gzip_payload_shorter_than_sizes() {
        let raw = [1u8, 2, 3];
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&raw).unwrap();
        let compressed = encoder.finish().unwrap();

        let bytes = with_header(
            "NRRD0004\ntype: uint8\ndimension: 3\nsizes: 2 2 2\nencoding: gzip\n\n",
            &compressed,
        );
        assert!(matches!(
            parse(&bytes, "test.nrrd"),
            Err(SegboxError::Nrrd { .. })
        ));
    }

    #[test]
    fn test_truncated_payload() {
        let bytes = with_header(
            "NRRD0004\ntype: uint16\nsizes: 2 2 2\nencoding: raw\n\n",
            &[0u8; 10],
        );
        assert!(matches!(
            parse(&bytes, "test.nrrd"),
            Err(SegboxError::Nrrd { .. })
        ));
    }
}
