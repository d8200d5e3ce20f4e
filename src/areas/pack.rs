//! Packed object storage
//!
//! After `git gc` (or a clone) most objects live in packs rather than as loose
//! files. A pack is a pair of files under `objects/pack/`:
//!
//! - `pack-<sha>.idx` (version 2): a fan-out table, the sorted object IDs,
//!   a CRC per object and the offset of each object inside the pack data
//! - `pack-<sha>.pack` (version 2 or 3): a `PACK` header followed by the
//!   zlib-compressed objects, some of them stored as deltas against others
//!
//! ## Entry Format
//!
//! Each entry starts with a varint header carrying a 3-bit type and the
//! inflated size. Types 1-4 are whole objects, 6 (`OFS_DELTA`) references its
//! base by a backwards distance and 7 (`REF_DELTA`) by object ID.

use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use anyhow::Context;
use byteorder::{BigEndian, ReadBytesExt};
use bytes::Bytes;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};

const INDEX_MAGIC: [u8; 4] = [0xff, b't', b'O', b'c'];
const INDEX_VERSION: u32 = 2;
const PACK_MAGIC: &[u8; 4] = b"PACK";
const PACK_HEADER_LENGTH: usize = 12;
const FANOUT_ENTRIES: usize = 256;
const LARGE_OFFSET_FLAG: u32 = 0x8000_0000;
const OFS_DELTA: u8 = 6;
const REF_DELTA: u8 = 7;
/// Upper bound on delta chains; git itself defaults to 50
const MAX_DELTA_DEPTH: usize = 64;
/// A copy instruction with a zero size copies this many bytes
const DEFAULT_COPY_SIZE: usize = 0x10000;
/// Object ID, CRC and small offset stored per index entry
const INDEX_ENTRY_LENGTH: usize = 20 + 4 + 4;
/// Largest buffer reserved up front from a size read out of a file
const MAX_PREALLOCATION: usize = 1 << 20;

/// Parsed `.idx` file: object IDs sorted ascending, with their pack offsets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackIndex {
    oids: Vec<ObjectId>,
    offsets: Vec<u64>,
}

impl PackIndex {
    pub fn parse(data: &[u8]) -> anyhow::Result<Self> {
        let mut reader = Cursor::new(data);

        let mut magic = [0u8; 4];
        reader
            .read_exact(&mut magic)
            .context("pack index is too short")?;
        if magic != INDEX_MAGIC {
            anyhow::bail!("unsupported pack index format (only version 2 is supported)");
        }

        let version = reader.read_u32::<BigEndian>()?;
        if version != INDEX_VERSION {
            anyhow::bail!("unsupported pack index version {version}");
        }

        let mut fanout = [0u32; FANOUT_ENTRIES];
        reader
            .read_u32_into::<BigEndian>(&mut fanout)
            .context("truncated pack index fan-out table")?;
        if fanout.windows(2).any(|pair| pair[0] > pair[1]) {
            anyhow::bail!("corrupt pack index fan-out table");
        }
        let count = fanout[FANOUT_ENTRIES - 1] as usize;
        let remaining = data.len().saturating_sub(reader.position() as usize);
        if count
            .checked_mul(INDEX_ENTRY_LENGTH)
            .is_none_or(|needed| needed > remaining)
        {
            anyhow::bail!("pack index claims {count} objects but is only {} bytes", data.len());
        }

        let mut oids = Vec::with_capacity(count);
        for _ in 0..count {
            oids.push(ObjectId::read_h40_from(&mut reader).context("truncated pack index")?);
        }

        // CRCs are only needed when copying raw entries between packs
        reader.set_position(reader.position() + 4 * count as u64);

        let mut small_offsets = vec![0u32; count];
        reader
            .read_u32_into::<BigEndian>(&mut small_offsets)
            .context("truncated pack index offset table")?;

        let large_count = small_offsets
            .iter()
            .filter(|offset| **offset & LARGE_OFFSET_FLAG != 0)
            .count();
        let remaining = data.len().saturating_sub(reader.position() as usize);
        if large_count * 8 > remaining {
            anyhow::bail!("truncated pack index large offset table");
        }
        let mut large_offsets = vec![0u64; large_count];
        reader
            .read_u64_into::<BigEndian>(&mut large_offsets)
            .context("truncated pack index large offset table")?;

        let offsets = small_offsets
            .into_iter()
            .map(|offset| {
                if offset & LARGE_OFFSET_FLAG == 0 {
                    Ok(offset as u64)
                } else {
                    large_offsets
                        .get((offset & !LARGE_OFFSET_FLAG) as usize)
                        .copied()
                        .context("pack index large offset out of range")
                }
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        Ok(PackIndex { oids, offsets })
    }

    pub fn object_ids(&self) -> impl Iterator<Item = &ObjectId> {
        self.oids.iter()
    }

    pub fn offset_of(&self, oid: &ObjectId) -> Option<u64> {
        self.oids
            .binary_search(oid)
            .ok()
            .map(|position| self.offsets[position])
    }
}

/// A pack index paired with the pack data it describes
#[derive(Debug)]
pub struct Pack {
    path: PathBuf,
    index: PackIndex,
    data: Bytes,
}

impl Pack {
    /// Open a pack from the path of its `.idx` file
    pub fn open(index_path: &Path) -> anyhow::Result<Self> {
        let index_data = std::fs::read(index_path)
            .with_context(|| format!("Unable to read pack index {}", index_path.display()))?;
        let index = PackIndex::parse(&index_data)
            .with_context(|| format!("Invalid pack index {}", index_path.display()))?;

        let pack_path = index_path.with_extension("pack");
        let data = std::fs::read(&pack_path)
            .with_context(|| format!("Unable to read pack file {}", pack_path.display()))?;

        Self::new(pack_path, index, data.into())
    }

    pub fn new(path: PathBuf, index: PackIndex, data: Bytes) -> anyhow::Result<Self> {
        if data.len() < PACK_HEADER_LENGTH || &data[..4] != PACK_MAGIC {
            anyhow::bail!("{} is not a pack file", path.display());
        }

        Ok(Pack { path, index, data })
    }

    pub fn index(&self) -> &PackIndex {
        &self.index
    }

    /// Read an object from this pack, or `None` if the pack does not hold it
    pub fn read(&self, oid: &ObjectId) -> anyhow::Result<Option<(ObjectType, Bytes)>> {
        match self.index.offset_of(oid) {
            Some(offset) => self
                .read_at(offset, 0)
                .with_context(|| format!("Unable to read {oid} from {}", self.path.display()))
                .map(Some),
            None => Ok(None),
        }
    }

    fn read_at(&self, offset: u64, depth: usize) -> anyhow::Result<(ObjectType, Bytes)> {
        if depth > MAX_DELTA_DEPTH {
            anyhow::bail!("delta chain deeper than {MAX_DELTA_DEPTH} at offset {offset}");
        }

        let start = usize::try_from(offset)?;
        let entry = self
            .data
            .get(start..)
            .filter(|entry| !entry.is_empty() && start >= PACK_HEADER_LENGTH)
            .with_context(|| format!("object offset {offset} is outside the pack"))?;
        let mut reader = Cursor::new(entry);
        let (code, size) = read_entry_header(&mut reader)?;

        match code {
            OFS_DELTA => {
                let distance = read_base_distance(&mut reader)?;
                let base_offset = offset
                    .checked_sub(distance)
                    .context("delta base lies before the start of the pack")?;
                let delta = inflate(&entry[reader.position() as usize..], size)?;
                let (object_type, base) = self.read_at(base_offset, depth + 1)?;

                Ok((object_type, apply_delta(&base, &delta)?))
            }
            REF_DELTA => {
                let base_oid = ObjectId::read_h40_from(&mut reader)?;
                let base_offset = self
                    .index
                    .offset_of(&base_oid)
                    .with_context(|| format!("delta base {base_oid} is not in the same pack"))?;
                let delta = inflate(&entry[reader.position() as usize..], size)?;
                let (object_type, base) = self.read_at(base_offset, depth + 1)?;

                Ok((object_type, apply_delta(&base, &delta)?))
            }
            code => {
                let object_type = ObjectType::from_pack_code(code)
                    .with_context(|| format!("invalid pack object type {code}"))?;

                Ok((object_type, inflate(&entry[reader.position() as usize..], size)?))
            }
        }
    }
}

/// Type code and inflated size of a pack entry
fn read_entry_header(reader: &mut impl Read) -> anyhow::Result<(u8, usize)> {
    let mut byte = reader.read_u8()?;
    let code = (byte >> 4) & 0b111;
    let mut size = (byte & 0x0f) as usize;
    let mut shift = 4;

    while byte & 0x80 != 0 {
        if shift > usize::BITS - 7 {
            anyhow::bail!("pack entry size overflows");
        }
        byte = reader.read_u8()?;
        size |= ((byte & 0x7f) as usize) << shift;
        shift += 7;
    }

    Ok((code, size))
}

/// Backwards distance to the base of an `OFS_DELTA` entry
fn read_base_distance(reader: &mut impl Read) -> anyhow::Result<u64> {
    let mut byte = reader.read_u8()?;
    let mut distance = (byte & 0x7f) as u64;

    while byte & 0x80 != 0 {
        byte = reader.read_u8()?;
        distance = distance
            .checked_add(1)
            .and_then(|distance| distance.checked_mul(1 << 7))
            .context("delta base distance overflows")?
            | (byte & 0x7f) as u64;
    }

    Ok(distance)
}

/// Little-endian base-128 size used at the start of a delta
fn read_delta_size(reader: &mut impl Read) -> anyhow::Result<usize> {
    let mut size = 0usize;
    let mut shift = 0;

    loop {
        let byte = reader.read_u8()?;
        size |= ((byte & 0x7f) as usize) << shift;
        if byte & 0x80 == 0 {
            return Ok(size);
        }
        shift += 7;
        if shift > usize::BITS - 7 {
            anyhow::bail!("delta size overflows");
        }
    }
}

fn inflate(data: &[u8], size: usize) -> anyhow::Result<Bytes> {
    // one byte past the expected size is enough to detect an oversized entry
    let mut decoder = flate2::read::ZlibDecoder::new(data).take((size as u64).saturating_add(1));
    let mut content = Vec::with_capacity(size.min(MAX_PREALLOCATION));
    decoder
        .read_to_end(&mut content)
        .context("Unable to decompress pack entry")?;

    if content.len() != size {
        anyhow::bail!(
            "pack entry inflated to {} bytes, expected {size}",
            content.len()
        );
    }

    Ok(content.into())
}

/// Rebuild an object from its base and a copy/insert instruction stream
fn apply_delta(base: &[u8], delta: &[u8]) -> anyhow::Result<Bytes> {
    let mut reader = Cursor::new(delta);

    let base_size = read_delta_size(&mut reader)?;
    if base_size != base.len() {
        anyhow::bail!(
            "delta expects a base of {base_size} bytes, found {}",
            base.len()
        );
    }
    let target_size = read_delta_size(&mut reader)?;
    let mut target = Vec::with_capacity(target_size.min(MAX_PREALLOCATION));

    while (reader.position() as usize) < delta.len() {
        let opcode = reader.read_u8()?;

        if opcode & 0x80 != 0 {
            let mut offset = 0usize;
            for i in 0..4 {
                if opcode & (1 << i) != 0 {
                    offset |= (reader.read_u8()? as usize) << (8 * i);
                }
            }
            let mut length = 0usize;
            for i in 0..3 {
                if opcode & (1 << (4 + i)) != 0 {
                    length |= (reader.read_u8()? as usize) << (8 * i);
                }
            }
            if length == 0 {
                length = DEFAULT_COPY_SIZE;
            }

            let chunk = offset
                .checked_add(length)
                .and_then(|end| base.get(offset..end))
                .context("delta copies outside of its base")?;
            target.extend_from_slice(chunk);
        } else if opcode != 0 {
            let start = reader.position() as usize;
            let end = start + opcode as usize;
            let chunk = delta
                .get(start..end)
                .context("delta inserts past its end")?;
            target.extend_from_slice(chunk);
            reader.set_position(end as u64);
        } else {
            anyhow::bail!("reserved delta opcode 0");
        }
    }

    if target.len() != target_size {
        anyhow::bail!(
            "delta produced {} bytes, expected {target_size}",
            target.len()
        );
    }

    Ok(target.into())
}
