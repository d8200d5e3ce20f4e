use crate::areas::pack::Pack;
use crate::artifacts::graph::source::ObjectStore;
use crate::artifacts::objects::object::ObjectBox;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use anyhow::Context;
use bytes::Bytes;
use std::collections::BTreeSet;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use walkdir::WalkDir;

const PACK_DIR: &str = "pack";
const PACK_INDEX_EXTENSION: &str = "idx";

/// Read-only view of `.git/objects`, covering loose and packed objects
#[derive(Debug)]
pub struct Database {
    path: Box<Path>,
    /// Packs found by the last scan, reused by lookups until the next scan
    packs: Mutex<Option<Arc<Vec<Pack>>>>,
}

impl Database {
    pub fn new(path: Box<Path>) -> Self {
        Database {
            path,
            packs: Mutex::new(None),
        }
    }

    /// Re-read the pack directory and replace the cached pack list
    pub fn scan_packs(&self) -> anyhow::Result<Arc<Vec<Pack>>> {
        let pack_dir = self.path.join(PACK_DIR);
        let mut packs = Vec::new();

        if pack_dir.is_dir() {
            let mut index_paths = std::fs::read_dir(&pack_dir)
                .with_context(|| format!("Unable to list pack directory {}", pack_dir.display()))?
                .map(|entry| entry.map(|entry| entry.path()))
                .collect::<Result<Vec<PathBuf>, std::io::Error>>()?;
            index_paths.retain(|path| {
                path.extension()
                    .is_some_and(|extension| extension == PACK_INDEX_EXTENSION)
            });
            index_paths.sort();

            for index_path in index_paths {
                packs.push(Pack::open(&index_path)?);
            }
        }

        let packs = Arc::new(packs);
        *self.lock_packs()? = Some(packs.clone());

        Ok(packs)
    }

    fn packs(&self) -> anyhow::Result<Arc<Vec<Pack>>> {
        let cached = self.lock_packs()?.clone();

        match cached {
            Some(packs) => Ok(packs),
            None => self.scan_packs(),
        }
    }

    fn lock_packs(&self) -> anyhow::Result<std::sync::MutexGuard<'_, Option<Arc<Vec<Pack>>>>> {
        self.packs
            .lock()
            .map_err(|_| anyhow::anyhow!("pack cache lock poisoned"))
    }

    /// Object IDs stored as loose files under `objects/XX/YYYY...`
    pub fn loose_object_ids(&self) -> anyhow::Result<Vec<ObjectId>> {
        let mut oids = Vec::new();

        for entry in WalkDir::new(&self.path).min_depth(2).max_depth(2) {
            let entry = entry.with_context(|| {
                format!("Unable to walk object directory {}", self.path.display())
            })?;
            if !entry.file_type().is_file() {
                continue;
            }

            let dir_name = entry
                .path()
                .parent()
                .and_then(|parent| parent.file_name())
                .map(|name| name.to_string_lossy().to_string())
                .unwrap_or_default();
            let file_name = entry.file_name().to_string_lossy();

            // pack/, info/ and temporary files never parse as object IDs
            if dir_name.len() == 2
                && let Ok(oid) = ObjectId::try_parse(format!("{dir_name}{file_name}"))
            {
                oids.push(oid);
            }
        }

        Ok(oids)
    }

    fn read_loose(&self, object_id: &ObjectId) -> anyhow::Result<Option<(ObjectType, Bytes)>> {
        let object_path = self.path.join(object_id.to_path());

        let object_content = match std::fs::read(&object_path) {
            Ok(content) => content,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(error) => {
                return Err(error).context(format!(
                    "Unable to read object file {}",
                    object_path.display()
                ));
            }
        };

        let object_content = Self::decompress(object_content.into())
            .with_context(|| format!("Corrupt object file {}", object_path.display()))?;
        let mut object_reader = Cursor::new(object_content);
        let object_type = ObjectType::parse_object_type(&mut object_reader)?;
        let position = object_reader.position() as usize;

        Ok(Some((object_type, object_reader.into_inner().slice(position..))))
    }

    /// Read the type and payload of an object, loose first, then packed
    pub fn read_object(&self, object_id: &ObjectId) -> anyhow::Result<(ObjectType, Bytes)> {
        if let Some(object) = self.read_loose(object_id)? {
            return Ok(object);
        }

        for pack in self.packs()?.iter() {
            if let Some(object) = pack.read(object_id)? {
                return Ok(object);
            }
        }

        anyhow::bail!("object {object_id} not found")
    }

    fn decompress(data: Bytes) -> anyhow::Result<Bytes> {
        let mut decoder = flate2::read::ZlibDecoder::new(&*data);
        let mut decompressed_content = Vec::new();
        decoder
            .read_to_end(&mut decompressed_content)
            .context("Unable to decompress object content")?;

        Ok(decompressed_content.into())
    }
}

impl ObjectStore for Database {
    fn object_ids(&self) -> anyhow::Result<Vec<ObjectId>> {
        let mut oids = self.loose_object_ids()?.into_iter().collect::<BTreeSet<_>>();

        for pack in self.scan_packs()?.iter() {
            oids.extend(pack.index().object_ids().cloned());
        }

        Ok(oids.into_iter().collect())
    }

    fn parse_object(&self, object_id: &ObjectId) -> anyhow::Result<ObjectBox> {
        let (object_type, content) = self.read_object(object_id)?;

        ObjectBox::parse(object_type, Cursor::new(content))
            .with_context(|| format!("Unable to parse {object_type} {object_id}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::objects::blob::Blob;
    use assert_fs::TempDir;
    use flate2::Compression;
    use flate2::write::ZlibEncoder;
    use std::io::Write;

    /// Store `raw` as a loose object and return its ID
    fn write_loose(objects: &Path, raw: &[u8]) -> String {
        use sha1::{Digest, Sha1};

        let oid = format!("{:x}", Sha1::digest(raw));
        let path = objects.join(&oid[..2]).join(&oid[2..]);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(raw).unwrap();
        std::fs::write(path, encoder.finish().unwrap()).unwrap();
        oid
    }

    #[test]
    fn enumerates_loose_objects_and_ignores_stray_files() {
        let dir = TempDir::new().unwrap();
        let oid = write_loose(dir.path(), b"blob 2\0hi");
        std::fs::create_dir_all(dir.path().join("info")).unwrap();
        std::fs::write(dir.path().join("info").join("packs"), "").unwrap();
        std::fs::write(dir.path().join(&oid[..2]).join("tmp_obj_123"), "").unwrap();

        let database = Database::new(dir.path().into());
        let oids = database.object_ids().unwrap();

        assert_eq!(oids, vec![ObjectId::try_parse(oid).unwrap()]);
    }

    #[test]
    fn parses_loose_blobs() {
        let dir = TempDir::new().unwrap();
        let oid = write_loose(dir.path(), b"blob 2\0hi");

        let database = Database::new(dir.path().into());
        let object = database
            .parse_object(&ObjectId::try_parse(oid).unwrap())
            .unwrap();

        assert_eq!(
            object,
            ObjectBox::Blob(Box::new(Blob::new(2)))
        );
    }

    #[test]
    fn tags_are_unsupported_objects() {
        let dir = TempDir::new().unwrap();
        let oid = write_loose(dir.path(), b"tag 3\0abc");

        let database = Database::new(dir.path().into());
        let object = database
            .parse_object(&ObjectId::try_parse(oid).unwrap())
            .unwrap();

        assert_eq!(object, ObjectBox::Unsupported(ObjectType::Tag));
    }

    #[test]
    fn missing_objects_are_errors() {
        let dir = TempDir::new().unwrap();

        let database = Database::new(dir.path().into());

        assert!(
            database
                .parse_object(&ObjectId::try_parse("d".repeat(40)).unwrap())
                .is_err()
        );
    }

    #[test]
    fn corrupt_objects_are_errors() {
        let dir = TempDir::new().unwrap();
        let oid = "e".repeat(40);
        let path = dir.path().join("ee").join("e".repeat(38));
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"not zlib").unwrap();

        let database = Database::new(dir.path().into());

        assert!(
            database
                .parse_object(&ObjectId::try_parse(oid).unwrap())
                .is_err()
        );
    }

    #[test]
    fn missing_object_directory_is_an_error() {
        let dir = TempDir::new().unwrap();

        let database = Database::new(dir.path().join("missing").into());

        assert!(database.object_ids().is_err());
    }
}
