//! JSON snapshot store
//!
//! A small, self-contained [`TargetStore`] kept in memory and optionally
//! persisted as `store.json` plus a `files/` directory. The catalog is
//! seeded with an article and a page bundle, category and tag
//! vocabularies, two text formats, one comment type and the admin account.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::{
    BundleInfo, CatalogEntry, CommentRecord, DetectedFields, FetchError, Fetcher, FileRef,
    MediaRule, NodeRecord, StoreError, TargetStore, UserLookup,
};
use crate::types::{EntityId, ADMIN_ID};
use crate::util::file_name_of;

const SNAPSHOT_FILE: &str = "store.json";
const FILES_DIR: &str = "files";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct BundleDef {
    id: String,
    label: String,
    fields: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRow {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermRow {
    pub name: String,
    pub vocabulary: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRow {
    pub bundle: String,
    pub field: String,
    pub file_id: EntityId,
    pub alt: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoreData {
    bundles: Vec<BundleDef>,
    vocabularies: Vec<CatalogEntry>,
    text_formats: Vec<CatalogEntry>,
    comment_types: Vec<CatalogEntry>,
    #[serde(default)]
    users: BTreeMap<EntityId, UserRow>,
    #[serde(default)]
    terms: BTreeMap<EntityId, TermRow>,
    #[serde(default)]
    files: BTreeMap<EntityId, FileRef>,
    #[serde(default)]
    media: BTreeMap<EntityId, MediaRow>,
    #[serde(default)]
    nodes: BTreeMap<EntityId, NodeRecord>,
    #[serde(default)]
    comments: BTreeMap<EntityId, CommentRecord>,
}

impl StoreData {
    fn seeded() -> Self {
        let fields = |names: &[&str]| -> Vec<String> { names.iter().map(|n| n.to_string()).collect() };
        Self {
            bundles: vec![
                BundleDef {
                    id: "article".into(),
                    label: "Article".into(),
                    fields: fields(&["body", "field_excerpt", "field_image", "comment", "field_tags"]),
                },
                BundleDef {
                    id: "page".into(),
                    label: "Basic page".into(),
                    fields: fields(&["body"]),
                },
            ],
            vocabularies: vec![
                CatalogEntry::new("categories", "Categories"),
                CatalogEntry::new("tags", "Tags"),
            ],
            text_formats: vec![
                CatalogEntry::new("basic_html", "Basic HTML"),
                CatalogEntry::new("plain_text", "Plain text"),
            ],
            comment_types: vec![CatalogEntry::new("comment", "Default comments")],
            users: BTreeMap::from([(
                ADMIN_ID,
                UserRow {
                    name: "admin".into(),
                    email: "admin@localhost".into(),
                },
            )]),
            terms: BTreeMap::new(),
            files: BTreeMap::new(),
            media: BTreeMap::new(),
            nodes: BTreeMap::new(),
            comments: BTreeMap::new(),
        }
    }
}

fn next_id<V>(table: &BTreeMap<EntityId, V>) -> EntityId {
    table.keys().next_back().map_or(1, |last| last + 1)
}

/// Reference target store
pub struct LocalStore {
    data: StoreData,
    root: Option<PathBuf>,
    fetcher: Box<dyn Fetcher>,
}

impl LocalStore {
    /// A fresh seeded store that never touches disk
    pub fn in_memory(fetcher: impl Fetcher + 'static) -> Self {
        Self {
            data: StoreData::seeded(),
            root: None,
            fetcher: Box::new(fetcher),
        }
    }

    /// Open the store rooted at `dir`, seeding it if no snapshot exists
    pub fn open(dir: impl AsRef<Path>, fetcher: impl Fetcher + 'static) -> Result<Self, StoreError> {
        let root = dir.as_ref().to_path_buf();
        let snapshot = root.join(SNAPSHOT_FILE);

        let data = if snapshot.exists() {
            let content = fs::read_to_string(&snapshot)?;
            let data: StoreData = serde_json::from_str(&content)?;
            info!(
                "Opened local store {} ({} nodes, {} media)",
                root.display(),
                data.nodes.len(),
                data.media.len()
            );
            data
        } else {
            info!("Creating local store at {}", root.display());
            StoreData::seeded()
        };

        Ok(Self {
            data,
            root: Some(root),
            fetcher: Box::new(fetcher),
        })
    }

    /// Write the snapshot (temp file + rename). No-op for in-memory stores.
    pub fn persist(&self) -> Result<(), StoreError> {
        let Some(root) = &self.root else {
            return Ok(());
        };
        fs::create_dir_all(root)?;

        let path = root.join(SNAPSHOT_FILE);
        let temp_path = path.with_extension("tmp");
        let json = serde_json::to_string_pretty(&self.data)?;
        let mut out = File::create(&temp_path)?;
        out.write_all(json.as_bytes())?;
        out.sync_all()?;
        fs::rename(&temp_path, &path)?;

        info!("Saved local store to {}", path.display());
        Ok(())
    }

    pub fn users(&self) -> impl Iterator<Item = (EntityId, &UserRow)> {
        self.data.users.iter().map(|(id, row)| (*id, row))
    }

    pub fn terms(&self) -> impl Iterator<Item = (EntityId, &TermRow)> {
        self.data.terms.iter().map(|(id, row)| (*id, row))
    }

    pub fn media(&self) -> impl Iterator<Item = (EntityId, &MediaRow)> {
        self.data.media.iter().map(|(id, row)| (*id, row))
    }

    pub fn nodes(&self) -> impl Iterator<Item = (EntityId, &NodeRecord)> {
        self.data.nodes.iter().map(|(id, row)| (*id, row))
    }

    pub fn comments(&self) -> impl Iterator<Item = (EntityId, &CommentRecord)> {
        self.data.comments.iter().map(|(id, row)| (*id, row))
    }

    pub fn node(&self, id: EntityId) -> Option<&NodeRecord> {
        self.data.nodes.get(&id)
    }

    pub fn comment(&self, id: EntityId) -> Option<&CommentRecord> {
        self.data.comments.get(&id)
    }

    fn bundle_def(&self, id: &str) -> Option<&BundleDef> {
        self.data.bundles.iter().find(|b| b.id == id)
    }

    /// Public file name not yet used by another stored file
    fn unique_file_name(&self, file_id: EntityId, filename: &str) -> String {
        let taken = self.data.files.values().any(|f| f.filename == filename);
        if taken {
            format!("{}-{}", file_id, filename)
        } else {
            filename.to_string()
        }
    }
}

impl TargetStore for LocalStore {
    fn list_bundles(&self) -> Result<Vec<BundleInfo>, StoreError> {
        Ok(self
            .data
            .bundles
            .iter()
            .map(|b| BundleInfo {
                id: b.id.clone(),
                label: b.label.clone(),
                fields: DetectedFields::detect(&b.fields),
            })
            .collect())
    }

    fn list_vocabularies(&self) -> Result<Vec<CatalogEntry>, StoreError> {
        Ok(self.data.vocabularies.clone())
    }

    fn list_text_formats(&self) -> Result<Vec<CatalogEntry>, StoreError> {
        Ok(self.data.text_formats.clone())
    }

    fn list_comment_types(&self) -> Result<Vec<CatalogEntry>, StoreError> {
        Ok(self.data.comment_types.clone())
    }

    fn find_user(&self, key: UserLookup<'_>) -> Result<Option<EntityId>, StoreError> {
        let found = self.data.users.iter().find(|(_, user)| match key {
            UserLookup::Email(email) => user.email.eq_ignore_ascii_case(email),
            UserLookup::Name(name) => user.name == name,
        });
        Ok(found.map(|(id, _)| *id))
    }

    fn create_user(&mut self, name: &str, email: &str) -> Result<EntityId, StoreError> {
        if name.trim().is_empty() {
            return Err(StoreError::Rejected("user name must not be empty".into()));
        }
        if self.find_user(UserLookup::Name(name))?.is_some() {
            return Err(StoreError::Rejected(format!("user name '{}' is taken", name)));
        }
        if self.find_user(UserLookup::Email(email))?.is_some() {
            return Err(StoreError::Rejected(format!("email '{}' is taken", email)));
        }

        let id = next_id(&self.data.users);
        self.data.users.insert(
            id,
            UserRow {
                name: name.to_string(),
                email: email.to_string(),
            },
        );
        debug!("Created user {} ({})", id, name);
        Ok(id)
    }

    fn find_term(&self, name: &str, vocabulary: &str) -> Result<Option<EntityId>, StoreError> {
        Ok(self
            .data
            .terms
            .iter()
            .find(|(_, t)| t.vocabulary == vocabulary && t.name == name)
            .map(|(id, _)| *id))
    }

    fn create_term(&mut self, name: &str, vocabulary: &str) -> Result<EntityId, StoreError> {
        if !self.data.vocabularies.iter().any(|v| v.id == vocabulary) {
            return Err(StoreError::NotFound(format!("vocabulary '{}'", vocabulary)));
        }
        let id = next_id(&self.data.terms);
        self.data.terms.insert(
            id,
            TermRow {
                name: name.to_string(),
                vocabulary: vocabulary.to_string(),
            },
        );
        Ok(id)
    }

    fn fetch_and_store_file(&mut self, url: &str) -> Result<FileRef, FetchError> {
        let bytes = self.fetcher.fetch(url)?;
        let filename = match file_name_of(url) {
            "" => "file".to_string(),
            name => name.to_string(),
        };
        let size = bytes.len() as u64;

        if let Some(existing) = self
            .data
            .files
            .values()
            .find(|f| f.filename == filename && f.size == size)
        {
            debug!("Reusing stored file {} for {}", existing.uri, url);
            return Ok(existing.clone());
        }

        let file_id = next_id(&self.data.files);
        let public_name = self.unique_file_name(file_id, &filename);
        if let Some(root) = &self.root {
            let dir = root.join(FILES_DIR);
            fs::create_dir_all(&dir)?;
            fs::write(dir.join(&public_name), &bytes)?;
        }

        let file = FileRef {
            file_id,
            uri: format!("public://{}", public_name),
            url: format!("/{}/{}", FILES_DIR, public_name),
            filename,
            size,
        };
        self.data.files.insert(file_id, file.clone());
        Ok(file)
    }

    fn find_media(&self, file: &FileRef) -> Result<Option<EntityId>, StoreError> {
        Ok(self
            .data
            .media
            .iter()
            .find(|(_, m)| m.file_id == file.file_id)
            .map(|(id, _)| *id))
    }

    fn create_media(
        &mut self,
        file: &FileRef,
        rule: &MediaRule,
        alt: &str,
    ) -> Result<EntityId, StoreError> {
        if !self.data.files.contains_key(&file.file_id) {
            return Err(StoreError::NotFound(format!("file {}", file.file_id)));
        }
        let id = next_id(&self.data.media);
        self.data.media.insert(
            id,
            MediaRow {
                bundle: rule.bundle.to_string(),
                field: rule.field.to_string(),
                file_id: file.file_id,
                alt: alt.to_string(),
            },
        );
        Ok(id)
    }

    fn find_existing_node(
        &self,
        bundle: &str,
        title: &str,
        created: DateTime<Utc>,
    ) -> Result<Option<EntityId>, StoreError> {
        Ok(self
            .data
            .nodes
            .iter()
            .find(|(_, n)| n.bundle == bundle && n.title == title && n.created == created)
            .map(|(id, _)| *id))
    }

    fn create_node(&mut self, record: &NodeRecord) -> Result<EntityId, StoreError> {
        if self.bundle_def(&record.bundle).is_none() {
            return Err(StoreError::NotFound(format!("bundle '{}'", record.bundle)));
        }
        let id = next_id(&self.data.nodes);
        self.data.nodes.insert(id, record.clone());
        Ok(id)
    }

    fn create_comment(&mut self, record: &CommentRecord) -> Result<EntityId, StoreError> {
        if !self.data.nodes.contains_key(&record.node_id) {
            return Err(StoreError::NotFound(format!("node {}", record.node_id)));
        }
        if let Some(parent) = record.parent_id {
            if !self.data.comments.contains_key(&parent) {
                return Err(StoreError::NotFound(format!("parent comment {}", parent)));
            }
        }
        let id = next_id(&self.data.comments);
        self.data.comments.insert(id, record.clone());
        Ok(id)
    }

    fn find_comment_field(&self, bundle: &str) -> Result<Option<String>, StoreError> {
        let def = self
            .bundle_def(bundle)
            .ok_or_else(|| StoreError::NotFound(format!("bundle '{}'", bundle)))?;
        Ok(DetectedFields::detect(&def.fields).comment)
    }

    fn flush(&mut self) -> Result<(), StoreError> {
        self.persist()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{media_rule_for, TextValue};
    use tempfile::TempDir;

    struct StaticFetcher;

    impl Fetcher for StaticFetcher {
        fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
            if url.contains("missing") {
                return Err(FetchError::Status(404));
            }
            Ok(url.as_bytes().to_vec())
        }
    }

    fn node(title: &str) -> NodeRecord {
        let created = DateTime::parse_from_rfc3339("2024-01-02T03:04:05Z")
            .unwrap()
            .with_timezone(&Utc);
        NodeRecord {
            bundle: "article".into(),
            title: title.into(),
            author_id: ADMIN_ID,
            created,
            changed: created,
            body_field: "body".into(),
            body: TextValue {
                value: "<p>Hi</p>".into(),
                format: "basic_html".into(),
            },
            excerpt: None,
            alias: None,
            published: false,
            category_ids: vec![],
            tag_ids: vec![],
            image: None,
        }
    }

    #[test]
    fn test_seeded_catalog() {
        let store = LocalStore::in_memory(StaticFetcher);
        let bundles = store.list_bundles().unwrap();
        let article = bundles.iter().find(|b| b.id == "article").unwrap();
        assert_eq!(article.fields.body.as_deref(), Some("body"));
        assert_eq!(article.fields.excerpt.as_deref(), Some("field_excerpt"));
        assert_eq!(article.fields.image.as_deref(), Some("field_image"));
        assert_eq!(article.fields.comment.as_deref(), Some("comment"));
        assert_eq!(store.find_comment_field("page").unwrap(), None);
        assert_eq!(
            store.find_user(UserLookup::Name("admin")).unwrap(),
            Some(ADMIN_ID)
        );
    }

    #[test]
    fn test_user_uniqueness() {
        let mut store = LocalStore::in_memory(StaticFetcher);
        let id = store.create_user("jane", "jane@example.com").unwrap();
        assert_eq!(id, 2);
        assert_eq!(
            store.find_user(UserLookup::Email("JANE@example.com")).unwrap(),
            Some(2)
        );
        assert!(matches!(
            store.create_user("jane", "other@example.com"),
            Err(StoreError::Rejected(_))
        ));
    }

    #[test]
    fn test_files_deduplicated_by_name_and_size() {
        let mut store = LocalStore::in_memory(StaticFetcher);
        let a = store
            .fetch_and_store_file("https://old.example.com/2024/01/a.jpg")
            .unwrap();
        let again = store
            .fetch_and_store_file("https://old.example.com/2024/01/a.jpg")
            .unwrap();
        assert_eq!(a, again);

        // Same name, different size
        let b = store
            .fetch_and_store_file("https://old.example.com/2023/1/a.jpg")
            .unwrap();
        assert_ne!(a.file_id, b.file_id);
        assert_eq!(b.url, format!("/files/{}-a.jpg", b.file_id));

        let media = store
            .create_media(&a, media_rule_for(&a.filename), "alt")
            .unwrap();
        assert_eq!(store.find_media(&again).unwrap(), Some(media));
        assert_eq!(store.find_media(&b).unwrap(), None);

        assert!(matches!(
            store.fetch_and_store_file("https://old.example.com/missing.png"),
            Err(FetchError::Status(404))
        ));
    }

    #[test]
    fn test_node_lookup_by_natural_key() {
        let mut store = LocalStore::in_memory(StaticFetcher);
        let record = node("Hello");
        let id = store.create_node(&record).unwrap();
        assert_eq!(
            store
                .find_existing_node("article", "Hello", record.created)
                .unwrap(),
            Some(id)
        );
        assert_eq!(
            store.find_existing_node("page", "Hello", record.created).unwrap(),
            None
        );
    }

    #[test]
    fn test_persist_and_reopen() {
        let dir = TempDir::new().unwrap();
        let mut store = LocalStore::open(dir.path(), StaticFetcher).unwrap();
        store.create_term("News", "categories").unwrap();
        store.create_node(&node("Persisted")).unwrap();
        let file = store
            .fetch_and_store_file("https://old.example.com/doc.pdf")
            .unwrap();
        store.persist().unwrap();
        assert!(dir.path().join("files").join("doc.pdf").exists());

        let reopened = LocalStore::open(dir.path(), StaticFetcher).unwrap();
        assert_eq!(reopened.find_term("News", "categories").unwrap(), Some(1));
        assert_eq!(reopened.nodes().count(), 1);
        assert_eq!(reopened.nodes().next().unwrap().1.title, "Persisted");
        assert_eq!(file.uri, "public://doc.pdf");
    }
}
