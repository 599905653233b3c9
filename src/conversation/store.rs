// File-backed conversation metadata: history, uploaded documents and transcripts
//
// Layout under the data dir:
//   conversations/<id>/history.json
//   conversations/<id>/documents.json
//   conversations/<id>/documents/<doc-id>.<ext>   original bytes
//   conversations/<id>/documents/<doc-id>.txt     extracted text
//   conversations/<id>/transcripts/<timestamp>.md

use super::locks::ConversationLocks;
use crate::ai::core::providers::{ChatMessage, Role};
use crate::ai::rag::{RAGError, RAGResult, ValidationError};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs as tokio_fs;
use uuid::Uuid;

const SUPPORTED_EXTENSIONS: &[&str] = &["txt", "md", "markdown"];

/// One stored conversation turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

impl From<&Message> for ChatMessage {
    fn from(message: &Message) -> Self {
        ChatMessage::new(message.role, message.content.clone())
    }
}

/// Metadata of an uploaded document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub name: String,
    pub stored_path: PathBuf,
    pub text_path: PathBuf,
    pub size: u64,
    pub uploaded_at: DateTime<Utc>,
    /// Extracted text, filled when loaded to avoid repeat disk reads
    #[serde(skip)]
    pub content_cache: Option<String>,
}

/// Conversation ids become directory names, so only a safe alphabet is accepted
pub fn validate_conversation_id(conversation_id: &str) -> Result<(), ValidationError> {
    let valid = !conversation_id.is_empty()
        && conversation_id.len() <= 128
        && conversation_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(ValidationError::InvalidConversationId(
            conversation_id.to_string(),
        ))
    }
}

pub struct ConversationStore {
    root: PathBuf,
    locks: ConversationLocks,
}

impl ConversationStore {
    /// Open the store rooted at `data_dir`, creating the directory if needed
    pub async fn open(data_dir: &Path) -> RAGResult<Self> {
        tokio_fs::create_dir_all(data_dir)
            .await
            .map_err(RAGError::io(format!("create data directory {}", data_dir.display())))?;

        Ok(Self {
            root: data_dir.to_path_buf(),
            locks: ConversationLocks::new(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Allocate a fresh conversation id and its directories
    pub async fn create_conversation(&self) -> RAGResult<String> {
        let conversation_id = Uuid::new_v4().to_string();
        self.ensure_conversation(&conversation_id).await?;
        Ok(conversation_id)
    }

    pub async fn ensure_conversation(&self, conversation_id: &str) -> RAGResult<()> {
        validate_conversation_id(conversation_id)?;

        let dir = self.conversation_dir(conversation_id);
        for subdir in [dir.clone(), dir.join("documents"), dir.join("transcripts")] {
            tokio_fs::create_dir_all(&subdir).await.map_err(RAGError::io(format!(
                "create conversation directory {}",
                subdir.display()
            )))?;
        }
        Ok(())
    }

    pub async fn append_message(&self, conversation_id: &str, message: Message) -> RAGResult<()> {
        self.ensure_conversation(conversation_id).await?;

        let _guard = self.locks.acquire(conversation_id).await;
        let mut history = self.load_history(conversation_id).await?;
        history.push(message);
        write_json(&self.history_path(conversation_id), &history, "encode history").await
    }

    /// Stored history in order; a conversation without history is empty
    pub async fn load_history(&self, conversation_id: &str) -> RAGResult<Vec<Message>> {
        validate_conversation_id(conversation_id)?;
        read_json_or_default(&self.history_path(conversation_id), "decode history").await
    }

    /// Store an upload and its extracted text, then record it in `documents.json`
    pub async fn save_document(
        &self,
        conversation_id: &str,
        original_name: &str,
        data: &[u8],
    ) -> RAGResult<Document> {
        let extension = Path::new(original_name)
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .unwrap_or_else(|| "txt".to_string());
        if !SUPPORTED_EXTENSIONS.contains(&extension.as_str()) {
            return Err(ValidationError::UnsupportedFileType(extension).into());
        }

        self.ensure_conversation(conversation_id).await?;

        let document_id = Uuid::new_v4().to_string();
        let documents_dir = self.conversation_dir(conversation_id).join("documents");

        let stored_path = documents_dir.join(format!("{}.{}", document_id, extension));
        tokio_fs::write(&stored_path, data)
            .await
            .map_err(RAGError::io("write document"))?;

        // Plain text and markdown are used as-is
        let text = String::from_utf8_lossy(data).into_owned();
        let text_path = documents_dir.join(format!("{}.txt", document_id));
        if text_path != stored_path {
            tokio_fs::write(&text_path, text.as_bytes())
                .await
                .map_err(RAGError::io("write extracted text"))?;
        }

        let document = Document {
            id: document_id,
            name: original_name.to_string(),
            stored_path,
            text_path,
            size: data.len() as u64,
            uploaded_at: Utc::now(),
            content_cache: Some(text),
        };

        let _guard = self.locks.acquire(conversation_id).await;
        let mut documents = self.load_documents(conversation_id).await?;
        documents.push(document.clone());
        write_json(
            &self.documents_path(conversation_id),
            &documents,
            "encode documents",
        )
        .await?;

        tracing::info!(
            "Stored document {} ({} bytes) for conversation {}",
            document.id,
            document.size,
            conversation_id
        );
        Ok(document)
    }

    /// Document metadata with the text cache filled where the text file is readable
    pub async fn list_documents(&self, conversation_id: &str) -> RAGResult<Vec<Document>> {
        self.ensure_conversation(conversation_id).await?;

        let mut documents = self.load_documents(conversation_id).await?;
        for document in &mut documents {
            if document.content_cache.is_none() {
                match read_text(&document.text_path).await {
                    Ok(text) => document.content_cache = Some(text),
                    Err(e) => tracing::debug!(
                        "Text for document {} not readable: {}",
                        document.id,
                        e
                    ),
                }
            }
        }
        Ok(documents)
    }

    /// Extracted text of every document, in upload order
    pub async fn load_document_texts(&self, conversation_id: &str) -> RAGResult<Vec<String>> {
        let documents = self.list_documents(conversation_id).await?;

        let mut texts = Vec::with_capacity(documents.len());
        for document in &documents {
            texts.push(self.document_text(document).await?);
        }
        Ok(texts)
    }

    pub async fn document_text(&self, document: &Document) -> RAGResult<String> {
        if let Some(text) = &document.content_cache {
            return Ok(text.clone());
        }
        read_text(&document.text_path)
            .await
            .map_err(RAGError::io(format!("read text of document {}", document.id)))
    }

    /// Write a markdown transcript with a small front-matter header
    pub async fn save_transcript(
        &self,
        conversation_id: &str,
        content: &str,
        timestamp: DateTime<Utc>,
    ) -> RAGResult<PathBuf> {
        self.ensure_conversation(conversation_id).await?;

        let filename = format!("{}.md", timestamp.format("%Y%m%dT%H%M%SZ"));
        let path = self
            .conversation_dir(conversation_id)
            .join("transcripts")
            .join(filename);

        let body = format!(
            "---\nconversation_id: {}\ntimestamp: {}\n---\n\n{}\n",
            conversation_id,
            timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            content
        );
        tokio_fs::write(&path, body)
            .await
            .map_err(RAGError::io("write transcript"))?;
        Ok(path)
    }

    /// Remove everything stored for a conversation. Returns false when nothing existed.
    pub async fn delete_conversation(&self, conversation_id: &str) -> RAGResult<bool> {
        validate_conversation_id(conversation_id)?;

        let _guard = self.locks.acquire(conversation_id).await;
        match tokio_fs::remove_dir_all(self.conversation_dir(conversation_id)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(RAGError::io(format!("delete conversation {}", conversation_id))(e)),
        }
    }

    async fn load_documents(&self, conversation_id: &str) -> RAGResult<Vec<Document>> {
        read_json_or_default(&self.documents_path(conversation_id), "decode documents").await
    }

    fn conversation_dir(&self, conversation_id: &str) -> PathBuf {
        self.root.join("conversations").join(conversation_id)
    }

    fn history_path(&self, conversation_id: &str) -> PathBuf {
        self.conversation_dir(conversation_id).join("history.json")
    }

    fn documents_path(&self, conversation_id: &str) -> PathBuf {
        self.conversation_dir(conversation_id).join("documents.json")
    }
}

async fn read_text(path: &Path) -> std::io::Result<String> {
    let data = tokio_fs::read(path).await?;
    Ok(String::from_utf8_lossy(&data).into_owned())
}

async fn read_json_or_default<T>(path: &Path, context: &'static str) -> RAGResult<Vec<T>>
where
    T: DeserializeOwned,
{
    let data = match tokio_fs::read(path).await {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(RAGError::io(format!("read {}", path.display()))(e)),
    };
    serde_json::from_slice(&data).map_err(RAGError::serialization(context))
}

/// Write through a temporary file and rename, so readers never see half a file
async fn write_json<T: Serialize>(path: &Path, value: &T, context: &'static str) -> RAGResult<()> {
    let data = serde_json::to_vec_pretty(value).map_err(RAGError::serialization(context))?;

    let tmp_path = path.with_extension("json.tmp");
    tokio_fs::write(&tmp_path, &data)
        .await
        .map_err(RAGError::io(format!("write {}", tmp_path.display())))?;
    tokio_fs::rename(&tmp_path, path)
        .await
        .map_err(RAGError::io(format!("replace {}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    async fn open_store() -> (TempDir, ConversationStore) {
        let dir = TempDir::new().unwrap();
        let store = ConversationStore::open(dir.path()).await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_missing_history_is_empty() {
        let (_dir, store) = open_store().await;
        assert!(store.load_history("conv").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_append_and_load_history_in_order() {
        let (_dir, store) = open_store().await;
        store
            .append_message("conv", Message::new(Role::User, "hello"))
            .await
            .unwrap();
        store
            .append_message("conv", Message::new(Role::Assistant, "hi there"))
            .await
            .unwrap();

        let history = store.load_history("conv").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, Role::User);
        assert_eq!(history[1].content, "hi there");
    }

    #[tokio::test]
    async fn test_concurrent_appends_are_not_lost() {
        let (_dir, store) = open_store().await;
        let store = Arc::new(store);

        let mut handles = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .append_message("conv", Message::new(Role::User, format!("message {}", i)))
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.load_history("conv").await.unwrap().len(), 16);
    }

    #[tokio::test]
    async fn test_save_document_and_load_texts() {
        let (_dir, store) = open_store().await;
        let first = store
            .save_document("conv", "notes.md", b"# Notes\nfirst")
            .await
            .unwrap();
        store
            .save_document("conv", "README", b"second")
            .await
            .unwrap();

        assert!(first.stored_path.extension().is_some_and(|ext| ext == "md"));
        assert_eq!(first.size, 13);

        let documents = store.list_documents("conv").await.unwrap();
        assert_eq!(documents.len(), 2);
        assert_eq!(documents[1].name, "README");
        assert!(documents.iter().all(|doc| doc.content_cache.is_some()));

        let texts = store.load_document_texts("conv").await.unwrap();
        assert_eq!(texts, vec!["# Notes\nfirst".to_string(), "second".to_string()]);
    }

    #[tokio::test]
    async fn test_unsupported_extension_rejected() {
        let (_dir, store) = open_store().await;
        let err = store
            .save_document("conv", "report.pdf", b"%PDF")
            .await
            .unwrap_err();

        assert_eq!(
            err.validation(),
            Some(&ValidationError::UnsupportedFileType("pdf".to_string()))
        );
        assert!(store.list_documents("conv").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_conversation_id_rejected() {
        let (_dir, store) = open_store().await;
        for id in ["", "../escape", "a/b", "with space"] {
            let err = store.load_history(id).await.unwrap_err();
            assert!(err.is_validation(), "{:?} should be rejected", id);
        }
    }

    #[tokio::test]
    async fn test_transcript_has_front_matter() {
        let (_dir, store) = open_store().await;
        let timestamp = DateTime::parse_from_rfc3339("2024-05-01T12:30:00Z")
            .unwrap()
            .with_timezone(&Utc);

        let path = store
            .save_transcript("conv", "The answer is 42.", timestamp)
            .await
            .unwrap();

        assert!(path.ends_with("transcripts/20240501T123000Z.md"));
        let body = tokio_fs::read_to_string(&path).await.unwrap();
        assert_eq!(
            body,
            "---\nconversation_id: conv\ntimestamp: 2024-05-01T12:30:00Z\n---\n\nThe answer is 42.\n"
        );
    }

    #[tokio::test]
    async fn test_delete_conversation_is_idempotent() {
        let (_dir, store) = open_store().await;
        store
            .append_message("conv", Message::new(Role::User, "hello"))
            .await
            .unwrap();

        assert!(store.delete_conversation("conv").await.unwrap());
        assert!(!store.delete_conversation("conv").await.unwrap());
        assert!(store.load_history("conv").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_conversation_allocates_directories() {
        let (dir, store) = open_store().await;
        let id = store.create_conversation().await.unwrap();

        let conv_dir = dir.path().join("conversations").join(&id);
        assert!(conv_dir.join("documents").is_dir());
        assert!(conv_dir.join("transcripts").is_dir());
    }
}
