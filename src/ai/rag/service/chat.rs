// End-to-end chat over uploaded documents

use super::{DocumentRefresher, RefreshOutcome, Retriever};
use crate::ai::core::providers::{ChatMessage, ChatProvider, EmbeddingProvider, Role};
use crate::ai::rag::{
    engines::VectorStore, PromptAssembler, RAGResult, TextChunker, ValidationError,
};
use crate::conversation::{ConversationStore, Document, Message};
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;

/// Where the reference texts of a reply came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextSource {
    /// Top-K chunks from similarity search
    Retrieved { chunks: usize },
    /// Full document texts, used when retrieval failed or found nothing
    FullText { documents: usize },
    /// The conversation has no documents
    None,
}

#[derive(Debug, Clone)]
pub struct ChatReply {
    pub content: String,
    pub context: ContextSource,
    pub transcript_path: PathBuf,
}

pub struct ChatService {
    conversations: Arc<ConversationStore>,
    vectors: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    chat: Arc<dyn ChatProvider>,
    retriever: Retriever,
    chunker: TextChunker,
    assembler: PromptAssembler,
}

impl ChatService {
    pub fn new(
        conversations: Arc<ConversationStore>,
        vectors: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        chat: Arc<dyn ChatProvider>,
        top_k: usize,
    ) -> Self {
        let retriever = Retriever::new(vectors.clone(), embedder.clone(), top_k);
        Self {
            conversations,
            vectors,
            embedder,
            chat,
            retriever,
            chunker: TextChunker::default(),
            assembler: PromptAssembler::default(),
        }
    }

    pub fn with_chunker(mut self, chunker: TextChunker) -> Self {
        self.chunker = chunker;
        self
    }

    pub fn with_assembler(mut self, assembler: PromptAssembler) -> Self {
        self.assembler = assembler;
        self
    }

    pub fn conversations(&self) -> &ConversationStore {
        &self.conversations
    }

    /// Store a document and index its chunks.
    ///
    /// The document stays stored when indexing fails; `reindex_conversation` retries it.
    pub async fn upload_document(
        &self,
        conversation_id: &str,
        name: &str,
        data: &[u8],
    ) -> RAGResult<(Document, RefreshOutcome)> {
        let document = self
            .conversations
            .save_document(conversation_id, name, data)
            .await?;

        let outcome = self
            .refresh_document(conversation_id, &document)
            .await
            .inspect_err(|e| {
                tracing::warn!(
                    "Document {} stored but not indexed: {}",
                    document.id,
                    e
                )
            })?;
        Ok((document, outcome))
    }

    /// Refresh every stored document of a conversation, stopping at the first failure
    pub async fn reindex_conversation(
        &self,
        conversation_id: &str,
    ) -> RAGResult<Vec<(Document, RefreshOutcome)>> {
        let documents = self.conversations.list_documents(conversation_id).await?;

        let mut refreshed = Vec::with_capacity(documents.len());
        for document in documents {
            let outcome = self.refresh_document(conversation_id, &document).await?;
            refreshed.push((document, outcome));
        }
        Ok(refreshed)
    }

    async fn refresh_document(
        &self,
        conversation_id: &str,
        document: &Document,
    ) -> RAGResult<RefreshOutcome> {
        let text = self.conversations.document_text(document).await?;
        let chunker = self.chunker;

        DocumentRefresher::new(self.vectors.as_ref())
            .chunk_with(move || Ok(chunker.split(&text)))
            .embed_with(self.embedder.as_ref())
            .refresh(conversation_id, &document.id)
            .await
    }

    /// Record the user's message, answer it with document context and record the answer
    pub async fn send_message(&self, conversation_id: &str, content: &str) -> RAGResult<ChatReply> {
        let content = content.trim();
        if content.is_empty() {
            return Err(ValidationError::EmptyContent.into());
        }

        self.conversations
            .append_message(conversation_id, Message::new(Role::User, content))
            .await?;

        let history: Vec<ChatMessage> = self
            .conversations
            .load_history(conversation_id)
            .await?
            .iter()
            .map(ChatMessage::from)
            .collect();

        let (candidates, context) = self.gather_context(conversation_id, content).await?;
        let messages = self.assembler.assemble(&history, &candidates);

        tracing::debug!(
            "Generating reply for conversation {} with {} messages via {}",
            conversation_id,
            messages.len(),
            self.chat.provider_name()
        );
        let reply = self.chat.generate(&messages).await?;

        let now = Utc::now();
        self.conversations
            .append_message(
                conversation_id,
                Message {
                    role: Role::Assistant,
                    content: reply.clone(),
                    timestamp: now,
                },
            )
            .await?;
        let transcript_path = self
            .conversations
            .save_transcript(conversation_id, &reply, now)
            .await?;

        Ok(ChatReply {
            content: reply,
            context,
            transcript_path,
        })
    }

    /// Candidate reference texts: retrieved chunks, else full document texts
    async fn gather_context(
        &self,
        conversation_id: &str,
        query: &str,
    ) -> RAGResult<(Vec<String>, ContextSource)> {
        let documents = self.conversations.list_documents(conversation_id).await?;
        if documents.is_empty() {
            return Ok((Vec::new(), ContextSource::None));
        }

        match self.retriever.retrieve(conversation_id, query).await {
            Ok(chunks) if !chunks.is_empty() => {
                let context = ContextSource::Retrieved {
                    chunks: chunks.len(),
                };
                let texts = chunks.into_iter().map(|chunk| chunk.content).collect();
                return Ok((texts, context));
            }
            Ok(_) => tracing::warn!(
                "No indexed chunks for conversation {}, using full document texts",
                conversation_id
            ),
            Err(e) => tracing::warn!(
                "Retrieval failed for conversation {}, using full document texts: {}",
                conversation_id,
                e
            ),
        }

        let mut texts = Vec::with_capacity(documents.len());
        for document in &documents {
            texts.push(self.conversations.document_text(document).await?);
        }
        Ok((
            texts,
            ContextSource::FullText {
                documents: documents.len(),
            },
        ))
    }

    /// Remove a conversation's vectors, then its metadata
    pub async fn delete_conversation(&self, conversation_id: &str) -> RAGResult<bool> {
        crate::conversation::validate_conversation_id(conversation_id)?;

        let chunks = self.vectors.delete_conversation(conversation_id).await?;
        let existed = self
            .conversations
            .delete_conversation(conversation_id)
            .await?;

        tracing::info!(
            "Deleted conversation {} ({} chunks)",
            conversation_id,
            chunks
        );
        Ok(existed || chunks > 0)
    }
}
