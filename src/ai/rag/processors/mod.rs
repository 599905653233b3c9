// RAG processors

pub mod chunk;

pub use chunk::TextChunker;
