mod buffer;
mod buffer_builder;
mod config;
mod edit;
mod error;
mod io;
mod source;
mod text_change;

pub use crate::buffer::{PieceTreeTextBuffer, REDUCE_OPERATIONS_THRESHOLD};
pub use crate::buffer_builder::PieceTreeTextBufferBuilder;
pub use crate::config::BuildOptions;
pub use crate::edit::{
    ApplyEditsResult, ContentChange, Identifier, ReverseEditOperation, SingleEditOperation,
    ValidatedEditOperation,
};
pub use crate::error::{BufferError, BufferResult};
pub use crate::io::{
    hash_file, load_from_path, load_from_reader, load_from_source, save_to_path, save_to_source,
    save_to_writer, spawn_content_hash,
};
pub use crate::source::{DocumentMetadata, DocumentSource, FsDocument, MemoryDocument};
pub use crate::text_change::TextChange;
