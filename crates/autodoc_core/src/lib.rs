pub mod ai;
pub mod blocks;
pub mod domain;
pub mod forms;
pub mod ports;
pub mod rendering;
pub mod schema;
pub mod templating;

pub use ai::{AiClient, AiSettings, FieldHelp, GenerationOptions};
pub use domain::{
    AiRequestRecord, DocumentTemplate, DocumentType, GeneratedDocument, LegalCategory,
    NewAiRequestRecord, NewDocumentTemplate, NewGeneratedDocument, RequestKind, TemplateFilter,
    TemplatePage,
};
pub use forms::{CleanedData, DynamicForm, FieldError, FormField};
pub use ports::{
    AiHistoryRepository, CompletionTransport, DatabaseService, PortError, PortResult,
    ResponseCache, TemplateSource,
};
pub use rendering::{DocumentRenderer, OutputFormat, RenderedDocument};
