mod translation;

pub use translation::{
    file_too_large, validate_upload, OutcomeSource, TranslationOutcome, TranslationService,
    ALLOWED_EXTENSIONS, INVALID_FILE_TYPE_MESSAGE,
};
