pub mod ai_service;
pub mod bank_service;
pub mod examination_service;
pub mod generation_service;
pub mod question_service;
pub mod text_extraction;
