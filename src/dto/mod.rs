pub mod bank_dto;
pub mod examination_dto;
pub mod question_dto;
