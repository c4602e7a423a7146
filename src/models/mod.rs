pub mod question;
pub mod question_bank;
