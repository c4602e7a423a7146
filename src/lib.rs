pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use crate::services::{
    ai_service::AIService, bank_service::BankService,
    examination_service::ExaminationService, generation_service::GenerationService,
    question_service::QuestionService,
};
use reqwest::Client;
use sqlx::PgPool;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub question_service: QuestionService,
    pub bank_service: BankService,
    pub examination_service: ExaminationService<QuestionService>,
    pub ai_service: AIService,
    pub generation_service: GenerationService,
}

impl AppState {
    pub fn new(pool: PgPool) -> error::Result<Self> {
        let config = crate::config::get_config();
        let http_client = Client::builder()
            .timeout(std::time::Duration::from_secs(180))
            .build()?;

        let question_service = QuestionService::new(pool.clone());
        let bank_service = BankService::new(pool.clone());
        let examination_service = ExaminationService::new(question_service.clone());
        let ai_service = AIService::new(http_client, config);
        let generation_service = GenerationService::new(ai_service.clone(), question_service.clone());

        Ok(Self {
            pool,
            question_service,
            bank_service,
            examination_service,
            ai_service,
            generation_service,
        })
    }
}
