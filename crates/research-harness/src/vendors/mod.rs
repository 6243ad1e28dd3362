/// OpenAI Responses API backend.
pub mod openai;
