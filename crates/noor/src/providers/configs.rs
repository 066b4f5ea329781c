/// Unified enum wrapping the provider configurations the factory understands.
#[derive(Debug, Clone)]
pub enum ProviderConfig {
    OpenAi(OpenAiProviderConfig),
}

#[derive(Debug, Clone)]
pub struct OpenAiProviderConfig {
    pub host: String,
    pub api_key: String,
    pub model: String,
    pub image_model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<i32>,
}
