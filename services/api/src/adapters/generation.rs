//! services/api/src/adapters/generation.rs
//!
//! This module contains the adapter for the hosted text-generation model.
//! It implements the `ContentGenerator` port from the `core` crate.
//!
//! Search-grounded requests go through the Responses API with the web search
//! tool enabled; everything else is a plain chat completion.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        chat::{
            ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
            ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
        },
        responses::{CreateResponseArgs, Tool, WebSearchTool},
    },
    Client,
};
use async_trait::async_trait;
use readwithme_core::domain::{Citation, GeneratedContent, GenerationOptions};
use readwithme_core::ports::{ContentGenerator, PortError, PortResult};
use readwithme_core::prompts::SYSTEM_INSTRUCTION;
use regex::Regex;
use tracing::debug;

const JSON_INSTRUCTION: &str =
    "Respond with valid JSON only. Do not wrap it in markdown fences or add commentary.";

const MAX_OUTPUT_TOKENS: u32 = 4096;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `ContentGenerator` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct LlmGenerationAdapter {
    client: Client<OpenAIConfig>,
    model: String,
    citation_pattern: Regex,
}

impl LlmGenerationAdapter {
    /// Creates a new `LlmGenerationAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Result<Self, regex::Error> {
        // Markdown links: [title](https://...)
        let citation_pattern = Regex::new(r"\[([^\]\n]+)\]\((https?://[^\s)]+)\)")?;
        Ok(Self {
            client,
            model,
            citation_pattern,
        })
    }

    /// Collects the web sources the model linked to, first occurrence wins.
    fn extract_citations(&self, text: &str) -> Vec<Citation> {
        let mut citations: Vec<Citation> = Vec::new();
        for caps in self.citation_pattern.captures_iter(text) {
            let uri = caps[2].to_string();
            if citations.iter().any(|c| c.uri == uri) {
                continue;
            }
            citations.push(Citation {
                uri,
                title: caps[1].trim().to_string(),
            });
        }
        citations
    }

    async fn search_completion(&self, prompt: &str) -> PortResult<String> {
        let request = CreateResponseArgs::default()
            .model(&self.model)
            .instructions(SYSTEM_INSTRUCTION)
            .input(prompt)
            .tools(vec![Tool::WebSearch(WebSearchTool::default())])
            .max_output_tokens(MAX_OUTPUT_TOKENS)
            .build()
            .map_err(|e| PortError::Generation(e.to_string()))?;

        let response = self
            .client
            .responses()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Generation(e.to_string()))?;

        Ok(response.output_text().unwrap_or_default())
    }

    async fn chat_completion(&self, prompt: &str, json_mode: bool) -> PortResult<String> {
        let mut messages = vec![ChatCompletionRequestMessage::System(
            ChatCompletionRequestSystemMessageArgs::default()
                .content(SYSTEM_INSTRUCTION)
                .build()
                .map_err(|e| PortError::Generation(e.to_string()))?,
        )];
        if json_mode {
            messages.push(ChatCompletionRequestMessage::System(
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(JSON_INSTRUCTION)
                    .build()
                    .map_err(|e| PortError::Generation(e.to_string()))?,
            ));
        }
        messages.push(ChatCompletionRequestMessage::User(
            ChatCompletionRequestUserMessageArgs::default()
                .content(prompt)
                .build()
                .map_err(|e| PortError::Generation(e.to_string()))?,
        ));

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .max_tokens(MAX_OUTPUT_TOKENS)
            .build()
            .map_err(|e| PortError::Generation(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| PortError::Generation(e.to_string()))?;

        Ok(response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .unwrap_or_default())
    }
}

//=========================================================================================
// `ContentGenerator` Trait Implementation
//=========================================================================================

#[async_trait]
impl ContentGenerator for LlmGenerationAdapter {
    async fn generate(
        &self,
        prompt: &str,
        options: GenerationOptions,
    ) -> PortResult<GeneratedContent> {
        let options = options.effective();
        debug!(
            "Generating with model {} (search: {}, json: {})",
            self.model, options.use_search, options.json_mode
        );

        let text = if options.use_search {
            self.search_completion(prompt).await?
        } else {
            self.chat_completion(prompt, options.json_mode).await?
        };

        let text = text.trim().to_string();
        let citations = if options.use_search {
            self.extract_citations(&text)
        } else {
            Vec::new()
        };

        Ok(GeneratedContent { text, citations })
    }
}
