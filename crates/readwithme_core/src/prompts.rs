//! crates/readwithme_core/src/prompts.rs
//!
//! Prompt templates sent to the generation service. Placeholders in braces are
//! substituted with `str::replace`.

pub const SYSTEM_INSTRUCTION: &str = r#"You are ReadWithMe, an AI-powered reading companion.
Your role is to help users discover books, provide insightful analysis, and enhance their reading experience.
Always use web search to verify book information and provide accurate, up-to-date recommendations."#;

pub const TRANSLATOR_INSTRUCTION: &str =
    "You are a professional translator. Translate accurately while preserving formatting.";

const TOPIC_TEMPLATE: &str = r#"Recommend 5 highly-rated books about "{topic}".
IMPORTANT: Prioritize the MOST RECENT publications (from the last 2-3 years if available). Sort these books by publication date in DESCENDING order (newest/most recent books first).

For each book, provide:
- Title
- Author
- Publication year (in YYYY format)
- Brief description (2-3 sentences)

CRITICAL FORMATTING INSTRUCTION:
Format each book entry exactly like this:
### Title by Author | Year
Description

Use web search to find the most recent, highly-rated books and ensure the published dates are accurate."#;

const SEARCH_TEMPLATE: &str = r#"I am looking for the specific book: "{query}".

Please find this exact book and provide:
- Title (exact title of the book)
- Author (full author name)
- Publication year (in YYYY format)
- Brief description (2-3 sentences about this specific book)

CRITICAL FORMATTING INSTRUCTION:
Format the book entry exactly like this:
### Title by Author | Year
Description

Use web search to find the exact book titled "{query}" and verify all details are accurate.
If you cannot find this exact book, find the closest match and explain in the description."#;

const GUIDE_TEMPLATE: &str = r#"I want to read and understand the book "{title}" by "{author}".

Please provide a comprehensive "Read With Me" guide that includes:
1. A detailed synopsis of the book's core argument or plot
2. Key themes and main ideas
3. Important takeaways
4. Discussion questions for reflection

Format your response with clear sections using:
## for main section headings
### for subsections
**text** for emphasis

Use web search to ensure accuracy."#;

const TRANSLATION_TEMPLATE: &str = r#"Translate the following book reading guide to {language}.
Preserve all markdown formatting (##, ###, **, bullet points).
Maintain the same structure and sections.
Only translate the text content, keep the markdown syntax intact.

Content to translate:
{content}"#;

const QUIZ_TEMPLATE: &str = r#"Create a 5-question multiple choice quiz about the book "{title}" by "{author}".

For each question, provide:
- question: The question text
- options: Array of exactly 4 answer options
- answer: Index (0-3) of the correct option
- explanation: Brief explanation of why the answer is correct

Return ONLY a valid JSON array with no markdown formatting.

Example format:
[
  {
    "question": "What is the main theme?",
    "options": ["Option A", "Option B", "Option C", "Option D"],
    "answer": 0,
    "explanation": "The main theme is..."
  }
]"#;

pub fn topic_prompt(topic: &str) -> String {
    TOPIC_TEMPLATE.replace("{topic}", topic)
}

pub fn search_prompt(query: &str) -> String {
    SEARCH_TEMPLATE.replace("{query}", query)
}

pub fn guide_prompt(title: &str, author: &str) -> String {
    GUIDE_TEMPLATE.replace("{title}", title).replace("{author}", author)
}

/// `language` is the display name ("Hindi"), not the code.
pub fn translation_prompt(content: &str, language: &str) -> String {
    // Content last so braces inside the guide are never treated as placeholders.
    format!(
        "{}\n\n{}",
        TRANSLATOR_INSTRUCTION,
        TRANSLATION_TEMPLATE.replace("{language}", language)
    )
    .replace("{content}", content)
}

pub fn quiz_prompt(title: &str, author: &str) -> String {
    QUIZ_TEMPLATE.replace("{title}", title).replace("{author}", author)
}
