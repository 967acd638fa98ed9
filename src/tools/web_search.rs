//! Web search through the Serper API.

use super::{parse_args, Tool, ToolOutput};
use crate::config::SearchSettings;
use crate::context::TurnContext;
use crate::error::{Result, VidyaError};
use crate::llm::ToolSpec;
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, instrument, warn};
use url::Url;

/// Searches the web and returns the cleaned text of each result page.
pub struct WebSearchTool {
    http: reqwest::Client,
    serper_url: String,
    max_page_chars: usize,
    hidden_regex: Regex,
    block_regex: Regex,
    tag_regex: Regex,
}

#[derive(Deserialize)]
struct SearchArgs {
    query: String,
}

#[derive(Deserialize)]
struct SerperResponse {
    #[serde(default)]
    organic: Vec<OrganicResult>,
}

#[derive(Deserialize)]
struct OrganicResult {
    #[serde(default)]
    title: String,
    link: String,
}

#[derive(Debug, Serialize)]
struct PageContent {
    title: String,
    url: String,
    full_content: String,
}

impl WebSearchTool {
    pub fn from_settings(settings: &SearchSettings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.page_timeout_secs))
            .build()?;

        Ok(Self {
            http,
            serper_url: settings.serper_url.clone(),
            max_page_chars: settings.max_page_chars,
            hidden_regex: Regex::new(r"(?is)<script\b.*?</script>|<style\b.*?</style>|<!--.*?-->")
                .expect("Invalid regex"),
            block_regex: Regex::new(
                r"(?i)</?(?:p|div|br|h[1-6]|li|tr|title|section|article|header|footer|ul|ol|table)\b[^>]*>",
            )
            .expect("Invalid regex"),
            tag_regex: Regex::new(r"(?s)<[^>]*>").expect("Invalid regex"),
        })
    }

    /// Reduce an HTML document to cleaned visible text.
    fn html_to_text(&self, html: &str) -> String {
        let visible = self.hidden_regex.replace_all(html, "");
        let block_breaks = self.block_regex.replace_all(&visible, "\n");
        let text = self.tag_regex.replace_all(&block_breaks, "");
        clean_text(&decode_entities(&text))
    }

    async fn serper_search(&self, query: &str) -> Result<Vec<OrganicResult>> {
        let api_key = std::env::var("SERPER_API_KEY")
            .map_err(|_| VidyaError::Config("SERPER_API_KEY is not set".to_string()))?;

        let response = self
            .http
            .post(&self.serper_url)
            .header("X-API-KEY", api_key)
            .json(&json!({ "q": query }))
            .send()
            .await?
            .error_for_status()?;

        let body: SerperResponse = response.json().await?;
        Ok(body.organic)
    }

    async fn fetch_page(&self, link: &str) -> Result<String> {
        let url = Url::parse(link)
            .map_err(|e| VidyaError::InvalidInput(format!("Invalid URL {}: {}", link, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(VidyaError::InvalidInput(format!("Unsupported URL scheme: {}", link)));
        }

        let html = self.http.get(url).send().await?.text().await?;
        Ok(self.html_to_text(&html))
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "get_web_search_result".to_string(),
            description: "Search the web and retrieve the full content of the result pages. Use \
                this for current information that may not be in your training data, such as \
                recent news, current policies, statistics, or the latest circulars. Write the \
                query in English and be specific."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Search query, in English"
                    }
                },
                "required": ["query"]
            }),
        }
    }

    fn usage_notice(&self) -> String {
        "Searching the Web for information".to_string()
    }

    #[instrument(skip(self, arguments, _ctx))]
    async fn call(&self, arguments: &Value, _ctx: &TurnContext) -> Result<ToolOutput> {
        let args: SearchArgs = parse_args("get_web_search_result", arguments)?;
        let results = self.serper_search(&args.query).await?;
        debug!("Serper returned {} organic results", results.len());

        let mut pages = Vec::with_capacity(results.len());
        for result in results {
            match self.fetch_page(&result.link).await {
                Ok(text) => pages.push(PageContent {
                    title: result.title,
                    url: result.link,
                    full_content: text.chars().take(self.max_page_chars).collect(),
                }),
                Err(e) => warn!("Skipping {}: {}", result.link, e),
            }
        }

        Ok(ToolOutput::text(serde_json::to_string(&pages)?))
    }
}

/// Collapse runs of whitespace within lines and drop blank lines.
pub fn clean_text(text: &str) -> String {
    text.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_text() {
        let raw = "  SEBI   circular \n\n\n\t  dated   2024 \n   \n end ";
        assert_eq!(clean_text(raw), "SEBI circular\ndated 2024\nend");
    }

    #[test]
    fn test_html_to_text() {
        let tool = WebSearchTool::from_settings(&SearchSettings::default()).unwrap();
        let html = r#"<html><head><title>T</title><style>p { color: red; }</style>
            <script type="text/javascript">var x = "<p>no</p>";</script></head>
            <body><!-- hidden --><h1>Mutual   Funds</h1><p>NAV &amp; AUM</p>
            <div>Exit&nbsp;load<br>applies</div></body></html>"#;
        assert_eq!(tool.html_to_text(html), "T\nMutual Funds\nNAV & AUM\nExit load\napplies");
    }

    #[tokio::test]
    async fn test_rejects_non_http_links() {
        let tool = WebSearchTool::from_settings(&SearchSettings::default()).unwrap();
        assert!(tool.fetch_page("ftp://example.com/file").await.is_err());
        assert!(tool.fetch_page("not a url").await.is_err());
    }
}
