use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_MODEL: &str = "ai-search-proxy";
pub const NO_ANSWER_TEXT: &str = "Keine Antwort erhalten. Bitte versuchen Sie es später erneut.";

// Chat request as sent by the site
#[derive(Deserialize, Default, Debug)]
#[serde(rename_all = "camelCase", default)]
pub struct ChatRequest {
    pub prompt: Option<String>,
    pub message: Option<String>,
    pub system_instruction: Option<String>,
}

impl ChatRequest {
    /// `prompt` wins over `message`; blank values count as missing.
    pub fn prompt(&self) -> Option<&str> {
        [&self.prompt, &self.message]
            .into_iter()
            .flatten()
            .map(|s| s.trim())
            .find(|s| !s.is_empty())
    }

    pub fn system_instruction(&self) -> Option<&str> {
        self.system_instruction
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

// Body forwarded to the AI upstream
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamChatRequest<'a> {
    pub prompt: &'a str,
    pub message: &'a str,
    pub system_instruction: &'a str,
    pub rag_id: &'a str,
    pub max_results: u32,
    pub gateway_id: &'a str,
}

// Normalized reply returned to the site
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ChatReply {
    pub text: String,
    pub model: String,
}

impl ChatReply {
    /// Upstreams disagree on where the answer lives; take the first
    /// non-empty candidate.
    pub fn from_upstream(data: &Value) -> Self {
        let text = match data {
            Value::String(s) => Some(s.clone()),
            _ => first_text(
                data,
                &[&["text"], &["response"], &["answer"], &["data", "text"], &["data", "response"]],
            ),
        };

        let text = text
            .or_else(|| {
                data.get("error")
                    .and_then(Value::as_str)
                    .map(|e| format!("Fehler: {e}"))
            })
            .unwrap_or_else(|| NO_ANSWER_TEXT.to_string());

        let model = data
            .get("model")
            .and_then(Value::as_str)
            .filter(|m| !m.is_empty())
            .unwrap_or(DEFAULT_MODEL)
            .to_string();

        Self { text, model }
    }
}

pub const DEFAULT_CATEGORY: &str = "Seite";
const DESCRIPTION_CHARS: usize = 200;

// Site search request
#[derive(Deserialize, Default, Debug)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchRequest {
    pub query: Option<String>,
    pub top_k: Option<Value>,
}

impl SearchRequest {
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref().filter(|q| !q.is_empty())
    }

    /// `topK` given as a number or a numeric string. Zero counts as unset.
    pub fn top_k(&self) -> Option<u32> {
        let n = match self.top_k.as_ref()? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }?;
        u32::try_from(n).ok().filter(|n| *n > 0)
    }
}

// Body forwarded to the AI Search API
#[derive(Serialize, Debug)]
pub struct UpstreamSearchRequest<'a> {
    pub query: &'a str,
    pub max_num_results: u32,
    pub rewrite_query: bool,
    pub stream: bool,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub url: String,
    pub title: String,
    pub category: String,
    pub description: String,
    pub score: f64,
}

impl SearchHit {
    /// Builds a hit from one `result.data[]` item. Site paths come from the
    /// indexed file name, e.g. `pages/blog/react.html` -> `/blog/react`.
    pub fn from_item(item: &Value) -> Self {
        let filename = item
            .get("filename")
            .and_then(Value::as_str)
            .filter(|f| !f.is_empty());

        let path = filename.unwrap_or("/");
        let path = path.strip_prefix("pages").unwrap_or(path);
        let path = path.strip_suffix(".html").unwrap_or(path);
        let path = path.strip_suffix("/index").unwrap_or(path);
        let url = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        };

        let title = filename
            .and_then(|f| f.rsplit('/').next())
            .map(|name| name.replacen(".html", "", 1))
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| DEFAULT_CATEGORY.to_string());

        let description = item
            .get("content")
            .and_then(Value::as_array)
            .map(|parts| {
                parts
                    .iter()
                    .filter_map(|part| part.get("text").and_then(Value::as_str))
                    .collect::<Vec<_>>()
                    .join(" ")
                    .chars()
                    .take(DESCRIPTION_CHARS)
                    .collect()
            })
            .unwrap_or_default();

        Self {
            url,
            title,
            category: DEFAULT_CATEGORY.to_string(),
            description,
            score: item.get("score").and_then(Value::as_f64).unwrap_or(0.0),
        }
    }
}

// Search reply returned to the site
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct SearchResults {
    pub results: Vec<SearchHit>,
    pub summary: String,
    pub count: usize,
    pub query: String,
}

impl SearchResults {
    /// Reshapes `{ result: { data: [...], response } }`.
    pub fn from_upstream(query: &str, data: &Value) -> Self {
        let result = data.get("result");
        let results: Vec<SearchHit> = result
            .and_then(|r| r.get("data"))
            .and_then(Value::as_array)
            .map(|items| items.iter().map(SearchHit::from_item).collect())
            .unwrap_or_default();

        let summary = result
            .and_then(|r| r.get("response"))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("Suchergebnisse für \"{query}\""));

        Self {
            count: results.len(),
            results,
            summary,
            query: query.to_string(),
        }
    }
}

fn first_text(data: &Value, paths: &[&[&str]]) -> Option<String> {
    paths.iter().find_map(|path| {
        path.iter()
            .try_fold(data, |v, key| v.get(*key))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn prompt_falls_back_to_message() {
        let req: ChatRequest = serde_json::from_value(json!({"message": "hi"})).unwrap();
        assert_eq!(req.prompt(), Some("hi"));

        let req: ChatRequest = serde_json::from_value(json!({"prompt": "  ", "message": "m"})).unwrap();
        assert_eq!(req.prompt(), Some("m"));

        let req: ChatRequest = serde_json::from_value(json!({"systemInstruction": "x"})).unwrap();
        assert_eq!(req.prompt(), None);
        assert_eq!(req.system_instruction(), Some("x"));
    }

    #[test]
    fn reply_text_candidates_in_order() {
        assert_eq!(ChatReply::from_upstream(&json!({"text": "a", "response": "b"})).text, "a");
        assert_eq!(ChatReply::from_upstream(&json!({"text": "", "answer": "c"})).text, "c");
        assert_eq!(ChatReply::from_upstream(&json!({"data": {"response": "d"}})).text, "d");
        assert_eq!(ChatReply::from_upstream(&json!("plain")).text, "plain");
    }

    #[test]
    fn reply_falls_back_to_error_then_apology() {
        let reply = ChatReply::from_upstream(&json!({"error": "quota"}));
        assert_eq!(reply.text, "Fehler: quota");
        assert_eq!(reply.model, DEFAULT_MODEL);

        let reply = ChatReply::from_upstream(&json!({"model": "llama"}));
        assert_eq!(reply.text, NO_ANSWER_TEXT);
        assert_eq!(reply.model, "llama");
    }

    #[test]
    fn upstream_chat_request_carries_retrieval_settings() {
        let body = serde_json::to_value(UpstreamChatRequest {
            prompt: "p",
            message: "p",
            system_instruction: "s",
            rag_id: "suche",
            max_results: 10,
            gateway_id: "default",
        })
        .unwrap();
        assert_eq!(body["ragId"], "suche");
        assert_eq!(body["maxResults"], 10);
        assert_eq!(body["gatewayId"], "default");
        assert_eq!(body["systemInstruction"], "s");
    }

    #[test]
    fn top_k_accepts_numbers_and_numeric_strings() {
        let req: SearchRequest = serde_json::from_value(json!({"query": "q", "topK": 3})).unwrap();
        assert_eq!(req.top_k(), Some(3));

        let req: SearchRequest = serde_json::from_value(json!({"query": "q", "topK": "7"})).unwrap();
        assert_eq!(req.top_k(), Some(7));

        let req: SearchRequest = serde_json::from_value(json!({"query": "q", "topK": 0})).unwrap();
        assert_eq!(req.top_k(), None);

        let req: SearchRequest = serde_json::from_value(json!({"query": ""})).unwrap();
        assert_eq!(req.query(), None);
    }

    #[test]
    fn hit_paths_come_from_filenames() {
        let url = |f: &str| SearchHit::from_item(&json!({ "filename": f })).url;
        assert_eq!(url("pages/blog/react.html"), "/blog/react");
        assert_eq!(url("pages/about/index.html"), "/about");
        assert_eq!(url("projekte.html"), "/projekte");
        assert_eq!(url(""), "/");
        assert_eq!(SearchHit::from_item(&json!({})).url, "/");
    }

    #[test]
    fn hit_fields_have_fallbacks() {
        let hit = SearchHit::from_item(&json!({
            "filename": "pages/blog/react.html",
            "content": [{"text": "Hooks"}, {"type": "image"}, {"text": "und State"}],
            "score": 0.8,
        }));
        assert_eq!(hit.title, "react");
        assert_eq!(hit.category, DEFAULT_CATEGORY);
        assert_eq!(hit.description, "Hooks und State");
        assert_eq!(hit.score, 0.8);

        let hit = SearchHit::from_item(&json!({"content": [{"text": "x".repeat(500)}]}));
        assert_eq!(hit.title, DEFAULT_CATEGORY);
        assert_eq!(hit.description.chars().count(), 200);
        assert_eq!(hit.score, 0.0);
    }

    #[test]
    fn search_summary_falls_back_to_query() {
        let results = SearchResults::from_upstream("rust", &json!({"success": true, "result": {"data": []}}));
        assert_eq!(results.summary, "Suchergebnisse für \"rust\"");
        assert_eq!(results.count, 0);

        let results = SearchResults::from_upstream(
            "rust",
            &json!({"result": {"data": [{"filename": "a.html"}], "response": "Gefunden"}}),
        );
        assert_eq!(results.summary, "Gefunden");
        assert_eq!(results.count, 1);
        assert_eq!(results.query, "rust");
    }
}
