use crate::app::AppState;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{Html, IntoResponse};

/// `GET /` demo console. A fixed document parameterized by base URL, gateway
/// key and default model; placeholder substitution avoids escaping every
/// brace in the CSS/JS.
pub async fn console_page(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let host = headers
        .get(axum::http::header::HOST)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("localhost:8080");
    let base_url = format!("http://{host}");
    Html(render_console(
        &base_url,
        &state.runtime.gateway_api_key,
        &state.runtime.default_model,
    ))
}

fn render_console(base_url: &str, api_key: &str, default_model: &str) -> String {
    CONSOLE_TEMPLATE
        .replace("__BASE_URL__", base_url)
        .replace("__API_KEY__", api_key)
        .replace("__DEFAULT_MODEL__", default_model)
}

const CONSOLE_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <title>agentgate console</title>
  <style>
    :root { --bg: #1a1b26; --fg: #c0caf5; --accent: #7aa2f7; --panel: #24283b; --border: #414868; }
    body { font-family: -apple-system, 'Segoe UI', Roboto, sans-serif; background: var(--bg); color: var(--fg); margin: 0; padding: 2rem; line-height: 1.6; }
    .container { max-width: 820px; margin: 0 auto; }
    h1 { color: var(--accent); }
    section { background: var(--panel); border-radius: 8px; padding: 1.25rem; margin-bottom: 1.5rem; }
    pre, code { background: #1f2335; color: #a9b1d6; border-radius: 4px; padding: 0.2em 0.4em; }
    pre { padding: 0.8rem; overflow-x: auto; white-space: pre-wrap; border: 1px solid var(--border); }
    select, textarea { width: 100%; box-sizing: border-box; background: #1f2335; color: var(--fg); border: 1px solid var(--border); border-radius: 4px; padding: 0.6rem; margin-bottom: 0.8rem; }
    button { background: var(--accent); color: var(--bg); border: none; padding: 0.6rem 1.2rem; border-radius: 4px; cursor: pointer; font-weight: bold; }
    button:disabled { background: #565f89; cursor: not-allowed; }
    #result { min-height: 100px; margin-top: 0.8rem; }
  </style>
</head>
<body>
  <div class="container">
    <h1>agentgate</h1>
    <p>An OpenAI-compatible gateway with pseudo-streaming. Point any OpenAI-style client at it.</p>
    <section>
      <h2>Quick start</h2>
      <p><strong>Base URL:</strong> <code>__BASE_URL__/v1</code></p>
      <p><strong>API key:</strong> <code>__API_KEY__</code></p>
      <p><strong>Default model:</strong> <code>__DEFAULT_MODEL__</code> (see <code>GET /v1/models</code> for the full list)</p>
    </section>
    <section>
      <h2>Live tester</h2>
      <select id="model"><option>loading models...</option></select>
      <textarea id="prompt" rows="3" placeholder="Ask something"></textarea>
      <button id="send">Send</button>
      <pre id="result">...</pre>
    </section>
  </div>
  <script>
    const apiKey = '__API_KEY__';
    const modelSelect = document.getElementById('model');
    const promptInput = document.getElementById('prompt');
    const sendButton = document.getElementById('send');
    const resultArea = document.getElementById('result');

    async function loadModels() {
      try {
        const resp = await fetch('/v1/models', { headers: { 'Authorization': 'Bearer ' + apiKey } });
        if (!resp.ok) throw new Error('failed to load models');
        const data = await resp.json();
        modelSelect.innerHTML = '';
        data.data.forEach(m => {
          const opt = document.createElement('option');
          opt.value = m.id;
          opt.textContent = m.id;
          modelSelect.appendChild(opt);
        });
      } catch (err) {
        modelSelect.innerHTML = '<option>' + err.message + '</option>';
        modelSelect.disabled = true;
      }
    }
    loadModels();

    sendButton.addEventListener('click', async () => {
      const prompt = promptInput.value.trim();
      if (!prompt || modelSelect.disabled) return;
      sendButton.disabled = true;
      resultArea.textContent = '';
      let full = '';
      try {
        const resp = await fetch('/v1/chat/completions', {
          method: 'POST',
          headers: { 'Content-Type': 'application/json', 'Authorization': 'Bearer ' + apiKey },
          body: JSON.stringify({ model: modelSelect.value, messages: [{ role: 'user', content: prompt }], stream: true })
        });
        if (!resp.ok) {
          const err = await resp.json();
          throw new Error(err.error.message || 'request failed');
        }
        const reader = resp.body.getReader();
        const decoder = new TextDecoder('utf-8');
        while (true) {
          const { done, value } = await reader.read();
          if (done) break;
          const lines = decoder.decode(value, { stream: true }).split('\n\n');
          for (const line of lines) {
            const data = line.trim();
            if (!data.startsWith('data: ')) continue;
            const payload = data.substring(6).trim();
            if (payload === '[DONE]') break;
            try {
              const chunk = JSON.parse(payload);
              const delta = chunk.choices && chunk.choices[0].delta && chunk.choices[0].delta.content;
              if (delta) { full += delta; resultArea.textContent = full; }
            } catch (err) { /* ignore partial frames */ }
          }
        }
      } catch (err) {
        resultArea.textContent = 'request failed: ' + err.message;
      } finally {
        sendButton.disabled = false;
      }
    });
  </script>
</body>
</html>
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_substitutes_all_placeholders() {
        let page = render_console("http://gw.example", "sk-demo", "Sonar Pro");
        assert!(page.contains("http://gw.example/v1"));
        assert!(page.contains("sk-demo"));
        assert!(page.contains("Sonar Pro"));
        assert!(!page.contains("__BASE_URL__"));
        assert!(!page.contains("__API_KEY__"));
        assert!(!page.contains("__DEFAULT_MODEL__"));
    }
}
