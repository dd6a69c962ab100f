//! HTML rendering for the single launcher page.

use crate::invoker::InvocationResult;
use crate::preflight::ValidationReport;

/// Everything the page shows.
#[derive(Debug, Default)]
pub struct PageView<'a> {
    pub status: Option<&'a ValidationReport>,
    /// Prompt echoed back into the textarea.
    pub prompt: &'a str,
    pub result: Option<&'a InvocationResult>,
}

/// Escape text for use in element content and double-quoted attributes.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            c => escaped.push(c),
        }
    }
    escaped
}

const STYLE: &str = r#"
    :root { --bg: #f5f7fb; --card: #ffffff; --ink: #121826; --muted: #4a5160; --accent: #0b5fff; --line: #d9dfeb; }
    body { margin: 0; font-family: "Segoe UI", Tahoma, sans-serif; background: var(--bg); color: var(--ink); }
    .wrap { max-width: 980px; margin: 24px auto; padding: 0 16px; }
    .card { background: var(--card); border: 1px solid var(--line); border-radius: 12px; padding: 18px; box-shadow: 0 8px 22px rgba(18,24,38,.06); }
    h1 { margin: 0 0 12px; font-size: 1.5rem; }
    h2 { margin: 18px 0 10px; font-size: 1.1rem; }
    p { margin: 8px 0; color: var(--muted); }
    .status { border-radius: 10px; padding: 10px 12px; margin: 10px 0 16px; }
    .status.ok { background: #eaf7ef; color: #0a7d33; border: 1px solid #0a7d3333; }
    .status.pending { background: #ffeef1; color: #a30f2d; border: 1px solid #a30f2d33; }
    textarea { width: 100%; min-height: 120px; border: 1px solid var(--line); border-radius: 10px; padding: 10px; font-size: 0.95rem; box-sizing: border-box; }
    button { margin-top: 10px; background: var(--accent); color: #fff; border: none; border-radius: 9px; padding: 10px 14px; font-weight: 600; cursor: pointer; }
    pre { white-space: pre-wrap; word-wrap: break-word; background: #0e1422; color: #e7ebf5; border-radius: 10px; padding: 12px; max-height: 420px; overflow: auto; }
    code { background: #eef2ff; padding: 2px 5px; border-radius: 4px; }
"#;

pub fn render_page(view: &PageView<'_>) -> String {
    let status_block = match view.status {
        Some(report) => {
            let (class, title) = if report.ok {
                ("ok", "Ready")
            } else {
                ("pending", "Configuration pending")
            };
            format!(
                r#"<div class="status {class}"><strong>{title}:</strong> {}</div>"#,
                escape_html(&report.message)
            )
        }
        None => String::new(),
    };

    let result_block = match view.result {
        Some(result) => format!(
            r#"
      <h2>Result</h2>
      <p><strong>Exit code:</strong> {}</p>
      <pre>{}</pre>"#,
            result.exit_code,
            escape_html(&result.output)
        ),
        None => String::new(),
    };

    format!(
        r#"<!doctype html>
<html lang="en">
<head>
  <meta charset="utf-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1" />
  <title>agentdock</title>
  <style>{STYLE}</style>
</head>
<body>
  <div class="wrap">
    <div class="card">
      <h1>agentdock</h1>
      <p>Runs the agent once per task with <code>--prompt</code> and shows its output when it finishes.</p>
      {status_block}
      <form method="post">
        <label for="prompt"><strong>Prompt</strong></label>
        <textarea id="prompt" name="prompt" placeholder="Describe the task for the agent...">{prompt}</textarea>
        <br />
        <button type="submit">Run agent</button>
      </form>{result_block}
    </div>
  </div>
</body>
</html>
"#,
        prompt = escape_html(view.prompt),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_markup_characters() {
        assert_eq!(
            escape_html(r#"<script>alert("x" & 'y')</script>"#),
            "&lt;script&gt;alert(&quot;x&quot; &amp; &#x27;y&#x27;)&lt;/script&gt;"
        );
        assert_eq!(escape_html("plain text"), "plain text");
    }

    #[test]
    fn empty_view_has_form_and_no_result() {
        let page = render_page(&PageView::default());
        assert!(page.contains(r#"<form method="post">"#));
        assert!(page.contains(r#"name="prompt""#));
        assert!(!page.contains("Exit code"));
        assert!(!page.contains(r#"class="status"#));
    }

    #[test]
    fn status_banner_reflects_report() {
        let ok = ValidationReport {
            ok: true,
            message: "configuration valid".to_string(),
        };
        let page = render_page(&PageView {
            status: Some(&ok),
            ..Default::default()
        });
        assert!(page.contains(r#"<div class="status ok"><strong>Ready:</strong> configuration valid</div>"#));

        let pending = ValidationReport {
            ok: false,
            message: "parse error: <bad>".to_string(),
        };
        let page = render_page(&PageView {
            status: Some(&pending),
            ..Default::default()
        });
        assert!(page.contains("Configuration pending:</strong> parse error: &lt;bad&gt;"));
    }

    #[test]
    fn result_and_prompt_are_escaped() {
        let result = InvocationResult {
            exit_code: 3,
            output: "<b>boom</b>".to_string(),
        };
        let page = render_page(&PageView {
            status: None,
            prompt: "</textarea><script>",
            result: Some(&result),
        });
        assert!(page.contains("<strong>Exit code:</strong> 3</p>"));
        assert!(page.contains("<pre>&lt;b&gt;boom&lt;/b&gt;</pre>"));
        assert!(page.contains("&lt;/textarea&gt;&lt;script&gt;</textarea>"));
        assert!(!page.contains("<b>boom</b>"));
    }
}
