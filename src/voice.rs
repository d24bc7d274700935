//! Embedding the third-party voice-call widget.
//!
//! The widget is opaque: it is loaded from its CDN and run with two
//! credentials. The page reacts to its call start and end events itself.

use serde_json::Value;

use crate::core::models::{PayloadView, VapiConfig};

pub const WIDGET_SCRIPT_URL: &str =
    "https://cdn.jsdelivr.net/gh/VapiAI/html-script-tag@latest/dist/assets/index.js";

/// The two credentials the widget needs.
#[derive(Debug, Clone, PartialEq)]
pub struct WidgetCredentials {
    pub public_key: String,
    pub assistant_id: String,
}

impl WidgetCredentials {
    /// Pull both credentials out of a `/v1/vapi/config` response.
    pub fn from_payload(payload: &Value) -> Option<Self> {
        let config = VapiConfig::from_payload(payload);
        let public_key = config.public_key.filter(|k| !k.trim().is_empty())?;
        let assistant_id = config.assistant_id.filter(|a| !a.trim().is_empty())?;
        Some(Self {
            public_key,
            assistant_id,
        })
    }
}

/// A JSON string literal that is also safe inside `<script>`.
fn script_literal(s: &str) -> String {
    Value::String(s.to_string())
        .to_string()
        .replace('<', "\\u003c")
        .replace('>', "\\u003e")
        .replace('&', "\\u0026")
}

/// A standalone page that opens the voice widget.
pub fn widget_page(credentials: &WidgetCredentials) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>WeightPilot voice coach</title>
</head>
<body>
<p id="call-status">Ready to call</p>
<script>
  var apiKey = {api_key};
  var assistant = {assistant};
  (function (d, t) {{
    var g = document.createElement(t),
      s = d.getElementsByTagName(t)[0];
    g.src = "{script_url}";
    g.defer = true;
    g.async = true;
    s.parentNode.insertBefore(g, s);
    g.onload = function () {{
      var vapi = window.vapiSDK.run({{ apiKey: apiKey, assistant: assistant }});
      var status = document.getElementById("call-status");
      vapi.on("call-start", function () {{ status.textContent = "Call in progress"; }});
      vapi.on("call-end", function () {{ status.textContent = "Call ended"; }});
    }};
  }})(document, "script");
</script>
</body>
</html>
"#,
        api_key = script_literal(&credentials.public_key),
        assistant = script_literal(&credentials.assistant_id),
        script_url = WIDGET_SCRIPT_URL,
    )
}
