//! Stdout sink, primarily for local development and demos.

use async_trait::async_trait;
use serde_json::Value;

use super::ChannelSink;
use crate::template::render_template;

#[derive(Debug)]
pub struct StdoutSink {
    name: String,
    format: String, // "json" or "text"
    pretty: bool,
    template: Option<String>, // for text output
}

impl StdoutSink {
    pub fn new(
        name: impl Into<String>,
        format: &str,
        pretty: bool,
        template: Option<String>,
    ) -> Result<Self, anyhow::Error> {
        let format = format.to_lowercase();
        if format != "json" && format != "text" {
            return Err(anyhow::anyhow!(
                "Invalid format for stdout sink: {}. Must be 'json' or 'text'",
                format
            ));
        }

        Ok(Self {
            name: name.into(),
            format,
            pretty,
            template,
        })
    }

    pub fn json() -> Self {
        Self {
            name: "stdout".to_string(),
            format: "json".to_string(),
            pretty: false,
            template: None,
        }
    }
}

#[async_trait]
impl ChannelSink for StdoutSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn publish(&self, target: &str, payload: &Value) -> Result<(), anyhow::Error> {
        match self.format.as_str() {
            "json" => {
                let envelope = serde_json::json!({ "target": target, "payload": payload });
                let line = if self.pretty {
                    serde_json::to_string_pretty(&envelope)?
                } else {
                    serde_json::to_string(&envelope)?
                };
                println!("{}", line);
            }
            "text" => {
                if let Some(template) = &self.template {
                    let rendered = render_template(template, payload)
                        .map_err(|e| anyhow::anyhow!("stdout sink template: {}", e))?;
                    println!("[{}] {}", target, rendered);
                } else {
                    println!("[{}] {}", target, payload);
                }
            }
            _ => unreachable!("format validated in constructor"),
        }
        Ok(())
    }
}
