use anyhow::{Context, Result, anyhow};
use tokio::process::Command;
use tracing::{debug, info, warn};

const URL_PLACEHOLDER: &str = "{url}";

/// Runs a shell command template with `{url}` replaced by a quoted URL.
///
/// Without a template the URL is only logged.
#[derive(Debug, Clone, Default)]
pub struct TrailerOpener {
    template: Option<String>,
}

impl TrailerOpener {
    pub fn new(template: Option<String>) -> Self {
        Self { template }
    }

    pub fn render(&self, url: &str) -> Option<String> {
        let template = self.template.as_deref()?;
        let quoted = shell_quote(url);
        Some(if template.contains(URL_PLACEHOLDER) {
            template.replace(URL_PLACEHOLDER, &quoted)
        } else {
            format!("{template} {quoted}")
        })
    }

    /// Launch the opener in the background.
    pub fn open(&self, url: &str) {
        let Some(command) = self.render(url) else {
            info!(%url, "trailer available; no opener configured");
            return;
        };
        debug!(%command, "opening trailer");
        tokio::spawn(async move {
            if let Err(err) = run_command(&command).await {
                warn!(error = %err, "trailer opener failed");
            }
        });
    }
}

async fn run_command(command: &str) -> Result<()> {
    let status = Command::new("sh")
        .arg("-c")
        .arg(command)
        .status()
        .await
        .with_context(|| format!("failed to spawn shell for command: {command}"))?;

    if status.success() {
        Ok(())
    } else {
        Err(anyhow!(
            "command exited with status {}: {command}",
            status.code().unwrap_or(-1)
        ))
    }
}

fn shell_quote(raw: &str) -> String {
    format!("'{}'", raw.replace('\'', r"'\''"))
}
