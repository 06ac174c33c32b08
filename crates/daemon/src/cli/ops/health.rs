use clap::Args;

use burrow_daemon::state::AppState;

#[derive(Args, Debug, Clone)]
pub struct Health;

#[derive(Debug, thiserror::Error)]
pub enum HealthError {
    #[error("Health check failed: {0}")]
    Failed(#[from] reqwest::Error),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Health {
    type Error = HealthError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let mut lines = Vec::new();

        lines.push("Config:".to_string());
        match AppState::load(ctx.config_path.clone()) {
            Ok(state) => {
                lines.push(format!("  directory:    {}", state.burrow_dir.display()));
                lines.push("  config.toml:  OK".to_string());
                let db = if state.db_path.exists() { "OK" } else { "not created yet" };
                lines.push(format!("  db.sqlite:    {}", db));
                match &state.config.root {
                    Some(root) => lines.push(format!("  root:         {}", root.display())),
                    None => lines.push("  root:         not set".to_string()),
                }
                lines.push(format!("  port:         {}", state.config.port));
                lines.push(format!("  auth:         {}", state.config.auth));
            }
            Err(e) => {
                lines.push(format!("  error: {}", e));
            }
        }

        let client = reqwest::Client::builder().build()?;
        let base = ctx.remote.as_str().trim_end_matches('/');

        lines.push(String::new());
        lines.push(format!("Daemon ({}):", base));

        for probe in ["livez", "readyz"] {
            let url = format!("{}/_status/{}", base, probe);
            let status = match client.get(&url).send().await {
                Ok(resp) if resp.status().is_success() => "OK".to_string(),
                Ok(resp) => format!("UNHEALTHY ({})", resp.status()),
                Err(_) => "NOT REACHABLE".to_string(),
            };
            lines.push(format!("  {}:{}{}", probe, " ".repeat(8 - probe.len()), status));
        }

        Ok(lines.join("\n"))
    }
}
