use super::Workspace;
use anyhow::Result;
use ghostwriter_core::completion::CompletionService;
use ghostwriter_core::document::PromptSettings;
use ghostwriter_interaction::OpenAICompletionClient;

/// Completes one paragraph with the default system prompt.
///
/// Failures are printed the same way the editor shows them in the output
/// field, so the command itself only fails on configuration errors.
pub async fn run(workspace: &Workspace, text: &str, instructions: Option<&str>) -> Result<()> {
    let client = OpenAICompletionClient::from_config(
        &workspace.config.completion,
        &workspace.config_service,
    );
    if !client.has_credentials() {
        tracing::warn!("No OpenAI API key configured");
    }

    let prompt = PromptSettings {
        instructions: instructions.unwrap_or_default().to_string(),
        ..PromptSettings::default()
    };

    let output = match client
        .complete(&prompt.system_prompt, &prompt.user_text(text))
        .await
    {
        Ok(text) => text,
        Err(e) => e.to_string(),
    };
    println!("{output}");
    Ok(())
}
