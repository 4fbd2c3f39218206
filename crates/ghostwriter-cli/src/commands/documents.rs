use super::Workspace;
use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use ghostwriter_application::{create_document, export};
use ghostwriter_core::WindowId;
use ghostwriter_core::document::{Document, DocumentMetadata, DocumentRepository};
use std::fs;
use std::path::PathBuf;

pub async fn list(workspace: &Workspace) -> Result<()> {
    let documents = workspace.store.list().await?;
    if documents.is_empty() {
        println!("No documents yet. Create one with `ghostwriter new <name>`.");
        return Ok(());
    }
    print!("{}", format_list(&documents));
    Ok(())
}

pub async fn create(workspace: &Workspace, name: &str) -> Result<()> {
    let document = create_document(&workspace.store, name, &WindowId::generate()).await?;
    println!("{}", document.id());
    Ok(())
}

pub async fn rename(workspace: &Workspace, id: &str, name: &str) -> Result<()> {
    let metadata = workspace
        .store
        .rename(id, name)
        .await
        .with_context(|| format!("Failed to rename document {id}"))?;
    println!("Renamed {} to \"{}\"", metadata.id, metadata.name);
    Ok(())
}

pub async fn delete(workspace: &Workspace, id: &str) -> Result<()> {
    workspace.store.delete(id).await?;
    println!("Deleted {id}");
    Ok(())
}

pub async fn history(workspace: &Workspace, id: &str) -> Result<()> {
    let document = open(workspace, id).await?;
    print!("{}", format_history(&document));
    Ok(())
}

pub async fn export(workspace: &Workspace, id: &str, output: Option<PathBuf>) -> Result<()> {
    let document = open(workspace, id).await?;
    let text = match document.history.current() {
        Some(snapshot) => export::render(snapshot.paragraphs()),
        None => String::new(),
    };

    let path = output.unwrap_or_else(|| PathBuf::from(export::file_name(document.name())));
    fs::write(&path, text).with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Exported \"{}\" to {}", document.name(), path.display());
    Ok(())
}

async fn open(workspace: &Workspace, id: &str) -> Result<Document> {
    workspace
        .store
        .open(id)
        .await
        .with_context(|| format!("Failed to open document {id}"))
}

fn format_timestamp(millis: i64) -> String {
    DateTime::from_timestamp_millis(millis)
        .map(|utc| utc.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn format_list(documents: &[DocumentMetadata]) -> String {
    documents
        .iter()
        .map(|doc| {
            format!(
                "{}  {}  {:>3} versions  {}\n",
                doc.id,
                format_timestamp(doc.updated),
                doc.version_count,
                doc.name
            )
        })
        .collect()
}

fn format_history(document: &Document) -> String {
    let history = &document.history;
    let mut out = format!("{} ({})\n", document.name(), document.id());
    if history.is_empty() {
        out.push_str("  no versions\n");
        return out;
    }

    for (index, snapshot) in history.versions().iter().enumerate() {
        let cursor = if history.current_index() == Some(index) { '*' } else { ' ' };
        let kind = if snapshot.is_auto_save() { "auto" } else { "save" };
        out.push_str(&format!(
            "{cursor} {index:>3}  {}  {kind}  {} paragraphs",
            format_timestamp(snapshot.timestamp()),
            snapshot.paragraphs().len(),
        ));
        if !snapshot.editor_window().is_unknown() {
            out.push_str(&format!("  {}", snapshot.editor_window()));
        }
        out.push('\n');
    }
    out
}
