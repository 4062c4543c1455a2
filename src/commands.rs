//! Subcommand bodies. Each prints one pretty JSON document to stdout.

use codelens_core::bootstrap::Components;
use codelens_core::project::ProjectSnapshot;
use codelens_index::heuristics;
use serde::Serialize;

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub(crate) fn files(snapshot: &ProjectSnapshot) -> anyhow::Result<()> {
    print_json(&snapshot.files.paths())
}

pub(crate) fn deps(snapshot: &ProjectSnapshot) -> anyhow::Result<()> {
    print_json(&snapshot.graph)
}

pub(crate) async fn index(
    components: &Components,
    snapshot: &ProjectSnapshot,
    path: Option<&str>,
) -> anyhow::Result<()> {
    let indexer = components.indexer();
    match path {
        Some(path) => {
            let outcome = indexer
                .embed_path(&snapshot.id, &snapshot.files, path)
                .await?;
            print_json(&outcome)
        }
        None => {
            let report = indexer.index_project(&snapshot.id, &snapshot.files).await?;
            print_json(&report)
        }
    }
}

pub(crate) async fn ask(
    components: &Components,
    snapshot: &ProjectSnapshot,
    query: &str,
    k: usize,
    anchor: Option<&str>,
) -> anyhow::Result<()> {
    let hits = components
        .retriever()
        .retrieve(&snapshot.id, &snapshot.files, &snapshot.graph, query, k, anchor)
        .await;
    print_json(&hits)
}

pub(crate) async fn scan(snapshot: &ProjectSnapshot) -> anyhow::Result<()> {
    let files = snapshot.files.clone();
    let symbols = tokio::task::spawn_blocking(move || heuristics::scan(&files)).await?;
    print_json(&symbols)
}

pub(crate) async fn review_file(
    components: &Components,
    snapshot: &ProjectSnapshot,
    query: &str,
    k: usize,
    anchor: Option<&str>,
) -> anyhow::Result<()> {
    let review = components
        .reviewer()
        .review_file(snapshot, query, k, anchor)
        .await;
    print_json(&review)
}

pub(crate) async fn review_repo(
    components: &Components,
    snapshot: &ProjectSnapshot,
    query: &str,
    k: usize,
) -> anyhow::Result<()> {
    let review = components.reviewer().review_repo(snapshot, query, k).await;
    print_json(&review)
}
