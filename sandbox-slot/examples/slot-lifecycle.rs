use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use sandbox::{ContainerData, SandboxData, Sandboxer};
use sandbox_slot::resource::annotations;
use sandbox_slot::{SlotConfig, SlotSandboxer};
use tracing_subscriber::fmt::time::FormatTime;
use uuid::Uuid;

struct Elapsed(Instant);

impl FormatTime for Elapsed {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> fmt::Result {
        let d = self.0.elapsed();
        let total_secs = d.as_secs();
        let mins = total_secs / 60;
        let secs = total_secs % 60;
        let millis = d.subsec_millis();
        write!(w, "[{mins:02}:{secs:02}:{millis:03}]")
    }
}

/// Drive one sandbox through its whole lifecycle and leave the artifacts
/// behind for inspection.
#[derive(Parser)]
#[command(name = "slot-lifecycle")]
struct Cli {
    /// YAML config file; `--base-dir` overrides its base directory
    #[arg(long)]
    config: Option<PathBuf>,
    /// Directory the artifacts are written to
    #[arg(long)]
    base_dir: Option<PathBuf>,
    /// Sandbox id (random if omitted)
    #[arg(long)]
    id: Option<String>,
    /// CPU limit in cores
    #[arg(long)]
    cpu: Option<f64>,
    /// Memory limit in bytes
    #[arg(long)]
    memory: Option<u64>,
    /// Number of containers to run inside the sandbox
    #[arg(long, default_value_t = 1)]
    containers: u32,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_timer(Elapsed(Instant::now()))
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("error: {e}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => sandbox_slot::config::load(path).await?,
        None => SlotConfig::default(),
    };
    if let Some(base_dir) = cli.base_dir {
        config.base_dir = base_dir;
    }
    // Keep the artifacts around for the caller to look at.
    config.cleanup_on_delete = false;

    let sandboxer = SlotSandboxer::new(&config);
    let id = cli.id.unwrap_or_else(|| Uuid::new_v4().to_string());

    let mut sandbox_annotations = HashMap::new();
    if let Some(cpu) = cli.cpu {
        sandbox_annotations.insert(annotations::CPU_LIMIT.to_owned(), cpu.to_string());
    }
    if let Some(memory) = cli.memory {
        sandbox_annotations.insert(annotations::MEMORY_LIMIT.to_owned(), memory.to_string());
    }

    let handle = sandboxer
        .create(
            &id,
            SandboxData {
                id: id.clone(),
                annotations: sandbox_annotations,
                ..SandboxData::default()
            },
        )
        .await?;
    sandboxer.start(&id).await?;

    let cids: Vec<String> = (0..cli.containers).map(|i| format!("c{i}")).collect();
    for cid in &cids {
        let data = ContainerData {
            id: cid.clone(),
            sandbox_id: id.clone(),
            ..ContainerData::default()
        };
        sandboxer.append_container(&id, cid, data).await?;
        sandboxer.start_container(&id, cid).await?;
    }

    let status = sandboxer.status(&id).await?;
    println!("{}", serde_json::to_string_pretty(&status)?);

    for cid in &cids {
        sandboxer.stop_container(&id, cid).await?;
    }
    sandboxer.stop(&id, false).await?;
    sandboxer.delete(&id, false).await?;

    let profile = *handle.read().await.resource_profile();
    println!("cpu_limit:    {:?}", profile.cpu_limit_cores());
    println!("memory_limit: {:?}", profile.memory_limit_bytes());
    if let Some(path) = sandboxer.persister().paths().resource_info(&id) {
        println!("artifacts:    {}", path.display());
    }

    Ok(())
}
