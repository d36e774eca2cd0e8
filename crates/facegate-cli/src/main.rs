use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use facegate_core::{EmbeddingStore, FacePipeline, JsonFileStore, OnnxPipeline};
use reqwest::multipart::{Form, Part};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "facegate", about = "facegate face registration and verification CLI")]
struct Cli {
    /// Base URL of a running facegated
    #[arg(long, global = true, env = "FACEGATE_SERVER", default_value = "http://127.0.0.1:8000")]
    server: String,

    /// Embedding store file, for offline commands
    #[arg(long, global = true, env = "FACEGATE_STORE_PATH", default_value = "encodings.json")]
    store: PathBuf,

    /// Directory holding the ONNX models, for `detect`
    #[arg(long, global = true, env = "FACEGATE_MODEL_DIR")]
    model_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a face image under a user id
    Register {
        #[arg(short, long)]
        user_id: String,
        image: PathBuf,
    },
    /// Find the registered user matching a face image
    Verify { image: PathBuf },
    /// Show daemon health
    Status,
    /// List user ids in the store file
    List,
    /// Remove a user id from the store file
    Remove { user_id: String },
    /// Run face detection locally and print the faces found
    Detect { image: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let server = cli.server.trim_end_matches('/');

    match cli.command {
        Commands::Register { user_id, image } => {
            let form = Form::new()
                .text("user_id", user_id)
                .part("file", image_part(&image)?);
            print_response(post(server, "/register-face", form).await?).await?;
        }
        Commands::Verify { image } => {
            let form = Form::new().part("file", image_part(&image)?);
            print_response(post(server, "/verify-face", form).await?).await?;
        }
        Commands::Status => {
            let response = reqwest::get(format!("{server}/health"))
                .await
                .with_context(|| format!("facegated not reachable at {server}"))?;
            print_response(response).await?;
        }
        Commands::List => {
            let gallery = JsonFileStore::new(&cli.store).load()?;
            if gallery.is_empty() {
                println!("No faces registered");
            }
            for (user_id, embedding) in &gallery {
                println!("{user_id}\t{} dims", embedding.dim());
            }
        }
        Commands::Remove { user_id } => {
            let store = JsonFileStore::new(&cli.store);
            let mut gallery = store.load()?;
            if gallery.remove(&user_id).is_none() {
                bail!("no entry for user id {user_id:?} in {}", cli.store.display());
            }
            store.save(&gallery)?;
            println!("Removed {user_id}");
        }
        Commands::Detect { image } => {
            let model_dir = cli.model_dir.unwrap_or_else(facegate_core::default_model_dir);
            detect(&model_dir, &image)?;
        }
    }

    Ok(())
}

fn image_part(path: &Path) -> Result<Part> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    Ok(Part::bytes(bytes).file_name(file_name))
}

async fn post(server: &str, path: &str, form: Form) -> Result<reqwest::Response> {
    reqwest::Client::new()
        .post(format!("{server}{path}"))
        .multipart(form)
        .send()
        .await
        .with_context(|| format!("facegated not reachable at {server}"))
}

/// Print the body, pretty-printed when it is JSON. Non-2xx is reported on stderr
/// but the body is still shown, since 400s carry a structured message.
async fn print_response(response: reqwest::Response) -> Result<()> {
    let status = response.status();
    let text = response.text().await?;
    match serde_json::from_str::<serde_json::Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{text}"),
    }
    if !status.is_success() {
        bail!("request failed with HTTP {status}");
    }
    Ok(())
}

fn detect(model_dir: &Path, image_path: &Path) -> Result<()> {
    let image = image::open(image_path)
        .with_context(|| format!("decoding {}", image_path.display()))?
        .to_rgb8();
    let mut pipeline = OnnxPipeline::load(model_dir)
        .with_context(|| format!("loading models from {}", model_dir.display()))?;

    let faces = pipeline.detect(&image)?;
    println!(
        "{}: {}x{}, {} face(s)",
        image_path.display(),
        image.width(),
        image.height(),
        faces.len()
    );
    for (i, face) in faces.iter().enumerate() {
        println!(
            "  #{i}: x={:.0} y={:.0} w={:.0} h={:.0} confidence={:.3}",
            face.x, face.y, face.width, face.height, face.confidence
        );
    }
    if let [face] = faces.as_slice() {
        let embedding = pipeline.embed(&image, face)?;
        println!("  embedding: {} dims", embedding.dim());
    }
    Ok(())
}
