use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use synthlens::memory::{samples, TypeKind};
use synthlens::{
    ChildValue, EngineConfig, Inspector, MemoryImage, OpaqueAccessor, Shape, ShapeRegistry,
    ValueRef,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "synthlens", about = "Inspect engine containers inside memory images")]
struct Cli {
    /// Log recovery decisions at info level (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a sample image holding one of every supported container.
    Sample {
        /// Output path of the JSON image.
        out: PathBuf,
    },
    /// List the symbols of an image and the layout each resolves to.
    List {
        /// JSON image.
        image: PathBuf,
    },
    /// Show the synthetic children of a container, or a single element.
    Inspect {
        /// JSON image.
        image: PathBuf,
        /// Symbol naming the container.
        symbol: String,
        /// Only materialize this logical element.
        #[arg(long)]
        index: Option<usize>,
        /// Step ceiling for each tree traversal.
        #[arg(long, default_value_t = 1000)]
        max_steps: usize,
        /// Maximum elements listed.
        #[arg(long, default_value_t = 256)]
        display_limit: usize,
    },
    /// Print the one-line summary of a string or enum wrapper.
    Summary {
        /// JSON image.
        image: PathBuf,
        /// Symbol naming the value.
        symbol: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Sample { out } => run_sample(&out)?,
        Commands::List { image } => run_list(&image)?,
        Commands::Inspect {
            image,
            symbol,
            index,
            max_steps,
            display_limit,
        } => {
            let config = EngineConfig::default()
                .with_max_steps(max_steps)
                .with_display_limit(display_limit);
            run_inspect(&image, &symbol, index, config)?
        }
        Commands::Summary { image, symbol } => run_summary(&image, &symbol)?,
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn run_sample(out: &Path) -> Result<()> {
    let image = samples::standard().context("failed to build sample image")?;
    let json = image.to_json_pretty().context("failed to serialize image")?;
    std::fs::write(out, json).with_context(|| format!("failed to write {}", out.display()))?;
    tracing::info!(path = %out.display(), symbols = image.symbols().count(), "sample image written");
    println!("wrote {}", out.display());
    Ok(())
}

fn load_image(path: &Path) -> Result<MemoryImage> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read image {}", path.display()))?;
    MemoryImage::from_json(&json).with_context(|| format!("failed to parse image {}", path.display()))
}

fn lookup(image: &MemoryImage, symbol: &str) -> Result<ValueRef> {
    image
        .symbol(symbol)
        .ok_or_else(|| anyhow!("no symbol `{symbol}` in image"))
}

fn run_list(path: &Path) -> Result<()> {
    let image = load_image(path)?;
    let registry = ShapeRegistry::with_defaults();

    for (name, value) in image.symbols() {
        let type_name = image.type_name(&value.ty);
        let layout = match registry.resolve(&type_name) {
            Some(kind) => kind.to_string(),
            None if registry.is_enum(&type_name) => "enum".to_string(),
            None => "-".to_string(),
        };
        println!("{name}\t{layout}\t{type_name}");
    }
    Ok(())
}

fn run_inspect(path: &Path, symbol: &str, index: Option<usize>, config: EngineConfig) -> Result<()> {
    let image = load_image(path)?;
    let value = lookup(&image, symbol)?;
    let inspector = Inspector::new(&image, ShapeRegistry::with_defaults(), config);

    let mut children = inspector
        .children(&value)
        .with_context(|| format!("cannot inspect `{symbol}`"))?;
    let view = children.view();
    println!(
        "{symbol}: {} ({}, {} elements)",
        view.descriptor().type_name,
        view.descriptor().kind,
        view.count()
    );

    if let Some(index) = index {
        let view = children.view_mut();
        let handle = match view.try_element_at(index) {
            Ok(handle) => handle,
            Err(err) => bail!("element {index} unavailable: {err}"),
        };
        println!("[{index}] = {}", render_value(&image, &handle));
        let stats = view.stats();
        if stats != Default::default() {
            println!("{}", stats.report());
        }
        return Ok(());
    }

    for index in 0..children.num_children() {
        match children.child_at_index(index) {
            Some(child) => match child.value {
                ChildValue::Value(handle) => {
                    println!("  {} = {}", child.name, render_value(&image, &handle))
                }
                ChildValue::Content(bytes) => {
                    println!("  {} = {:?}", child.name, String::from_utf8_lossy(&bytes))
                }
            },
            None => println!("  #{index} = <unavailable>"),
        }
    }

    let view = children.view();
    if view.shape() == Shape::OrderedTree {
        tracing::info!(stats = %view.stats().report(), "tree traversal");
    }
    Ok(())
}

fn run_summary(path: &Path, symbol: &str) -> Result<()> {
    let image = load_image(path)?;
    let value = lookup(&image, symbol)?;
    let inspector = Inspector::new(&image, ShapeRegistry::with_defaults(), EngineConfig::default());

    match inspector.summary(&value) {
        Some(summary) => println!("{summary}"),
        None => bail!(
            "`{symbol}` ({}) has no summary",
            image.type_name(&value.ty)
        ),
    }
    Ok(())
}

/// Scalars print their value; structs print their address and any key/value fields
fn render_value(image: &MemoryImage, handle: &ValueRef) -> String {
    let type_name = image.type_name(&handle.ty);
    match image.type_def(handle.ty).map(|def| &def.kind) {
        Some(TypeKind::Pointer { .. }) => {
            format!("({type_name}) {:#x}", image.unsigned_value(handle, 0))
        }
        Some(TypeKind::Unsigned | TypeKind::Enum { .. }) => {
            format!("({type_name}) {}", image.unsigned_value(handle, 0))
        }
        _ => {
            let entries: Vec<String> = ["m_Key", "m_Value"]
                .iter()
                .filter_map(|name| {
                    let field = image.field(handle, name).ok()?;
                    Some(format!("{name}: {}", image.unsigned_value(&field, 0)))
                })
                .collect();
            if entries.is_empty() {
                format!("({type_name}) @ {:#x}", handle.address)
            } else {
                format!("({type_name}) {{ {} }}", entries.join(", "))
            }
        }
    }
}
