use std::fs;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use rootcause::prelude::*;
use tracing::info;
use tracing_subscriber::EnvFilter;

use gnoexport::data::bone_source::{extract_node_data, load_bone_source};
use gnoexport::models::gno::GnoFile;
use gnoexport::{ExportConfig, ExportFormat, ModelType, SceneSnapshot, export_to_file};

#[derive(Parser, Debug)]
#[command(name = "gno-export")]
#[command(about = "Sonic Riders GameCube model exporter")]
#[command(version)]
struct Cli {
    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Export a JSON scene snapshot to a GNO model
    Export {
        /// Scene snapshot (JSON)
        scene: PathBuf,

        /// Output .gno file
        #[arg(short, long)]
        output: PathBuf,

        #[arg(long, value_enum, default_value_t = ExportFormat::CharacterModel)]
        format: ExportFormat,

        #[arg(long, value_enum, default_value_t = ModelType::Character)]
        model_type: ModelType,

        /// Omit the texture list chunk
        #[arg(long)]
        no_texture_list: bool,

        /// Model to borrow the bone hierarchy from. Relative to the output
        /// directory unless absolute.
        #[arg(long)]
        bone_data: Option<PathBuf>,

        /// The bone data file is a raw node dump, not a model
        #[arg(long, requires = "bone_data")]
        raw_bone_data: bool,

        /// Matrix index for meshes when there is no rig
        #[arg(long, default_value_t = 0)]
        default_bone: u16,

        /// Also write the texture order to this file, one name per line
        #[arg(long)]
        texture_list: Option<PathBuf>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the chunks, textures and counts of a GNO model
    Inspect {
        /// Input .gno file
        input: PathBuf,
    },

    /// Dump a model's node records for use as raw bone data
    ExtractBones {
        /// Input .gno file
        input: PathBuf,

        /// Output raw node file
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn run_export(
    scene_path: PathBuf,
    output: PathBuf,
    config: ExportConfig,
    texture_list: Option<PathBuf>,
    json: bool,
) -> Result<(), Report> {
    let data = fs::read(&scene_path).context("Failed to read scene file")?;
    let scene: SceneSnapshot =
        serde_json::from_slice(&data).context("Failed to parse scene snapshot")?;

    let report = export_to_file(&scene, &config, &output).context("Export failed")?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialize report")?
        );
    } else {
        print!("{report}");
    }

    if let Some(path) = texture_list {
        fs::write(&path, report.texture_list()).context("Failed to write texture list")?;
        info!(path = %path.display(), "wrote texture order");
    }
    Ok(())
}

fn run_inspect(input: PathBuf) -> Result<(), Report> {
    let data = fs::read(&input).context("Failed to read model")?;
    let gno = GnoFile::parse(&data).context("Failed to parse model")?;

    println!("{}", input.display());
    if let Some(name) = &gno.file_name {
        println!("  name: {name}");
    }
    for chunk in &gno.chunks {
        println!(
            "  {} at 0x{:X}, 0x{:X} bytes",
            chunk.magic_str(),
            chunk.offset,
            chunk.declared_size()
        );
    }

    let d = &gno.object.descriptor;
    println!(
        "  {} nodes, {} materials, {} vertex sets, {} primitives, {} meshes",
        d.node_count,
        d.material_count,
        d.vertex_set_count,
        d.primitive_count,
        gno.object.mesh_count()
    );
    println!("  {} relocations", gno.relocations.len());
    for (i, texture) in gno.textures.iter().enumerate() {
        println!("  texture {i:>3}: {texture}");
    }
    Ok(())
}

fn run_extract_bones(input: PathBuf, output: PathBuf) -> Result<(), Report> {
    let data = fs::read(&input).context("Failed to read model")?;
    let nodes = extract_node_data(&data).context("Failed to read node records")?;
    fs::write(&output, &nodes).context("Failed to write bone data")?;
    // Round-trip check.
    let records = load_bone_source(&output, true).context("Written bone data does not parse")?;
    info!(path = %output.display(), bones = records.len(), "extracted bone data");
    Ok(())
}

fn main() -> Result<(), Report> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    match cli.command {
        Commands::Export {
            scene,
            output,
            format,
            model_type,
            no_texture_list,
            bone_data,
            raw_bone_data,
            default_bone,
            texture_list,
            json,
        } => {
            let config = ExportConfig::builder()
                .format(format)
                .model_type(model_type)
                .include_texture_list(!no_texture_list)
                .maybe_bone_data_source(bone_data)
                .bone_data_is_raw(raw_bone_data)
                .default_bone(default_bone)
                .build();
            run_export(scene, output, config, texture_list, json)
        }
        Commands::Inspect { input } => run_inspect(input),
        Commands::ExtractBones { input, output } => run_extract_bones(input, output),
    }
}
