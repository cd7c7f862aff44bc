use std::{
    error::Error,
    fs::File,
    path::{Path, PathBuf},
};

use clap::Parser;
use picdate::{dump_box_tree, extract_file, ByteSource, ExtractionResult, FileFormat};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Print results as JSON lines (needs the `json_dump` feature)
    #[arg(long)]
    json: bool,

    /// Print the box tree of ISOBMFF files
    #[arg(long)]
    boxes: bool,

    files: Vec<PathBuf>,
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    for path in &cli.files {
        let result = extract_file(path);
        if cli.json {
            print_json(path, &result)?;
        } else {
            print_text(path, &result);
        }
        if cli.boxes {
            print_boxes(path)?;
        }
    }
    Ok(())
}

fn print_text(path: &Path, result: &ExtractionResult) {
    let date = match (result.preferred_date, result.utc_only_date) {
        (Some(t), _) => t.to_string(),
        (None, Some(t)) => format!("{t} UTC"),
        (None, None) => "-".to_owned(),
    };
    let coordinate = result
        .coordinate
        .map(|c| c.to_iso6709())
        .unwrap_or_else(|| "-".to_owned());
    let stem = result.suggested_stem().unwrap_or_default();
    print!("{}\t{date}\t{coordinate}\t{stem}", path.display());
    match &result.diagnostic {
        Some(d) => println!("\t({d})"),
        None => println!(),
    }
}

#[cfg(feature = "json_dump")]
fn print_json(path: &Path, result: &ExtractionResult) -> Result<(), Box<dyn Error>> {
    let mut value = serde_json::to_value(result)?;
    value["path"] = path.display().to_string().into();
    println!("{value}");
    Ok(())
}

#[cfg(not(feature = "json_dump"))]
fn print_json(_: &Path, _: &ExtractionResult) -> Result<(), Box<dyn Error>> {
    Err("rebuild with `--features json_dump` for JSON output".into())
}

fn print_boxes(path: &Path) -> Result<(), Box<dyn Error>> {
    let mut src = ByteSource::new(File::open(path)?)?;
    if src.len() < 8 {
        return Ok(());
    }
    if FileFormat::sniff(&src.read_array::<8>(0)?) != Some(FileFormat::Isobmff) {
        return Ok(());
    }
    let len = src.len();
    for line in dump_box_tree(&mut src, 0..len)? {
        println!("  {line}");
    }
    Ok(())
}
