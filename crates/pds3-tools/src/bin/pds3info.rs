use std::path::{Path, PathBuf};

use clap::Parser;
use env_logger::{Builder, Env};
use pds3_pure::pointer::{resolve_image, ImageDescriptor};
use pds3_pure::{load_label, serialize_label, ConvertOptions, Label, Outcome, Value};

#[derive(Parser)]
#[command(name = "pds3info", about = "Summarize a PDS3 label")]
struct Args {
    /// Label file to inspect
    label: PathBuf,

    /// Print the whole label as JSON instead of a summary
    #[arg(long)]
    json: bool,
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Scalar(_) => "scalar",
        Value::Quantity { .. } => "quantity",
        Value::Sequence(_) => "sequence",
        Value::Group(_) => "block",
        Value::Pointer(_) => "pointer",
    }
}

fn format_descriptor(d: &ImageDescriptor) -> String {
    let mut out = String::new();
    out.push_str(&format!("  Dimensions: {} x {}\n", d.lines, d.line_samples));
    out.push_str(&format!(
        "  Samples: {} bits, {:?} {:?} ({:?})\n",
        d.sample_bits, d.sample_type, d.byte_order, d.format
    ));
    if d.line_prefix_bytes > 0 || d.line_suffix_bytes > 0 {
        out.push_str(&format!(
            "  Line prefix/suffix: {}/{} bytes\n",
            d.line_prefix_bytes, d.line_suffix_bytes
        ));
    }
    out.push_str(&format!("  Data file: {}\n", d.source.path().display()));
    out.push_str(&format!("  Offset: {} bytes\n", d.byte_offset));
    if let Ok(len) = d.data_len() {
        out.push_str(&format!("  Data size: {len} bytes\n"));
    }
    out
}

fn summary(label: &Label, path: &Path, options: &ConvertOptions) -> anyhow::Result<String> {
    let mut out = format!("{}\n", path.display());
    out.push_str(&format!("Keys: {}\n", label.len()));
    for (key, value) in label.iter() {
        out.push_str(&format!("  {key} ({})\n", kind(value)));
    }

    match resolve_image(label, path, options)? {
        Outcome::Converted(d) => {
            out.push_str("Image:\n");
            out.push_str(&format_descriptor(&d));
        }
        Outcome::Skipped(reason) => out.push_str(&format!("Image: skipped, {reason}\n")),
    }
    Ok(out)
}

fn main() -> anyhow::Result<()> {
    Builder::from_env(Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let options = ConvertOptions::default();

    let label = load_label(&args.label, &options)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&serialize_label(&label))?);
    } else {
        print!("{}", summary(&label, &args.label, &options)?);
    }
    Ok(())
}
