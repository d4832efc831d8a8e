use crate::brief_display::BriefDisplay;
use anyhow::Context;
use cbor_codec::{DecodeErrorKind, Decoder, DecoderConfig};
use clap::Parser;
use std::{
    fs::File,
    io::{stdin, stdout, Write},
};

mod brief_display;

#[derive(Parser, Debug)]
struct Args {
    /// Input file to process; use "-" for stdin
    #[clap(short, long, default_value = "-")]
    input: String,

    /// Output file to write; use "-" for stdout
    #[clap(short, long, default_value = "-")]
    output: String,

    /// Output each CBOR item as a diagnostic string
    #[clap(short, long)]
    string: bool,

    /// Censored property names
    ///
    /// Any properties with this name will have their value replaced by "…" in the output.
    #[clap(short, long)]
    censored_properties: Vec<String>,

    /// Maximum depth of the output
    ///
    /// The output will be truncated at this depth, meaning that an array or map
    /// at this depth will be cleared.
    #[clap(short = 'd', long, default_value = "10")]
    max_depth: usize,

    /// Maximum length of an array to be displayed
    ///
    /// Further elements will be cleared from the array.
    #[clap(short, long, default_value = "10")]
    array_length: usize,

    /// Maximum length of a text string to be displayed
    ///
    /// Further characters will be cleared from the string.
    #[clap(short, long, default_value = "10")]
    text_length: usize,

    /// Do not print any diagnostic output to stderr
    #[clap(short, long)]
    quiet: bool,
}

/// The stream ran dry exactly at an item boundary — a clean end of input,
/// not a truncated item.
fn is_clean_eof(kind: &DecodeErrorKind) -> bool {
    matches!(kind, DecodeErrorKind::PrematureEoS { expected: 1, got: 0 })
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let input: Box<dyn std::io::Read> = if args.input == "-" {
        Box::new(stdin())
    } else {
        Box::new(
            File::open(&args.input)
                .context(format!("opening input file `{}`", args.input))?,
        )
    };
    let mut output: Box<dyn std::io::Write> = if args.output == "-" {
        Box::new(stdout())
    } else {
        Box::new(
            File::create(&args.output)
                .context(format!("opening output file `{}`", args.output))?,
        )
    };

    let mut dec = Decoder::new(input, DecoderConfig::default());
    let mut count = 0usize;
    loop {
        match dec.decode() {
            Ok(value) => {
                count += 1;
                if args.string {
                    writeln!(
                        &mut output,
                        "{}",
                        BriefDisplay {
                            value: &value,
                            max_depth: args.max_depth,
                            array_length: args.array_length,
                            censored_properties: &args.censored_properties,
                            text_length: args.text_length,
                        }
                    )?;
                }
            }
            Err(e) if is_clean_eof(e.kind()) => break,
            Err(e) => return Err(anyhow::anyhow!(e.to_string())),
        }
    }

    if !args.quiet {
        eprintln!("Processed {count} items");
    }
    Ok(())
}
