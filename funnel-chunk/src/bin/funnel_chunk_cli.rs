use clap::Parser;
use funnel_chunk::{Chunker, DEFAULT_CHUNK_LIMIT};
use serde::Serialize;
use std::fs;
use std::io::{self, Read};

/// A CLI tool to chunk a document into JSON output using funnel-chunk.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the input text file. If not provided, reads from stdin.
    #[arg(short, long)]
    input: Option<String>,

    /// Maximum length for each chunk in characters.
    #[arg(short, long, default_value_t = DEFAULT_CHUNK_LIMIT)]
    max_chunk_length: usize,

    /// Also emit the sanitized form of each chunk.
    #[arg(short, long)]
    sanitized: bool,
}

fn main() -> io::Result<()> {
    let args = Args::parse();

    let raw_text = if let Some(input_path) = args.input {
        fs::read_to_string(input_path)?
    } else {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    };

    let chunker = Chunker::new(args.max_chunk_length);
    let chunks = chunker.chunk(&raw_text);

    #[derive(Serialize)]
    struct ChunkRow<'a> {
        suffix: &'a str,
        text: &'a str,
        #[serde(skip_serializing_if = "Option::is_none")]
        sanitized: Option<String>,
    }

    let rows: Vec<ChunkRow> = chunks
        .iter()
        .map(|c| ChunkRow {
            suffix: &c.suffix,
            text: &c.text,
            sanitized: args.sanitized.then(|| chunker.sanitize(&c.text)),
        })
        .collect();

    let json_output = serde_json::to_string_pretty(&rows)?;
    println!("{}", json_output);

    Ok(())
}
