use std::io::{BufRead, Write};
use anyhow::Context;
use bfs::{Config, Error};
use byte_unit::Byte;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Optional config file as the first argument.
    let config = match std::env::args().nth(1) {
        Some(path) => Config::from_file(&path).with_context(|| format!("loading config {path}"))?,
        None => Config::default(),
    };
    let client = bfs::start(&config).context("starting cluster")?;

    println!("Block file system CLI");
    println!("Commands:");
    println!("  add <file_path>         - Add file");
    println!("  read <file_name> <out>  - Read and reconstruct file");
    println!("  list                    - List stored files");
    println!("  du                      - Show bytes stored across nodes");
    println!("  exit                    - Exit CLI");

    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("bfs> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next() else { break };
        let line = line?;
        let parts: Vec<&str> = line.split_whitespace().collect();
        let Some(command) = parts.first() else { continue };

        match command.to_lowercase().as_str() {
            "add" => {
                let Some(path) = parts.get(1) else {
                    println!("Usage: add <file_path>");
                    continue;
                };
                match client.add_file(path) {
                    Ok(report) => {
                        for a in &report.assignments {
                            println!("Stored block {} in node {}", a.block_num, a.node_id);
                        }
                        println!("Added {} ({:#})", report.file_name, Byte::from_u64(report.size));
                    }
                    Err(e) => println!("Error: {e}"),
                }
            }
            "read" => {
                let (Some(name), Some(out)) = (parts.get(1), parts.get(2)) else {
                    println!("Usage: read <file_name> <output_file>");
                    continue;
                };
                match client.read_file(name, out) {
                    Ok(report) => {
                        for m in &report.missing {
                            println!("Block {} missing from node {}", m.block_num, m.node_id);
                        }
                        println!("File reconstructed at {out}");
                    }
                    Err(Error::FileNotFound(_)) => println!("File not found in metadata."),
                    Err(e) => println!("Error: {e}"),
                }
            }
            "list" => {
                let files = client.list_files();
                if files.is_empty() {
                    println!("No files stored.");
                } else {
                    println!("Files:");
                    files.iter().for_each(|f| println!(" - {f}"));
                }
            }
            "du" => println!("disk used: {:#}", Byte::from_u64(client.du())),
            "exit" => break,
            _ => println!("Unknown command. Type 'add', 'read', 'list', 'du', or 'exit'."),
        }
    }

    println!("Exiting...");
    Ok(())
}
