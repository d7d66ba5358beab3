//! Tabvault transfer server
//!
//! Usage:
//!   tabvault-server --data-dir /path/to/data --bind 0.0.0.0:8080
//!
//! Type `LIST` on stdin to see stored files, `SHUTDOWN` (or close stdin) to
//! stop accepting and wait for in-flight transfers.

use std::io::{self, BufRead};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use tabvault_net::handlers::list_files;
use tabvault_net::{Server, ServerConfig};

#[derive(Parser, Debug)]
#[command(name = "tabvault-server")]
#[command(about = "Tabvault table file transfer server")]
#[command(version)]
struct Args {
    /// Address to listen on
    #[arg(short, long, default_value = "0.0.0.0:8080")]
    bind: SocketAddr,

    /// Directory stored files live in
    #[arg(short, long, default_value = "data")]
    data_dir: PathBuf,

    /// Maximum number of connections served at once
    #[arg(short, long, default_value_t = 256)]
    pool_size: usize,

    /// Read/write timeout per connection, in seconds
    #[arg(short, long, default_value_t = 30)]
    timeout_secs: u64,
}

fn main() {
    env_logger::init();

    let args = Args::parse();

    let config = ServerConfig {
        bind_addr: args.bind,
        data_dir: args.data_dir.clone(),
        pool_size: args.pool_size,
        read_timeout: Duration::from_secs(args.timeout_secs),
        write_timeout: Duration::from_secs(args.timeout_secs),
        ..ServerConfig::default()
    };

    let server = match Server::bind(config) {
        Ok(server) => server,
        Err(e) => {
            eprintln!("Server error: {}", e);
            std::process::exit(1);
        }
    };
    let handle = match server.start() {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("Server error: {}", e);
            std::process::exit(1);
        }
    };
    println!("Listening on {}. Commands: LIST, SHUTDOWN", handle.local_addr());

    for line in io::stdin().lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                log::warn!("stdin: {}", e);
                break;
            }
        };
        match line.trim().to_ascii_uppercase().as_str() {
            "" => {}
            "LIST" => match list_files(&args.data_dir) {
                Ok(names) if names.is_empty() => println!("No files in {}", args.data_dir.display()),
                Ok(names) => {
                    println!("Files in {}:", args.data_dir.display());
                    for name in names {
                        println!(" - {}", name);
                    }
                }
                Err(e) => println!("{}", e),
            },
            "SHUTDOWN" => break,
            other => println!("Unknown command '{}'. Commands: LIST, SHUTDOWN", other),
        }
    }

    println!("Shutting down, waiting for active transfers...");
    handle.shutdown();
}
